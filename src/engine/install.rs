// Managed yt-dlp installation: trusted release download, checksum
// verification and atomic placement into the tools directory. Blocking by
// design; callers run it on a blocking task.
use super::*;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

pub(super) const YTDLP_SHA256SUMS_URL: &str =
    "https://github.com/yt-dlp/yt-dlp/releases/latest/download/SHA2-256SUMS";
pub(super) const TRUSTED_DOWNLOAD_HOSTS: [&str; 2] =
    ["github.com", "objects.githubusercontent.com"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallProgress {
    pub status: String,
    pub message: String,
    pub detail: Option<String>,
    pub progress: Option<f32>,
}

fn report_progress(
    report: &dyn Fn(InstallProgress),
    status: &str,
    message: &str,
    detail: Option<String>,
    progress: Option<f32>,
) {
    report(InstallProgress {
        status: status.to_string(),
        message: message.to_string(),
        detail,
        progress,
    });
}

pub(super) fn ytdlp_download_url() -> &'static str {
    if cfg!(target_os = "windows") {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp.exe"
    } else {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp"
    }
}

pub(super) fn ytdlp_asset_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    }
}

pub(super) fn trusted_host_match(host: &str, allowed_host: &str) -> bool {
    host.eq_ignore_ascii_case(allowed_host)
        || host
            .to_ascii_lowercase()
            .ends_with(&format!(".{}", allowed_host.to_ascii_lowercase()))
}

pub(super) fn ensure_trusted_https_url(url: &str) -> Result<Url, String> {
    let parsed = Url::parse(url).map_err(|_| "Invalid source URL.".to_string())?;
    if parsed.scheme() != "https" {
        return Err("Only HTTPS download sources are allowed.".to_string());
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err("Source URL must not include credentials.".to_string());
    }
    if parsed.port().is_some() {
        return Err("Source URL must not include a custom port.".to_string());
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| "Failed to resolve source domain.".to_string())?;
    if TRUSTED_DOWNLOAD_HOSTS
        .iter()
        .any(|allowed| trusted_host_match(host, allowed))
    {
        return Ok(parsed);
    }
    Err(format!("Untrusted download source: {host}"))
}

pub(super) fn download_text(url: &str) -> Result<String, String> {
    let parsed = ensure_trusted_https_url(url)?;
    let response = ureq::get(parsed.as_str())
        .call()
        .map_err(|error| format!("Failed to fetch checksum: {error}"))?;
    let mut reader = response.into_reader();
    let mut body = Vec::new();
    reader
        .read_to_end(&mut body)
        .map_err(|error| format!("Failed to read checksum: {error}"))?;
    String::from_utf8(body).map_err(|_| "Checksum response was not valid UTF-8.".to_string())
}

pub(super) fn parse_sha256_for_asset(manifest: &str, asset_name: &str) -> Option<String> {
    for line in manifest.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let normalized = trimmed.replace('*', " ");
        let mut parts = normalized.split_whitespace();
        let Some(hash) = parts.next() else {
            continue;
        };
        let Some(filename) = parts
            .next_back()
            .or_else(|| normalized.split_whitespace().nth(1))
        else {
            continue;
        };
        let candidate_name = filename.trim().trim_start_matches("./");
        if candidate_name.eq_ignore_ascii_case(asset_name)
            && hash.len() == 64
            && hash.chars().all(|ch| ch.is_ascii_hexdigit())
        {
            return Some(hash.to_ascii_lowercase());
        }
    }
    None
}

pub(super) fn expected_ytdlp_sha256() -> Result<String, String> {
    let manifest = download_text(YTDLP_SHA256SUMS_URL)?;
    parse_sha256_for_asset(&manifest, ytdlp_asset_name())
        .ok_or_else(|| "Failed to find SHA256 for selected yt-dlp binary.".to_string())
}

pub(super) fn sha256_of_file(path: &Path) -> Result<String, String> {
    let mut file = fs::File::open(path)
        .map_err(|error| format!("Failed to open file for checksum: {error}"))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 64 * 1024];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|error| format!("Failed to read file for checksum: {error}"))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

pub(super) fn verify_download_checksum(path: &Path, expected_sha256: &str) -> Result<(), String> {
    let expected = expected_sha256.trim().to_ascii_lowercase();
    if expected.len() != 64 || !expected.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err("Invalid expected SHA256 format.".to_string());
    }
    let actual = sha256_of_file(path)?;
    if actual != expected {
        return Err(format!(
            "Checksum mismatch. Expected {expected}, got {actual}."
        ));
    }
    Ok(())
}

pub(super) fn download_to_path_with_progress(
    report: &dyn Fn(InstallProgress),
    source_url: &str,
    destination_path: &Path,
    start_progress: f32,
    end_progress: f32,
) -> Result<(), String> {
    let parsed_url = ensure_trusted_https_url(source_url)?;
    let source_host = parsed_url
        .host_str()
        .map(|host| host.to_string())
        .unwrap_or_else(|| "unknown source".to_string());
    report_progress(
        report,
        "progress",
        "Connecting to source...",
        Some(source_host.clone()),
        Some(start_progress),
    );

    let response = ureq::get(parsed_url.as_str())
        .call()
        .map_err(|error| format!("Failed to download file: {error}"))?;

    let total_size = response
        .header("content-length")
        .and_then(|value| value.parse::<u64>().ok());

    let mut reader = response.into_reader();
    let mut file = fs::File::create(destination_path)
        .map_err(|error| format!("Failed to create temp file: {error}"))?;

    let mut downloaded = 0_u64;
    let mut last_emitted_percent = -1_i32;
    let mut buffer = [0_u8; 64 * 1024];
    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|error| format!("Failed to read downloaded stream: {error}"))?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])
            .map_err(|error| format!("Failed to write downloaded file: {error}"))?;
        downloaded += read as u64;

        if let Some(total) = total_size {
            if total > 0 {
                let ratio = (downloaded as f64 / total as f64).clamp(0.0, 1.0);
                let progress = start_progress + (end_progress - start_progress) * ratio as f32;
                let percent = (ratio * 100.0).round() as i32;
                if percent != last_emitted_percent && percent % 5 == 0 {
                    last_emitted_percent = percent;
                    let detail = format!(
                        "{:.1}/{:.1} MB • {}",
                        downloaded as f64 / (1024.0 * 1024.0),
                        total as f64 / (1024.0 * 1024.0),
                        source_host
                    );
                    report_progress(
                        report,
                        "progress",
                        &format!("Downloading artifacts: {percent}%"),
                        Some(detail),
                        Some(progress),
                    );
                }
            }
        }
    }

    if downloaded < 1024 * 256 {
        return Err("Downloaded file is too small and may be corrupted.".to_string());
    }

    report_progress(
        report,
        "progress",
        "File downloaded successfully.",
        Some(source_host),
        Some(end_progress),
    );
    Ok(())
}

pub fn install_managed_ytdlp(report: &dyn Fn(InstallProgress)) -> Result<PathBuf, String> {
    report_progress(
        report,
        "progress",
        "Preparing yt-dlp setup...",
        None,
        Some(0.03),
    );
    report_progress(
        report,
        "progress",
        "Verifying yt-dlp release checksum...",
        None,
        Some(0.06),
    );
    let expected_sha256 = expected_ytdlp_sha256()?;

    let target_path = managed_ytdlp_path()?;
    let temp_path = target_path.with_extension("tmp");
    download_to_path_with_progress(report, ytdlp_download_url(), &temp_path, 0.08, 0.88)?;
    report_progress(
        report,
        "progress",
        "Validating downloaded yt-dlp integrity...",
        None,
        Some(0.91),
    );
    if let Err(error) = verify_download_checksum(&temp_path, &expected_sha256) {
        let _ = fs::remove_file(&temp_path);
        return Err(error);
    }

    report_progress(
        report,
        "progress",
        "Applying yt-dlp update...",
        None,
        Some(0.94),
    );

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o755);
        fs::set_permissions(&temp_path, perms)
            .map_err(|error| format!("Failed to set yt-dlp permissions: {error}"))?;
    }

    fs::rename(&temp_path, &target_path)
        .map_err(|error| format!("Failed to complete yt-dlp installation: {error}"))?;

    log::info!("installed managed yt-dlp at {}", target_path.display());
    report_progress(
        report,
        "success",
        "yt-dlp installed successfully.",
        Some(target_path.to_string_lossy().to_string()),
        Some(1.0),
    );
    Ok(target_path)
}
