// Tool settings, yt-dlp binary resolution and URL validation shared by the engine.
use super::*;
use which::which;

pub(super) const SETTINGS_FILE_NAME: &str = "settings.json";
pub(super) const APP_DIR_NAME: &str = "mediagrab";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSettings {
    pub ytdlp_mode: String,
    pub ytdlp_custom_path: Option<String>,
    pub download_dir: Option<String>,
    pub auto_update_ytdlp: bool,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ytdlp_mode: "managed".to_string(),
            ytdlp_custom_path: None,
            download_dir: None,
            auto_update_ytdlp: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolStatus {
    pub name: String,
    pub available: bool,
    pub source: String,
    pub path: Option<String>,
    pub version: Option<String>,
    pub message: Option<String>,
}

pub(super) fn sanitize_optional_path(value: Option<String>) -> Result<Option<String>, String> {
    match value {
        None => Ok(None),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            if trimmed.len() > 512 {
                return Err("Path is too long.".to_string());
            }
            if trimmed.chars().any(|ch| ch.is_control()) {
                return Err("Path contains invalid control characters.".to_string());
            }
            Ok(Some(trimmed.to_string()))
        }
    }
}

pub(super) fn normalize_settings(mut settings: ToolSettings) -> Result<ToolSettings, String> {
    settings.ytdlp_mode = settings.ytdlp_mode.trim().to_lowercase();
    if settings.ytdlp_mode != "managed"
        && settings.ytdlp_mode != "custom"
        && settings.ytdlp_mode != "system"
    {
        settings.ytdlp_mode = "managed".to_string();
    }
    settings.ytdlp_custom_path = sanitize_optional_path(settings.ytdlp_custom_path)?;
    settings.download_dir = sanitize_optional_path(settings.download_dir)?;
    Ok(settings)
}

pub(super) fn app_config_dir() -> Result<PathBuf, String> {
    let base = dirs::config_dir().ok_or_else(|| "Failed to resolve config dir.".to_string())?;
    let path = base.join(APP_DIR_NAME);
    fs::create_dir_all(&path).map_err(|error| format!("Failed to create config dir: {error}"))?;
    Ok(path)
}

pub(super) fn app_data_dir() -> Result<PathBuf, String> {
    let base = dirs::data_dir().ok_or_else(|| "Failed to resolve data dir.".to_string())?;
    let path = base.join(APP_DIR_NAME);
    fs::create_dir_all(&path).map_err(|error| format!("Failed to create data dir: {error}"))?;
    Ok(path)
}

pub fn settings_file_path() -> Result<PathBuf, String> {
    Ok(app_config_dir()?.join(SETTINGS_FILE_NAME))
}

pub fn load_settings_from(path: &Path) -> Result<ToolSettings, String> {
    if !path.exists() {
        return Ok(ToolSettings::default());
    }

    let raw =
        fs::read_to_string(path).map_err(|error| format!("Failed to read settings: {error}"))?;
    let parsed: ToolSettings =
        serde_json::from_str(&raw).map_err(|error| format!("Failed to parse settings: {error}"))?;
    normalize_settings(parsed)
}

pub fn save_settings_to(path: &Path, settings: ToolSettings) -> Result<ToolSettings, String> {
    let normalized = normalize_settings(settings)?;
    let payload = serde_json::to_string_pretty(&normalized)
        .map_err(|error| format!("Failed to serialize settings: {error}"))?;
    fs::write(path, payload).map_err(|error| format!("Failed to save settings: {error}"))?;
    Ok(normalized)
}

pub fn load_settings() -> Result<ToolSettings, String> {
    load_settings_from(&settings_file_path()?)
}

pub fn save_settings(settings: ToolSettings) -> Result<ToolSettings, String> {
    save_settings_to(&settings_file_path()?, settings)
}

pub fn default_download_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Downloads")
        .join(APP_DIR_NAME)
}

pub(super) fn platform_bin(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

pub(super) fn find_system_ytdlp_path() -> Option<PathBuf> {
    which("yt-dlp").ok()
}

pub(super) fn canonicalize_existing_path(path: &Path) -> Result<PathBuf, String> {
    fs::canonicalize(path).map_err(|error| format!("Failed to resolve path: {error}"))
}

pub(super) fn ensure_custom_binary(path: &str) -> Option<PathBuf> {
    let parsed = PathBuf::from(path);
    if !parsed.exists() {
        return None;
    }
    let canonical = canonicalize_existing_path(&parsed).ok()?;
    if canonical.is_file() {
        Some(canonical)
    } else {
        None
    }
}

pub fn managed_ytdlp_path() -> Result<PathBuf, String> {
    let tools_dir = app_data_dir()?.join("tools");
    fs::create_dir_all(&tools_dir)
        .map_err(|error| format!("Failed to create tools dir: {error}"))?;
    Ok(tools_dir.join(platform_bin("yt-dlp")))
}

pub fn resolve_ytdlp_binary(settings: &ToolSettings) -> Option<(PathBuf, String)> {
    if settings.ytdlp_mode == "custom" {
        return settings
            .ytdlp_custom_path
            .as_ref()
            .and_then(|value| ensure_custom_binary(value))
            .map(|path| (path, "custom".to_string()));
    }

    if settings.ytdlp_mode == "managed" {
        if let Ok(path) = managed_ytdlp_path() {
            if path.exists() {
                return Some((path, "managed".to_string()));
            }
        }
    }

    if let Some(system) = find_system_ytdlp_path() {
        return Some((system, "system".to_string()));
    }

    None
}

pub(super) async fn run_version(binary: &Path, arg: &str) -> Option<String> {
    let run = run_captured(binary, &[arg]).await.ok()?;
    if !run.success {
        return None;
    }
    run.stdout
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
}

pub async fn inspect_tool(
    path_with_source: Option<(PathBuf, String)>,
    name: &str,
    version_arg: &str,
) -> ToolStatus {
    match path_with_source {
        Some((path, source)) => {
            let version = run_version(&path, version_arg).await;
            ToolStatus {
                name: name.to_string(),
                available: version.is_some(),
                source,
                path: Some(path.to_string_lossy().to_string()),
                version,
                message: None,
            }
        }
        None => ToolStatus {
            name: name.to_string(),
            available: false,
            source: "missing".to_string(),
            path: None,
            version: None,
            message: Some("Tool not found.".to_string()),
        },
    }
}

pub async fn build_tool_status(settings: &ToolSettings) -> ToolStatus {
    inspect_tool(resolve_ytdlp_binary(settings), "yt-dlp", "--version").await
}

pub fn validate_media_url(raw: &str) -> Result<Url, String> {
    let parsed = Url::parse(raw.trim()).map_err(|_| "Invalid URL.".to_string())?;
    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Err("Only HTTP(S) links are supported.".to_string());
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err("Media link must not include credentials.".to_string());
    }
    if parsed.host_str().is_none() {
        return Err("Failed to resolve link domain.".to_string());
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_coerces_unknown_mode_to_managed() {
        let settings = ToolSettings {
            ytdlp_mode: "  Portable ".to_string(),
            ..ToolSettings::default()
        };
        let normalized = normalize_settings(settings).expect("normalize");
        assert_eq!(normalized.ytdlp_mode, "managed");
    }

    #[test]
    fn normalize_trims_paths_and_drops_empty_ones() {
        let settings = ToolSettings {
            ytdlp_custom_path: Some("  /opt/yt-dlp  ".to_string()),
            download_dir: Some("   ".to_string()),
            ..ToolSettings::default()
        };
        let normalized = normalize_settings(settings).expect("normalize");
        assert_eq!(normalized.ytdlp_custom_path.as_deref(), Some("/opt/yt-dlp"));
        assert_eq!(normalized.download_dir, None);
    }

    #[test]
    fn normalize_rejects_control_characters() {
        let settings = ToolSettings {
            download_dir: Some("bad\u{0007}dir".to_string()),
            ..ToolSettings::default()
        };
        assert!(normalize_settings(settings).is_err());
    }

    #[test]
    fn settings_round_trip_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");

        let missing = load_settings_from(&path).expect("defaults for missing file");
        assert_eq!(missing.ytdlp_mode, "managed");

        let saved = save_settings_to(
            &path,
            ToolSettings {
                ytdlp_mode: "SYSTEM".to_string(),
                download_dir: Some("/tmp/media".to_string()),
                ..ToolSettings::default()
            },
        )
        .expect("save");
        assert_eq!(saved.ytdlp_mode, "system");

        let loaded = load_settings_from(&path).expect("load");
        assert_eq!(loaded.ytdlp_mode, "system");
        assert_eq!(loaded.download_dir.as_deref(), Some("/tmp/media"));
    }

    #[test]
    fn custom_mode_requires_an_existing_file() {
        let settings = ToolSettings {
            ytdlp_mode: "custom".to_string(),
            ytdlp_custom_path: Some("/definitely/not/here/yt-dlp".to_string()),
            ..ToolSettings::default()
        };
        assert!(resolve_ytdlp_binary(&settings).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn custom_mode_resolves_an_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let binary = dir.path().join("yt-dlp");
        fs::write(&binary, "#!/bin/sh\n").expect("write stub");

        let settings = ToolSettings {
            ytdlp_mode: "custom".to_string(),
            ytdlp_custom_path: Some(binary.to_string_lossy().to_string()),
            ..ToolSettings::default()
        };
        let (resolved, source) = resolve_ytdlp_binary(&settings).expect("resolved");
        assert_eq!(source, "custom");
        assert!(resolved.is_file());
    }

    #[test]
    fn default_download_dir_ends_with_app_folder() {
        let dir = default_download_dir();
        assert!(dir.ends_with(Path::new("Downloads").join(APP_DIR_NAME)));
    }

    #[test]
    fn media_url_validation() {
        assert!(validate_media_url("https://example.com/watch?v=abc").is_ok());
        assert!(validate_media_url("http://example.com/video").is_ok());
        assert!(validate_media_url("ftp://example.com/video").is_err());
        assert!(validate_media_url("https://user:pw@example.com/video").is_err());
        assert!(validate_media_url("not a url").is_err());
    }
}
