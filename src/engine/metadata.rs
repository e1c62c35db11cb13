// One-shot yt-dlp probes: JSON dumps for videos/playlists and version checks.
// These never touch the download controller's job slot.
use super::*;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub title: String,
    pub duration_seconds: f64,
    pub uploader: String,
    pub view_count: u64,
    pub upload_date: String,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistEntry {
    pub title: String,
    pub duration_seconds: f64,
    pub uploader: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistMetadata {
    pub title: String,
    pub entries: Vec<PlaylistEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionStatus {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ProbePayload {
    #[serde(rename = "_type")]
    pub(super) record_type: Option<String>,
    pub(super) title: Option<String>,
    pub(super) duration: Option<f64>,
    pub(super) uploader: Option<String>,
    pub(super) view_count: Option<u64>,
    pub(super) upload_date: Option<String>,
    pub(super) thumbnail: Option<String>,
}

pub(super) fn fetch_failure_message(stderr: &str, fallback: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

pub struct MetadataFetcher {
    binary: PathBuf,
}

impl MetadataFetcher {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    pub async fn fetch_video_info(&self, url: &str) -> Result<VideoMetadata, String> {
        let target = validate_media_url(url)?;
        let run = run_captured(
            &self.binary,
            &["--dump-json", "--no-download", target.as_str()],
        )
        .await?;
        let body = run.stdout.trim();
        if !run.success || body.is_empty() {
            return Err(fetch_failure_message(&run.stderr, "Failed to get video info"));
        }

        // A stream of JSON lines is tolerated; the video record is the first.
        let first_line = body.lines().next().unwrap_or_default();
        let payload: ProbePayload = serde_json::from_str(first_line)
            .map_err(|_| "Failed to parse video info".to_string())?;
        Ok(VideoMetadata {
            title: payload.title.unwrap_or_else(|| "Unknown".to_string()),
            duration_seconds: payload.duration.unwrap_or(0.0),
            uploader: payload.uploader.unwrap_or_else(|| "Unknown".to_string()),
            view_count: payload.view_count.unwrap_or(0),
            upload_date: payload.upload_date.unwrap_or_else(|| "Unknown".to_string()),
            thumbnail_url: payload.thumbnail,
        })
    }

    pub async fn fetch_playlist_info(&self, url: &str) -> Result<PlaylistMetadata, String> {
        let target = validate_media_url(url)?;
        let run = run_captured(
            &self.binary,
            &["--dump-json", "--flat-playlist", target.as_str()],
        )
        .await?;
        let body = run.stdout.trim();
        if !run.success || body.is_empty() {
            return Err(fetch_failure_message(
                &run.stderr,
                "Failed to get playlist info",
            ));
        }

        let mut title = "Unknown Playlist".to_string();
        let mut entries = Vec::new();
        for line in body.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let payload: ProbePayload = serde_json::from_str(trimmed)
                .map_err(|_| "Failed to parse playlist info".to_string())?;
            if payload.record_type.as_deref() == Some("playlist") {
                if let Some(playlist_title) = payload.title {
                    title = playlist_title;
                }
            } else {
                entries.push(PlaylistEntry {
                    title: payload.title.unwrap_or_else(|| "Unknown".to_string()),
                    duration_seconds: payload.duration.unwrap_or(0.0),
                    uploader: payload.uploader.unwrap_or_else(|| "Unknown".to_string()),
                });
            }
        }
        Ok(PlaylistMetadata { title, entries })
    }

    // A status query, not an action: a missing or broken executable is a
    // not-found result, never an error.
    pub async fn check_version(&self) -> VersionStatus {
        match run_captured(&self.binary, &["--version"]).await {
            Ok(run) => {
                let version = run.stdout.trim().to_string();
                if run.success && !version.is_empty() {
                    VersionStatus {
                        found: true,
                        version: Some(version),
                    }
                } else {
                    VersionStatus {
                        found: false,
                        version: None,
                    }
                }
            }
            Err(_) => VersionStatus {
                found: false,
                version: None,
            },
        }
    }
}
