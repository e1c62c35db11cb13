pub mod engine;
pub mod store;

pub use engine::{
    build_download_args, classify_output_line, default_download_dir, install_managed_ytdlp,
    load_settings, resolve_ytdlp_binary, save_settings, validate_media_url, ControllerConfig,
    DownloadController, DownloadEvent, DownloadObserver, DownloadOptions, InstallProgress,
    MetadataFetcher, ParsedLine, PlaylistEntry, PlaylistMetadata, ProgressUpdate, StopOutcome,
    ToolSettings, ToolStatus, VersionStatus, VideoMetadata,
};
pub use store::{DownloadRecord, HistoryEntry, HistoryStore};
