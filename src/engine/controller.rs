// Single-slot download job controller: argument building, startup handshake,
// observer event dispatch and last-writer-wins replacement.
use super::*;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use tokio::time::timeout;

pub(super) const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

fn default_subtitle_lang() -> String {
    "en".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOptions {
    pub urls: Vec<String>,
    pub output_dir: Option<String>,
    pub quality: String,
    pub format: String,
    pub playlist: bool,
    pub subtitles: bool,
    #[serde(default = "default_subtitle_lang")]
    pub subtitle_lang: String,
    pub thumbnail: bool,
    pub metadata: bool,
    pub description: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            output_dir: None,
            quality: "best".to_string(),
            format: "mp4".to_string(),
            playlist: false,
            subtitles: false,
            subtitle_lang: default_subtitle_lang(),
            thumbnail: false,
            metadata: false,
            description: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DownloadEvent {
    Progress(ProgressUpdate),
    Output { line: String },
    Complete { code: Option<i32> },
    Error { message: String },
}

pub trait DownloadObserver: Send + Sync {
    fn on_event(&self, event: DownloadEvent);
}

impl DownloadObserver for tokio::sync::mpsc::UnboundedSender<DownloadEvent> {
    fn on_event(&self, event: DownloadEvent) {
        let _ = self.send(event);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopOutcome {
    pub stopped: bool,
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub ytdlp_binary: PathBuf,
    pub startup_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            ytdlp_binary: PathBuf::from(platform_bin("yt-dlp")),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }
}

struct ActiveJob {
    id: u64,
    kill: Arc<Notify>,
}

pub struct DownloadController {
    config: ControllerConfig,
    observer: Arc<dyn DownloadObserver>,
    active: Arc<Mutex<Option<ActiveJob>>>,
    next_job_id: AtomicU64,
}

pub fn build_download_args(options: &DownloadOptions) -> Vec<String> {
    let mut args = vec!["--newline".to_string(), "--no-colors".to_string()];

    if let Some(output_dir) = options
        .output_dir
        .as_deref()
        .map(str::trim)
        .filter(|dir| !dir.is_empty())
    {
        let template = Path::new(output_dir).join("%(title)s.%(ext)s");
        args.push("-o".to_string());
        args.push(template.to_string_lossy().to_string());
    }

    match options.format.as_str() {
        "mp3" => {
            // Audio quality 0 is the highest-fidelity tier; only mp3 requests it.
            for arg in ["-x", "--audio-format", "mp3", "--audio-quality", "0"] {
                args.push(arg.to_string());
            }
        }
        "m4a" => {
            for arg in ["-x", "--audio-format", "m4a"] {
                args.push(arg.to_string());
            }
        }
        container => {
            let selector = if options.quality == "best" {
                format!("best[ext={container}]/best")
            } else {
                let height = options.quality.trim_end_matches('p');
                format!(
                    "best[height<={height}][ext={container}]/best[height<={height}]/best[ext={container}]/best"
                )
            };
            args.push("-f".to_string());
            args.push(selector);
        }
    }

    if options.playlist {
        args.push("--yes-playlist".to_string());
    } else {
        args.push("--no-playlist".to_string());
    }

    if options.subtitles {
        let lang = options.subtitle_lang.trim();
        args.push("--write-auto-subs".to_string());
        args.push("--sub-lang".to_string());
        args.push(if lang.is_empty() {
            default_subtitle_lang()
        } else {
            lang.to_string()
        });
    }
    if options.thumbnail {
        args.push("--write-thumbnail".to_string());
    }
    if options.metadata {
        args.push("--embed-metadata".to_string());
    }
    if options.description {
        args.push("--write-description".to_string());
    }

    args.push("--continue".to_string());
    args.push("--no-overwrites".to_string());

    for url in &options.urls {
        let trimmed = url.trim();
        if !trimmed.is_empty() {
            args.push(trimmed.to_string());
        }
    }

    args
}

impl DownloadController {
    pub fn new(config: ControllerConfig, observer: Arc<dyn DownloadObserver>) -> Self {
        Self {
            config,
            observer,
            active: Arc::new(Mutex::new(None)),
            next_job_id: AtomicU64::new(0),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    // Resolves once the job is accepted (first output line observed), or with
    // the launch/timeout/silent-exit failure. Subsequent lines flow to the
    // observer until exactly one Complete event closes the job out.
    pub async fn start(&self, options: DownloadOptions) -> Result<(), String> {
        if options.urls.iter().all(|url| url.trim().is_empty()) {
            return Err("No download URL was provided.".to_string());
        }

        let args = build_download_args(&options);
        let job_id = self.next_job_id.fetch_add(1, Ordering::Relaxed) + 1;
        let kill = Arc::new(Notify::new());
        self.replace_active(ActiveJob {
            id: job_id,
            kill: Arc::clone(&kill),
        });
        log::info!("starting download job {job_id}");

        let spawned = match spawn_streamed(&self.config.ytdlp_binary, &args) {
            Ok(spawned) => spawned,
            Err(error) => {
                self.clear_if_current(job_id);
                self.observer.on_event(DownloadEvent::Error {
                    message: error.clone(),
                });
                return Err(error);
            }
        };

        let (accept_tx, accept_rx) = oneshot::channel::<()>();
        self.spawn_supervisor(job_id, spawned, kill, accept_tx);

        match timeout(self.config.startup_timeout, accept_rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err("Download failed to start".to_string()),
            Err(_) => {
                self.kill_if_current(job_id);
                Err("Download timeout".to_string())
            }
        }
    }

    // Kills at most once; stopping an idle controller is a reported no-op.
    pub fn stop(&self) -> StopOutcome {
        let job = self.active.lock().ok().and_then(|mut slot| slot.take());
        match job {
            Some(job) => {
                log::info!("stopping download job {}", job.id);
                job.kill.notify_one();
                StopOutcome { stopped: true }
            }
            None => StopOutcome { stopped: false },
        }
    }

    fn replace_active(&self, job: ActiveJob) {
        if let Ok(mut slot) = self.active.lock() {
            if let Some(previous) = slot.replace(job) {
                log::info!("replacing active download job {}", previous.id);
                previous.kill.notify_one();
            }
        }
    }

    fn clear_if_current(&self, job_id: u64) {
        if let Ok(mut slot) = self.active.lock() {
            if slot.as_ref().map(|job| job.id) == Some(job_id) {
                *slot = None;
            }
        }
    }

    fn kill_if_current(&self, job_id: u64) {
        if let Ok(slot) = self.active.lock() {
            if let Some(job) = slot.as_ref() {
                if job.id == job_id {
                    job.kill.notify_one();
                }
            }
        }
    }

    fn spawn_supervisor(
        &self,
        job_id: u64,
        spawned: StreamedChild,
        kill: Arc<Notify>,
        accept_tx: oneshot::Sender<()>,
    ) {
        let observer = Arc::clone(&self.observer);
        let active = Arc::clone(&self.active);

        tokio::spawn(async move {
            let StreamedChild {
                child,
                stdout,
                stderr,
            } = spawned;

            let stdout_observer = Arc::clone(&observer);
            let stdout_task = tokio::spawn(async move {
                let mut reader = BufReader::new(stdout);
                let mut raw_buffer = Vec::new();
                let mut accept = Some(accept_tx);
                let mut produced_output = false;
                loop {
                    match read_lossy_process_line(&mut reader, &mut raw_buffer).await {
                        Ok(Some(line)) => {
                            if line.trim().is_empty() {
                                continue;
                            }
                            produced_output = true;
                            if let Some(sender) = accept.take() {
                                let _ = sender.send(());
                            }
                            match classify_output_line(&line) {
                                ParsedLine::Progress(update) => {
                                    stdout_observer.on_event(DownloadEvent::Progress(update));
                                }
                                ParsedLine::Log(line) => {
                                    stdout_observer.on_event(DownloadEvent::Output { line });
                                }
                            }
                        }
                        Ok(None) | Err(_) => break,
                    }
                }
                produced_output
            });

            let stderr_observer = Arc::clone(&observer);
            let stderr_task = tokio::spawn(async move {
                let mut reader = BufReader::new(stderr);
                let mut raw_buffer = Vec::new();
                while let Ok(Some(line)) = read_lossy_process_line(&mut reader, &mut raw_buffer).await
                {
                    if line.trim().is_empty() {
                        continue;
                    }
                    stderr_observer.on_event(DownloadEvent::Output {
                        line: format!("Error: {line}"),
                    });
                }
            });

            let code = supervise_child(child, kill).await;
            let produced_output = stdout_task.await.unwrap_or(false);
            let _ = stderr_task.await;

            if let Ok(mut slot) = active.lock() {
                if slot.as_ref().map(|job| job.id) == Some(job_id) {
                    *slot = None;
                }
            }

            log::info!(
                "download job {job_id} finished with code {code:?} (produced output: {produced_output})"
            );
            // A job that never produced output has dropped its acceptance
            // sender by now, which fails the pending start request in start().
            observer.on_event(DownloadEvent::Complete { code });
        });
    }
}
