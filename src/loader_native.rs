//! Native image loader
//!
//! Runs a tokio runtime in a background thread. Jobs go in over a tokio
//! channel, results come back over a std channel the render loop drains.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, StreamExt};
use image::RgbaImage;
use parking_lot::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::core::error::LoadError;
use crate::core::loader::{LoadCompletion, LoadRequest, WarmCompletion, WarmRequest};

pub enum LoadJob {
    Scene(LoadRequest),
    Warm(WarmRequest),
}

#[derive(Debug)]
pub enum LoaderEvent {
    Scene(LoadCompletion),
    Warm(WarmCompletion),
}

/// Loader health counters, shared with the render thread
#[derive(Clone, Debug, Default)]
pub struct LoaderStats {
    pub requested: u64,
    pub loaded: u64,
    pub failed: u64,
}

pub struct NativeLoader {
    jobs: UnboundedSender<LoadJob>,
    /// Completed loads, in completion order
    pub rx: Receiver<LoaderEvent>,
    pub stats: Arc<Mutex<LoaderStats>>,
}

impl NativeLoader {
    /// Start the loader thread. Relative image sources resolve against
    /// `asset_root`.
    pub fn spawn(asset_root: impl Into<PathBuf>) -> Self {
        let (tx, rx): (Sender<LoaderEvent>, Receiver<LoaderEvent>) = mpsc::channel();
        let (jobs, job_rx) = unbounded_channel();
        let stats = Arc::new(Mutex::new(LoaderStats::default()));

        let root = asset_root.into();
        let stats_clone = stats.clone();

        std::thread::spawn(move || {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    error!(error = %e, "Failed to create tokio runtime");
                    return;
                }
            };
            rt.block_on(async move {
                Self::run(root, job_rx, tx, stats_clone).await;
            });
        });

        Self { jobs, rx, stats }
    }

    /// Queue a job. Returns false when the loader thread is gone.
    pub fn submit(&self, job: LoadJob) -> bool {
        self.jobs.send(job).is_ok()
    }

    /// Every event that has arrived so far
    pub fn drain(&self) -> Vec<LoaderEvent> {
        self.rx.try_iter().collect()
    }

    async fn run(
        root: PathBuf,
        mut jobs: UnboundedReceiver<LoadJob>,
        tx: Sender<LoaderEvent>,
        stats: Arc<Mutex<LoaderStats>>,
    ) {
        info!(root = %root.display(), "Image loader started");
        let root = Arc::new(root);

        while let Some(job) = jobs.recv().await {
            let root = root.clone();
            let tx = tx.clone();
            let stats = stats.clone();
            match job {
                LoadJob::Scene(request) => {
                    tokio::spawn(Self::run_scene(root, request, tx, stats));
                }
                LoadJob::Warm(request) => {
                    tokio::spawn(Self::run_warm(root, request, tx, stats));
                }
            }
        }

        debug!("Image loader job channel closed");
    }

    async fn run_scene(root: Arc<PathBuf>, request: LoadRequest, tx: Sender<LoaderEvent>, stats: Arc<Mutex<LoaderStats>>) {
        let LoadRequest { ticket, sources } = request;
        debug!(tab = %ticket.tab, images = sources.len(), "Scene load started");

        let mut pending: FuturesUnordered<_> = sources
            .iter()
            .enumerate()
            .map(|(index, source)| {
                let root = root.clone();
                let src = source.src.clone();
                let stats = stats.clone();
                async move { (index, load_image(&root, &src, &stats).await) }
            })
            .collect();

        while let Some((index, result)) = pending.next().await {
            let completion = LoadCompletion {
                ticket: ticket.clone(),
                index,
                result,
            };
            if tx.send(LoaderEvent::Scene(completion)).is_err() {
                // Receiver dropped, exit
                return;
            }
        }
    }

    async fn run_warm(root: Arc<PathBuf>, request: WarmRequest, tx: Sender<LoaderEvent>, stats: Arc<Mutex<LoaderStats>>) {
        let WarmRequest {
            tab,
            epoch,
            delay_ms,
            sources,
        } = request;
        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        debug!(%tab, images = sources.len(), "Pre-warm load started");

        let results =
            futures_util::future::join_all(sources.iter().map(|source| load_image(&root, &source.src, &stats))).await;

        let completion = WarmCompletion {
            tab,
            epoch,
            sources,
            results,
        };
        let _ = tx.send(LoaderEvent::Warm(completion));
    }
}

/// Path of an image source under the asset root. Site-absolute sources
/// ("/assets/x.png") are taken relative to the root as well.
pub fn resolve_src(root: &Path, src: &str) -> PathBuf {
    root.join(src.trim_start_matches('/'))
}

async fn load_image(root: &Path, src: &str, stats: &Mutex<LoaderStats>) -> Result<RgbaImage, LoadError> {
    stats.lock().requested += 1;
    let result = read_and_decode(root, src).await;
    let mut stats = stats.lock();
    match &result {
        Ok(_) => stats.loaded += 1,
        Err(e) => {
            warn!(error = %e, "Image load failed");
            stats.failed += 1;
        }
    }
    result
}

async fn read_and_decode(root: &Path, src: &str) -> Result<RgbaImage, LoadError> {
    let path = resolve_src(root, src);
    let bytes = tokio::fs::read(&path).await.map_err(|e| LoadError::Io {
        src: src.to_string(),
        reason: e.to_string(),
    })?;
    if bytes.is_empty() {
        return Err(LoadError::Empty { src: src.to_string() });
    }
    let len = bytes.len();

    let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes).map(|img| img.to_rgba8()))
        .await
        .map_err(|e| LoadError::Decode {
            src: src.to_string(),
            reason: e.to_string(),
        })?;
    let pixels = decoded.map_err(|e| LoadError::Decode {
        src: src.to_string(),
        reason: e.to_string(),
    })?;

    if pixels.width() == 0 || pixels.height() == 0 {
        return Err(LoadError::Empty { src: src.to_string() });
    }
    debug!(src, bytes = len, width = pixels.width(), height = pixels.height(), "Image decoded");
    Ok(pixels)
}
