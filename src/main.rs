//! Headless CLI for the dot-morph engine
//!
//! Loads the site catalog from disk, plays a scripted scroll through every
//! tab and writes the last frame to a PNG.
//!
//! Run with: cargo run --features cli --bin dot-cli

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::time::Duration;

    use dot_morph::core::{LoadState, MorphEngine, Pointer, SiteConfig, Viewport};
    use dot_morph::loader_native::{LoadJob, LoaderEvent, NativeLoader};
    use dot_morph::raster::RasterSurface;
    use dot_morph::time::FpsCounter;
    use tracing::{debug, info, warn};
    use tracing_subscriber::{fmt, EnvFilter};

    /// Frames spent on each scroll segment of a tab
    const FRAMES_PER_SEGMENT: usize = 90;
    /// Frames to wait for a scene set before moving on anyway
    const LOAD_TIMEOUT_FRAMES: usize = 600;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,dot_morph=debug"));
    fmt().with_env_filter(filter).with_target(true).init();

    let config = match std::env::var("DOT_MORPH_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading site config");
            SiteConfig::from_json(&std::fs::read_to_string(&path)?)?
        }
        Err(_) => SiteConfig::builtin()?,
    };
    let assets = std::env::var("DOT_MORPH_ASSETS").unwrap_or_else(|_| ".".to_string());
    let viewport = std::env::var("DOT_MORPH_VIEWPORT")
        .ok()
        .and_then(|v| parse_viewport(&v))
        .unwrap_or(Viewport::new(1280.0, 800.0));
    let out = std::env::var("DOT_MORPH_OUT").unwrap_or_else(|_| "dot-morph.png".to_string());

    let mut engine = MorphEngine::new(config.engine.clone(), config.presets.clone(), viewport);
    let mut surface = RasterSurface::new(viewport.width as u32, viewport.height as u32);
    let loader = NativeLoader::spawn(assets);

    // Initial tab first, then the rest in catalog order
    let mut script: Vec<_> = config.tabs.iter().filter(|t| t.id == config.initial_tab).collect();
    script.extend(config.tabs.iter().filter(|t| t.id != config.initial_tab));

    for tab in &config.tabs {
        if tab.id == config.initial_tab {
            continue;
        }
        if let Some(request) = engine.pre_warm(tab.id.clone(), tab.images.clone()) {
            loader.submit(LoadJob::Warm(request));
        }
    }

    let mut fps = FpsCounter::new();
    let mut frame_interval = tokio::time::interval(Duration::from_millis(16));
    let mut stats_interval = tokio::time::interval(Duration::from_secs(5));
    let mut step = 0usize;
    let mut tab_frame = 0usize;
    let mut waited = 0usize;
    let mut frames = 0u64;
    let mut started = false;

    info!(tabs = script.len(), width = viewport.width, height = viewport.height, "Starting scripted run");

    loop {
        let Some(tab) = script.get(step) else {
            break;
        };

        tokio::select! {
            _ = frame_interval.tick() => {
                if !started {
                    engine.set_current_tab(tab.id.clone());
                    if let Some(request) = engine.set_art_set(tab.id.clone(), tab.images.clone()) {
                        loader.submit(LoadJob::Scene(request));
                    }
                    started = true;
                }

                for event in loader.drain() {
                    match event {
                        LoaderEvent::Scene(completion) => {
                            engine.accept(completion);
                        }
                        LoaderEvent::Warm(completion) => {
                            engine.accept_warm(completion);
                        }
                    }
                }
                if engine.take_mask_refresh() {
                    // No foreground elements without a document
                    engine.set_masks(Vec::new());
                }

                let loading = matches!(engine.load_state(), LoadState::Loading { .. });
                if loading && waited < LOAD_TIMEOUT_FRAMES {
                    waited += 1;
                } else {
                    if loading {
                        warn!(tab = %tab.id, "Scene set still loading, continuing");
                    }
                    let segment_height = viewport.height * dot_morph::core::scroll::SEGMENT_FRACTION;
                    let scroll_y = (tab_frame / FRAMES_PER_SEGMENT) as f32 * segment_height;
                    engine.morph_to(tab.scene_for_scroll(scroll_y, viewport.height));

                    // Pointer sweeps across the middle of the viewport
                    let x = (tab_frame as f32 * 8.0) % viewport.width.max(1.0);
                    engine.set_pointer(Some(Pointer::new(x, viewport.height / 2.0)));
                    tab_frame += 1;
                }

                engine.frame(&mut surface);
                fps.tick();
                frames += 1;

                let segments = tab.segments.len().max(tab.images.len()).max(1);
                if tab_frame >= segments * FRAMES_PER_SEGMENT {
                    debug!(tab = %tab.id, frames = tab_frame, "Tab finished");
                    engine.set_pointer(None);
                    step += 1;
                    tab_frame = 0;
                    waited = 0;
                    started = false;
                }
            }
            _ = stats_interval.tick() => {
                let stats = loader.stats.lock().clone();
                info!(
                    fps = format!("{:.1}", fps.fps()),
                    frames,
                    tab = %tab.id,
                    scene = engine.target_scene(),
                    particles = engine.particle_count(),
                    cached = engine.scene_cache().len(),
                    load = ?engine.load_state(),
                    loaded = stats.loaded,
                    failed = stats.failed,
                    "stats"
                );
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted");
                break;
            }
        }
    }

    surface.save(&out)?;
    info!(path = %out, frames, particles = engine.particle_count(), "Final frame written");
    Ok(())
}

/// "1280x800" → viewport
#[cfg(not(target_arch = "wasm32"))]
fn parse_viewport(value: &str) -> Option<dot_morph::core::Viewport> {
    let (w, h) = value.trim().split_once(['x', 'X'])?;
    let width: f32 = w.trim().parse().ok()?;
    let height: f32 = h.trim().parse().ok()?;
    (width > 0.0 && height > 0.0).then(|| dot_morph::core::Viewport::new(width, height))
}

#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn parses_viewport_sizes() {
        let vp = parse_viewport("1280x800").unwrap();
        assert_eq!((vp.width, vp.height), (1280.0, 800.0));
        assert!(parse_viewport(" 640 X 480 ").is_some());
        assert!(parse_viewport("1280").is_none());
        assert!(parse_viewport("0x800").is_none());
        assert!(parse_viewport("axb").is_none());
    }
}
