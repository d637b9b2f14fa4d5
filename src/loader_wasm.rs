//! Browser image loader
//!
//! Images are decoded by the browser, drawn into an offscreen canvas and
//! read back as RGBA. Every load runs as a local future; results are
//! pushed to a shared queue the frame callback drains.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use futures_util::future::join_all;
use image::RgbaImage;
use tracing::{debug, error, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

use crate::core::error::LoadError;
use crate::core::loader::{LoadCompletion, LoadRequest, WarmCompletion, WarmRequest};

/// Longest edge kept when reading pixels back; larger images are scaled
/// down first. Size maps sample far fewer cells than this.
pub const MAX_DECODE_EDGE: u32 = 1024;

pub enum LoaderEvent {
    Scene(LoadCompletion),
    Warm(WarmCompletion),
}

/// Shared event buffer: loader futures push, the frame callback drains
pub type EventQueue = Rc<RefCell<VecDeque<LoaderEvent>>>;

/// Start every image of a scene load at once
pub fn start_scene(request: LoadRequest, queue: EventQueue) {
    let LoadRequest { ticket, sources } = request;
    debug!(tab = %ticket.tab, images = sources.len(), "Scene load started");

    for (index, source) in sources.into_iter().enumerate() {
        let queue = queue.clone();
        let ticket = ticket.clone();
        spawn_local(async move {
            let result = load_image(&source.src).await;
            if let Err(e) = &result {
                warn!(error = %e, "Image load failed");
            }
            queue
                .borrow_mut()
                .push_back(LoaderEvent::Scene(LoadCompletion { ticket, index, result }));
        });
    }
}

/// Wait out the idle delay, then load the whole set
pub fn start_warm(request: WarmRequest, queue: EventQueue) {
    spawn_local(async move {
        let WarmRequest {
            tab,
            epoch,
            delay_ms,
            sources,
        } = request;
        if let Err(e) = sleep_ms(delay_ms).await {
            warn!(error = ?e, "Pre-warm delay failed");
        }
        debug!(%tab, images = sources.len(), "Pre-warm load started");

        let results = join_all(sources.iter().map(|s| load_image(&s.src))).await;
        queue.borrow_mut().push_back(LoaderEvent::Warm(WarmCompletion {
            tab,
            epoch,
            sources,
            results,
        }));
    });
}

async fn sleep_ms(ms: u64) -> Result<(), JsValue> {
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let scheduled = web_sys::window().map(|w| {
            w.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms.min(i32::MAX as u64) as i32)
        });
        if !matches!(scheduled, Some(Ok(_))) {
            // No timer available, resolve at once
            if let Err(e) = resolve.call0(&JsValue::NULL) {
                error!(error = ?e, "Failed to resolve pre-warm delay");
            }
        }
    });
    JsFuture::from(promise).await.map(|_| ())
}

async fn load_image(src: &str) -> Result<RgbaImage, LoadError> {
    let dom = |e: JsValue| LoadError::Dom {
        src: src.to_string(),
        reason: format!("{e:?}"),
    };

    let img = HtmlImageElement::new().map_err(dom)?;
    img.set_cross_origin(Some("anonymous"));
    img.set_src(src);
    JsFuture::from(img.decode()).await.map_err(|e| LoadError::Decode {
        src: src.to_string(),
        reason: format!("{e:?}"),
    })?;

    let (width, height) = (img.natural_width(), img.natural_height());
    if width == 0 || height == 0 {
        return Err(LoadError::Empty { src: src.to_string() });
    }
    let scale = (MAX_DECODE_EDGE as f64 / width.max(height) as f64).min(1.0);
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);

    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| dom(JsValue::from_str("no document")))?;
    let canvas = document
        .create_element("canvas")
        .map_err(dom)?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| dom(JsValue::from_str("not a canvas element")))?;
    canvas.set_width(w);
    canvas.set_height(h);
    let ctx = canvas
        .get_context("2d")
        .map_err(dom)?
        .ok_or_else(|| dom(JsValue::from_str("2d context unavailable")))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|_| dom(JsValue::from_str("not a 2d context")))?;

    ctx.draw_image_with_html_image_element_and_dw_and_dh(&img, 0.0, 0.0, w as f64, h as f64)
        .map_err(dom)?;
    let data = ctx.get_image_data(0.0, 0.0, w as f64, h as f64).map_err(dom)?;

    debug!(src, width, height, sampled_width = w, sampled_height = h, "Image decoded");
    RgbaImage::from_raw(w, h, data.data().0).ok_or_else(|| LoadError::Decode {
        src: src.to_string(),
        reason: "pixel buffer size mismatch".to_string(),
    })
}
