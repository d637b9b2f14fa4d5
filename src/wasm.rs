//! `DotArt` browser bindings
//!
//! Owns the engine behind `Rc<RefCell<_>>`, shared by the window event
//! listeners and the requestAnimationFrame loop. All calls happen on the
//! browser main thread.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

use tracing::{debug, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, Element, HtmlCanvasElement, MouseEvent, Window};

use crate::canvas::CanvasSurface;
use crate::core::{
    collect_masks, ForegroundBounds, ImageSource, MaskRect, MorphEngine, Pointer, SiteConfig, TabId, Viewport,
};
use crate::loader_wasm::{self, EventQueue, LoaderEvent};
use crate::time::FpsCounter;

/// Global the host page may set to a JSON site config
const CONFIG_GLOBAL: &str = "__dot_morph_config";

static INIT: Once = Once::new();

fn init_logging() {
    INIT.call_once(|| {
        console_error_panic_hook::set_once();
        tracing_wasm::set_as_global_default();
    });
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("no window"))
}

fn window_viewport(window: &Window) -> Viewport {
    let width = window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    let height = window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    Viewport::new(width as f32, height as f32)
}

struct WebState {
    engine: MorphEngine,
    site: SiteConfig,
    canvas: HtmlCanvasElement,
    surface: CanvasSurface,
    queue: EventQueue,
    scroll_y: f32,
    fps: FpsCounter,
    /// An idle callback is already scheduled to build a queued pre-warm
    idle_scheduled: bool,
}

impl WebState {
    fn sources(&self, urls: Vec<String>) -> Vec<ImageSource> {
        urls.iter().map(|u| self.site.source_for(u)).collect()
    }

    fn set_art_set(&mut self, tab: TabId, sources: Vec<ImageSource>) {
        if let Some(request) = self.engine.set_art_set(tab, sources) {
            loader_wasm::start_scene(request, self.queue.clone());
        }
    }

    fn pre_warm(&mut self, tab: TabId, sources: Vec<ImageSource>) {
        if let Some(request) = self.engine.pre_warm(tab, sources) {
            loader_wasm::start_warm(request, self.queue.clone());
        }
    }

    /// Morph to the scene under the current scroll offset
    fn apply_scroll(&mut self) {
        let Some(tab) = self.engine.current_tab().and_then(|t| self.site.tab(t.as_str())) else {
            return;
        };
        let scene = tab.scene_for_scroll(self.scroll_y, self.engine.viewport().height);
        self.engine.morph_to(scene);
    }

    fn refresh_masks(&mut self) {
        let selector = self
            .engine
            .current_tab()
            .and_then(|t| self.site.tab(t.as_str()))
            .map(|t| t.mask_selector())
            .unwrap_or_default();
        let masks = dom_masks(&selector, self.engine.viewport().height);
        self.engine.set_masks(masks);
    }

    fn resize(&mut self, viewport: Viewport) {
        self.canvas.set_width(viewport.width as u32);
        self.canvas.set_height(viewport.height as u32);
        self.surface.set_size(viewport.width as f64, viewport.height as f64);
        self.engine.resize(viewport);
    }

    /// Drain loader events and draw. Pre-warm results are only queued
    /// here; returns true when an idle build should be scheduled.
    fn frame(&mut self) -> bool {
        let events: Vec<LoaderEvent> = self.queue.borrow_mut().drain(..).collect();
        for event in events {
            match event {
                LoaderEvent::Scene(completion) => {
                    self.engine.accept(completion);
                }
                LoaderEvent::Warm(completion) => {
                    self.engine.queue_warm(completion);
                }
            }
        }
        if self.engine.take_mask_refresh() {
            self.refresh_masks();
        }
        self.engine.frame(&mut self.surface);
        self.fps.tick();

        self.engine.warm_queued() > 0 && !self.idle_scheduled
    }

    /// Build one queued pre-warm set outside the frame callback
    fn idle_build(&mut self) {
        self.idle_scheduled = false;
        self.engine.build_queued_warm();
    }
}

/// Bounds of every element matching `selector`, as mask rectangles
fn dom_masks(selector: &str, viewport_height: f32) -> Vec<MaskRect> {
    if selector.is_empty() {
        return Vec::new();
    }
    let Some(window) = web_sys::window() else {
        return Vec::new();
    };
    let Some(nodes) = window.document().and_then(|d| d.query_selector_all(selector).ok()) else {
        return Vec::new();
    };

    let bounds = (0..nodes.length())
        .filter_map(|i| nodes.item(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .map(|el| element_bounds(&window, &el));
    collect_masks(bounds, viewport_height)
}

fn element_bounds(window: &Window, el: &Element) -> ForegroundBounds {
    let rect = el.get_bounding_client_rect();
    let (displayed, opacity) = match window.get_computed_style(el) {
        Ok(Some(style)) => {
            let display = style.get_property_value("display").unwrap_or_default();
            let visibility = style.get_property_value("visibility").unwrap_or_default();
            let opacity = style
                .get_property_value("opacity")
                .ok()
                .and_then(|o| o.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            (display != "none" && visibility != "hidden", opacity)
        }
        _ => (true, 1.0),
    };
    ForegroundBounds {
        left: rect.left() as f32,
        top: rect.top() as f32,
        width: rect.width() as f32,
        height: rect.height() as f32,
        displayed,
        opacity,
    }
}

#[wasm_bindgen]
pub struct DotArt {
    state: Rc<RefCell<WebState>>,
}

impl DotArt {
    fn attach(canvas_id: &str, site: SiteConfig) -> Result<DotArt, JsValue> {
        let window = window()?;
        let document = window.document().ok_or("no document")?;
        let canvas = document
            .get_element_by_id(canvas_id)
            .ok_or("canvas not found")?
            .dyn_into::<HtmlCanvasElement>()?;
        let ctx = canvas
            .get_context("2d")?
            .ok_or("2d context not supported")?
            .dyn_into::<CanvasRenderingContext2d>()?;

        let viewport = window_viewport(&window);
        canvas.set_width(viewport.width as u32);
        canvas.set_height(viewport.height as u32);

        let engine = MorphEngine::new(site.engine.clone(), site.presets.clone(), viewport);
        let initial = site.initial_tab.clone();
        let state = Rc::new(RefCell::new(WebState {
            engine,
            site,
            canvas,
            surface: CanvasSurface::new(ctx, viewport.width as f64, viewport.height as f64),
            queue: EventQueue::default(),
            scroll_y: window.scroll_y().unwrap_or(0.0) as f32,
            fps: FpsCounter::new(),
            idle_scheduled: false,
        }));

        register_listeners(&window, &state)?;
        start_loop(&window, state.clone())?;
        info!(canvas_id, width = viewport.width, height = viewport.height, "DotArt attached");

        let dot_art = DotArt { state };
        dot_art.switch_tab(initial.as_str())?;
        dot_art.pre_warm_all();
        Ok(dot_art)
    }
}

#[wasm_bindgen]
impl DotArt {
    /// Attach to the canvas with id `canvas_id`. Uses the page's
    /// `__dot_morph_config` JSON when present, the built-in catalog otherwise.
    #[wasm_bindgen(constructor)]
    pub fn new(canvas_id: &str) -> Result<DotArt, JsValue> {
        init_logging();
        let window = window()?;
        let json = js_sys::Reflect::get(&window, &JsValue::from_str(CONFIG_GLOBAL))
            .ok()
            .and_then(|v| v.as_string());
        let site = match json {
            Some(json) => SiteConfig::from_json(&json),
            None => SiteConfig::builtin(),
        }
        .map_err(to_js)?;
        Self::attach(canvas_id, site)
    }

    pub fn new_with_config(canvas_id: &str, json: &str) -> Result<DotArt, JsValue> {
        init_logging();
        let site = SiteConfig::from_json(json).map_err(to_js)?;
        Self::attach(canvas_id, site)
    }

    /// Make `urls` the scene set of `tab`
    pub fn set_art_set(&self, tab: &str, urls: Vec<String>) {
        let mut state = self.state.borrow_mut();
        let sources = state.sources(urls);
        state.set_art_set(TabId::from(tab), sources);
    }

    /// Activate a configured tab and load its scene set
    pub fn switch_tab(&self, tab: &str) -> Result<(), JsValue> {
        let mut state = self.state.borrow_mut();
        let Some(config) = state.site.tab(tab) else {
            return Err(JsValue::from_str(&format!("unknown tab '{tab}'")));
        };
        let sources = config.images.clone();
        let id = config.id.clone();

        state.engine.set_current_tab(id.clone());
        state.set_art_set(id, sources);
        state.apply_scroll();
        Ok(())
    }

    pub fn set_current_tab(&self, tab: &str) {
        self.state.borrow_mut().engine.set_current_tab(TabId::from(tab));
    }

    pub fn morph_to(&self, index: usize) -> bool {
        self.state.borrow_mut().engine.morph_to(index)
    }

    /// Scroll offset changed; picks the scene for the current tab
    pub fn on_scroll(&self, scroll_y: f32) {
        let mut state = self.state.borrow_mut();
        state.scroll_y = scroll_y;
        state.apply_scroll();
    }

    pub fn pre_warm(&self, tab: &str, urls: Vec<String>) {
        let mut state = self.state.borrow_mut();
        let sources = state.sources(urls);
        state.pre_warm(TabId::from(tab), sources);
    }

    /// Pre-warm every configured tab except the current one
    pub fn pre_warm_all(&self) {
        let mut state = self.state.borrow_mut();
        let current = state.engine.current_tab().cloned();
        let tabs: Vec<(TabId, Vec<ImageSource>)> = state
            .site
            .tabs
            .iter()
            .filter(|t| Some(&t.id) != current.as_ref())
            .map(|t| (t.id.clone(), t.images.clone()))
            .collect();
        for (tab, sources) in tabs {
            state.pre_warm(tab, sources);
        }
    }

    pub fn refresh_masks(&self) {
        self.state.borrow_mut().refresh_masks();
    }

    pub fn particle_count(&self) -> usize {
        self.state.borrow().engine.particle_count()
    }

    pub fn fps(&self) -> f64 {
        self.state.borrow().fps.fps()
    }
}

fn register_listeners(window: &Window, state: &Rc<RefCell<WebState>>) -> Result<(), JsValue> {
    // Resize - rebuild on the new grid
    let state_clone = state.clone();
    let on_resize = Closure::wrap(Box::new(move || {
        let Some(window) = web_sys::window() else {
            return;
        };
        state_clone.borrow_mut().resize(window_viewport(&window));
    }) as Box<dyn FnMut()>);
    window.add_event_listener_with_callback("resize", on_resize.as_ref().unchecked_ref())?;
    on_resize.forget();

    // Pointer position
    let state_clone = state.clone();
    let on_move = Closure::wrap(Box::new(move |e: MouseEvent| {
        let pointer = Pointer::new(e.client_x() as f32, e.client_y() as f32);
        state_clone.borrow_mut().engine.set_pointer(Some(pointer));
    }) as Box<dyn FnMut(MouseEvent)>);
    window.add_event_listener_with_callback("mousemove", on_move.as_ref().unchecked_ref())?;
    on_move.forget();

    // Pointer left the window
    let state_clone = state.clone();
    let on_out = Closure::wrap(Box::new(move |e: MouseEvent| {
        if e.related_target().is_none() {
            state_clone.borrow_mut().engine.set_pointer(None);
        }
    }) as Box<dyn FnMut(MouseEvent)>);
    window.add_event_listener_with_callback("mouseout", on_out.as_ref().unchecked_ref())?;
    on_out.forget();

    // Scroll - pick the scene and re-measure foreground elements
    let state_clone = state.clone();
    let on_scroll = Closure::wrap(Box::new(move || {
        let Some(window) = web_sys::window() else {
            return;
        };
        let mut state = state_clone.borrow_mut();
        state.scroll_y = window.scroll_y().unwrap_or(0.0) as f32;
        state.apply_scroll();
        state.refresh_masks();
    }) as Box<dyn FnMut()>);
    window.add_event_listener_with_callback("scroll", on_scroll.as_ref().unchecked_ref())?;
    on_scroll.forget();

    debug!("Window listeners registered");
    Ok(())
}

/// requestAnimationFrame loop. The closure holds a handle to itself so it
/// can schedule the next frame.
fn start_loop(window: &Window, state: Rc<RefCell<WebState>>) -> Result<(), JsValue> {
    let f: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
    let g = f.clone();

    *g.borrow_mut() = Some(Closure::wrap(Box::new(move || {
        let needs_idle = state.borrow_mut().frame();

        let Some(window) = web_sys::window() else {
            return;
        };
        if needs_idle {
            schedule_idle_build(&window, &state);
        }
        if let Some(callback) = f.borrow().as_ref() {
            if let Err(e) = window.request_animation_frame(callback.as_ref().unchecked_ref()) {
                warn!(error = ?e, "Failed to schedule frame");
            }
        }
    }) as Box<dyn FnMut()>));

    if let Some(callback) = g.borrow().as_ref() {
        window.request_animation_frame(callback.as_ref().unchecked_ref())?;
    }
    Ok(())
}

/// Build the next queued pre-warm from requestIdleCallback, or from a zero
/// timeout where the browser has no idle callbacks.
fn schedule_idle_build(window: &Window, state: &Rc<RefCell<WebState>>) {
    let state_clone = state.clone();
    let callback = Closure::once_into_js(move || {
        state_clone.borrow_mut().idle_build();
    });
    let callback: &js_sys::Function = callback.unchecked_ref();

    let scheduled = match window.request_idle_callback(callback) {
        Ok(_) => Ok(()),
        Err(e) => {
            debug!(error = ?e, "requestIdleCallback unavailable, using setTimeout");
            window
                .set_timeout_with_callback_and_timeout_and_arguments_0(callback, 0)
                .map(|_| ())
        }
    };
    match scheduled {
        Ok(()) => state.borrow_mut().idle_scheduled = true,
        Err(e) => {
            warn!(error = ?e, "Failed to schedule pre-warm build, building now");
            state.borrow_mut().idle_build();
        }
    }
}
