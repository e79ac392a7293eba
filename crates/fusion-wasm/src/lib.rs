//! Fusion WASM - Fusion Player in the browser
//!
//! Binds the headless player core to a page:
//! - `<video>` as the media element
//! - hls.js (global `Hls`) as the streaming engine, Safari plays HLS natively
//! - Fullscreen and picture-in-picture through the document APIs
//! - Document keydown for shortcuts, pointer events on the container
//!
//! ## Usage
//!
//! ```javascript
//! import init, { FusionWebPlayer } from '@fusion/wasm';
//!
//! await init();
//! const player = new FusionWebPlayer(container, video, { idle_hide_ms: 2000 });
//! player.on_change((snapshot) => render(snapshot));
//! player.load('/media/master.m3u8', '/media/poster.jpg', '/media/thumbs.vtt', '#7c3aed');
//! ```

use wasm_bindgen::prelude::*;

mod dom;
mod hls;
mod player;

pub use dom::{DomBridge, DomMedia, PerformanceClock};
pub use hls::{HlsEngine, HlsFactory};
pub use player::FusionWebPlayer;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    web_sys::console::log_1(&format!("[Fusion WASM] Initialized v{}", fusion_core::VERSION).into());
}

/// Library version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Parse a thumbnail timeline and return its cues
#[wasm_bindgen]
pub fn parse_timeline(text: &str) -> Result<JsValue, JsValue> {
    let track = fusion_core::ThumbnailTrack::parse(text);
    Ok(serde_wasm_bindgen::to_value(track.cues())?)
}
