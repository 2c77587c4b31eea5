pub mod builder;
pub mod config;
pub mod error;
pub mod geometry;
pub mod interaction;
pub mod overlay;
pub mod pages;
pub mod pdf;
pub mod session;
pub mod stamp;

pub use config::StampJob;
pub use error::{Result, StampError};
pub use geometry::{to_page_space, PageBox, Placement, PlacementState, WorkspaceSize};
pub use overlay::{OverlayRaster, OverlaySource};
pub use pages::{resolve_targets, TargetSpec};
pub use session::{Feature, Session};
pub use stamp::stamp;

use wasm_bindgen::prelude::*;

/// Stamps an overlay image onto a PDF. `job_json` is a serialized
/// [`StampJob`]; missing fields take their defaults.
#[wasm_bindgen]
pub fn stamp_pdf(pdf_bytes: &[u8], overlay_bytes: &[u8], job_json: &str) -> std::result::Result<Vec<u8>, JsValue> {
    let job = StampJob::from_json(job_json).map_err(|e| JsValue::from_str(&format!("{e:#}")))?;

    job.run(pdf_bytes.to_vec(), overlay_bytes.to_vec())
        .map_err(|e| JsValue::from_str(&format!("{} ({})", e.user_message(), e)))
}

#[wasm_bindgen]
pub fn get_page_count(pdf_bytes: &[u8]) -> std::result::Result<usize, JsValue> {
    pdf::page_count(pdf_bytes).map_err(|e| JsValue::from_str(e.user_message()))
}
