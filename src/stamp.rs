//! Embeds one overlay image into a PDF and draws it on a set of pages.

use crate::builder;
use crate::error::{Result, StampError};
use crate::geometry::{PageBox, Placement};
use crate::overlay::OverlaySource;
use crate::pdf;
use lopdf::{Document, ObjectId};
use tracing::{debug, info, warn};

const IMAGE_PREFIX: &str = "OvIm";
const STATE_PREFIX: &str = "OvGs";

/// Stamps `overlay` onto the zero-based `pages`. `place` maps each page box
/// to the rectangle to draw in. On any error no output is produced.
pub fn stamp<F>(pdf_bytes: &[u8], overlay: &OverlaySource, pages: &[usize], place: F) -> Result<Vec<u8>>
where
    F: Fn(PageBox) -> Placement,
{
    if pages.is_empty() {
        return Err(StampError::NoTargetPages);
    }

    let mut doc = pdf::load(pdf_bytes)?;
    let page_ids = pdf::page_ids(&doc);
    let targets = pages
        .iter()
        .map(|&index| {
            page_ids
                .get(index)
                .map(|&id| (index, id))
                .ok_or(StampError::PageOutOfRange {
                    index,
                    page_count: page_ids.len(),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let image_id = builder::add_image_xobject(&mut doc, overlay)?;
    debug!(?image_id, width = overlay.width(), height = overlay.height(), "overlay embedded");

    let mut states = OpacityStates::default();
    let mut drawn = 0;
    for (index, page_id) in targets {
        let page = pdf::page_box(&doc, page_id);
        let placement = place(page);
        if !placement.is_finite() {
            return Err(StampError::InvalidPlacement(format!("página {}: {placement:?}", index + 1)));
        }
        if placement.width <= 0.0 || placement.height <= 0.0 {
            warn!(index, ?placement, "overlay has no area on this page, skipping");
            continue;
        }

        let image_name = pdf::add_page_resource(&mut doc, page_id, b"XObject", IMAGE_PREFIX, image_id)?;
        let state_name = match states.get(&mut doc, placement.opacity) {
            Some(state_id) => Some(pdf::add_page_resource(
                &mut doc,
                page_id,
                b"ExtGState",
                STATE_PREFIX,
                state_id,
            )?),
            None => None,
        };

        let ops = draw_ops(&placement, page, &image_name, state_name.as_deref());
        pdf::append_page_content(&mut doc, page_id, ops.into_bytes())?;
        drawn += 1;
        debug!(index, x = placement.x, y = placement.y, w = placement.width, h = placement.height, "page stamped");
    }

    let out = pdf::save(&mut doc)?;
    info!(pages = drawn, bytes = out.len(), "document stamped");
    Ok(out)
}

#[derive(Default)]
struct OpacityStates {
    created: Vec<(f64, ObjectId)>,
}

impl OpacityStates {
    /// `None` for fully opaque placements, which need no graphics state.
    fn get(&mut self, doc: &mut Document, opacity: f64) -> Option<ObjectId> {
        if opacity >= 1.0 {
            return None;
        }
        if let Some(&(_, id)) = self.created.iter().find(|(o, _)| *o == opacity) {
            return Some(id);
        }
        let id = builder::add_opacity_state(doc, opacity);
        self.created.push((opacity, id));
        Some(id)
    }
}

/// Content stream that draws the image XObject `image` into `placement`,
/// rotated about the rectangle's centre.
fn draw_ops(placement: &Placement, page: PageBox, image: &str, state: Option<&str>) -> String {
    let center = placement.center();
    let cx = page.x0 + center.x;
    let cy = page.y0 + center.y;
    let (w, h) = (placement.width, placement.height);
    let (sin, cos) = placement.rotation.to_radians().sin_cos();

    let mut ops = String::from("q\n");
    if let Some(state) = state {
        ops.push_str(&format!("/{state} gs\n"));
    }
    ops.push_str(&format!("1 0 0 1 {} {} cm\n", num(cx), num(cy)));
    if placement.rotation != 0.0 {
        ops.push_str(&format!(
            "{} {} {} {} 0 0 cm\n",
            num(cos),
            num(sin),
            num(-sin),
            num(cos)
        ));
    }
    ops.push_str(&format!(
        "{} 0 0 {} {} {} cm\n/{image} Do\nQ\n",
        num(w),
        num(h),
        num(-w / 2.0),
        num(-h / 2.0)
    ));
    ops
}

fn num(v: f64) -> String {
    let s = format!("{v:.4}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    match s {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}
