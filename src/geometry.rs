//! Workspace pixels (origin top-left) to page points (origin bottom-left).

use crate::error::{Result, StampError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementState {
    /// Centre of the overlay, 0-100 on each axis, measured from the top-left.
    pub position_percent: Point,
    pub size_pixels: Size,
    /// Clockwise-positive, as reported by the rotate gesture.
    pub rotation_degrees: f64,
    pub opacity: f64,
    /// Ink colour or font choice. Not used for placement.
    pub style: Option<String>,
}

impl Default for PlacementState {
    fn default() -> Self {
        Self {
            position_percent: Point { x: 50.0, y: 50.0 },
            size_pixels: Size { width: 150.0, height: 60.0 },
            rotation_degrees: 0.0,
            opacity: 1.0,
            style: None,
        }
    }
}

impl PlacementState {
    /// Centred placement that keeps the overlay's own aspect ratio and takes
    /// at most `max_fraction` of the workspace on either axis.
    pub fn fitted(intrinsic: Size, workspace: WorkspaceSize, max_fraction: f64) -> Self {
        let mut state = Self::default();
        if intrinsic.width <= 0.0 || intrinsic.height <= 0.0 {
            return state;
        }
        let max_w = workspace.width * max_fraction;
        let max_h = workspace.height * max_fraction;
        let scale = (max_w / intrinsic.width).min(max_h / intrinsic.height).min(1.0);
        state.size_pixels = Size {
            width: intrinsic.width * scale,
            height: intrinsic.height * scale,
        };
        state
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("posición x", self.position_percent.x),
            ("posición y", self.position_percent.y),
            ("ancho", self.size_pixels.width),
            ("alto", self.size_pixels.height),
            ("rotación", self.rotation_degrees),
            ("opacidad", self.opacity),
        ];
        match fields.iter().find(|(_, v)| !v.is_finite()) {
            Some((name, v)) => Err(StampError::InvalidPlacement(format!("{name} = {v}"))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Size", into = "Size")]
pub struct WorkspaceSize {
    width: f64,
    height: f64,
}

impl WorkspaceSize {
    pub fn new(width: f64, height: f64) -> Result<Self> {
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(StampError::InvalidWorkspace { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }
}

impl Default for WorkspaceSize {
    fn default() -> Self {
        Self {
            width: 612.0,
            height: 792.0,
        }
    }
}

impl TryFrom<Size> for WorkspaceSize {
    type Error = StampError;

    fn try_from(size: Size) -> Result<Self> {
        WorkspaceSize::new(size.width, size.height)
    }
}

impl From<WorkspaceSize> for Size {
    fn from(ws: WorkspaceSize) -> Size {
        Size {
            width: ws.width,
            height: ws.height,
        }
    }
}

/// Visible page area in points. `x0`/`y0` is the lower-left corner of the box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x0: f64,
    pub y0: f64,
    pub width: f64,
    pub height: f64,
}

impl PageBox {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            x0: 0.0,
            y0: 0.0,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Counter-clockwise-positive degrees about the rectangle's centre.
    pub rotation: f64,
    pub opacity: f64,
}

impl Placement {
    pub fn is_finite(&self) -> bool {
        [self.x, self.y, self.width, self.height, self.rotation, self.opacity]
            .iter()
            .all(|v| v.is_finite())
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }
}

/// Workspace placement to a page-space rectangle, clamped inside the page.
pub fn to_page_space(state: &PlacementState, workspace: WorkspaceSize, page: PageBox) -> Placement {
    let (pw, ph) = (page.width.max(0.0), page.height.max(0.0));
    let scale_x = pw / workspace.width;
    let scale_y = ph / workspace.height;

    let mut width = state.size_pixels.width.max(0.0) * scale_x;
    let mut height = state.size_pixels.height.max(0.0) * scale_y;

    // Shrink uniformly rather than let an oversized overlay spill off the page.
    if width > pw || height > ph {
        let fit = (pw / width).min(ph / height);
        width = (width * fit).min(pw);
        height = (height * fit).min(ph);
    }

    let px = percent(state.position_percent.x);
    let py = percent(state.position_percent.y);

    let x = px / 100.0 * pw - width / 2.0;
    let y = ph - py / 100.0 * ph - height / 2.0;

    Placement {
        x: x.min(pw - width).max(0.0),
        y: y.min(ph - height).max(0.0),
        width,
        height,
        rotation: -state.rotation_degrees,
        opacity: state.opacity.clamp(0.0, 1.0),
    }
}

pub fn to_workspace(placement: &Placement, workspace: WorkspaceSize, page: PageBox) -> PlacementState {
    let center = placement.center();
    let (pw, ph) = (page.width, page.height);
    let ratio = |num: f64, den: f64| if den > 0.0 { num / den } else { 0.0 };

    PlacementState {
        position_percent: Point {
            x: ratio(center.x, pw) * 100.0,
            y: ratio(ph - center.y, ph) * 100.0,
        },
        size_pixels: Size {
            width: placement.width * ratio(workspace.width, pw),
            height: placement.height * ratio(workspace.height, ph),
        },
        rotation_degrees: -placement.rotation,
        opacity: placement.opacity,
        style: None,
    }
}

fn percent(v: f64) -> f64 {
    if v.is_nan() {
        50.0
    } else {
        v.clamp(0.0, 100.0)
    }
}
