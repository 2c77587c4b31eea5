//! Pointer gestures on the overlay: move, resize and rotate.
//!
//! Exactly one gesture can be active at a time. Pointer coordinates are
//! workspace pixels, origin top-left, y growing downward.

use crate::geometry::{PlacementState, Point, Size, WorkspaceSize};

/// Hit radius of the corner and rotation handles, in pixels.
const HANDLE_RADIUS: f64 = 10.0;
/// Distance of the rotation handle above the overlay's top edge.
const ROTATE_HANDLE_OFFSET: f64 = 24.0;
/// Smallest width or height a resize can produce.
const MIN_SIZE: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Body,
    Corner(Corner),
    RotateHandle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Idle,
    /// `grab` is the pointer's offset from the overlay centre at press time.
    Dragging { grab: Point },
    Resizing { corner: Corner },
    Rotating { start_angle: f64, start_rotation: f64 },
}

#[derive(Debug, Clone)]
pub struct OverlayEditor {
    placement: PlacementState,
    workspace: WorkspaceSize,
    gesture: Gesture,
}

impl OverlayEditor {
    pub fn new(placement: PlacementState, workspace: WorkspaceSize) -> Self {
        Self {
            placement,
            workspace,
            gesture: Gesture::Idle,
        }
    }

    pub fn placement(&self) -> &PlacementState {
        &self.placement
    }

    pub fn workspace(&self) -> WorkspaceSize {
        self.workspace
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    pub fn set_workspace(&mut self, workspace: WorkspaceSize) {
        self.workspace = workspace;
    }

    pub fn set_placement(&mut self, placement: PlacementState) {
        self.placement = placement;
        self.gesture = Gesture::Idle;
    }

    pub fn set_size(&mut self, size: Size) {
        if !(size.width.is_finite() && size.height.is_finite()) {
            return;
        }
        self.placement.size_pixels = Size {
            width: size.width.max(MIN_SIZE),
            height: size.height.max(MIN_SIZE),
        };
    }

    pub fn set_opacity(&mut self, opacity: f64) {
        if opacity.is_nan() {
            return;
        }
        self.placement.opacity = opacity.clamp(0.0, 1.0);
    }

    pub fn set_style(&mut self, style: Option<String>) {
        self.placement.style = style;
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.placement.position_percent.x / 100.0 * self.workspace.width(),
            y: self.placement.position_percent.y / 100.0 * self.workspace.height(),
        }
    }

    /// What a press at `pointer` would grab, handles first.
    pub fn hit_test(&self, pointer: Point) -> Option<HitTarget> {
        let local = self.to_local(pointer);
        let hw = self.placement.size_pixels.width / 2.0;
        let hh = self.placement.size_pixels.height / 2.0;
        let near = |x: f64, y: f64| (local.x - x).hypot(local.y - y) <= HANDLE_RADIUS;

        if near(0.0, -hh - ROTATE_HANDLE_OFFSET) {
            return Some(HitTarget::RotateHandle);
        }
        let corners = [
            (Corner::TopLeft, -hw, -hh),
            (Corner::TopRight, hw, -hh),
            (Corner::BottomLeft, -hw, hh),
            (Corner::BottomRight, hw, hh),
        ];
        if let Some(&(corner, _, _)) = corners.iter().find(|(_, x, y)| near(*x, *y)) {
            return Some(HitTarget::Corner(corner));
        }
        (local.x.abs() <= hw && local.y.abs() <= hh).then_some(HitTarget::Body)
    }

    /// Starts a gesture. Ignored while another gesture is running.
    pub fn pointer_down(&mut self, target: HitTarget, pointer: Point) {
        if self.gesture != Gesture::Idle {
            return;
        }
        let center = self.center();
        self.gesture = match target {
            HitTarget::Body => Gesture::Dragging {
                grab: Point {
                    x: pointer.x - center.x,
                    y: pointer.y - center.y,
                },
            },
            HitTarget::Corner(corner) => Gesture::Resizing { corner },
            HitTarget::RotateHandle => Gesture::Rotating {
                start_angle: angle_of(center, pointer),
                start_rotation: self.placement.rotation_degrees,
            },
        };
    }

    /// Feeds a pointer position to the active gesture. Returns whether the
    /// placement changed.
    pub fn pointer_move(&mut self, pointer: Point) -> bool {
        match self.gesture {
            Gesture::Idle => false,
            Gesture::Dragging { grab } => {
                let (w, h) = (self.workspace.width(), self.workspace.height());
                self.placement.position_percent = Point {
                    x: ((pointer.x - grab.x) / w * 100.0).clamp(0.0, 100.0),
                    y: ((pointer.y - grab.y) / h * 100.0).clamp(0.0, 100.0),
                };
                true
            }
            Gesture::Resizing { .. } => {
                let local = self.to_local(pointer);
                self.placement.size_pixels.width = (local.x.abs() * 2.0).max(MIN_SIZE);
                self.placement.size_pixels.height = (local.y.abs() * 2.0).max(MIN_SIZE);
                true
            }
            Gesture::Rotating {
                start_angle,
                start_rotation,
            } => {
                let angle = angle_of(self.center(), pointer);
                self.placement.rotation_degrees = normalize_degrees(start_rotation + angle - start_angle);
                true
            }
        }
    }

    pub fn pointer_up(&mut self) {
        self.gesture = Gesture::Idle;
    }

    pub fn pointer_leave(&mut self) {
        self.gesture = Gesture::Idle;
    }

    /// Pointer offset from the centre, in the overlay's unrotated frame.
    fn to_local(&self, pointer: Point) -> Point {
        let center = self.center();
        let (dx, dy) = (pointer.x - center.x, pointer.y - center.y);
        let (sin, cos) = self.placement.rotation_degrees.to_radians().sin_cos();
        Point {
            x: dx * cos + dy * sin,
            y: -dx * sin + dy * cos,
        }
    }
}

/// Clockwise-positive angle of `p` around `center` on a y-down screen.
fn angle_of(center: Point, p: Point) -> f64 {
    (p.y - center.y).atan2(p.x - center.x).to_degrees()
}

fn normalize_degrees(deg: f64) -> f64 {
    let d = deg.rem_euclid(360.0);
    if d > 180.0 {
        d - 360.0
    } else {
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> OverlayEditor {
        let placement = PlacementState {
            size_pixels: Size {
                width: 100.0,
                height: 40.0,
            },
            ..Default::default()
        };
        OverlayEditor::new(placement, WorkspaceSize::new(400.0, 600.0).unwrap())
    }

    fn pt(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    #[test]
    fn drag_keeps_grab_offset() {
        let mut ed = editor();
        // Centre is (200, 300); grab 10px right of it.
        ed.pointer_down(HitTarget::Body, pt(210.0, 300.0));
        assert!(matches!(ed.gesture(), Gesture::Dragging { .. }));
        assert!(ed.pointer_move(pt(110.0, 150.0)));
        assert_eq!(ed.placement().position_percent, pt(25.0, 25.0));
        ed.pointer_up();
        assert_eq!(ed.gesture(), Gesture::Idle);
        assert!(!ed.pointer_move(pt(0.0, 0.0)));
        assert_eq!(ed.placement().position_percent, pt(25.0, 25.0));
    }

    #[test]
    fn drag_is_clamped_to_workspace() {
        let mut ed = editor();
        ed.pointer_down(HitTarget::Body, pt(200.0, 300.0));
        ed.pointer_move(pt(-500.0, 5000.0));
        assert_eq!(ed.placement().position_percent, pt(0.0, 100.0));
    }

    #[test]
    fn resize_is_centre_anchored() {
        let mut ed = editor();
        ed.pointer_down(HitTarget::Corner(Corner::BottomRight), pt(250.0, 320.0));
        ed.pointer_move(pt(280.0, 330.0));
        let size = ed.placement().size_pixels;
        assert!((size.width - 160.0).abs() < 1e-9);
        assert!((size.height - 60.0).abs() < 1e-9);
        assert_eq!(ed.placement().position_percent, pt(50.0, 50.0));

        ed.pointer_move(pt(200.0, 300.0));
        assert_eq!(ed.placement().size_pixels.width, MIN_SIZE);
    }

    #[test]
    fn rotate_follows_pointer_clockwise() {
        let mut ed = editor();
        // Handle straight above the centre, pointer swings to the right.
        ed.pointer_down(HitTarget::RotateHandle, pt(200.0, 200.0));
        ed.pointer_move(pt(300.0, 300.0));
        assert!((ed.placement().rotation_degrees - 90.0).abs() < 1e-9);
        ed.pointer_move(pt(100.0, 300.0));
        assert!((ed.placement().rotation_degrees + 90.0).abs() < 1e-9);
        ed.pointer_leave();
        assert_eq!(ed.gesture(), Gesture::Idle);
    }

    #[test]
    fn gestures_are_exclusive() {
        let mut ed = editor();
        ed.pointer_down(HitTarget::Body, pt(200.0, 300.0));
        ed.pointer_down(HitTarget::RotateHandle, pt(200.0, 256.0));
        assert!(matches!(ed.gesture(), Gesture::Dragging { .. }));
        ed.pointer_move(pt(220.0, 300.0));
        assert_eq!(ed.placement().rotation_degrees, 0.0);
        assert_eq!(ed.placement().size_pixels.width, 100.0);
    }

    #[test]
    fn hit_test_finds_handles() {
        let ed = editor();
        assert_eq!(ed.hit_test(pt(200.0, 300.0)), Some(HitTarget::Body));
        assert_eq!(ed.hit_test(pt(250.0, 320.0)), Some(HitTarget::Corner(Corner::BottomRight)));
        assert_eq!(ed.hit_test(pt(151.0, 281.0)), Some(HitTarget::Corner(Corner::TopLeft)));
        assert_eq!(ed.hit_test(pt(200.0, 256.0)), Some(HitTarget::RotateHandle));
        assert_eq!(ed.hit_test(pt(10.0, 10.0)), None);
    }

    #[test]
    fn hit_test_respects_rotation() {
        let mut ed = editor();
        ed.pointer_down(HitTarget::RotateHandle, pt(200.0, 200.0));
        ed.pointer_move(pt(300.0, 300.0));
        ed.pointer_up();
        // Rotated 90 degrees clockwise, the long side now runs vertically.
        assert_eq!(ed.hit_test(pt(200.0, 345.0)), Some(HitTarget::Body));
        assert_eq!(ed.hit_test(pt(265.0, 300.0)), None);
    }

    #[test]
    fn normalizes_angles() {
        assert_eq!(normalize_degrees(190.0), -170.0);
        assert_eq!(normalize_degrees(-190.0), 170.0);
        assert_eq!(normalize_degrees(180.0), 180.0);
        assert_eq!(normalize_degrees(720.0), 0.0);
    }

    #[test]
    fn setters_ignore_non_finite_values() {
        let mut ed = editor();
        ed.set_opacity(f64::NAN);
        ed.set_size(Size {
            width: f64::INFINITY,
            height: 10.0,
        });
        assert_eq!(ed.placement().opacity, 1.0);
        assert_eq!(ed.placement().size_pixels, Size { width: 100.0, height: 40.0 });
        assert!(ed.placement().validate().is_ok());
    }
}
