//! Pointer-driven drag editing of the class graph.
//!
//! Translates pointer input into pinned-position overrides on the shared
//! simulator and manages simulation warmth while a drag is in flight. One
//! node may be dragged at a time; the interaction layer guarantees pointer
//! exclusivity.

use crate::simulation::LayoutSimulator;

/// Alpha target held while a drag is active. Keeps the layout lively enough
/// that neighbours follow the dragged node.
const DRAG_ALPHA_TARGET: f32 = 0.2;

/// A point, in whichever coordinate space the context implies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// On-screen pixel geometry of the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Logical viewbox of the rendering surface, in layout units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub width: f32,
    pub height: f32,
}

/// Map a pointer position in screen pixels into simulation coordinates via
/// the linear scale between the surface's pixel size and its logical viewbox.
pub fn screen_to_sim(screen: Point, view_box: ViewBox, surface: SurfaceRect) -> Point {
    let scale_x = view_box.width / surface.width.max(f32::EPSILON);
    let scale_y = view_box.height / surface.height.max(f32::EPSILON);
    Point {
        x: (screen.x - surface.left) * scale_x,
        y: (screen.y - surface.top) * scale_y,
    }
}

/// Drag interaction state: idle, or dragging one node by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(String),
}

/// Drives pin updates on the simulator from pointer events.
///
/// All transitions that do not apply in the current state are no-ops, so
/// stray pointer events (an up without a down, a move after leave) are safe.
#[derive(Debug, Default)]
pub struct DragController {
    state: DragState,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    /// Begin dragging: pin the node at its current simulated coordinates and
    /// raise the simulation temperature.
    pub fn pointer_down(&mut self, sim: &mut LayoutSimulator, node_id: &str) {
        if self.dragging() {
            return;
        }
        let Some(node) = sim.model_mut().node_mut(node_id) else {
            return;
        };
        node.fx = Some(node.x);
        node.fy = Some(node.y);
        self.state = DragState::Dragging(node_id.to_string());
        sim.set_alpha_target(DRAG_ALPHA_TARGET);
    }

    /// Move the pin to the pointer position, mapped into simulation space.
    pub fn pointer_move(
        &mut self,
        sim: &mut LayoutSimulator,
        screen: Point,
        view_box: ViewBox,
        surface: SurfaceRect,
    ) {
        let DragState::Dragging(id) = &self.state else {
            return;
        };
        let point = screen_to_sim(screen, view_box, surface);
        if let Some(node) = sim.model_mut().node_mut(id) {
            node.fx = Some(point.x);
            node.fy = Some(point.y);
        }
    }

    /// End the drag (pointer up or leave): clear the pin and let the
    /// simulation settle.
    pub fn pointer_up(&mut self, sim: &mut LayoutSimulator) {
        let DragState::Dragging(id) = std::mem::take(&mut self.state) else {
            return;
        };
        if let Some(node) = sim.model_mut().node_mut(&id) {
            node.fx = None;
            node.fy = None;
        }
        sim.set_alpha_target(0.0);
    }
}
