//! Input abstraction layer.
//!
//! Normalizes the rendering surface's drag-and-drop events into a
//! `DragEvent` enum consumed by the drag session. Positions arrive in
//! screen (client) space and are mapped to canvas space through a
//! [`CanvasTransform`] before they reach the session.

use crate::error::DragError;
use ng_core::{ElementDescriptor, NodeId, Point};
use serde::{Deserialize, Serialize};

/// A normalized drag-and-drop event.
#[derive(Debug, Clone, PartialEq)]
pub enum DragEvent {
    /// Drag started (palette item picked up, node grabbed).
    Start { position: Point, payload: String },

    /// Pointer moved while dragging. Arrives at input-device rate.
    Move { position: Point },

    /// Released over the canvas. `payload` is the transfer data, when the
    /// surface provides it at drop time.
    Drop {
        position: Point,
        payload: Option<String>,
    },

    /// Gesture aborted without a drop.
    Cancel { reason: CancelReason },
}

/// Why a gesture ended without committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Escape key.
    Escape,
    /// Drag ended outside any drop target.
    EndedWithoutDrop,
    /// Pointer capture lost (window blur, pointer cancel).
    CaptureLost,
    /// The gesture's payload was unusable (malformed or stale).
    Rejected,
}

impl DragEvent {
    pub fn start(x: f64, y: f64, payload: impl Into<String>) -> Self {
        Self::Start {
            position: Point::new(x, y),
            payload: payload.into(),
        }
    }

    pub fn moved(x: f64, y: f64) -> Self {
        Self::Move {
            position: Point::new(x, y),
        }
    }

    pub fn drop_at(x: f64, y: f64) -> Self {
        Self::Drop {
            position: Point::new(x, y),
            payload: None,
        }
    }

    pub fn drop_with(x: f64, y: f64, payload: impl Into<String>) -> Self {
        Self::Drop {
            position: Point::new(x, y),
            payload: Some(payload.into()),
        }
    }

    pub fn cancel(reason: CancelReason) -> Self {
        Self::Cancel { reason }
    }

    /// Extract position if this is a pointer event.
    pub fn position(&self) -> Option<Point> {
        match self {
            Self::Start { position, .. }
            | Self::Move { position }
            | Self::Drop { position, .. } => Some(*position),
            Self::Cancel { .. } => None,
        }
    }

    /// Same event with its position mapped through `f`.
    pub fn map_position(self, f: impl FnOnce(Point) -> Point) -> Self {
        match self {
            Self::Start { position, payload } => Self::Start {
                position: f(position),
                payload,
            },
            Self::Move { position } => Self::Move {
                position: f(position),
            },
            Self::Drop { position, payload } => Self::Drop {
                position: f(position),
                payload,
            },
            cancel @ Self::Cancel { .. } => cancel,
        }
    }
}

// ─── Payload ─────────────────────────────────────────────────────────────

/// What is being dragged, decoded from the transfer data.
///
/// Wire shapes: `{"element": {"type": "textNode", "data": {...}}}` for
/// palette items and `{"node": "<id>"}` for nodes already on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragPayload {
    Element(ElementDescriptor),
    Node(NodeId),
}

impl DragPayload {
    pub fn parse(raw: &str) -> Result<Self, DragError> {
        serde_json::from_str(raw).map_err(|e| DragError::MalformedPayload(e.to_string()))
    }

    /// Encode as transfer data.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The existing node being dragged, if any.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            DragPayload::Node(id) => Some(*id),
            DragPayload::Element(_) => None,
        }
    }

    /// Group elements always land on the canvas; groups never nest.
    pub fn is_group_element(&self) -> bool {
        matches!(self, DragPayload::Element(desc) if desc.kind.is_group())
    }
}

// ─── Screen → canvas ─────────────────────────────────────────────────────

/// The rendering surface's screen → canvas mapping (pan / zoom).
pub trait CanvasTransform {
    fn to_canvas(&self, screen: Point) -> Point;
}

/// Screen space is canvas space.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl CanvasTransform for IdentityTransform {
    fn to_canvas(&self, screen: Point) -> Point {
        screen
    }
}

impl<F: Fn(Point) -> Point> CanvasTransform for F {
    fn to_canvas(&self, screen: Point) -> Point {
        self(screen)
    }
}
