//! Node / edge records and the snapshot shape exchanged with persistence.
//!
//! A node's `position` is interpreted in its parent's frame: absolute canvas
//! coordinates when `parent_id` is `None`, offset from the parent's origin
//! otherwise. Only groups may be parents, and groups are never children, so
//! nesting is at most one level deep.

use crate::id::{EdgeId, NodeId};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Node kind ───────────────────────────────────────────────────────────

/// Wire name of the group container type.
pub const GROUP_TYPE: &str = "group";

/// Rendering / behaviour variant of a node.
///
/// Serialized as a plain string: `"group"` for containers, anything else is
/// a content element whose tag is forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    /// Container with an ordered list of children.
    Group,
    /// Content element (text, image, audio, ...). The tag is opaque here.
    Content(String),
}

impl NodeKind {
    pub fn is_group(&self) -> bool {
        matches!(self, NodeKind::Group)
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Group => GROUP_TYPE,
            NodeKind::Content(tag) => tag,
        }
    }
}

impl From<String> for NodeKind {
    fn from(tag: String) -> Self {
        if tag == GROUP_TYPE {
            NodeKind::Group
        } else {
            NodeKind::Content(tag)
        }
    }
}

impl From<&str> for NodeKind {
    fn from(tag: &str) -> Self {
        NodeKind::from(tag.to_string())
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Group => GROUP_TYPE.to_string(),
            NodeKind::Content(tag) => tag,
        }
    }
}

// ─── Node ────────────────────────────────────────────────────────────────

/// A placed element or group container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,

    #[serde(rename = "type")]
    pub kind: NodeKind,

    /// Absolute if un-parented, parent-relative otherwise.
    pub position: Point,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,

    /// Opaque payload owned by content modules.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl Node {
    pub fn new(id: NodeId, kind: impl Into<NodeKind>, position: Point) -> Self {
        Self {
            id,
            kind: kind.into(),
            position,
            parent_id: None,
            data: Value::Null,
        }
    }

    pub fn group(id: NodeId, position: Point) -> Self {
        Self::new(id, NodeKind::Group, position)
    }

    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn is_group(&self) -> bool {
        self.kind.is_group()
    }
}

// ─── Edge ────────────────────────────────────────────────────────────────

/// Directed connection between two nodes. Unaffected by grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl Edge {
    pub fn new(id: EdgeId, source: NodeId, target: NodeId) -> Self {
        Self {
            id,
            source,
            target,
            data: Value::Null,
        }
    }
}

// ─── Element descriptor ──────────────────────────────────────────────────

/// What the palette hands over when a new element is dragged onto the
/// canvas: the node type plus its initial payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl ElementDescriptor {
    pub fn new(kind: impl Into<NodeKind>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Materialize the descriptor as a node.
    pub fn into_node(self, id: NodeId, position: Point, parent: Option<NodeId>) -> Node {
        Node {
            id,
            kind: self.kind,
            position,
            parent_id: parent,
            data: self.data,
        }
    }
}

// ─── Node changes ────────────────────────────────────────────────────────

/// A single entry in a [`GraphStore::apply_node_changes`] batch.
///
/// [`GraphStore::apply_node_changes`]: crate::store::GraphStore::apply_node_changes
#[derive(Debug, Clone, PartialEq)]
pub enum NodeChange {
    /// Plain move in the node's current frame. Rejected for children.
    Position { id: NodeId, position: Point },
    /// Explicit parent change; `position` is in the new parent's frame.
    Reparent {
        id: NodeId,
        parent: Option<NodeId>,
        position: Point,
    },
}

impl NodeChange {
    pub fn id(&self) -> NodeId {
        match self {
            NodeChange::Position { id, .. } | NodeChange::Reparent { id, .. } => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_kind_wire_format() {
        let group: NodeKind = serde_json::from_str("\"group\"").unwrap();
        assert_eq!(group, NodeKind::Group);
        let text: NodeKind = serde_json::from_str("\"textNode\"").unwrap();
        assert_eq!(text, NodeKind::Content("textNode".into()));
        assert_eq!(serde_json::to_string(&text).unwrap(), "\"textNode\"");
    }

    #[test]
    fn node_json_shape() {
        let node = Node::new(NodeId::intern("n1"), "textNode", Point::new(10.0, 20.0))
            .with_parent(NodeId::intern("g1"))
            .with_data(json!({ "label": "Hello" }));
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "n1",
                "type": "textNode",
                "position": { "x": 10.0, "y": 20.0 },
                "parentId": "g1",
                "data": { "label": "Hello" }
            })
        );
    }

    #[test]
    fn descriptor_data_is_forwarded_verbatim() {
        let data = json!({ "label": "Audio", "src": "a.mp3" });
        let desc = ElementDescriptor::new("audioNode", data.clone());
        let node = desc.into_node(NodeId::intern("n2"), Point::ZERO, None);
        assert_eq!(node.data, data);
        assert!(!node.is_group());
    }
}
