pub mod config;
pub mod error;
pub mod geometry;
pub mod id;
pub mod model;
pub mod snapshot;
pub mod store;

pub use config::{ChildMetrics, EngineConfig, GroupMetrics};
pub use error::{SnapshotError, StoreError};
pub use id::{EdgeId, NodeId};
pub use model::*;
pub use snapshot::GraphSnapshot;
pub use store::GraphStore;

// Re-export kurbo geometry types so downstream crates share one version
pub use kurbo::{Point, Rect, Size, Vec2};
