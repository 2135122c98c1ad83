pub mod broadcast;
pub mod claim;
pub mod editor;
pub mod error;
pub mod input;
pub mod reconcile;
pub mod session;

pub use broadcast::{BroadcastChannel, ListenerKey, Signal, SignalKind, Subscription};
pub use claim::{Claimant, DropArbiter, DropTicket};
pub use editor::{DropOutcome, Editor};
pub use error::DragError;
pub use input::{CancelReason, CanvasTransform, DragEvent, DragPayload, IdentityTransform};
pub use reconcile::{PendingDrop, ReconcileOutcome, Reconciler};
pub use session::{Commit, DragController, DragKind, DragState, Effects, Preview};
