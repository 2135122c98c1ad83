//! Drag session state machine.
//!
//! One gesture at a time, modelled as a single tagged value:
//!
//! ```text
//! Idle → Armed → Previewing ─┬→ Committing → Idle
//!                            └→ Cancelled  → Idle
//! ```
//!
//! [`DragState::reduce`] is the only transition function. It is pure: it
//! reads the store through a [`HitContext`] and returns the next state plus
//! the [`Effects`] (signals to publish, a recoverable error) for the caller
//! to carry out. [`DragController`] wraps it and settles the terminal
//! `Committing` / `Cancelled` states back to `Idle`.
//!
//! Every move re-runs the hit-test and overwrites the previous preview, and
//! the drop position is hit-tested again, so a commit is always computed
//! from the latest pointer position.

use crate::broadcast::Signal;
use crate::error::DragError;
use crate::input::{CancelReason, DragEvent, DragPayload};
use ng_core::{NodeId, Point, StoreError};
use ng_hit::{GroupHit, HitContext, hit_test_groups};
use smallvec::SmallVec;

/// What kind of gesture is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    /// A palette element is being dragged onto the canvas.
    NewElement,
    /// An existing node is over a group (its own or another one).
    ChildReorder,
    /// An existing node is outside every group.
    ChildExtraction,
}

impl DragKind {
    fn resolve(payload: &DragPayload, target: Option<&GroupHit>) -> Self {
        match (payload, target) {
            (DragPayload::Element(_), _) => DragKind::NewElement,
            (DragPayload::Node(_), Some(_)) => DragKind::ChildReorder,
            (DragPayload::Node(_), None) => DragKind::ChildExtraction,
        }
    }
}

/// The resolved outcome of a drop, ready to be written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub kind: DragKind,
    pub payload: DragPayload,
    /// Drop point in absolute canvas space.
    pub pointer: Point,
    /// Target group and insertion index, or `None` for the bare canvas.
    pub target: Option<GroupHit>,
    /// Position in the target's frame: relative to the group when there is
    /// one, absolute otherwise.
    pub position: Point,
}

/// Current preview, for rendering insertion markers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preview {
    pub kind: DragKind,
    pub pointer: Point,
    pub target: Option<GroupHit>,
}

/// The drag session. Each variant carries only what is valid in that state.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DragState {
    #[default]
    Idle,
    Armed {
        payload: DragPayload,
        pointer: Point,
    },
    Previewing {
        payload: DragPayload,
        preview: Preview,
    },
    Committing(Commit),
    Cancelled(CancelReason),
}

/// Side effects requested by a transition.
#[derive(Debug, Default, PartialEq)]
pub struct Effects {
    pub signals: SmallVec<[Signal; 2]>,
    /// Filled by [`DragController`] when the gesture commits.
    pub commit: Option<Commit>,
    pub error: Option<DragError>,
}

impl Effects {
    fn signal(&mut self, signal: Signal) {
        self.signals.push(signal);
    }

    fn fail(&mut self, error: DragError) {
        log::warn!("drag: {error}");
        self.error = Some(error);
    }
}

impl DragState {
    pub fn is_idle(&self) -> bool {
        matches!(self, DragState::Idle)
    }

    pub fn preview(&self) -> Option<&Preview> {
        match self {
            DragState::Previewing { preview, .. } => Some(preview),
            _ => None,
        }
    }

    fn is_active(&self) -> bool {
        matches!(self, DragState::Armed { .. } | DragState::Previewing { .. })
    }

    /// Group currently showing a preview marker, if any.
    fn previewed_group(&self) -> Option<NodeId> {
        self.preview()
            .and_then(|p| p.target.as_ref())
            .map(|t| t.group_id)
    }

    /// Advance the session by one event.
    pub fn reduce(self, event: &DragEvent, ctx: &HitContext<'_>) -> (DragState, Effects) {
        let mut fx = Effects::default();
        let previewed = self.previewed_group();
        let next = match (self, event) {
            (DragState::Idle, DragEvent::Start { position, payload }) => {
                arm(*position, payload, ctx, &mut fx)
            }
            (stale, DragEvent::Start { position, payload }) => {
                log::warn!("drag: start received while not idle ({stale:?}); resetting");
                end_gesture(&stale, &mut fx);
                let next = arm(*position, payload, ctx, &mut fx);
                if fx.error.is_none() {
                    fx.fail(DragError::StaleController);
                }
                next
            }

            (
                DragState::Armed { payload, .. } | DragState::Previewing { payload, .. },
                DragEvent::Move { position },
            ) => preview(payload, *position, previewed, ctx, &mut fx),
            (state, DragEvent::Move { .. }) => state,

            (state, DragEvent::Drop { position, payload }) => {
                let captured = match &state {
                    DragState::Armed { payload, .. } | DragState::Previewing { payload, .. } => {
                        Some(payload.clone())
                    }
                    _ => None,
                };
                end_gesture(&state, &mut fx);
                let resolved = match payload {
                    Some(raw) => DragPayload::parse(raw).map(Some),
                    None => Ok(captured),
                };
                match resolved {
                    Ok(Some(payload)) => commit(payload, *position, ctx, &mut fx),
                    Ok(None) => {
                        fx.fail(DragError::NoActiveSession);
                        DragState::Idle
                    }
                    Err(err) => {
                        fx.fail(err);
                        DragState::Cancelled(CancelReason::Rejected)
                    }
                }
            }

            (state, DragEvent::Cancel { reason }) => {
                if state.is_active() {
                    end_gesture(&state, &mut fx);
                    DragState::Cancelled(*reason)
                } else {
                    DragState::Idle
                }
            }
        };
        (next, fx)
    }
}

/// Group under `pointer` for this payload. Group elements never target a
/// group; existing nodes exclude their own rect from the index.
fn target_for(payload: &DragPayload, pointer: Point, ctx: &HitContext<'_>) -> Option<GroupHit> {
    if payload.is_group_element() {
        return None;
    }
    hit_test_groups(ctx, pointer, payload.node_id())
}

/// Verify that a node payload still refers to a node in the store.
fn check_payload(payload: &DragPayload, ctx: &HitContext<'_>) -> Result<(), DragError> {
    match payload.node_id() {
        Some(id) if !ctx.store.contains(id) => Err(StoreError::NodeNotFound(id).into()),
        _ => Ok(()),
    }
}

fn arm(pointer: Point, raw: &str, ctx: &HitContext<'_>, fx: &mut Effects) -> DragState {
    let payload = match DragPayload::parse(raw).and_then(|p| check_payload(&p, ctx).map(|()| p)) {
        Ok(payload) => payload,
        Err(err) => {
            fx.fail(err);
            return DragState::Cancelled(CancelReason::Rejected);
        }
    };
    let kind = match payload.node_id() {
        None => DragKind::NewElement,
        Some(id) if ctx.store.parent_of(id).is_some() => DragKind::ChildReorder,
        Some(_) => DragKind::ChildExtraction,
    };
    log::debug!("drag: armed {kind:?}");
    fx.signal(Signal::DragStart { kind });
    DragState::Armed { payload, pointer }
}

fn preview(
    payload: DragPayload,
    pointer: Point,
    previewed: Option<NodeId>,
    ctx: &HitContext<'_>,
    fx: &mut Effects,
) -> DragState {
    let target = target_for(&payload, pointer, ctx);
    if let Some(group_id) = previewed
        && target.map(|t| t.group_id) != Some(group_id)
    {
        fx.signal(Signal::GroupPreviewLeave { group_id });
    }
    if let Some(hit) = target {
        fx.signal(Signal::GroupPreviewEnter {
            group_id: hit.group_id,
            pointer,
            insertion_index: hit.insertion_index,
        });
    }
    DragState::Previewing {
        preview: Preview {
            kind: DragKind::resolve(&payload, target.as_ref()),
            pointer,
            target,
        },
        payload,
    }
}

/// Clear any preview marker and announce the end of an active gesture.
fn end_gesture(state: &DragState, fx: &mut Effects) {
    if let Some(group_id) = state.previewed_group() {
        fx.signal(Signal::GroupPreviewLeave { group_id });
    }
    if state.is_active() {
        fx.signal(Signal::DragEnd);
    }
}

fn commit(
    payload: DragPayload,
    pointer: Point,
    ctx: &HitContext<'_>,
    fx: &mut Effects,
) -> DragState {
    if let Err(err) = check_payload(&payload, ctx) {
        fx.fail(err);
        return DragState::Cancelled(CancelReason::Rejected);
    }
    let target = target_for(&payload, pointer, ctx);
    let position = ctx
        .store
        .position_in_frame(pointer, target.map(|t| t.group_id));
    let kind = DragKind::resolve(&payload, target.as_ref());
    DragState::Committing(Commit {
        kind,
        payload,
        pointer,
        target,
        position,
    })
}

// ─── Controller ──────────────────────────────────────────────────────────

/// Holds the single active session and settles terminal states to `Idle`.
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

    pub fn preview(&self) -> Option<&Preview> {
        self.state.preview()
    }

    pub fn handle(&mut self, event: &DragEvent, ctx: &HitContext<'_>) -> Effects {
        let (next, mut fx) = std::mem::take(&mut self.state).reduce(event, ctx);
        self.state = match next {
            DragState::Committing(commit) => {
                log::debug!(
                    "drag: commit {:?} into {}",
                    commit.kind,
                    commit
                        .target
                        .map_or_else(|| "canvas".to_string(), |t| t.group_id.to_string())
                );
                fx.commit = Some(commit);
                DragState::Idle
            }
            DragState::Cancelled(reason) => {
                log::debug!("drag: cancelled ({reason:?})");
                DragState::Idle
            }
            other => other,
        };
        fx
    }
}
