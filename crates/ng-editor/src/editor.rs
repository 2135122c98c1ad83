//! The editor context: one store, one drag session, one channel.
//!
//! Owns every piece of mutable state the grouping engine needs and wires
//! them together. Input events go in through [`Editor::handle`]; signals
//! come out through the [`BroadcastChannel`]; the store is read through
//! [`Editor::store`].
//!
//! A committed drop is settled through the claim protocol. A drop that
//! landed in a group is announced as `GroupDrop` / `ChildDrop` carrying a
//! [`PendingDrop`] stamped with the drop's ticket. Group-side listeners
//! claim the ticket: the editor's own reconciler listener does so by
//! default, and hosts can claim through [`Editor::submit_group_drop`]. The
//! canvas handler runs last and only acts on tickets nobody claimed.

use crate::broadcast::{BroadcastChannel, ListenerKey, Signal, SignalKind};
use crate::claim::{Claimant, DropArbiter, DropTicket};
use crate::error::DragError;
use crate::input::{CancelReason, CanvasTransform, DragEvent, DragPayload, IdentityTransform};
use crate::reconcile::{PendingDrop, ReconcileOutcome, Reconciler};
use crate::session::{Commit, DragController, DragState, Effects, Preview};
use ng_core::{
    Edge, EdgeId, EngineConfig, GraphSnapshot, GraphStore, Node, NodeChange, NodeId, Point,
    Size, SnapshotError, StoreError,
};
use ng_hit::{GroupHit, HitContext, MeasuredSizes};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

/// What an input event did.
#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    /// Nothing to do (a move or cancel with no active gesture).
    Ignored,
    Armed,
    Previewing(Option<GroupHit>),
    /// The drop was written to the store. `parent` is `None` for the canvas.
    Applied {
        node: NodeId,
        parent: Option<NodeId>,
    },
    /// The drop is queued for a group that could not take it yet.
    Deferred { seq: u64, group_id: NodeId },
    /// Another handler already owns this drop ticket.
    ClaimLost { seq: u64 },
    Cancelled,
    /// The gesture or its mutation failed. Nothing was written.
    Rejected(DragError),
}

/// Drop records heard on the channel, waiting to be claimed.
type Inbox = Rc<RefCell<Vec<PendingDrop>>>;

pub struct Editor<T: CanvasTransform = IdentityTransform> {
    store: GraphStore,
    config: EngineConfig,
    sizes: MeasuredSizes,
    controller: DragController,
    channel: BroadcastChannel,
    arbiter: DropArbiter,
    reconciler: Reconciler,
    inbox: Inbox,
    /// Reconcile outcomes not yet returned by [`Editor::tick`].
    backlog: Vec<ReconcileOutcome>,
    transform: T,
}

impl Editor {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_transform(config, IdentityTransform)
    }

    /// Build an editor over an existing document.
    pub fn from_snapshot(
        snapshot: GraphSnapshot,
        config: EngineConfig,
    ) -> Result<Self, SnapshotError> {
        let mut editor = Self::new(config);
        editor.load_snapshot(snapshot)?;
        Ok(editor)
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl<T: CanvasTransform> Editor<T> {
    pub fn with_transform(config: EngineConfig, transform: T) -> Self {
        let mut editor = Self {
            store: GraphStore::new(),
            sizes: MeasuredSizes::new(),
            controller: DragController::new(),
            channel: BroadcastChannel::new(),
            arbiter: DropArbiter::new(),
            reconciler: Reconciler::new(config.pending_drop_timeout()),
            inbox: Inbox::default(),
            backlog: Vec::new(),
            config,
            transform,
        };
        editor.listen_for_group_drops();
        editor
    }

    /// Register the reconciler on the channel. Called on construction; call
    /// again after clearing the channel.
    pub fn listen_for_group_drops(&mut self) {
        for kind in [SignalKind::GroupDrop, SignalKind::ChildDrop] {
            let inbox = Rc::clone(&self.inbox);
            let _ = self
                .channel
                .subscribe(kind, ListenerKey::reconciler(), move |signal: &Signal| {
                    if let Signal::GroupDrop(record) | Signal::ChildDrop(record) = signal {
                        inbox.borrow_mut().push(record.clone());
                    }
                });
        }
    }

    /// Replace the document. A gesture in flight is cancelled (its preview
    /// cleared) and pending drops are abandoned; subscriptions are kept.
    pub fn load_snapshot(&mut self, snapshot: GraphSnapshot) -> Result<(), SnapshotError> {
        let store = GraphStore::from_snapshot(snapshot)?;
        self.abort_gesture(CancelReason::CaptureLost);
        self.store = store;
        self.reconciler.clear();
        self.inbox.borrow_mut().clear();
        self.sizes.retain_known(&self.store);
        Ok(())
    }

    /// Export the current document.
    pub fn snapshot(&self) -> GraphSnapshot {
        self.store.snapshot()
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The channel group widgets subscribe to.
    pub fn channel_mut(&mut self) -> &mut BroadcastChannel {
        &mut self.channel
    }

    pub fn state(&self) -> &DragState {
        self.controller.state()
    }

    /// Current target group and insertion index, for drawing markers.
    pub fn preview(&self) -> Option<&Preview> {
        self.controller.preview()
    }

    /// Drop records waiting for their group.
    pub fn pending(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Record the rendered size of a node. Measured sizes win over
    /// estimates during hit-testing.
    pub fn set_measured_size(&mut self, id: NodeId, size: Size) {
        self.sizes.set(id, size);
    }

    pub fn clear_measured_size(&mut self, id: NodeId) {
        self.sizes.remove(id);
    }

    // ─── Input ───────────────────────────────────────────────────────────

    /// Feed one input event. Positions are in screen space.
    pub fn handle(&mut self, event: DragEvent, now: Instant) -> DropOutcome {
        let event = event.map_position(|p| self.transform.to_canvas(p));

        let was_active = !self.controller.state().is_idle();
        let fx = self.run_controller(&event);

        if let Some(commit) = fx.commit {
            return self.settle(commit, now);
        }
        match fx.error {
            Some(DragError::StaleController) | None => {}
            Some(err) => return DropOutcome::Rejected(err),
        }
        match self.controller.state() {
            DragState::Armed { .. } => DropOutcome::Armed,
            DragState::Previewing { preview, .. } => DropOutcome::Previewing(preview.target),
            _ if was_active && matches!(event, DragEvent::Cancel { .. }) => DropOutcome::Cancelled,
            _ => DropOutcome::Ignored,
        }
    }

    /// Claim drop records heard on the channel, apply pending drops whose
    /// group exists and discard expired ones. Returns every reconcile
    /// outcome since the previous call. Hosts call this on their frame or
    /// timer tick.
    #[must_use = "reconcile outcomes report expired and rejected drops"]
    pub fn tick(&mut self, now: Instant) -> Vec<ReconcileOutcome> {
        self.claim_inbox(now);
        let outcomes = self.reconciler.reconcile(&mut self.store, now);
        self.backlog.extend(outcomes);
        std::mem::take(&mut self.backlog)
    }

    /// A fresh drop ticket, for hosts that announce drops themselves.
    pub fn issue_ticket(&mut self) -> DropTicket {
        self.arbiter.issue()
    }

    /// Current owner of a drop ticket.
    pub fn drop_owner(&self, ticket: DropTicket) -> Option<Claimant> {
        self.arbiter.owner(ticket)
    }

    /// Group-side entry point: claim `record`'s ticket for its group and
    /// queue it. Applied at once if the group exists, deferred otherwise.
    pub fn submit_group_drop(&mut self, record: PendingDrop, now: Instant) -> DropOutcome {
        let (seq, group_id) = (record.seq, record.group_id);
        if !self.accept(record, now) {
            return DropOutcome::ClaimLost { seq };
        }
        self.reconcile_one(seq, group_id, now)
    }

    /// Cancel any gesture in flight and publish its cleanup signals.
    pub fn abort_gesture(&mut self, reason: CancelReason) -> bool {
        if self.controller.state().is_idle() {
            return false;
        }
        self.run_controller(&DragEvent::cancel(reason));
        true
    }

    fn run_controller(&mut self, event: &DragEvent) -> Effects {
        let ctx = HitContext::new(&self.store, &self.sizes, &self.config);
        let fx = self.controller.handle(event, &ctx);
        for signal in &fx.signals {
            self.channel.publish(signal);
        }
        fx
    }

    fn settle(&mut self, commit: Commit, now: Instant) -> DropOutcome {
        let ticket = self.arbiter.issue();
        if let Some(hit) = commit.target {
            let record = PendingDrop {
                seq: ticket.seq,
                group_id: hit.group_id,
                payload: commit.payload.clone(),
                position: commit.position,
                index: Some(hit.insertion_index),
            };
            let signal = if record.payload.node_id().is_some() {
                Signal::ChildDrop(record)
            } else {
                Signal::GroupDrop(record)
            };
            self.channel.publish(&signal);
            self.claim_inbox(now);
        }

        match self.arbiter.owner(ticket) {
            Some(Claimant::Group(group_id)) => self.reconcile_one(ticket.seq, group_id, now),
            Some(Claimant::Canvas) => DropOutcome::ClaimLost { seq: ticket.seq },
            None if self.arbiter.claim(ticket, Claimant::Canvas) => self.settle_on_canvas(commit),
            None => DropOutcome::ClaimLost { seq: ticket.seq },
        }
    }

    /// Claim every record heard on the channel since the last call.
    fn claim_inbox(&mut self, now: Instant) {
        let heard = std::mem::take(&mut *self.inbox.borrow_mut());
        for record in heard {
            self.accept(record, now);
        }
    }

    fn accept(&mut self, record: PendingDrop, now: Instant) -> bool {
        if !self.arbiter.claim(record.ticket(), Claimant::Group(record.group_id)) {
            return false;
        }
        self.reconciler.submit(record, now);
        true
    }

    /// Run a reconcile pass and report on the record for `seq`. Outcomes
    /// for other records are kept for the next [`Editor::tick`].
    fn reconcile_one(&mut self, seq: u64, group_id: NodeId, now: Instant) -> DropOutcome {
        let mut outcome = None;
        for result in self.reconciler.reconcile(&mut self.store, now) {
            match result {
                ReconcileOutcome::Applied { seq: s, node, group_id } if s == seq => {
                    outcome = Some(DropOutcome::Applied {
                        node,
                        parent: Some(group_id),
                    });
                }
                ReconcileOutcome::Rejected { record, error } if record.seq == seq => {
                    outcome = Some(DropOutcome::Rejected(error.into()));
                }
                other => self.backlog.push(other),
            }
        }
        outcome.unwrap_or(DropOutcome::Deferred { seq, group_id })
    }

    /// Canvas handler: drops nobody else claimed become un-parented nodes
    /// at the pointer.
    fn settle_on_canvas(&mut self, commit: Commit) -> DropOutcome {
        let result = match commit.payload {
            DragPayload::Element(desc) => {
                let id = self.store.fresh_node_id(desc.kind.as_str());
                self.store
                    .add_node(desc.into_node(id, commit.pointer, None), None)
                    .map(|()| id)
            }
            DragPayload::Node(id) => self.store.reparent(id, None, commit.pointer).map(|()| id),
        };
        match result {
            Ok(node) => {
                log::debug!("editor: {node} dropped on canvas");
                DropOutcome::Applied { node, parent: None }
            }
            Err(err) => {
                log::warn!("editor: canvas drop rejected: {err}");
                DropOutcome::Rejected(err.into())
            }
        }
    }

    // ─── Direct mutations ────────────────────────────────────────────────

    /// Apply a batch of position / parent changes atomically.
    pub fn apply_node_changes(&mut self, changes: &[NodeChange]) -> Result<(), StoreError> {
        self.store.apply_node_changes(changes)
    }

    pub fn add_node(&mut self, node: Node, index: Option<usize>) -> Result<(), StoreError> {
        self.store.add_node(node, index)
    }

    /// Remove a node. Children of a removed group stay on the canvas.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, StoreError> {
        let removed = self.store.remove_node(id)?;
        self.sizes.remove(id);
        Ok(removed)
    }

    pub fn add_edge(&mut self, edge: Edge) -> Result<(), StoreError> {
        self.store.add_edge(edge)
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Result<Edge, StoreError> {
        self.store.remove_edge(id)
    }

    /// Absolute canvas position of a node.
    pub fn canvas_position(&self, id: NodeId) -> Option<Point> {
        self.store.absolute_position(id)
    }
}
