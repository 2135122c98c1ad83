//! Typed publish/subscribe between the drag session and group widgets.
//!
//! Groups are rendered independently of the canvas and share no call stack
//! with the drag session, so they learn about hover, preview and drops
//! through this channel instead of direct calls. The channel is owned by the
//! [`Editor`](crate::editor::Editor) and dropped with it, so registrations
//! never outlive the editor instance.
//!
//! Delivery is synchronous and in registration order. Nothing is queued
//! between publishes.

use crate::reconcile::PendingDrop;
use crate::session::DragKind;
use ng_core::{NodeId, Point};
use std::collections::HashMap;
use std::fmt;

/// Names of the signals a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    DragStart,
    DragEnd,
    GroupPreviewEnter,
    GroupPreviewLeave,
    GroupDrop,
    ChildDrop,
}

/// A published signal and its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// A gesture was armed. Groups may show their drop affordance.
    DragStart { kind: DragKind },
    /// The gesture ended (committed or cancelled).
    DragEnd,
    /// The pointer is over `group_id`; the marker belongs at
    /// `insertion_index`. Re-sent on every move while over the group.
    GroupPreviewEnter {
        group_id: NodeId,
        pointer: Point,
        insertion_index: usize,
    },
    /// The pointer left `group_id`, or the gesture ended while over it.
    GroupPreviewLeave { group_id: NodeId },
    /// A new element was dropped into a group.
    GroupDrop(PendingDrop),
    /// An existing node was dropped into a group.
    ChildDrop(PendingDrop),
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::DragStart { .. } => SignalKind::DragStart,
            Signal::DragEnd => SignalKind::DragEnd,
            Signal::GroupPreviewEnter { .. } => SignalKind::GroupPreviewEnter,
            Signal::GroupPreviewLeave { .. } => SignalKind::GroupPreviewLeave,
            Signal::GroupDrop(_) => SignalKind::GroupDrop,
            Signal::ChildDrop(_) => SignalKind::ChildDrop,
        }
    }

    /// The group this signal is addressed to, if it is group-targeted.
    pub fn group_id(&self) -> Option<NodeId> {
        match self {
            Signal::GroupPreviewEnter { group_id, .. } | Signal::GroupPreviewLeave { group_id } => {
                Some(*group_id)
            }
            Signal::GroupDrop(record) | Signal::ChildDrop(record) => Some(record.group_id),
            Signal::DragStart { .. } | Signal::DragEnd => None,
        }
    }
}

// ─── Channel ─────────────────────────────────────────────────────────────

pub type Handler = Box<dyn FnMut(&Signal)>;

/// Identity of a listener. A key holds at most one registration per signal
/// kind; subscribing again under the same key replaces the handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerKey(String);

impl ListenerKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Conventional key for a group widget.
    pub fn group(id: NodeId) -> Self {
        Self(format!("group:{id}"))
    }

    /// Key under which the editor's reconciler claims group drops.
    /// Unsubscribing it leaves every drop to the canvas handler unless the
    /// host claims group drops itself.
    pub fn reconciler() -> Self {
        Self::new("editor:reconciler")
    }
}

impl fmt::Display for ListenerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capability to remove one registration. Becomes inert once the key is
/// re-subscribed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "dropping a Subscription leaves the handler registered"]
pub struct Subscription {
    kind: SignalKind,
    key: ListenerKey,
    token: u64,
}

impl Subscription {
    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn key(&self) -> &ListenerKey {
        &self.key
    }
}

struct Registration {
    key: ListenerKey,
    token: u64,
    handler: Handler,
}

#[derive(Default)]
pub struct BroadcastChannel {
    listeners: HashMap<SignalKind, Vec<Registration>>,
    next_token: u64,
}

impl fmt::Debug for BroadcastChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastChannel")
            .field("listeners", &self.len())
            .finish()
    }
}

impl BroadcastChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind` under `key`, replacing any previous
    /// registration of the same key and kind.
    pub fn subscribe(
        &mut self,
        kind: SignalKind,
        key: ListenerKey,
        handler: impl FnMut(&Signal) + 'static,
    ) -> Subscription {
        self.next_token += 1;
        let token = self.next_token;
        let registrations = self.listeners.entry(kind).or_default();
        match registrations.iter_mut().find(|r| r.key == key) {
            Some(existing) => {
                existing.token = token;
                existing.handler = Box::new(handler);
            }
            None => registrations.push(Registration {
                key: key.clone(),
                token,
                handler: Box::new(handler),
            }),
        }
        Subscription { kind, key, token }
    }

    /// Remove a registration. Returns `false` if it was already removed or
    /// replaced by a newer subscription under the same key.
    pub fn unsubscribe(&mut self, subscription: &Subscription) -> bool {
        let Some(registrations) = self.listeners.get_mut(&subscription.kind) else {
            return false;
        };
        let before = registrations.len();
        registrations.retain(|r| !(r.key == subscription.key && r.token == subscription.token));
        before != registrations.len()
    }

    /// Drop every registration held by `key`, across all kinds.
    pub fn unsubscribe_key(&mut self, key: &ListenerKey) {
        for registrations in self.listeners.values_mut() {
            registrations.retain(|r| &r.key != key);
        }
    }

    /// Deliver `signal` to every current subscriber of its kind. Returns
    /// the number of handlers invoked.
    pub fn publish(&mut self, signal: &Signal) -> usize {
        let Some(registrations) = self.listeners.get_mut(&signal.kind()) else {
            return 0;
        };
        for registration in registrations.iter_mut() {
            (registration.handler)(signal);
        }
        registrations.len()
    }

    /// Total number of registrations.
    pub fn len(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every registration, including the editor's own reconciler.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}
