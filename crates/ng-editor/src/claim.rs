//! Drop claim protocol.
//!
//! A drop can be handled by the group it landed in or by the canvas. Each
//! drop is stamped with a monotonically increasing sequence number; the first
//! handler to claim that number owns the drop and every later claimant
//! stands down.

use ng_core::NodeId;
use std::collections::VecDeque;

/// Claims older than this many drops are forgotten.
const CLAIM_WINDOW: usize = 64;

/// Identifies one drop. Issued by [`DropArbiter::issue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DropTicket {
    pub seq: u64,
}

/// Who handled a drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claimant {
    Group(NodeId),
    Canvas,
}

#[derive(Debug, Default)]
pub struct DropArbiter {
    next_seq: u64,
    claims: VecDeque<(DropTicket, Claimant)>,
}

impl DropArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp a new drop.
    pub fn issue(&mut self) -> DropTicket {
        self.next_seq += 1;
        DropTicket { seq: self.next_seq }
    }

    /// Claim `ticket` for `claimant`. Returns `false` if someone else (or the
    /// same claimant) already holds it, or if the ticket was never issued.
    pub fn claim(&mut self, ticket: DropTicket, claimant: Claimant) -> bool {
        if ticket.seq == 0 || ticket.seq > self.next_seq {
            log::warn!("claim: ticket #{} was never issued", ticket.seq);
            return false;
        }
        if let Some(owner) = self.owner(ticket) {
            log::debug!(
                "claim: #{} already held by {owner:?}; {claimant:?} stands down",
                ticket.seq
            );
            return false;
        }
        if self.claims.len() == CLAIM_WINDOW {
            self.claims.pop_front();
        }
        self.claims.push_back((ticket, claimant));
        log::debug!("claim: #{} -> {claimant:?}", ticket.seq);
        true
    }

    /// Current owner of `ticket`, if it was claimed recently.
    pub fn owner(&self, ticket: DropTicket) -> Option<Claimant> {
        self.claims
            .iter()
            .rev()
            .find(|(t, _)| *t == ticket)
            .map(|(_, c)| *c)
    }

    pub fn is_claimed(&self, ticket: DropTicket) -> bool {
        self.owner(ticket).is_some()
    }
}
