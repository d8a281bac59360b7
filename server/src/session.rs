//! Per-connection handle bridging one external connection to the hub.
//!
//! A `PlayerSession` is created by [`HubHandle::register`] and owns the
//! receiving half of the session's snapshot mailbox. The hub owns the
//! sending half; when the hub drops it — rejection, ejection, explicit
//! unregistration or game stop — the snapshot stream ends, and that is the
//! transport layer's signal to tear the connection down.
//!
//! Sessions never touch the roster or the game directly: every mutation is
//! routed through the hub's event queue.

use crate::hub::HubHandle;
use shared::{Command, StateSnapshot};
use tokio::sync::mpsc;

pub struct PlayerSession {
    id: u32,
    snapshots: mpsc::Receiver<StateSnapshot>,
    hub: HubHandle,
}

impl PlayerSession {
    pub(crate) fn new(id: u32, snapshots: mpsc::Receiver<StateSnapshot>, hub: HubHandle) -> Self {
        Self { id, snapshots, hub }
    }

    /// Stable identity of this session for its whole lifetime. Identities
    /// are never reused; a removed session cannot rejoin.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The next snapshot from the hub, or `None` once the hub has closed
    /// this session's mailbox.
    pub async fn next_snapshot(&mut self) -> Option<StateSnapshot> {
        self.snapshots.recv().await
    }

    /// Relays a player command to the hub. Fire-and-forget: illegal or
    /// stale commands are absorbed by the game as no-ops.
    pub fn submit(&self, command: Command) {
        self.hub.submit(self.id, command);
    }

    /// Requests removal of this session. Idempotent; safe to call after
    /// the hub has already ejected the session.
    pub fn unregister(&self) {
        self.hub.unregister(self.id);
    }

    /// Splits the session for the transport's two tasks: the outbound pump
    /// takes the snapshot stream, the inbound relay keeps id and hub access.
    pub fn into_parts(self) -> (u32, mpsc::Receiver<StateSnapshot>, HubHandle) {
        (self.id, self.snapshots, self.hub)
    }
}
