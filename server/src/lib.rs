//! # Grid Combat Game Server
//!
//! Authoritative server core for a real-time, multi-session grid combat
//! game. Players connect over websockets, issue movement/turn/attack
//! commands, and receive visibility-limited snapshots of the shared arena
//! after every state-changing event.
//!
//! ## Architecture
//!
//! ### Single serialized control loop
//! All mutable shared state — the roster of connected players and the game
//! itself — is owned by one actor task, the hub. Registration,
//! unregistration, player actions and game start/stop all arrive as events
//! on a single queue and are applied one at a time, so the core needs no
//! locks and no two actions are ever applied concurrently. Every broadcast
//! reflects a fully consistent post-mutation state.
//!
//! ### Bounded fan-out
//! Snapshots are delivered into per-session mailboxes with a fixed timeout.
//! A session that cannot keep up is ejected — removed from the roster and
//! the game, its mailbox closed — rather than allowed to stall the loop.
//! Back-pressure is resolved by ejection, never by blocking the broadcast.
//!
//! ### Per-connection tasks
//! Each websocket runs two tasks: an inbound relay that forwards decoded
//! commands to the hub and unregisters the session on any read failure, and
//! an outbound pump that drains the snapshot mailbox and keeps the
//! connection alive with periodic pings.
//!
//! ## Module organization
//!
//! - [`game`] — grid generation, action legality, point-of-view projection.
//!   Pure state and algorithms, no I/O.
//! - [`hub`] — the coordinator actor, its event queue and broadcast policy.
//! - [`session`] — the per-connection handle linking a transport connection
//!   to the hub.
//! - [`network`] — websocket endpoints, keepalive and the admin control
//!   plane. Replaceable glue around the core.
//!
//! ## Error philosophy
//!
//! Illegal or stale input is absorbed as a silent no-op: moves into walls,
//! attacks from removed players, duplicate start requests and undecodable
//! frames all leave the game untouched. The only externally observable
//! rejection is a closed connection.

pub mod game;
pub mod hub;
pub mod network;
pub mod session;
