//! The session coordinator: a single actor task that owns the roster and the
//! game state.
//!
//! Every mutation — registration, unregistration, player actions, game
//! start/stop — arrives as a [`HubEvent`] on one queue and is applied by the
//! hub's control loop, one event at a time. Arrival order at that queue is
//! the total order of all game mutations, so no locking is needed anywhere
//! in the core.
//!
//! Broadcasts are bounded: delivering a snapshot into a session's mailbox
//! races a fixed timeout, and a session that stalls past it is ejected
//! exactly as if it had unregistered. Slow consumers can therefore never
//! stall the loop or each other.

use crate::game::{GameState, Player};
use crate::session::PlayerSession;
use log::{debug, info, warn};
use shared::{Command, GameConfig, StateSnapshot};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Bound on mailbox delivery during a broadcast.
pub const SEND_STATE_TIMEOUT: Duration = Duration::from_secs(2);

/// Mailbox depth per session. Kept at one so a broadcast is a near-direct
/// handoff to the outbound pump and a stalled pump is detected quickly.
const MAILBOX_CAPACITY: usize = 1;

/// Events consumed by the hub's control loop.
pub enum HubEvent {
    Register {
        id: u32,
        name: String,
        color: String,
        mailbox: mpsc::Sender<StateSnapshot>,
    },
    Unregister {
        id: u32,
    },
    Action {
        id: u32,
        command: Command,
    },
    Start(GameConfig),
    Stop,
}

/// Cloneable handle for submitting events to the hub from transport tasks.
#[derive(Clone)]
pub struct HubHandle {
    events: mpsc::UnboundedSender<HubEvent>,
    next_id: Arc<AtomicU32>,
}

impl HubHandle {
    /// Creates a session and submits its registration.
    ///
    /// The returned session owns the snapshot mailbox. If the hub is
    /// currently playing, registration is rejected by closing that mailbox;
    /// the session observes this as an immediate end of its snapshot stream.
    pub fn register(&self, name: String, color: String) -> PlayerSession {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (mailbox, snapshots) = mpsc::channel(MAILBOX_CAPACITY);

        self.send(HubEvent::Register {
            id,
            name,
            color,
            mailbox,
        });
        PlayerSession::new(id, snapshots, self.clone())
    }

    pub fn unregister(&self, id: u32) {
        self.send(HubEvent::Unregister { id });
    }

    pub fn submit(&self, id: u32, command: Command) {
        self.send(HubEvent::Action { id, command });
    }

    pub fn start(&self, config: GameConfig) {
        self.send(HubEvent::Start(config));
    }

    pub fn stop(&self) {
        self.send(HubEvent::Stop);
    }

    fn send(&self, event: HubEvent) {
        // A send failure means the hub task is gone; callers observe that
        // through their closed mailboxes, nothing to surface here.
        let _ = self.events.send(event);
    }
}

/// The coordinator itself. Construct with [`Hub::new`], then drive it with
/// [`Hub::run`] on its own task; all interaction goes through the handle.
pub struct Hub {
    events: mpsc::UnboundedReceiver<HubEvent>,
    roster: HashMap<u32, mpsc::Sender<StateSnapshot>>,
    game: GameState,
    playing: bool,
    send_timeout: Duration,
}

impl Hub {
    pub fn new() -> (Hub, HubHandle) {
        Self::with_game(GameState::new(), SEND_STATE_TIMEOUT)
    }

    /// Hub over a caller-supplied game state and broadcast timeout, for
    /// reproducible tests.
    pub fn with_game(game: GameState, send_timeout: Duration) -> (Hub, HubHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let hub = Hub {
            events: events_rx,
            roster: HashMap::new(),
            game,
            playing: false,
            send_timeout,
        };
        let handle = HubHandle {
            events: events_tx,
            next_id: Arc::new(AtomicU32::new(1)),
        };
        (hub, handle)
    }

    /// Consumes events until every handle is dropped.
    pub async fn run(mut self) {
        info!("hub: control loop running");
        while let Some(event) = self.events.recv().await {
            match event {
                HubEvent::Register {
                    id,
                    name,
                    color,
                    mailbox,
                } => self.handle_register(id, name, color, mailbox),
                HubEvent::Unregister { id } => self.handle_unregister(id),
                HubEvent::Action { id, command } => self.handle_action(id, command).await,
                HubEvent::Start(config) => self.handle_start(config).await,
                HubEvent::Stop => self.handle_stop(),
            }
        }
        info!("hub: control loop stopped");
    }

    fn handle_register(
        &mut self,
        id: u32,
        name: String,
        color: String,
        mailbox: mpsc::Sender<StateSnapshot>,
    ) {
        if self.playing {
            // Dropping the mailbox closes the session's snapshot stream;
            // that is the only rejection the outside world observes.
            info!("hub: rejecting registration of {} while playing", id);
            return;
        }
        info!("hub: registered player {} ({})", id, name);
        self.roster.insert(id, mailbox);
        self.game.add_player(id, Player::new(name, color));
    }

    fn handle_unregister(&mut self, id: u32) {
        if self.roster.remove(&id).is_none() {
            return;
        }
        self.game.remove_player(id);
        info!("hub: unregistered player {}", id);

        if self.roster.is_empty() && self.playing {
            info!("hub: roster empty, game over");
            self.playing = false;
            self.game.clear();
        }
    }

    async fn handle_action(&mut self, id: u32, command: Command) {
        if !self.playing {
            debug!("hub: discarding action from {} while idle", id);
            return;
        }
        debug!("hub: player {} issued {:?}", id, command);
        self.game.evaluate(id, command);
        self.broadcast().await;
    }

    async fn handle_start(&mut self, config: GameConfig) {
        if self.playing {
            debug!("hub: ignoring start, game already in progress");
            return;
        }
        info!("hub: starting game");
        self.playing = true;
        self.game.configure(&config);
        self.broadcast().await;
    }

    fn handle_stop(&mut self) {
        if !self.playing {
            debug!("hub: ignoring stop, no game in progress");
            return;
        }
        info!("hub: stopping game");
        self.playing = false;
        for (id, _mailbox) in self.roster.drain() {
            self.game.remove_player(id);
        }
        self.game.clear();
    }

    /// Sends each registered player a fresh projection of the game. A
    /// session whose mailbox cannot take the snapshot within the bound is
    /// ejected, exactly as if it had unregistered.
    async fn broadcast(&mut self) {
        let mut ejected: Vec<u32> = Vec::new();

        for (id, mailbox) in &self.roster {
            let snapshot = match self.game.project(*id) {
                Some(snapshot) => snapshot,
                None => continue,
            };
            match timeout(self.send_timeout, mailbox.send(snapshot)).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    warn!("hub: player {} mailbox closed, ejecting", id);
                    ejected.push(*id);
                }
                Err(_) => {
                    warn!(
                        "hub: player {} stalled past {:?}, ejecting",
                        id, self.send_timeout
                    );
                    ejected.push(*id);
                }
            }
        }

        for id in ejected {
            self.handle_unregister(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Cell;

    fn open_config() -> GameConfig {
        GameConfig {
            rows: 5,
            cols: 5,
            wall_roots: 0,
            wall_building_prob: 0.0,
            pov_radius: 10,
        }
    }

    fn spawn_hub(send_timeout: Duration) -> HubHandle {
        let (hub, handle) = Hub::with_game(GameState::seeded(9), send_timeout);
        tokio::spawn(hub.run());
        handle
    }

    async fn expect_no_snapshot(session: &mut PlayerSession) {
        let result = timeout(Duration::from_millis(100), session.next_snapshot()).await;
        assert!(result.is_err(), "unexpected snapshot while idle");
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let handle = spawn_hub(SEND_STATE_TIMEOUT);
        let a = handle.register("a".to_string(), "red".to_string());
        let b = handle.register("b".to_string(), "blue".to_string());
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_start_broadcasts_initial_snapshot() {
        let handle = spawn_hub(SEND_STATE_TIMEOUT);
        let mut a = handle.register("a".to_string(), "red".to_string());
        let mut b = handle.register("b".to_string(), "blue".to_string());

        handle.start(open_config());

        for session in [&mut a, &mut b] {
            let snapshot = session.next_snapshot().await.expect("initial snapshot");
            assert_eq!(snapshot.grid.cells.len(), 25);
            // Radius 10 exceeds the 5x5 diagonal: everything is visible.
            assert!(snapshot.grid.cells.iter().all(|c| *c != Cell::Unknown));
            assert_eq!(snapshot.enemies.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_action_applies_and_broadcasts() {
        let handle = spawn_hub(SEND_STATE_TIMEOUT);
        let mut a = handle.register("a".to_string(), "red".to_string());

        handle.start(open_config());
        let first = a.next_snapshot().await.expect("initial snapshot");

        a.submit(Command::TurnRight);
        let second = a.next_snapshot().await.expect("post-action snapshot");
        assert_eq!(second.player.direction, first.player.direction.turned_right());
        assert_eq!(second.player.position, first.player.position);
    }

    #[tokio::test]
    async fn test_actions_while_idle_are_discarded() {
        let handle = spawn_hub(SEND_STATE_TIMEOUT);
        let mut a = handle.register("a".to_string(), "red".to_string());

        a.submit(Command::Attack);
        expect_no_snapshot(&mut a).await;
    }

    #[tokio::test]
    async fn test_registration_rejected_while_playing() {
        let handle = spawn_hub(SEND_STATE_TIMEOUT);
        let mut a = handle.register("a".to_string(), "red".to_string());
        handle.start(open_config());
        assert!(a.next_snapshot().await.is_some());

        let mut late = handle.register("late".to_string(), "gray".to_string());
        assert!(late.next_snapshot().await.is_none(), "mailbox should be closed");

        // The rejected player never became an enemy of the live one.
        a.submit(Command::TurnLeft);
        let snapshot = a.next_snapshot().await.expect("snapshot");
        assert!(snapshot.enemies.is_empty());
    }

    #[tokio::test]
    async fn test_stop_closes_every_mailbox_and_is_idempotent() {
        let handle = spawn_hub(SEND_STATE_TIMEOUT);
        let mut sessions: Vec<PlayerSession> = (0..3)
            .map(|i| handle.register(format!("p{}", i), "red".to_string()))
            .collect();

        handle.start(open_config());
        for session in &mut sessions {
            assert!(session.next_snapshot().await.is_some());
        }

        handle.stop();
        handle.stop(); // no-op
        for session in &mut sessions {
            assert!(session.next_snapshot().await.is_none());
        }

        // The hub is idle again: a fresh registration and start succeed.
        let mut fresh = handle.register("fresh".to_string(), "teal".to_string());
        handle.start(open_config());
        let snapshot = fresh.next_snapshot().await.expect("snapshot after restart");
        assert!(snapshot.enemies.is_empty());
    }

    #[tokio::test]
    async fn test_unregistering_last_player_returns_hub_to_idle() {
        let handle = spawn_hub(SEND_STATE_TIMEOUT);
        let mut a = handle.register("a".to_string(), "red".to_string());
        handle.start(open_config());
        assert!(a.next_snapshot().await.is_some());

        a.unregister();
        assert!(a.next_snapshot().await.is_none());

        // No explicit stop was sent, yet registration works again.
        let mut b = handle.register("b".to_string(), "blue".to_string());
        handle.start(open_config());
        assert!(b.next_snapshot().await.is_some());
    }

    #[tokio::test]
    async fn test_stalled_consumer_is_ejected() {
        let handle = spawn_hub(Duration::from_millis(50));
        let mut a = handle.register("a".to_string(), "red".to_string());
        let mut stalled = handle.register("b".to_string(), "blue".to_string());

        handle.start(open_config());
        let first = a.next_snapshot().await.expect("initial snapshot");
        assert_eq!(first.enemies.len(), 1);
        // `stalled` never drains its mailbox, which now holds one snapshot.

        // The next broadcast cannot hand over within the bound: ejection.
        a.submit(Command::TurnRight);
        let second = a.next_snapshot().await.expect("post-action snapshot");
        assert_eq!(second.player.direction, first.player.direction.turned_right());

        assert!(stalled.next_snapshot().await.is_some(), "the queued snapshot");
        assert!(stalled.next_snapshot().await.is_none(), "then a closed mailbox");

        // The ejected player is gone from the game as well.
        a.submit(Command::TurnLeft);
        let third = a.next_snapshot().await.expect("snapshot");
        assert!(third.enemies.is_empty());
    }
}
