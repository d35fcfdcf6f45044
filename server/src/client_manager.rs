//! Session registry and per-session state for the game server
//!
//! This module owns everything the server knows about a connected player:
//! - The fixed-capacity registry that hands out slots and session ids
//! - Each session's lock-guarded state (game world, bonus phase, random source, writer)
//! - Snapshot delivery with the outbox drain that follows a successful send
//! - The one-way lifecycle `Connecting -> Initialized -> Disconnected`
//!
//! Locking is two-level. The registry lock is only held to claim, release
//! or look up a slot. All work on one session, including its socket writes,
//! happens under that session's own mutex, so a bonus toggle, a spawn and
//! the frame that reports it can never interleave.

use crate::game::{BonusPhase, CommandOutcome, GameState, WorldCommand};
use log::debug;
use rand::rngs::StdRng;
use shared::ControlToken;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, Notify};

/// Write half of a session's connection.
pub type FrameWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Failures of a single-session operation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no session with id {0}")]
    UnknownSession(u32),
    #[error("session {0} is not initialized")]
    NotInitialized(u32),
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] bincode::Error),
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("send did not complete within {0:?}")]
    SendTimeout(Duration),
}

impl SessionError {
    /// Whether the error leaves the connection unusable.
    pub fn is_transport(&self) -> bool {
        matches!(self, SessionError::Io(_) | SessionError::SendTimeout(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Connecting,
    Initialized,
    Disconnected,
}

/// Everything guarded by a session's mutex.
pub struct SessionState {
    pub status: SessionStatus,
    pub game: GameState,
    pub phase: BonusPhase,
    rng: StdRng,
    writer: FrameWriter,
}

impl SessionState {
    pub fn new(writer: FrameWriter, rng: StdRng) -> Self {
        Self {
            status: SessionStatus::Connecting,
            game: GameState::new(),
            phase: BonusPhase::default(),
            rng,
            writer,
        }
    }

    /// Resets the world and phase and marks the session live.
    pub fn initialize(&mut self) {
        self.game.initialize();
        self.phase = BonusPhase::default();
        self.status = SessionStatus::Initialized;
    }

    pub fn is_initialized(&self) -> bool {
        self.status == SessionStatus::Initialized
    }

    pub fn apply_token(&mut self, token: ControlToken) {
        self.phase.apply(token);
    }

    pub fn execute(&mut self, command: WorldCommand) -> CommandOutcome {
        self.game.apply(command, self.phase, &mut self.rng)
    }

    /// Writes the current snapshot as one frame, then drains the outbox.
    ///
    /// The outbox is left intact if the write fails or times out.
    pub async fn send_snapshot(&mut self, timeout: Duration) -> Result<(), SessionError> {
        let frame = self.game.snapshot().encode()?;
        let writer = &mut self.writer;
        let write = async move {
            writer.write_all(&frame).await?;
            writer.flush().await
        };

        match tokio::time::timeout(timeout, write).await {
            Ok(Ok(())) => {
                self.game.drain_outbox();
                Ok(())
            }
            Ok(Err(e)) => Err(SessionError::Io(e)),
            Err(_) => Err(SessionError::SendTimeout(timeout)),
        }
    }

    /// Moves the session to `Disconnected` and shuts the writer down.
    ///
    /// Returns false if the session was already disconnected.
    pub async fn close(&mut self) -> bool {
        if self.status == SessionStatus::Disconnected {
            return false;
        }
        self.status = SessionStatus::Disconnected;
        // Peer may already be gone.
        if let Err(e) = self.writer.shutdown().await {
            debug!("Writer shutdown failed while closing session: {}", e);
        }
        true
    }
}

/// A connected player.
pub struct Client {
    pub id: u32,
    pub addr: SocketAddr,
    /// Registry slot index.
    pub slot: usize,
    pub state: Mutex<SessionState>,
    /// Wakes the receive loop when the session is closed from elsewhere.
    pub kicked: Notify,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, slot: usize, state: SessionState) -> Self {
        Self {
            id,
            addr,
            slot,
            state: Mutex::new(state),
            kicked: Notify::new(),
        }
    }

    pub async fn summary(&self) -> SessionSummary {
        let state = self.state.lock().await;
        SessionSummary {
            id: self.id,
            addr: self.addr,
            status: state.status,
            phase: state.phase,
            enemies: state.game.enemies.active_count(),
            fruits: state.game.fruits.active_count(),
        }
    }
}

/// Point-in-time view of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: u32,
    pub addr: SocketAddr,
    pub status: SessionStatus,
    pub phase: BonusPhase,
    /// Entities placed but not yet delivered.
    pub enemies: usize,
    pub fruits: usize,
}

/// Fixed-capacity session registry
///
/// Slots are scanned linearly and the first free one is reused. Session
/// ids start at 1, grow monotonically and are never handed out twice, so a
/// reconnecting player always gets a fresh identity.
pub struct ClientManager {
    slots: Vec<Option<Arc<Client>>>,
    next_client_id: u32,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            slots: vec![None; max_clients],
            next_client_id: 1,
        }
    }

    /// Claims the first free slot for a new session.
    ///
    /// `make_state` receives the new session id. Returns `None` without
    /// calling it when every slot is taken.
    pub fn claim_slot<F>(&mut self, addr: SocketAddr, make_state: F) -> Option<Arc<Client>>
    where
        F: FnOnce(u32) -> SessionState,
    {
        let slot = self.slots.iter().position(Option::is_none)?;

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let client = Arc::new(Client::new(client_id, addr, slot, make_state(client_id)));
        self.slots[slot] = Some(Arc::clone(&client));
        Some(client)
    }

    /// Frees the slot held by `client_id`.
    pub fn release(&mut self, client_id: u32) -> Option<Arc<Client>> {
        self.slots
            .iter_mut()
            .find(|slot| matches!(slot, Some(client) if client.id == client_id))
            .and_then(Option::take)
    }

    pub fn get(&self, client_id: u32) -> Option<Arc<Client>> {
        self.slots
            .iter()
            .flatten()
            .find(|client| client.id == client_id)
            .cloned()
    }

    /// Every occupied slot, in registry order.
    pub fn active(&self) -> Vec<Arc<Client>> {
        self.slots.iter().flatten().cloned().collect()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
