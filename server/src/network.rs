//! Server network layer handling TCP sessions and operator fan-out

use crate::client_manager::{
    Client, ClientManager, SessionError, SessionState, SessionSummary,
};
use crate::config::ServerConfig;
use crate::game::{CommandOutcome, SpawnRejected, WorldCommand};
use crate::spawn::IceTarget;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{EnemyKind, FruitKind, InboundMessage, RECV_BUFFER_SIZE};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinSet;

/// Startup failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },
}

/// Tally of one command fanned out to every live session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions the command was attempted on.
    pub sessions: usize,
    pub placed: usize,
    pub gated: usize,
    pub full: usize,
    /// Slots freed by clear commands, summed over sessions.
    pub cleared: usize,
    /// Sessions skipped or dropped because of a session error.
    pub failed: usize,
}

impl BroadcastReport {
    fn record(&mut self, outcome: CommandOutcome) {
        match outcome {
            CommandOutcome::Placed(_) => self.placed += 1,
            CommandOutcome::Rejected(SpawnRejected::PhaseGated) => self.gated += 1,
            CommandOutcome::Rejected(SpawnRejected::PoolFull { .. }) => self.full += 1,
            CommandOutcome::Cleared(count) => self.cleared += count,
        }
    }
}

/// Cloneable access to the running server's sessions.
///
/// Used by the accept loop, by every receive loop, by the operator console
/// and by tests that drive sessions over in-memory streams.
#[derive(Clone)]
pub struct ServerHandle {
    clients: Arc<RwLock<ClientManager>>,
    send_timeout: Duration,
    rng_seed: Option<u64>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl ServerHandle {
    pub fn new(config: &ServerConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            send_timeout: config.send_timeout,
            rng_seed: config.rng_seed,
            shutdown: Arc::new(shutdown),
        }
    }

    fn session_rng(&self, client_id: u32) -> StdRng {
        match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(u64::from(client_id))),
            None => StdRng::from_entropy(),
        }
    }

    /// Admits a new connection.
    ///
    /// Claims a registry slot, initializes the session, sends its first
    /// frame and starts its receive loop. Returns the session id, or `None`
    /// if the registry is full or the first frame could not be delivered;
    /// either way the connection is closed.
    pub async fn connect<R, W>(&self, reader: R, writer: W, addr: SocketAddr) -> Option<u32>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (claimed, capacity) = {
            let mut clients = self.clients.write().await;
            let claimed = clients.claim_slot(addr, |id| {
                SessionState::new(Box::new(writer), self.session_rng(id))
            });
            (claimed, clients.capacity())
        };

        let client = match claimed {
            Some(client) => client,
            None => {
                warn!(
                    "Server full ({} clients), closing connection from {}",
                    capacity, addr
                );
                return None;
            }
        };

        let sent = {
            let mut state = client.state.lock().await;
            state.initialize();
            state.send_snapshot(self.send_timeout).await
        };
        let connected = self.connected_count().await;
        info!(
            "Client {} connected from {} ({} connected)",
            client.id, addr, connected
        );

        if let Err(e) = sent {
            warn!("Failed to send initial frame to client {}: {}", client.id, e);
            self.disconnect(client.id).await;
            return None;
        }

        let client_id = client.id;
        tokio::spawn(self.clone().receive_loop(client, reader));
        Some(client_id)
    }

    async fn receive_loop<R>(self, client: Arc<Client>, mut reader: R)
    where
        R: AsyncRead + Unpin,
    {
        let mut shutdown = self.shutdown.subscribe();
        let mut buffer = vec![0u8; RECV_BUFFER_SIZE];

        while !stop_requested(&shutdown) {
            tokio::select! {
                read = reader.read(&mut buffer) => match read {
                    Ok(0) => {
                        debug!("Client {} closed the connection", client.id);
                        break;
                    }
                    Ok(len) => self.handle_inbound(&client, &buffer[..len]).await,
                    Err(e) => {
                        warn!("Receive error from client {}: {}", client.id, e);
                        break;
                    }
                },
                _ = client.kicked.notified() => break,
                _ = shutdown.changed() => break,
            }
        }

        self.disconnect(client.id).await;
    }

    async fn handle_inbound(&self, client: &Client, bytes: &[u8]) {
        let message = InboundMessage::decode(bytes);

        let token = match &message {
            InboundMessage::RawControlToken(token) => Some(*token),
            InboundMessage::StructuredClientMessage {
                client_id,
                content,
                token,
            } => {
                debug!(
                    "Client {} sent a structured message as {}: {}",
                    client.id, client_id, content
                );
                if token.is_none() {
                    info!("Message from client {}: {}", client.id, content);
                }
                *token
            }
            InboundMessage::Unrecognized(text) => {
                info!("Message from client {}: {}", client.id, text);
                None
            }
        };

        if let Some(token) = token {
            let mut state = client.state.lock().await;
            state.apply_token(token);
            if state.phase.is_bonus() {
                info!("Client {} entered bonus phase", client.id);
            } else {
                info!("Client {} left bonus phase", client.id);
            }
        }
    }

    /// Closes a session and frees its slot.
    ///
    /// Safe to call from any task; only the first call for a session has an
    /// effect. Returns whether this call closed it.
    pub async fn disconnect(&self, client_id: u32) -> bool {
        let client = match self.clients.read().await.get(client_id) {
            Some(client) => client,
            None => return false,
        };

        let closed = client.state.lock().await.close().await;
        if !closed {
            return false;
        }
        client.kicked.notify_one();

        let remaining = {
            let mut clients = self.clients.write().await;
            clients.release(client_id);
            clients.len()
        };
        info!(
            "Client {} disconnected ({} connected)",
            client_id, remaining
        );
        true
    }

    /// Closes every live session
    ///
    /// Called once the accept loop has stopped. Sessions whose receive loop
    /// is already tearing down are skipped by [`ServerHandle::disconnect`].
    pub async fn disconnect_all(&self) {
        let clients = self.clients.read().await.active();
        for client in clients {
            self.disconnect(client.id).await;
        }
    }

    /// Runs one command on one session and sends it the resulting frame.
    pub async fn execute_for_client(
        &self,
        client_id: u32,
        command: WorldCommand,
    ) -> Result<CommandOutcome, SessionError> {
        let client = self
            .clients
            .read()
            .await
            .get(client_id)
            .ok_or(SessionError::UnknownSession(client_id))?;
        self.execute_on(&client, command).await
    }

    async fn execute_on(
        &self,
        client: &Client,
        command: WorldCommand,
    ) -> Result<CommandOutcome, SessionError> {
        let result = {
            let mut state = client.state.lock().await;
            if !state.is_initialized() {
                return Err(SessionError::NotInitialized(client.id));
            }
            let outcome = state.execute(command);
            // Rejected spawns still produce a frame.
            state
                .send_snapshot(self.send_timeout)
                .await
                .map(|()| outcome)
        };

        if let Err(e) = &result {
            if e.is_transport() {
                warn!("Dropping client {}: {}", client.id, e);
                self.disconnect(client.id).await;
            }
        }
        result
    }

    /// Runs `command` on every live session concurrently
    ///
    /// Each session runs in its own task under its own lock, so a slow
    /// client only delays itself; its send is still bounded by the send
    /// timeout. Sessions that are not initialized are skipped, and a
    /// session whose frame cannot be delivered is disconnected. Both are
    /// counted in [`BroadcastReport::failed`].
    pub async fn execute_for_all_clients(&self, command: WorldCommand) -> BroadcastReport {
        let clients = self.clients.read().await.active();
        let mut report = BroadcastReport {
            sessions: clients.len(),
            ..BroadcastReport::default()
        };

        let mut tasks = JoinSet::new();
        for client in clients {
            let handle = self.clone();
            tasks.spawn(async move { handle.execute_on(&client, command).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcome)) => report.record(outcome),
                Ok(Err(e)) => {
                    debug!("Broadcast skipped a session: {}", e);
                    report.failed += 1;
                }
                Err(e) => {
                    error!("Broadcast task failed: {}", e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Spawns one enemy in every live session
    ///
    /// Logs how many sessions received it and how many were skipped
    /// because of their phase or a full pool.
    pub async fn spawn_enemy_for_all_clients(
        &self,
        kind: EnemyKind,
        ice: IceTarget,
    ) -> BroadcastReport {
        let report = self
            .execute_for_all_clients(WorldCommand::SpawnEnemy { kind, ice })
            .await;
        info!("{} enemy spawned for {} clients", kind.name(), report.placed);
        log_rejections(&report);
        report
    }

    pub async fn spawn_fruit_for_all_clients(&self, kind: FruitKind) -> BroadcastReport {
        let report = self
            .execute_for_all_clients(WorldCommand::SpawnFruit(kind))
            .await;
        info!(
            "{} fruit ({} points) spawned for {} clients",
            kind.name(),
            kind.points(),
            report.placed
        );
        log_rejections(&report);
        report
    }

    /// Empties the enemy pool of every live session.
    pub async fn clear_all_enemies(&self) -> BroadcastReport {
        let report = self
            .execute_for_all_clients(WorldCommand::ClearEnemies)
            .await;
        info!(
            "Enemies cleared for {} clients ({} removed)",
            report.sessions - report.failed,
            report.cleared
        );
        report
    }

    pub async fn clear_all_fruits(&self) -> BroadcastReport {
        let report = self.execute_for_all_clients(WorldCommand::ClearFruits).await;
        info!(
            "Fruits cleared for {} clients ({} removed)",
            report.sessions - report.failed,
            report.cleared
        );
        report
    }

    /// Fans `command` out through the matching logged broadcast.
    pub async fn dispatch(&self, command: WorldCommand) -> BroadcastReport {
        match command {
            WorldCommand::SpawnEnemy { kind, ice } => {
                self.spawn_enemy_for_all_clients(kind, ice).await
            }
            WorldCommand::SpawnFruit(kind) => self.spawn_fruit_for_all_clients(kind).await,
            WorldCommand::ClearEnemies => self.clear_all_enemies().await,
            WorldCommand::ClearFruits => self.clear_all_fruits().await,
        }
    }

    /// Summaries of every live session, in slot order
    ///
    /// Each session is locked briefly in turn, so the list is not a single
    /// atomic view when commands are running at the same time.
    pub async fn sessions(&self) -> Vec<SessionSummary> {
        let clients = self.clients.read().await.active();
        let mut summaries = Vec::with_capacity(clients.len());
        for client in clients {
            summaries.push(client.summary().await);
        }
        summaries
    }

    /// Summary of one session, or `None` if the id is not registered.
    pub async fn session(&self, client_id: u32) -> Option<SessionSummary> {
        let client = self.clients.read().await.get(client_id)?;
        Some(client.summary().await)
    }

    /// Number of occupied registry slots.
    pub async fn connected_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Signals the accept loop and every receive loop to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

fn stop_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

fn log_rejections(report: &BroadcastReport) {
    if report.gated > 0 {
        warn!("Skipped {} clients outside the matching phase", report.gated);
    }
    if report.full > 0 {
        warn!("Skipped {} clients with no free slot", report.full);
    }
}

/// TCP listener plus the accept loop
pub struct Server {
    listener: TcpListener,
    handle: ServerHandle,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;
        info!("Server listening on {}", config.bind_addr);

        Ok(Server {
            listener,
            handle: ServerHandle::new(&config),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Accepts connections until shutdown, then closes every session.
    pub async fn run(self) {
        let mut shutdown = self.handle.shutdown.subscribe();

        while !stop_requested(&shutdown) {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let (reader, writer) = stream.into_split();
                        let handle = self.handle.clone();
                        tokio::spawn(async move {
                            handle.connect(reader, writer, addr).await;
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
                _ = shutdown.changed() => break,
            }
        }

        info!("Server shutting down");
        self.handle.disconnect_all().await;
    }
}
