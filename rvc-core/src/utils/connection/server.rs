//! WebSocket Server Module
//!
//! This module defines the operator-facing server implementation using the
//! `picoserve` framework. It manages incoming WebSocket sessions, translates
//! controller input ticks into drive commands, forwards them to the command
//! path, relays vehicle status, and exposes the health/status HTTP endpoints.

use alloc::{string::String, vec::Vec};

use embassy_futures::select::{select, Either};
use embassy_net::Stack;
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, mutex::Mutex};
use embassy_time::Duration;
use embedded_io_async::Read;
use hashbrown::HashMap;
use lazy_static::lazy_static;
use picoserve::{
    extract::FromRequest,
    io::embedded_io_async as embedded_aio,
    request::{RequestBody, RequestParts},
    response::{
        ws::{Message, ReadMessageError, SocketRx, SocketTx, WebSocketCallback, WebSocketUpgrade},
        Json,
    },
    url_encoded::deserialize_form,
    Router,
};
use serde::{Deserialize, Serialize};

use crate::utils::controllers::{
    drive::{self, CommandEnvelope, DRIVE_CHANNEL, STATUS_BUS},
    translator::{CommandTranslator, DriveCommand, DriveLabel, MotorStates},
    SystemCommand,
};

pub struct ServerTimer;

/// One upgraded operator connection, tied to its session id.
pub struct WebSocket {
    session: String,
}

#[derive(Clone, Debug)]
pub struct SessionState {
    pub last_seen: u64,
}
pub struct SessionManager;

lazy_static! {
    pub static ref SESSION_STORE: Mutex<CriticalSectionRawMutex, HashMap<String, SessionState>> =
        Mutex::new(HashMap::new());
}

/// Feedback echoed to the originating session after each command.
#[derive(Debug, Serialize, Deserialize)]
pub struct MotorFeedback {
    pub command: DriveLabel,
    pub motors: MotorStates,
    pub timestamp: u64,
}

#[derive(Serialize)]
struct HealthReport {
    status: &'static str,
    link: bool,
    timestamp: u64,
}

#[derive(Serialize)]
struct ServerStatus {
    server: &'static str,
    link: bool,
    sessions: usize,
    command: Option<CommandEnvelope>,
}

#[derive(Serialize)]
struct EstopAck {
    success: bool,
    message: &'static str,
}

/// Manages timeouts for the WebSocket server.
#[allow(unused_qualifications)]
impl picoserve::Timer for ServerTimer {
    type Duration = embassy_time::Duration;
    type TimeoutError = embassy_time::TimeoutError;

    /// Runs a future with a timeout.
    async fn run_with_timeout<F: core::future::Future>(
        &mut self,
        duration: Self::Duration,
        future: F,
    ) -> Result<F::Output, Self::TimeoutError> {
        embassy_time::with_timeout(duration, future).await
    }
}

/// Forward a translated command to the command path and echo motor feedback
/// on the originating session socket.
async fn forward_command<Writer>(
    command: DriveCommand,
    tx: &mut SocketTx<Writer>,
) -> Result<(), Writer::Error>
where
    Writer: embedded_aio::Write,
{
    let envelope = CommandEnvelope::new(command, embassy_time::Instant::now().as_millis());
    DRIVE_CHANNEL.send(envelope).await;

    let feedback = MotorFeedback {
        command: envelope.command,
        motors: envelope.motors,
        timestamp: envelope.timestamp,
    };
    match serde_json::to_string(&feedback) {
        Ok(payload) => tx.send_text(&payload).await,
        Err(error) => {
            tracing::error!(?error, "error serializing motor feedback");
            tx.send_text("Command received and forwarded").await
        }
    }
}

/// Handles incoming WebSocket connections.
impl WebSocketCallback for WebSocket {
    async fn run<Reader, Writer>(
        self,
        mut rx: SocketRx<Reader>,
        mut tx: SocketTx<Writer>,
    ) -> Result<(), Writer::Error>
    where
        Reader: embedded_aio::Read,
        Writer: embedded_aio::Write<Error = Reader::Error>,
    {
        let mut buffer = [0; 2048];
        let mut translator = CommandTranslator::new();
        let mut status_rx = STATUS_BUS.subscriber().ok();
        if status_rx.is_none() {
            tracing::warn!(
                session = %self.session,
                "subscriber limit reached, vehicle status relay disabled"
            );
        }

        tx.send_text("Connected").await?;

        let close_reason = loop {
            let incoming = match status_rx.as_mut() {
                Some(sub) => {
                    match select(rx.next_message(&mut buffer), sub.next_message_pure()).await {
                        Either::First(message) => message,
                        Either::Second(status) => {
                            match serde_json::to_string(&status) {
                                Ok(payload) => tx.send_text(&payload).await?,
                                Err(error) => {
                                    tracing::error!(?error, "error serializing status relay")
                                }
                            }
                            continue;
                        }
                    }
                }
                None => rx.next_message(&mut buffer).await,
            };

            match incoming {
                Ok(Message::Pong(_)) => continue,
                Ok(Message::Ping(data)) => tx.send_pong(data).await?,
                Ok(Message::Close(reason)) => {
                    tracing::info!(?reason, "websocket closed");
                    break None;
                }
                Ok(Message::Text(data)) => match serde_json::from_str::<SystemCommand>(data) {
                    Ok(command) => self.handle_command(command, &mut translator, &mut tx).await?,
                    Err(error) => {
                        tracing::error!(?error, "error deserializing SystemCommand");
                        tx.send_text("Invalid command format").await?
                    }
                },
                Ok(Message::Binary(data)) => match serde_json::from_slice::<SystemCommand>(data) {
                    Ok(command) => self.handle_command(command, &mut translator, &mut tx).await?,
                    Err(error) => {
                        tracing::error!(?error, "error deserializing incoming message");
                        tx.send_binary(b"Invalid command format").await?
                    }
                },
                Err(error) => {
                    tracing::error!(?error, "websocket error");
                    let code = match error {
                        ReadMessageError::TextIsNotUtf8 => 1007,
                        ReadMessageError::ReservedOpcode(_) => 1003,
                        ReadMessageError::ReadFrameError(_)
                        | ReadMessageError::UnexpectedMessageStart
                        | ReadMessageError::MessageStartsWithContinuation => 1002,
                        ReadMessageError::Io(err) => return Err(err),
                    };
                    break Some((code, "Websocket Error"));
                }
            };
        };

        SessionManager::remove_session(&self.session).await;
        tx.close(close_reason).await
    }
}

impl WebSocket {
    async fn handle_command<Writer>(
        &self,
        command: SystemCommand,
        translator: &mut CommandTranslator,
        tx: &mut SocketTx<Writer>,
    ) -> Result<(), Writer::Error>
    where
        Writer: embedded_aio::Write,
    {
        let now = embassy_time::Instant::now().as_millis();
        SessionManager::update_session(&self.session, now).await;

        let command = match command {
            SystemCommand::Input { l, r } => translator.process(&l, &r),
            SystemCommand::Estop => {
                tracing::warn!(session = %self.session, "emergency stop requested by operator");
                translator.emergency_stop()
            }
        };
        forward_command(command, tx).await
    }
}

#[allow(dead_code)]
impl SessionManager {
    /// Creates a new session with the given session ID and timestamp.
    pub async fn create_session(
        session_id: String,
        timestamp: u64,
    ) {
        SESSION_STORE.lock().await.insert(
            session_id,
            SessionState {
                last_seen: timestamp,
            },
        );
    }

    /// Retrieves a copy of the session state for the given session ID.
    /// Returns None if the session does not exist.
    pub async fn get_session(session_id: &str) -> Option<SessionState> {
        SESSION_STORE.lock().await.get(session_id).cloned()
    }

    /// Updates the last seen timestamp of the session identified by session_id.
    /// Returns true if the session was found and updated.
    pub async fn update_session(
        session_id: &str,
        timestamp: u64,
    ) -> bool {
        if let Some(session) = SESSION_STORE.lock().await.get_mut(session_id) {
            session.last_seen = timestamp;
            true
        } else {
            false
        }
    }

    /// Removes the session identified by session_id.
    /// Returns true if a session was removed.
    pub async fn remove_session(session_id: &str) -> bool {
        SESSION_STORE.lock().await.remove(session_id).is_some()
    }

    /// Returns a list of active session IDs.
    pub async fn list_sessions() -> Vec<String> {
        SESSION_STORE.lock().await.keys().cloned().collect()
    }
}

/// Creates the operator-facing server: health/status endpoints, the manual
/// emergency-stop endpoint, and WebSocket sessions on "/ws".
pub async fn run(
    id: usize,
    port: u16,
    stack: Stack<'static>,
    config: Option<&'static picoserve::Config<Duration>>,
) -> ! {
    let default_config = picoserve::Config::new(picoserve::Timeouts {
        start_read_request: Some(Duration::from_secs(5)),
        persistent_start_read_request: None,
        read_request: Some(Duration::from_secs(1)),
        write: Some(Duration::from_secs(5)),
    });

    let config = config.unwrap_or(&default_config);

    let router = Router::new()
        // Liveness probe for deployment tooling
        .route(
            "/health",
            picoserve::routing::get(|| async {
                Json(HealthReport {
                    status: "healthy",
                    link: drive::link_up(),
                    timestamp: embassy_time::Instant::now().as_millis(),
                })
            }),
        )
        // Operational snapshot: link state, sessions, last dispatched command
        .route(
            "/status",
            picoserve::routing::get(|| async {
                Json(ServerStatus {
                    server: "running",
                    link: drive::link_up(),
                    sessions: SessionManager::list_sessions().await.len(),
                    command: drive::last_command(),
                })
            }),
        )
        // Manual emergency stop, bypassing controller sampling entirely
        .route(
            "/estop",
            picoserve::routing::post(|| async {
                tracing::warn!("emergency stop requested via API");
                let envelope =
                    CommandEnvelope::emergency_stop(embassy_time::Instant::now().as_millis());
                DRIVE_CHANNEL.send(envelope).await;
                Json(EstopAck {
                    success: true,
                    message: "Emergency stop executed",
                })
            }),
        )
        // WebSocket communication on "/ws"
        .route(
            "/ws",
            picoserve::routing::get(|params: WsConnectionParams| async move {
                let session_id = params.query.session;
                tracing::info!("New WebSocket connection with session id: {}", session_id);
                let now = embassy_time::Instant::now().as_secs();
                SessionManager::create_session(session_id.clone(), now).await;
                params
                    .upgrade
                    .on_upgrade(WebSocket {
                        session: session_id,
                    })
                    .with_protocol("messages")
            }),
        );

    // Print out the IP and port before starting the server.
    if let Some(ip_cfg) = stack.config_v4() {
        tracing::info!("Starting server at {}:{}", ip_cfg.address, port);
    } else {
        tracing::warn!(
            "Starting WebSocket server on port {port}, but no IPv4 address is assigned yet!"
        );
    }

    let (mut rx_buffer, mut tx_buffer, mut http_buffer) = ([0; 1024], [0; 1024], [0; 4096]);

    picoserve::listen_and_serve_with_state(
        id,
        &router,
        config,
        stack,
        port,
        &mut rx_buffer,
        &mut tx_buffer,
        &mut http_buffer,
        &(),
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    session: String,
}

pub struct WsConnectionParams {
    pub upgrade: WebSocketUpgrade,
    pub query: QueryParams,
}

impl<'r, S> FromRequest<'r, S> for WsConnectionParams {
    type Rejection = &'static str;

    async fn from_request<R: Read>(
        state: &'r S,
        parts: RequestParts<'r>,
        body: RequestBody<'r, R>,
    ) -> Result<Self, Self::Rejection> {
        // First extract the WebSocketUpgrade as usual.
        let upgrade = WebSocketUpgrade::from_request(state, parts.clone(), body)
            .await
            .map_err(|_| "Failed to extract WebSocketUpgrade")?;

        // Then extract the query string for QueryParams.
        let query_str = parts.query().ok_or("Missing query parameters")?;
        let query =
            deserialize_form::<QueryParams>(query_str).map_err(|_| "Invalid query parameters")?;

        if query.session.is_empty() {
            return Err("Session ID is required");
        }

        Ok(WsConnectionParams { upgrade, query })
    }
}
