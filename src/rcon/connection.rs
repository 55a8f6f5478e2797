//! RCON session layer: dial, authenticate, exchange command frames
//!
//! An [`RconConnection`] owns at most one TCP socket and moves between
//! exactly two states, `Disconnected` and `Connected`. Connections are
//! plain values constructed wherever needed (per command burst, per poll);
//! nothing in this crate holds a shared or global session. Commands are
//! strictly serialized per session: `send` takes `&mut self`, so two
//! in-flight requests on one socket cannot be expressed.

use crate::rcon::packet::{self, kind, Packet, AUTH_REJECTED_ID};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Default bound for the connect handshake and each command round trip.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Handshake frames tolerated before the auth verdict. Some servers
/// preface the verdict with an empty response frame.
const MAX_HANDSHAKE_FRAMES: usize = 4;

// ============================================================================
// Options & Reconnect Policy
// ============================================================================

/// Bounded policy for the implicit reconnect inside [`RconConnection::send`].
///
/// The default is a single immediate attempt: a command issued on a dropped
/// session gets exactly one chance to re-establish it before failing with
/// [`CommandError::NotConnected`]. Deployments that want more resilience
/// raise `max_attempts` and set delays, which double per attempt up to
/// `max_delay_ms`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Attempts before giving up; 0 disables implicit reconnects entirely
    pub max_attempts: u32,
    /// Delay before the first attempt (milliseconds)
    pub initial_delay_ms: u64,
    /// Cap for the doubling delay (milliseconds)
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay_ms: 0,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given 1-based attempt: doubles each time, capped.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if self.initial_delay_ms == 0 {
            return Duration::ZERO;
        }
        let cap = self.max_delay_ms.max(self.initial_delay_ms);
        let ms = self
            .initial_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
            .min(cap);
        Duration::from_millis(ms)
    }
}

/// Endpoint coordinates and credentials for one RCON server.
///
/// Immutable once a connection is built; the implicit reconnect always
/// re-dials with the originally supplied values.
#[derive(Clone)]
pub struct ConnectionOptions {
    /// Hostname or IP of the game server
    pub host: String,
    /// RCON listener port
    pub port: u16,
    /// RCON password
    pub password: String,
    /// Bound for the handshake and for each command round trip
    pub timeout: Duration,
    /// Implicit-reconnect policy applied inside `send`
    pub reconnect: ReconnectPolicy,
}

impl ConnectionOptions {
    /// Options with the default timeout and reconnect policy.
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Override the handshake/command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the implicit-reconnect policy.
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// `host:port` dial string.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

// ============================================================================
// States & Errors
// ============================================================================

/// Socket-ownership state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Failures establishing a session.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Authentication rejected by server")]
    Rejected,

    #[error("Handshake timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error during handshake: {0}")]
    Protocol(String),
}

/// Failures executing a command on a session.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures tearing a session down.
#[derive(Debug, Error)]
pub enum DisconnectError {
    #[error("Not connected to any server")]
    NotConnected,
}

// ============================================================================
// Connection
// ============================================================================

/// One RCON session over one exclusively-owned TCP socket.
pub struct RconConnection {
    options: ConnectionOptions,
    stream: Option<TcpStream>,
    next_id: i32,
}

impl RconConnection {
    /// Build a `Disconnected` connection. No I/O happens until `connect`.
    pub fn new(options: ConnectionOptions) -> Self {
        Self {
            options,
            stream: None,
            next_id: 0,
        }
    }

    /// Current state, derived from socket ownership.
    pub fn state(&self) -> ConnectionState {
        if self.stream.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// The options this connection was built with.
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Open the socket and run the password handshake, the whole sequence
    /// bounded by `options.timeout`. Idempotent when already connected.
    pub async fn connect(&mut self) -> Result<(), ConnectError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let addr = self.options.address();
        tracing::debug!(address = %addr, "Connecting to RCON endpoint");

        let bound = self.options.timeout;
        let auth_id = self.bump_id();
        let password = self.options.password.clone();
        let stream = tokio::time::timeout(bound, Self::handshake(&addr, auth_id, &password))
            .await
            .map_err(|_| ConnectError::Timeout(bound))??;

        self.stream = Some(stream);
        tracing::info!(address = %addr, "RCON session established");
        Ok(())
    }

    /// Dial, enable keepalive, exchange the password. Split out so
    /// `connect` can wrap the whole sequence in a single timeout.
    async fn handshake(addr: &str, auth_id: i32, password: &str) -> Result<TcpStream, ConnectError> {
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ConnectError::Network(e.to_string()))?;

        // Keepalive so half-dead servers surface between polls
        let sock_ref = socket2::SockRef::from(&stream);
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(std::time::Duration::from_secs(30))
            .with_interval(std::time::Duration::from_secs(10));
        let _ = sock_ref.set_tcp_keepalive(&keepalive);

        packet::write_packet(&mut stream, &Packet::auth(auth_id, password))
            .await
            .map_err(|e| ConnectError::Network(e.to_string()))?;

        for _ in 0..MAX_HANDSHAKE_FRAMES {
            let frame = packet::read_packet(&mut stream).await.map_err(io_to_connect)?;
            match frame.kind {
                kind::RESPONSE_VALUE => continue,
                kind::AUTH_RESPONSE if frame.id == AUTH_REJECTED_ID => {
                    return Err(ConnectError::Rejected);
                }
                kind::AUTH_RESPONSE if frame.id == auth_id => return Ok(stream),
                kind::AUTH_RESPONSE => {
                    return Err(ConnectError::Protocol(format!(
                        "auth verdict for unknown request id {}",
                        frame.id
                    )));
                }
                other => {
                    return Err(ConnectError::Protocol(format!(
                        "unexpected frame kind {other} during handshake"
                    )));
                }
            }
        }

        Err(ConnectError::Protocol(
            "no auth verdict within allowed handshake frames".to_string(),
        ))
    }

    /// Execute one command and await its matching response frame.
    ///
    /// When the session is down this first runs the reconnect policy; if
    /// every attempt fails the command is never transmitted. Timeouts and
    /// protocol faults tear the session down before returning, leaving the
    /// connection `Disconnected`.
    pub async fn send(&mut self, command: &str) -> Result<String, CommandError> {
        if self.stream.is_none() {
            self.reconnect().await?;
        }

        let request_id = self.bump_id();
        let bound = self.options.timeout;

        let outcome = {
            let Some(stream) = self.stream.as_mut() else {
                return Err(CommandError::NotConnected(
                    "session lost before send".to_string(),
                ));
            };
            let exchange = async {
                packet::write_packet(stream, &Packet::exec(request_id, command)).await?;
                packet::read_packet(stream).await
            };
            tokio::time::timeout(bound, exchange).await
        };

        match outcome {
            Err(_) => {
                self.drop_session().await;
                tracing::warn!(
                    address = %self.options.address(),
                    timeout = ?bound,
                    "RCON command timed out; session closed"
                );
                Err(CommandError::Timeout(bound))
            }
            Ok(Err(e)) => {
                let mapped = io_to_command(&e);
                self.drop_session().await;
                Err(mapped)
            }
            Ok(Ok(frame)) => {
                if frame.kind != kind::RESPONSE_VALUE || frame.id != request_id {
                    self.drop_session().await;
                    return Err(CommandError::Protocol(format!(
                        "expected response for request {request_id}, got kind {} id {}",
                        frame.kind, frame.id
                    )));
                }
                Ok(frame.body)
            }
        }
    }

    /// Close the session. Fails when no session is active, which is how a
    /// double disconnect becomes observable to callers.
    pub async fn disconnect(&mut self) -> Result<(), DisconnectError> {
        match self.stream.take() {
            None => Err(DisconnectError::NotConnected),
            Some(mut stream) => {
                let _ = stream.shutdown().await;
                tracing::debug!(address = %self.options.address(), "RCON session closed");
                Ok(())
            }
        }
    }

    /// Run the bounded implicit-reconnect policy.
    async fn reconnect(&mut self) -> Result<(), CommandError> {
        let policy = self.options.reconnect;
        if policy.max_attempts == 0 {
            return Err(CommandError::NotConnected(
                "implicit reconnect disabled by policy".to_string(),
            ));
        }

        let mut last_error = String::new();
        for attempt in 1..=policy.max_attempts {
            let delay = policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.connect().await {
                Ok(()) => {
                    tracing::info!(attempt, "RCON session re-established before send");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %e,
                        "RCON reconnect attempt failed"
                    );
                    last_error = e.to_string();
                }
            }
        }

        Err(CommandError::NotConnected(format!(
            "reconnect failed after {} attempt(s): {last_error}",
            policy.max_attempts
        )))
    }

    /// Close the socket without state checks. Used on faults where the
    /// stream can no longer be trusted.
    async fn drop_session(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
    }

    /// Next request id: wraps positive, never the rejection sentinel.
    fn bump_id(&mut self) -> i32 {
        self.next_id = if self.next_id >= i32::MAX - 1 {
            1
        } else {
            self.next_id + 1
        };
        self.next_id
    }
}

fn io_to_connect(e: std::io::Error) -> ConnectError {
    if e.kind() == std::io::ErrorKind::InvalidData {
        ConnectError::Protocol(e.to_string())
    } else {
        ConnectError::Network(e.to_string())
    }
}

fn io_to_command(e: &std::io::Error) -> CommandError {
    if e.kind() == std::io::ErrorKind::InvalidData {
        CommandError::Protocol(e.to_string())
    } else {
        CommandError::Network(e.to_string())
    }
}
