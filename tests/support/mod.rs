//! In-process RCON server used by the integration tests
//!
//! Speaks the same framing as the library, answers auth and exec packets
//! from a canned response table, and records everything it was asked so
//! tests can assert on command ordering and reconnect behavior. Faulty
//! server modes (reject auth, hang on a command, drop mid-exchange) are
//! switchable per test.

// Each test binary uses a different slice of this module
#![allow(dead_code)]

use garrison::rcon::packet::{self, kind, Packet, AUTH_REJECTED_ID};
use garrison::ConnectionOptions;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

static TRACING: Once = Once::new();

/// Route library logs through the test harness, filtered by `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Timeout given to clients talking to the mock; generous for CI, small
/// enough that hang-mode tests finish quickly.
pub const CLIENT_TIMEOUT: Duration = Duration::from_millis(800);

#[derive(Default)]
struct ServerState {
    password: String,
    preface_auth: bool,
    reject_auth: AtomicBool,
    auth_attempts: AtomicUsize,
    responses: Mutex<HashMap<String, String>>,
    hang_on: Mutex<HashSet<String>>,
    drop_on: Mutex<HashSet<String>>,
    commands: Mutex<Vec<String>>,
}

/// A live mock server bound to an ephemeral localhost port.
pub struct MockRconServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    accept_task: JoinHandle<()>,
}

impl MockRconServer {
    /// Bind and start serving with the given password.
    pub async fn spawn(password: &str) -> Self {
        Self::spawn_inner(password, false).await
    }

    /// Like [`spawn`](Self::spawn), but every auth response is preceded by
    /// an empty `RESPONSE_VALUE` frame, as some server builds do.
    pub async fn spawn_with_auth_preface(password: &str) -> Self {
        Self::spawn_inner(password, true).await
    }

    async fn spawn_inner(password: &str, preface_auth: bool) -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server local addr");
        let state = Arc::new(ServerState {
            password: password.to_string(),
            preface_auth,
            ..ServerState::default()
        });

        let accept_state = state.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(serve_connection(stream, accept_state.clone()));
            }
        });

        Self {
            addr,
            state,
            accept_task,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Options pointed at this server with its real password and the test
    /// timeout applied.
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions::new("127.0.0.1", self.port(), &self.state.password)
            .with_timeout(CLIENT_TIMEOUT)
    }

    /// Canned body returned for an exact command.
    pub fn set_response(&self, command: &str, body: &str) {
        self.state
            .responses
            .lock()
            .unwrap()
            .insert(command.to_string(), body.to_string());
    }

    /// Never answer this command; the session stays silent until the client
    /// gives up.
    pub fn hang_on(&self, command: &str) {
        self.state
            .hang_on
            .lock()
            .unwrap()
            .insert(command.to_string());
    }

    /// Close the connection instead of answering this command.
    pub fn drop_on(&self, command: &str) {
        self.state
            .drop_on
            .lock()
            .unwrap()
            .insert(command.to_string());
    }

    /// Reject every auth attempt from now on.
    pub fn reject_auth(&self, reject: bool) {
        self.state.reject_auth.store(reject, Ordering::SeqCst);
    }

    /// Auth packets received so far, accepted or not.
    pub fn auth_attempts(&self) -> usize {
        self.state.auth_attempts.load(Ordering::SeqCst)
    }

    /// Exec command bodies received so far, in arrival order.
    pub fn commands(&self) -> Vec<String> {
        self.state.commands.lock().unwrap().clone()
    }
}

impl Drop for MockRconServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve_connection(mut stream: TcpStream, state: Arc<ServerState>) {
    loop {
        let Ok(request) = packet::read_packet(&mut stream).await else {
            return;
        };
        match request.kind {
            kind::AUTH => {
                state.auth_attempts.fetch_add(1, Ordering::SeqCst);
                if state.preface_auth {
                    let preface = Packet::response(request.id, "");
                    if packet::write_packet(&mut stream, &preface).await.is_err() {
                        return;
                    }
                }
                let accepted = !state.reject_auth.load(Ordering::SeqCst)
                    && request.body == state.password;
                let reply_id = if accepted { request.id } else { AUTH_REJECTED_ID };
                let reply = Packet::auth_response(reply_id);
                if packet::write_packet(&mut stream, &reply).await.is_err() {
                    return;
                }
                if !accepted {
                    // Real servers cut unauthenticated sessions
                    return;
                }
            }
            kind::EXEC_COMMAND => {
                let command = request.body.clone();
                state.commands.lock().unwrap().push(command.clone());
                if state.hang_on.lock().unwrap().contains(&command) {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    return;
                }
                if state.drop_on.lock().unwrap().contains(&command) {
                    return;
                }
                let body = state
                    .responses
                    .lock()
                    .unwrap()
                    .get(&command)
                    .cloned()
                    .unwrap_or_else(|| format!("Unknown command: {command}"));
                let reply = Packet::response(request.id, &body);
                if packet::write_packet(&mut stream, &reply).await.is_err() {
                    return;
                }
            }
            _ => return,
        }
    }
}

/// A localhost port with nothing listening on it.
pub fn dead_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe listener");
    let port = listener.local_addr().expect("probe listener addr").port();
    drop(listener);
    port
}
