//! Typed RCON command surface
//!
//! [`RconClient`] wraps one session and exposes the administrative verbs a
//! fleet console needs: roster listing, kick, ban, server info, scheduled
//! restart, plus raw command passthrough. Every public operation returns a
//! [`CommandResult`] envelope; connection faults, timeouts, and protocol
//! errors fold into `success = false` with a readable message, so nothing
//! escapes this boundary as an error or a panic.

use crate::rcon::connection::{ConnectionOptions, RconConnection};
use crate::rcon::parser::{self, PlayerListParser, StandardListParser};
use crate::types::{CommandResult, Player};

/// Command requesting the roster.
const PLAYERS_COMMAND: &str = "players";

/// Command requesting the raw statistics payload.
const SERVER_INFO_COMMAND: &str = "serverinfo";

/// Reason applied when a kick is issued without one.
pub const DEFAULT_KICK_REASON: &str = "Kicked by admin";

/// Reason applied when a ban is issued without one.
pub const DEFAULT_BAN_REASON: &str = "Banned by admin";

/// Restart delay applied when none is given (seconds).
pub const DEFAULT_RESTART_DELAY_SECS: u32 = 60;

// ============================================================================
// Client
// ============================================================================

/// Administrative command client over one RCON session.
pub struct RconClient {
    connection: RconConnection,
    parser: Box<dyn PlayerListParser>,
}

impl RconClient {
    /// Client over a fresh disconnected session, using the standard roster
    /// grammar.
    pub fn new(options: ConnectionOptions) -> Self {
        Self {
            connection: RconConnection::new(options),
            parser: Box::new(StandardListParser),
        }
    }

    /// Swap the roster grammar. Server builds differ in list formatting;
    /// deployments provide a strategy matched to theirs.
    pub fn with_parser(mut self, parser: Box<dyn PlayerListParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Establish the session.
    pub async fn connect(&mut self) -> CommandResult<()> {
        match self.connection.connect().await {
            Ok(()) => CommandResult::ok_empty("Connected to RCON server"),
            Err(e) => CommandResult::fail(format!("Failed to connect to RCON server: {e}")),
        }
    }

    /// Tear the session down.
    pub async fn disconnect(&mut self) -> CommandResult<()> {
        match self.connection.disconnect().await {
            Ok(()) => CommandResult::ok_empty("Disconnected from RCON server"),
            Err(e) => CommandResult::fail(e.to_string()),
        }
    }

    /// Execute an arbitrary command and return its raw payload.
    pub async fn run_command(&mut self, command: &str) -> CommandResult<String> {
        match self.connection.send(command).await {
            Ok(payload) => CommandResult::ok("Command executed successfully", payload),
            Err(e) => CommandResult::fail(format!("Failed to execute command: {e}")),
        }
    }

    /// Current roster.
    ///
    /// Empty output, a bare header, or the vendor's no-players notice all
    /// mean a successful empty roster. Unrecognized lines are skipped by
    /// the parser, never an error; row order mirrors the server's output.
    pub async fn list_players(&mut self) -> CommandResult<Vec<Player>> {
        let response = self.run_command(PLAYERS_COMMAND).await;
        if !response.success {
            return CommandResult::fail_from(&response);
        }

        let raw = response.data.unwrap_or_default();
        if parser::is_empty_roster(&raw) {
            return CommandResult::ok("No players online", Vec::new());
        }

        let players = self.parser.parse(&raw);
        CommandResult::ok(format!("{} player(s) online", players.len()), players)
    }

    /// Remove a player. `reason` defaults to [`DEFAULT_KICK_REASON`].
    pub async fn kick_player(
        &mut self,
        player_id: u32,
        reason: Option<&str>,
    ) -> CommandResult<String> {
        let reason = reason.unwrap_or(DEFAULT_KICK_REASON);
        self.run_command(&format!("kick {player_id} {reason}")).await
    }

    /// Ban a player. `reason` defaults to [`DEFAULT_BAN_REASON`].
    pub async fn ban_player(
        &mut self,
        player_id: u32,
        reason: Option<&str>,
    ) -> CommandResult<String> {
        let reason = reason.unwrap_or(DEFAULT_BAN_REASON);
        self.run_command(&format!("ban {player_id} {reason}")).await
    }

    /// Raw server statistics payload, passed through opaquely.
    pub async fn server_info(&mut self) -> CommandResult<String> {
        self.run_command(SERVER_INFO_COMMAND).await
    }

    /// Announce a restart, then schedule the shutdown. `delay_secs` defaults
    /// to [`DEFAULT_RESTART_DELAY_SECS`].
    ///
    /// The announcement goes out strictly first so players see the warning.
    /// The shutdown is still attempted when the announcement fails (best
    /// effort, no rollback); the returned envelope reflects the shutdown
    /// send.
    pub async fn restart_server(&mut self, delay_secs: Option<u32>) -> CommandResult<String> {
        let delay_secs = delay_secs.unwrap_or(DEFAULT_RESTART_DELAY_SECS);
        let announcement = format!("say -1 \"Server will restart in {delay_secs} seconds\"");
        let announced = self.run_command(&announcement).await;
        if !announced.success {
            tracing::warn!(
                message = %announced.message,
                "Restart announcement failed; proceeding with shutdown"
            );
        }
        self.run_command(&format!("#shutdown {delay_secs}")).await
    }
}

// ============================================================================
// Reachability Probe
// ============================================================================

/// Connect-then-disconnect reachability check for one endpoint.
///
/// Used by enrollment flows to validate host, port, and credentials before
/// a server enters the registry. Any session opened here is torn down
/// before returning.
pub async fn probe(options: ConnectionOptions) -> CommandResult<()> {
    let mut client = RconClient::new(options);
    let connected = client.connect().await;
    if !connected.success {
        return connected;
    }
    let _ = client.disconnect().await;
    CommandResult::ok_empty("RCON endpoint reachable and credentials accepted")
}
