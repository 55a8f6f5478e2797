//! Player-list response parsing
//!
//! RCON `players` output is vendor text, not a stable wire format, so the
//! grammar lives behind the [`PlayerListParser`] trait and deployments can
//! swap in a strategy matched to their server build. The bundled
//! [`StandardListParser`] handles the common shape:
//!
//! ```text
//! Players:
//! 1 Bob (76561198000000001) 192.168.1.1:2302
//! 2 Alice (76561198000000002) 10.0.0.7:2302
//! ```
//!
//! Parsing is deliberately lenient: a line the grammar does not recognize
//! is skipped and logged, never an error. A corrupted row must not take
//! down a whole fleet poll.

use crate::types::Player;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Header line preceding the roster rows.
pub const LIST_HEADER: &str = "Players:";

/// Substring some server builds emit for an empty roster.
pub const NO_PLAYERS_MARKER: &str = "No players";

static PLAYER_LINE: OnceLock<Regex> = OnceLock::new();

fn player_line_regex() -> &'static Regex {
    PLAYER_LINE.get_or_init(|| {
        Regex::new(r"^\s*(\d+)\s+(.+?)\s+\(([^()\s]+)\)(?:\s+\S+)*\s*$")
            .expect("player line pattern is a valid regex")
    })
}

/// A player-list line the grammar did not recognize.
///
/// Non-fatal by contract: listings skip the line and keep going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unrecognized player list line: {line:?}")]
pub struct ParseError {
    /// The offending line, kept for logs
    pub line: String,
}

// ============================================================================
// Parser Strategy
// ============================================================================

/// Strategy turning a raw `players` payload into structured rows.
pub trait PlayerListParser: Send + Sync {
    /// Parser identity for logs.
    fn name(&self) -> &'static str;

    /// Parse the multi-line payload. Unrecognized lines are skipped;
    /// output order mirrors input line order.
    fn parse(&self, raw: &str) -> Vec<Player>;
}

/// Default grammar: `<index> <name> (<steamId>) [address...]`.
///
/// Names may contain spaces (and parentheses); the steam id is the last
/// parenthesized token without internal whitespace; trailing address
/// tokens are tolerated and ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardListParser;

impl PlayerListParser for StandardListParser {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn parse(&self, raw: &str) -> Vec<Player> {
        let mut players = Vec::new();
        for line in raw.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.contains(LIST_HEADER) {
                continue;
            }
            match parse_player_line(trimmed) {
                Ok(player) => players.push(player),
                Err(e) => {
                    tracing::debug!(
                        parser = self.name(),
                        line = %e.line,
                        "Skipping unrecognized player list line"
                    );
                }
            }
        }
        players
    }
}

// ============================================================================
// Pure Helpers
// ============================================================================

/// Whether a `players` payload describes an empty roster: blank output,
/// a bare header, or the vendor's no-players notice.
pub fn is_empty_roster(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed == LIST_HEADER || trimmed.contains(NO_PLAYERS_MARKER)
}

/// Parse one roster row against the standard grammar.
pub fn parse_player_line(line: &str) -> Result<Player, ParseError> {
    let caps = player_line_regex().captures(line).ok_or_else(|| ParseError {
        line: line.to_string(),
    })?;
    let id = caps[1].parse::<u32>().map_err(|_| ParseError {
        line: line.to_string(),
    })?;
    Ok(Player {
        id,
        name: caps[2].to_string(),
        steam_id: caps[3].to_string(),
    })
}
