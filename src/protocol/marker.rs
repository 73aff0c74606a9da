//! Completion marker framing and parsing
//!
//! Every script is wrapped in a `{ ... }` group so the whole body shares one
//! exit status, then followed by a trailer that echoes
//! `TOKEN,<exit-status>,<id>[,1]` to both standard output and standard error.

use crate::LOG_TARGET;
use crate::types::identifiers::{CommandId, MarkerToken};

/// Shell variable holding the group's exit status between the two echoes
pub const STATUS_VAR: &str = "__rootshell_rc";

/// Fourth marker field flagging a callback-driven command
pub const ASYNC_FLAG: &str = "1";

/// Parsed completion marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// Exit status text printed by the interpreter
    pub exit_code: String,
    /// Command the marker completes
    pub id: CommandId,
    /// Whether the trailer carried the asynchronous flag
    pub asynchronous: bool,
}

/// Classification of one line read from an interpreter stream
#[derive(Debug, PartialEq, Eq)]
pub enum ScannedLine<'a> {
    /// Ordinary command output
    Text(&'a str),
    /// A completion marker, possibly preceded by output lacking a newline
    Marker {
        /// Text before the token on the same line, if any
        prefix: Option<&'a str>,
        /// The parsed marker
        marker: Marker,
    },
}

/// Wrap `script` with the grouping and the dual-stream trailer
#[must_use]
pub fn frame_script(
    script: &str,
    token: &MarkerToken,
    id: CommandId,
    asynchronous: bool,
) -> String {
    let suffix = if asynchronous {
        format!(",{ASYNC_FLAG}")
    } else {
        String::new()
    };
    let trailer = format!("{token},${{{STATUS_VAR}}},{id}{suffix}");
    format!("{{\n{script}\n}}\n{STATUS_VAR}=$?; echo \"{trailer}\"; echo \"{trailer}\" 1>&2\n")
}

/// Classify a line as output or marker
///
/// The token may appear mid-line when the script's last output had no
/// trailing newline; everything before it is returned as `prefix`. A line
/// carrying the token but not a well-formed marker is treated as text.
#[must_use]
pub fn scan_line<'a>(line: &'a str, token: &MarkerToken) -> ScannedLine<'a> {
    let Some(pos) = line.find(token.as_str()) else {
        return ScannedLine::Text(line);
    };

    let rest = &line[pos + token.as_str().len()..];
    let Some(marker) = rest.strip_prefix(',').and_then(parse_fields) else {
        log::warn!(target: LOG_TARGET, "ignoring malformed marker line: {line}");
        return ScannedLine::Text(line);
    };

    let prefix = (pos > 0).then(|| &line[..pos]);
    ScannedLine::Marker { prefix, marker }
}

fn parse_fields(fields: &str) -> Option<Marker> {
    let mut parts = fields.split(',');
    let exit_code = parts.next().filter(|s| !s.is_empty())?;
    let id = parts.next()?.parse::<u64>().ok()?;
    let asynchronous = match parts.next() {
        None => false,
        Some(ASYNC_FLAG) => true,
        Some(_) => return None,
    };
    if parts.next().is_some() {
        return None;
    }
    Some(Marker {
        exit_code: exit_code.to_string(),
        id: CommandId::new(id),
        asynchronous,
    })
}
