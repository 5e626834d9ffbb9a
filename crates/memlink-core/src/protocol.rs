//! # Sync Wire Protocol
//!
//! Plain-text, newline-delimited protocol for fetching relationships:
//!
//! ```text
//! -> GET_RELATIONSHIPS <entity>\n
//! <- <source> <target> <label> <weight>\n   (zero or more)
//! ```
//!
//! Response lines are parsed independently. Blank lines are ignored; a line
//! that is not exactly four tokens with an integer weight becomes a
//! [`LineError`] and is skipped without affecting the other lines.
//!
//! Exported snapshots use a separate binary framing: an 8-byte big-endian
//! length followed by the opaque blob (see [`frame`]).

use crate::primitives::{
    FRAME_PREFIX_SIZE, MAX_ENTITY_NAME_LENGTH, RECORD_TOKEN_COUNT, REQUEST_VERB,
};
use crate::{MemlinkError, RelationshipRecord};
use thiserror::Error;

// =============================================================================
// LINE ERRORS
// =============================================================================

/// Why a response line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineErrorKind {
    /// The line did not split into exactly four tokens.
    #[error("expected {expected} tokens, found {0}", expected = RECORD_TOKEN_COUNT)]
    TokenCount(usize),

    /// The weight token is not a base-10 signed integer.
    #[error("weight {0:?} is not an integer")]
    InvalidWeight(String),

    /// The line is not valid UTF-8.
    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

/// A rejected response line. Reported and skipped, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line_number}: {kind}: {line:?}")]
pub struct LineError {
    /// 1-based line number within the response.
    pub line_number: usize,
    /// The offending line, lossily decoded.
    pub line: String,
    /// What was wrong with it.
    pub kind: LineErrorKind,
}

/// Records and rejected lines of one response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub records: Vec<RelationshipRecord>,
    pub rejected: Vec<LineError>,
}

// =============================================================================
// REQUESTS
// =============================================================================

/// Check that a name can travel as a single protocol token.
pub fn validate_token(name: &str) -> Result<(), MemlinkError> {
    if name.is_empty()
        || name.len() > MAX_ENTITY_NAME_LENGTH
        || name.chars().any(char::is_whitespace)
    {
        return Err(MemlinkError::InvalidEntity(name.to_string()));
    }
    Ok(())
}

/// Encode `GET_RELATIONSHIPS <entity>\n`.
pub fn encode_request(entity: &str) -> Result<Vec<u8>, MemlinkError> {
    validate_token(entity)?;
    Ok(format!("{} {}\n", REQUEST_VERB, entity).into_bytes())
}

/// Parse a request line, returning the requested entity.
///
/// Used by the responding side. The trailing line break is optional.
pub fn parse_request(line: &str) -> Result<String, MemlinkError> {
    let mut tokens = line.split_whitespace();
    match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(REQUEST_VERB), Some(entity), None) => {
            validate_token(entity)?;
            Ok(entity.to_string())
        }
        _ => Err(MemlinkError::Protocol(format!(
            "Unrecognised request: {:?}",
            line.trim_end()
        ))),
    }
}

// =============================================================================
// RESPONSES
// =============================================================================

/// Encode one record as a response line.
///
/// Fails if any name or the label cannot travel as a single token.
pub fn encode_record(record: &RelationshipRecord) -> Result<String, MemlinkError> {
    validate_token(&record.source)?;
    validate_token(&record.target)?;
    validate_token(&record.label)?;
    Ok(format!(
        "{} {} {} {}\n",
        record.source, record.target, record.label, record.weight
    ))
}

/// Parse a single response line.
///
/// Returns `Ok(None)` for a blank line.
pub fn parse_line(line: &str) -> Result<Option<RelationshipRecord>, LineErrorKind> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        [] => Ok(None),
        [source, target, label, weight] => {
            let weight = weight
                .parse::<i64>()
                .map_err(|_| LineErrorKind::InvalidWeight((*weight).to_string()))?;
            Ok(Some(RelationshipRecord::new(*source, *target, *label, weight)))
        }
        other => Err(LineErrorKind::TokenCount(other.len())),
    }
}

/// Parse a whole response body.
///
/// A final line without a trailing newline is parsed like any other line.
pub fn parse_response(body: &[u8]) -> ParsedResponse {
    let mut parsed = ParsedResponse::default();

    for (index, raw) in body.split(|&b| b == b'\n').enumerate() {
        let line_number = index + 1;
        let result = std::str::from_utf8(raw)
            .map_err(|_| LineErrorKind::InvalidUtf8)
            .and_then(parse_line);

        match result {
            Ok(Some(record)) => parsed.records.push(record),
            Ok(None) => {}
            Err(kind) => parsed.rejected.push(LineError {
                line_number,
                line: String::from_utf8_lossy(raw).trim_end().to_string(),
                kind,
            }),
        }
    }

    parsed
}

/// The prefix of `body` made of complete, newline-terminated lines.
#[must_use]
pub fn complete_lines(body: &[u8]) -> &[u8] {
    match body.iter().rposition(|&b| b == b'\n') {
        Some(last) => &body[..=last],
        None => &[],
    }
}

// =============================================================================
// FRAMING
// =============================================================================

/// Prefix `payload` with its length as a big-endian `u64`.
#[must_use]
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(FRAME_PREFIX_SIZE + payload.len());
    framed.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    framed.extend_from_slice(payload);
    framed
}

/// Strip and check the length prefix written by [`frame`].
pub fn unframe(framed: &[u8]) -> Result<&[u8], MemlinkError> {
    let Some((prefix, payload)) = framed.split_first_chunk::<FRAME_PREFIX_SIZE>() else {
        return Err(MemlinkError::Protocol(
            "Frame shorter than its length prefix".to_string(),
        ));
    };

    let declared = u64::from_be_bytes(*prefix);
    if declared != payload.len() as u64 {
        return Err(MemlinkError::Protocol(format!(
            "Frame declares {} bytes but carries {}",
            declared,
            payload.len()
        )));
    }
    Ok(payload)
}

// =============================================================================
// TESTS
// =============================================================================
