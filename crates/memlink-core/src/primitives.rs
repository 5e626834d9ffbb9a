//! # Primitives
//!
//! Hardcoded constants shared by the graph, the store and the wire protocol.
//! These are compiled into the binary and are immutable at runtime.

/// Request verb for fetching relationships from a peer.
///
/// A request is a single line: `GET_RELATIONSHIPS <entity>\n`.
pub const REQUEST_VERB: &str = "GET_RELATIONSHIPS";

/// Number of whitespace-separated tokens in a well-formed response record.
pub const RECORD_TOKEN_COUNT: usize = 4;

/// Hash recorded for entities created implicitly by `add_relationship`.
pub const DEFAULT_ENTITY_HASH: i64 = 0;

/// Magic bytes for the memlink snapshot header.
///
/// - Snapshot = Magic Bytes ("MLNK") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"MLNK";

/// Current snapshot format version.
///
/// Peers only decode snapshots carrying the same version.
pub const FORMAT_VERSION: u8 = 1;

/// Size of the snapshot header (magic + version).
pub const HEADER_SIZE: usize = 5;

/// Size of the big-endian length prefix that frames an exported blob.
pub const FRAME_PREFIX_SIZE: usize = 8;

/// Number of bytes requested from the channel per receive call.
pub const RECEIVE_CHUNK_SIZE: usize = 1024;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum accepted size of a single sync response (16 MB).
///
/// A peer that keeps sending past this limit fails the sync with a
/// protocol error and leaves the graph untouched.
pub const MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

/// Maximum accepted size of an encoded snapshot (500 MB).
///
/// Validated BEFORE attempting deserialization.
pub const MAX_SNAPSHOT_SIZE: usize = 500 * 1024 * 1024;

/// Maximum length of an entity name sent in a request.
pub const MAX_ENTITY_NAME_LENGTH: usize = 256;
