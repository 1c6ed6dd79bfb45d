//! Wire protocol of the playback service.
//!
//! The protocol is a strict request/response exchange of text frames over a
//! persistent stream socket. A request consists of an integer opcode
//! optionally followed by arguments, each preceded by [`DELIMITER`]. A
//! response is a single command-specific payload: an integer, a float or a
//! [`DELIMITER`]-separated list of integers.
//!
//! # Submodules
//!
//! * [`command`] - Opcodes and the wire representation of playback enums
//! * [`frame`] - Encoding and decoding of frames
//!
//! # Handshake
//!
//! Immediately after connecting, the client sends [`Command::Version`] with
//! no arguments. The service must answer with exactly [`VERSION`], or the
//! connection is refused by the client.

pub mod command;
pub mod frame;

use std::time::Duration;

pub use command::{Command, RepeatMode, ShuffleMode, Status};
pub use frame::{parse_list, Frame};

/// Protocol version that both sides must agree on.
pub const VERSION: i32 = 1;

/// Reserved byte separating the opcode and arguments of a frame.
///
/// This is the ASCII unit separator, which never occurs in numeric values.
pub const DELIMITER: char = '\u{1f}';

/// Byte terminating a frame on the wire. Added and stripped by the transport.
pub const TERMINATOR: char = '\n';

/// Well-known local port the playback service listens on.
pub const PORT: u16 = 3333;

/// Default timeout applied to every socket read and write.
pub const TIMEOUT: Duration = Duration::from_millis(1_500);

/// Song identifier as used by the playback service.
///
/// Negative values mean "no song".
pub type SongId = i32;
