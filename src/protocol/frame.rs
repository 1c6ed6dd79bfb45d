//! Encoding and decoding of protocol frames.
//!
//! A request frame is `<opcode>` followed by zero or more
//! `<DELIMITER><argument>` segments. No terminator is added here; the
//! transport frames messages on the wire.
//!
//! Arguments must not contain [`DELIMITER`] or [`TERMINATOR`]. Rather than
//! escaping them, [`Frame::encode`] rejects such arguments.
//!
//! # Example
//!
//! ```rust
//! use playctl::protocol::{Command, Frame};
//!
//! let frame = Frame::new(Command::GetQueue).arg(0).arg(25_000);
//! let wire = frame.encode()?;
//! assert_eq!(wire.parse::<Frame>()?, frame);
//! ```

use std::str::FromStr;

use super::{Command, DELIMITER, TERMINATOR};
use crate::error::{Error, Result};

/// One request: an opcode plus positional string arguments.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Frame {
    pub command: Command,
    pub args: Vec<String>,
}

impl Frame {
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            command,
            args: Vec::new(),
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg<T: ToString>(mut self, arg: T) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Appends all arguments of `args` in order.
    #[must_use]
    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        self.args.extend(args.into_iter().map(|arg| arg.to_string()));
        self
    }

    /// Encodes the frame to its wire representation, without terminator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::invalid_argument`] if an argument contains the
    /// delimiter or the frame terminator.
    pub fn encode(&self) -> Result<String> {
        let mut wire = self.command.to_string();
        for arg in &self.args {
            if arg.contains([DELIMITER, TERMINATOR]) {
                return Err(Error::invalid_argument(format!(
                    "argument {arg:?} contains a reserved character"
                )));
            }
            wire.push(DELIMITER);
            wire.push_str(arg);
        }
        Ok(wire)
    }
}

impl FromStr for Frame {
    type Err = Error;

    /// Decodes a wire frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::invalid_argument`] if the opcode is missing, not an
    /// integer, or unknown.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(DELIMITER);
        let command = parts
            .next()
            .filter(|opcode| !opcode.is_empty())
            .ok_or_else(|| Error::invalid_argument("frame has no opcode"))?
            .parse::<Command>()?;

        Ok(Self {
            command,
            args: parts.map(str::to_owned).collect(),
        })
    }
}

/// Splits a delimiter-separated response and parses every token.
///
/// An empty payload yields an empty list.
///
/// # Errors
///
/// Returns the parse error of the first malformed token, including empty
/// tokens between two delimiters.
pub fn parse_list<T>(payload: &str) -> Result<Vec<T>>
where
    T: FromStr,
    Error: From<T::Err>,
{
    if payload.is_empty() {
        return Ok(Vec::new());
    }

    payload
        .split(DELIMITER)
        .map(|token| token.trim().parse::<T>().map_err(Error::from))
        .collect()
}
