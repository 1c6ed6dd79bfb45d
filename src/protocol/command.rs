//! Opcodes and enumerated values of the playback service protocol.
//!
//! Every request starts with the decimal representation of a [`Command`].
//! Playback status, repeat mode and shuffle mode travel as small integers;
//! their human readable names are only used for display and on the
//! command line.

use std::{fmt, str::FromStr};

use crate::error::{Error, Result};

/// Request opcodes.
///
/// The discriminants are part of the wire format and must never change
/// without bumping [`VERSION`](super::VERSION).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum Command {
    /// Query the protocol version. Always the first request on a connection.
    Version = 0,
    /// Stop playback and clear both queues.
    Reset = 1,
    Resume = 2,
    Pause = 3,
    Previous = 4,
    Next = 5,
    GetVolume = 6,
    SetVolume = 7,
    /// Index of the playing song in the main queue.
    GetQueueIndex = 8,
    SetQueueIndex = 9,
    /// Ranged fetch of the main queue: `start`, `end`.
    GetQueue = 10,
    SetQueue = 11,
    GetQueueSize = 12,
    RemoveFromQueue = 13,
    /// Ranged fetch of the sub-queue: `start`, `end`.
    GetSubQueue = 14,
    AddToSubQueue = 15,
    RemoveFromSubQueue = 16,
    GetSubQueueSize = 17,
    SkipSubQueueSongs = 18,
    GetRepeat = 19,
    SetRepeat = 20,
    GetShuffle = 21,
    SetShuffle = 22,
    GetSong = 23,
    GetStatus = 24,
    GetPosition = 25,
    SetPosition = 26,
}

impl Command {
    const ALL: [Command; 27] = [
        Command::Version,
        Command::Reset,
        Command::Resume,
        Command::Pause,
        Command::Previous,
        Command::Next,
        Command::GetVolume,
        Command::SetVolume,
        Command::GetQueueIndex,
        Command::SetQueueIndex,
        Command::GetQueue,
        Command::SetQueue,
        Command::GetQueueSize,
        Command::RemoveFromQueue,
        Command::GetSubQueue,
        Command::AddToSubQueue,
        Command::RemoveFromSubQueue,
        Command::GetSubQueueSize,
        Command::SkipSubQueueSongs,
        Command::GetRepeat,
        Command::SetRepeat,
        Command::GetShuffle,
        Command::SetShuffle,
        Command::GetSong,
        Command::GetStatus,
        Command::GetPosition,
        Command::SetPosition,
    ];

    /// Returns the opcode as sent on the wire.
    #[must_use]
    pub fn opcode(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for Command {
    type Error = Error;

    fn try_from(opcode: i32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|command| command.opcode() == opcode)
            .ok_or_else(|| Error::invalid_argument(format!("unknown opcode {opcode}")))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode())
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::try_from(s.parse::<i32>()?)
    }
}

/// Playback status as reported by the service.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Status {
    /// The service failed to determine its status.
    Error = 0,
    Playing = 1,
    Paused = 2,
    #[default]
    Stopped = 3,
}

/// Repeat mode of the main queue.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum RepeatMode {
    #[default]
    Off = 0,
    RepeatOne = 1,
    RepeatAll = 2,
}

/// Shuffle mode of the main queue.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum ShuffleMode {
    #[default]
    Off = 0,
    On = 1,
}

/// Shared conversions for the small enums that travel as integers.
macro_rules! wire_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Returns the integer sent on the wire.
            #[must_use]
            pub fn wire_value(self) -> u8 {
                self as u8
            }

            /// Parses a wire payload.
            ///
            /// # Errors
            ///
            /// Returns [`Error::invalid_argument`] if `s` is not an integer
            /// or not a known value.
            pub fn from_wire(s: &str) -> Result<Self> {
                let value = s.trim().parse::<u8>()?;
                Self::try_from(value)
            }
        }

        impl TryFrom<u8> for $ty {
            type Error = Error;

            fn try_from(value: u8) -> Result<Self> {
                $(
                    if value == $ty::$variant as u8 {
                        return Ok($ty::$variant);
                    }
                )+
                Err(Error::invalid_argument(format!(
                    "{value} is not a valid {}",
                    stringify!($ty)
                )))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $($ty::$variant => write!(f, $name),)+
                }
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    _ => Err(Error::invalid_argument(format!(
                        "{s} is not a valid {}",
                        stringify!($ty)
                    ))),
                }
            }
        }
    };
}

wire_enum!(Status {
    Error => "error",
    Playing => "playing",
    Paused => "paused",
    Stopped => "stopped",
});

wire_enum!(RepeatMode {
    Off => "off",
    RepeatOne => "one",
    RepeatAll => "all",
});

wire_enum!(ShuffleMode {
    Off => "off",
    On => "on",
});

impl From<bool> for ShuffleMode {
    fn from(on: bool) -> Self {
        if on {
            ShuffleMode::On
        } else {
            ShuffleMode::Off
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_are_stable() {
        assert_eq!(Command::Version.opcode(), 0);
        assert_eq!(Command::GetQueue.opcode(), 10);
        assert_eq!(Command::SetPosition.opcode(), 26);
        for command in Command::ALL {
            assert_eq!(Command::try_from(command.opcode()).unwrap(), command);
        }
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        assert!(Command::try_from(27).is_err());
        assert!("-1".parse::<Command>().is_err());
        assert!("next".parse::<Command>().is_err());
    }

    #[test]
    fn wire_enums_parse_payloads() {
        assert_eq!(Status::from_wire("1").unwrap(), Status::Playing);
        assert_eq!(RepeatMode::from_wire("2").unwrap(), RepeatMode::RepeatAll);
        assert_eq!(ShuffleMode::from_wire("0").unwrap(), ShuffleMode::Off);
        assert!(Status::from_wire("4").is_err());
        assert!(RepeatMode::from_wire("").is_err());
    }

    #[test]
    fn names_round_trip() {
        for mode in [RepeatMode::Off, RepeatMode::RepeatOne, RepeatMode::RepeatAll] {
            assert_eq!(mode.to_string().parse::<RepeatMode>().unwrap(), mode);
        }
        assert_eq!("on".parse::<ShuffleMode>().unwrap(), ShuffleMode::On);
        assert!("sometimes".parse::<ShuffleMode>().is_err());
    }
}
