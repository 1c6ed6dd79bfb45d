//! Requests the client can issue and how their responses update the cache.
//!
//! Each [`Request`] variant knows how to build its [`Frame`] and how to
//! apply the service's response to the cached [`State`]. Applying a response
//! may produce follow-up requests, for example a full queue fetch when the
//! polled queue size changed. Those are handed to the caller, which appends
//! them to the outbound queue.

use std::str::FromStr;

use crate::{
    config::Config,
    error::{Error, Result},
    protocol::{parse_list, Command, Frame, RepeatMode, ShuffleMode, SongId, Status},
    state::State,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    /// Stop playback and clear both queues on the service.
    Reset,
    Resume,
    Pause,
    Previous,
    Next,
    GetVolume,
    SetVolume(f64),
    GetQueueIndex,
    SetQueueIndex(usize),
    GetQueueSize,
    GetQueue { start: usize, end: usize },
    SetQueue(Vec<SongId>),
    RemoveFromQueue(usize),
    GetSubQueue { start: usize, end: usize },
    AddToSubQueue(SongId),
    RemoveFromSubQueue(usize),
    GetSubQueueSize,
    SkipSubQueueSongs(usize),
    GetRepeat,
    SetRepeat(RepeatMode),
    GetShuffle,
    SetShuffle(ShuffleMode),
    GetSong,
    GetStatus,
    GetPosition,
    SetPosition(f64),
}

/// Parses a scalar response payload.
fn parse<T>(response: &str) -> Result<T>
where
    T: FromStr,
    Error: From<T::Err>,
{
    Ok(response.trim().parse::<T>()?)
}

impl Request {
    /// Fetch of the whole main queue.
    #[must_use]
    pub fn full_queue(config: &Config) -> Self {
        Request::GetQueue {
            start: 0,
            end: config.queue_limit,
        }
    }

    /// Fetch of the whole sub-queue.
    #[must_use]
    pub fn full_sub_queue(config: &Config) -> Self {
        Request::GetSubQueue {
            start: 0,
            end: config.sub_queue_limit,
        }
    }

    /// The state polls issued once per refresh interval, in order.
    #[must_use]
    pub fn refresh_battery() -> [Request; 9] {
        [
            Request::GetPosition,
            Request::GetQueueSize,
            Request::GetRepeat,
            Request::GetShuffle,
            Request::GetSong,
            Request::GetQueueIndex,
            Request::GetSubQueueSize,
            Request::GetStatus,
            Request::GetVolume,
        ]
    }

    #[must_use]
    pub fn command(&self) -> Command {
        match self {
            Request::Reset => Command::Reset,
            Request::Resume => Command::Resume,
            Request::Pause => Command::Pause,
            Request::Previous => Command::Previous,
            Request::Next => Command::Next,
            Request::GetVolume => Command::GetVolume,
            Request::SetVolume(_) => Command::SetVolume,
            Request::GetQueueIndex => Command::GetQueueIndex,
            Request::SetQueueIndex(_) => Command::SetQueueIndex,
            Request::GetQueueSize => Command::GetQueueSize,
            Request::GetQueue { .. } => Command::GetQueue,
            Request::SetQueue(_) => Command::SetQueue,
            Request::RemoveFromQueue(_) => Command::RemoveFromQueue,
            Request::GetSubQueue { .. } => Command::GetSubQueue,
            Request::AddToSubQueue(_) => Command::AddToSubQueue,
            Request::RemoveFromSubQueue(_) => Command::RemoveFromSubQueue,
            Request::GetSubQueueSize => Command::GetSubQueueSize,
            Request::SkipSubQueueSongs(_) => Command::SkipSubQueueSongs,
            Request::GetRepeat => Command::GetRepeat,
            Request::SetRepeat(_) => Command::SetRepeat,
            Request::GetShuffle => Command::GetShuffle,
            Request::SetShuffle(_) => Command::SetShuffle,
            Request::GetSong => Command::GetSong,
            Request::GetStatus => Command::GetStatus,
            Request::GetPosition => Command::GetPosition,
            Request::SetPosition(_) => Command::SetPosition,
        }
    }

    /// Builds the request frame.
    #[must_use]
    pub fn frame(&self) -> Frame {
        let frame = Frame::new(self.command());
        match self {
            Request::SetVolume(value) | Request::SetPosition(value) => frame.arg(value),
            Request::SetQueueIndex(n)
            | Request::RemoveFromQueue(n)
            | Request::RemoveFromSubQueue(n)
            | Request::SkipSubQueueSongs(n) => frame.arg(n),
            Request::GetQueue { start, end } | Request::GetSubQueue { start, end } => {
                frame.arg(start).arg(end)
            }
            Request::SetQueue(songs) => frame.args(songs),
            Request::AddToSubQueue(id) => frame.arg(id),
            Request::SetRepeat(mode) => frame.arg(mode.wire_value()),
            Request::SetShuffle(mode) => frame.arg(mode.wire_value()),
            _ => frame,
        }
    }

    /// Whether an empty payload is a valid response to this request.
    ///
    /// Only list-shaped responses may be empty; for every other request an
    /// empty response means the exchange failed.
    #[must_use]
    pub fn accepts_empty(&self) -> bool {
        matches!(self, Request::GetQueue { .. } | Request::GetSubQueue { .. })
    }

    /// Applies the service's `response` to `state`.
    ///
    /// Follow-up requests are passed to `enqueue` before the cached value
    /// that triggered them is updated.
    ///
    /// When the service confirms a different value than the one requested,
    /// a warning is logged; see each variant for whether the cache follows
    /// the service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::invalid_argument`] if the response does not parse.
    /// The cache is left untouched in that case.
    pub fn apply<F>(
        &self,
        response: &str,
        state: &State,
        config: &Config,
        mut enqueue: F,
    ) -> Result<()>
    where
        F: FnMut(Request),
    {
        match self {
            Request::Reset => {}

            Request::Resume
            | Request::Pause
            | Request::Previous
            | Request::Next
            | Request::GetSong => state.set_current_song(parse(response)?),

            Request::GetVolume | Request::SetVolume(_) => state.set_volume(parse(response)?),

            Request::GetPosition | Request::SetPosition(_) => {
                state.set_position(parse(response)?);
            }

            Request::GetQueueIndex => {
                let index = parse(response)?;
                if state.queue_index() != index {
                    enqueue(Request::full_queue(config));
                    enqueue(Request::full_sub_queue(config));
                }
                state.set_queue_index(index);
            }

            Request::SetQueueIndex(requested) => {
                let index = parse(response)?;
                if index != *requested {
                    warn!("service moved to queue index {index} instead of {requested}");
                }
                if state.queue_index() != index {
                    enqueue(Request::full_queue(config));
                    enqueue(Request::full_sub_queue(config));
                }
                state.set_queue_index(index);
            }

            Request::GetQueueSize => {
                let size = parse(response)?;
                if state.queue_size() != size {
                    enqueue(Request::full_queue(config));
                }
                state.set_queue_size(size);
            }

            Request::GetSubQueueSize => {
                let size = parse(response)?;
                if state.sub_queue_size() != size {
                    enqueue(Request::full_sub_queue(config));
                }
                state.set_sub_queue_size(size);
            }

            Request::GetQueue { .. } => state.replace_queue(parse_list(response)?),
            Request::GetSubQueue { .. } => state.replace_sub_queue(parse_list(response)?),

            Request::SetQueue(songs) => {
                let accepted: usize = parse(response)?;
                if accepted != songs.len() {
                    warn!("service accepted {accepted} of {} queued songs", songs.len());
                }
                // The new queue may have the old length.
                enqueue(Request::full_queue(config));
            }

            Request::RemoveFromQueue(requested)
            | Request::RemoveFromSubQueue(requested)
            | Request::SkipSubQueueSongs(requested) => {
                let confirmed: usize = parse(response)?;
                if confirmed != *requested {
                    warn!(
                        "service confirmed {confirmed} instead of {requested} for {:?}",
                        self.command()
                    );
                }
            }

            Request::AddToSubQueue(requested) => {
                let confirmed: SongId = parse(response)?;
                if confirmed != *requested {
                    warn!("service added song {confirmed} instead of {requested} to sub-queue");
                }
            }

            Request::GetRepeat => state.set_repeat_mode(RepeatMode::from_wire(response)?),

            Request::SetRepeat(requested) => {
                let mode = RepeatMode::from_wire(response)?;
                if mode == *requested {
                    state.set_repeat_mode(mode);
                } else {
                    warn!("service kept repeat {mode} instead of {requested}");
                }
            }

            Request::GetShuffle => state.set_shuffle_mode(ShuffleMode::from_wire(response)?),

            Request::SetShuffle(requested) => {
                let mode = ShuffleMode::from_wire(response)?;
                if mode != *requested {
                    warn!("service kept shuffle {mode} instead of {requested}");
                }
                // Shuffling reorders the queue on the service.
                enqueue(Request::full_queue(config));
                state.set_shuffle_mode(mode);
            }

            Request::GetStatus => state.set_status(Status::from_wire(response)?),
        }

        Ok(())
    }
}
