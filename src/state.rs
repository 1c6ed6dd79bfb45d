//! Cached playback state.
//!
//! The cache is written only by the client's processing loop, when it
//! applies responses, and read by any thread. Scalars are stored in atomics
//! so reads never block and are never torn. The main queue and sub-queue
//! each sit behind their own mutex, separate from the outbound request
//! queue, so that readers never wait on protocol traffic.
//!
//! Values are eventually consistent: every scalar is re-polled once per
//! refresh interval, which bounds how stale a read can be while connected.

use std::sync::{
    atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicU8, AtomicUsize, Ordering},
    Mutex, MutexGuard, PoisonError,
};

use crate::protocol::{RepeatMode, ShuffleMode, SongId, Status};

/// `f64` stored as its bit pattern.
#[derive(Debug)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// Locks `mutex`, recovering the data if a holder panicked.
///
/// Sequences are replaced wholesale under the lock, so a poisoned lock
/// still guards a coherent value.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A cached song-id sequence with its "changed since last read" flag.
#[derive(Debug, Default)]
struct Sequence {
    songs: Mutex<Vec<SongId>>,
    changed: AtomicBool,
}

impl Sequence {
    fn songs(&self) -> Vec<SongId> {
        lock(&self.songs).clone()
    }

    fn replace(&self, songs: Vec<SongId>) {
        *lock(&self.songs) = songs;
        self.changed.store(true, Ordering::Release);
    }

    fn take_changed(&self) -> bool {
        self.changed.swap(false, Ordering::AcqRel)
    }
}

/// Local mirror of the playback service's state.
#[derive(Debug)]
pub struct State {
    current_song: AtomicI32,
    position: AtomicF64,
    volume: AtomicF64,
    status: AtomicU8,
    repeat: AtomicU8,
    shuffle: AtomicU8,
    queue_index: AtomicUsize,
    queue_size: AtomicUsize,
    sub_queue_size: AtomicUsize,
    queue: Sequence,
    sub_queue: Sequence,
}

impl Default for State {
    fn default() -> Self {
        Self {
            current_song: AtomicI32::new(-1),
            position: AtomicF64::new(0.0),
            volume: AtomicF64::new(100.0),
            status: AtomicU8::new(Status::Stopped.wire_value()),
            repeat: AtomicU8::new(RepeatMode::Off.wire_value()),
            shuffle: AtomicU8::new(ShuffleMode::Off.wire_value()),
            queue_index: AtomicUsize::new(0),
            queue_size: AtomicUsize::new(0),
            sub_queue_size: AtomicUsize::new(0),
            queue: Sequence::default(),
            sub_queue: Sequence::default(),
        }
    }
}

impl State {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently playing song, if any.
    #[must_use]
    pub fn current_song(&self) -> Option<SongId> {
        let id = self.current_song.load(Ordering::Acquire);
        (id >= 0).then_some(id)
    }

    /// Playback position in seconds.
    #[must_use]
    pub fn position(&self) -> f64 {
        self.position.load()
    }

    /// Volume between 0 and 100.
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.volume.load()
    }

    #[must_use]
    pub fn status(&self) -> Status {
        Status::try_from(self.status.load(Ordering::Acquire)).unwrap_or_default()
    }

    #[must_use]
    pub fn repeat_mode(&self) -> RepeatMode {
        RepeatMode::try_from(self.repeat.load(Ordering::Acquire)).unwrap_or_default()
    }

    #[must_use]
    pub fn shuffle_mode(&self) -> ShuffleMode {
        ShuffleMode::try_from(self.shuffle.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Index of the playing song in the main queue.
    #[must_use]
    pub fn queue_index(&self) -> usize {
        self.queue_index.load(Ordering::Acquire)
    }

    /// Size of the main queue as last polled.
    #[must_use]
    pub fn queue_size(&self) -> usize {
        self.queue_size.load(Ordering::Acquire)
    }

    /// Size of the sub-queue as last polled.
    #[must_use]
    pub fn sub_queue_size(&self) -> usize {
        self.sub_queue_size.load(Ordering::Acquire)
    }

    /// Snapshot of the main queue.
    #[must_use]
    pub fn queue(&self) -> Vec<SongId> {
        self.queue.songs()
    }

    /// Snapshot of the sub-queue.
    #[must_use]
    pub fn sub_queue(&self) -> Vec<SongId> {
        self.sub_queue.songs()
    }

    /// Returns whether the main queue was refetched since the last call.
    pub fn queue_changed(&self) -> bool {
        self.queue.take_changed()
    }

    /// Returns whether the sub-queue was refetched since the last call.
    pub fn sub_queue_changed(&self) -> bool {
        self.sub_queue.take_changed()
    }

    pub(crate) fn set_current_song(&self, id: SongId) {
        self.current_song.store(id, Ordering::Release);
    }

    pub(crate) fn set_position(&self, seconds: f64) {
        self.position.store(seconds);
    }

    pub(crate) fn set_volume(&self, volume: f64) {
        self.volume.store(volume);
    }

    pub(crate) fn set_status(&self, status: Status) {
        self.status.store(status.wire_value(), Ordering::Release);
    }

    pub(crate) fn set_repeat_mode(&self, mode: RepeatMode) {
        self.repeat.store(mode.wire_value(), Ordering::Release);
    }

    pub(crate) fn set_shuffle_mode(&self, mode: ShuffleMode) {
        self.shuffle.store(mode.wire_value(), Ordering::Release);
    }

    pub(crate) fn set_queue_index(&self, index: usize) {
        self.queue_index.store(index, Ordering::Release);
    }

    pub(crate) fn set_queue_size(&self, size: usize) {
        self.queue_size.store(size, Ordering::Release);
    }

    pub(crate) fn set_sub_queue_size(&self, size: usize) {
        self.sub_queue_size.store(size, Ordering::Release);
    }

    pub(crate) fn replace_queue(&self, songs: Vec<SongId>) {
        self.queue.replace(songs);
    }

    pub(crate) fn replace_sub_queue(&self, songs: Vec<SongId>) {
        self.sub_queue.replace(songs);
    }
}
