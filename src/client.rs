//! Client for the playback service.
//!
//! The client funnels every request through a single FIFO that is drained
//! by one background thread, the processing loop. Consumer threads only
//! ever append to that queue and read the cached [`State`], so none of them
//! block on network I/O. The exceptions are the `wait_*` helpers, which
//! block the calling thread until their own request has been answered.
//!
//! # Lifecycle
//!
//! * Construction connects, checks the protocol version and fetches both
//!   queues.
//! * Once per refresh interval the loop enqueues the refresh battery, so
//!   cached values are never older than one interval while connected.
//! * Any failed exchange latches the error flag and discards every queued
//!   request. The client does not retry on its own: call
//!   [`Client::reconnect`] to clear the flag.
//! * [`Client::shutdown`] stops the loop after its current iteration and
//!   closes the connection.
//!
//! # Example
//!
//! ```no_run
//! use playctl::{client::Client, config::Config};
//!
//! let client = Client::new(Config::default())?;
//! if client.error() {
//!     client.reconnect()?;
//! }
//!
//! client.set_volume(40.0);
//! let index = client.wait_queue_index()?;
//! println!("playing {:?} at {index}", client.state().current_song());
//! ```

use std::{
    collections::VecDeque,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering},
        mpsc::{self, SyncSender},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Instant,
};

use crate::{
    config::Config,
    error::{Error, Result},
    protocol::{Command, Frame, RepeatMode, ShuffleMode, SongId, VERSION},
    request::Request,
    state::{lock, State},
    transport::{ConnectionState, TcpTransport, Transport},
};

/// A request waiting in the outbound queue.
struct Pending {
    request: Request,

    /// Receives the raw response once the request has been applied.
    /// Dropping it unanswered wakes the waiter with an error.
    completion: Option<SyncSender<String>>,
}

/// State shared between consumer threads and the processing loop.
struct Shared {
    config: Config,
    state: State,

    /// Outbound FIFO. Only held to push or pop.
    outbound: Mutex<VecDeque<Pending>>,

    /// Held by the processing loop for a whole drain, and by reconnects.
    transport: Mutex<Box<dyn Transport>>,

    /// Last known [`ConnectionState`] of `transport`, readable without its
    /// lock.
    connection: AtomicU8,

    /// Set until a handshake succeeds, and after any failed exchange.
    error: AtomicBool,
    exit: AtomicBool,
}

impl Shared {
    fn new(config: Config, transport: Box<dyn Transport>) -> Self {
        Self {
            config,
            state: State::new(),
            outbound: Mutex::new(VecDeque::new()),
            transport: Mutex::new(transport),
            connection: AtomicU8::new(ConnectionState::Disconnected as u8),
            error: AtomicBool::new(true),
            exit: AtomicBool::new(false),
        }
    }

    /// Appends to the outbound queue. Returns `false` and drops `pending`
    /// when the client is errored or exiting.
    fn enqueue(&self, pending: Pending) -> bool {
        let mut outbound = lock(&self.outbound);
        if self.error.load(Ordering::Acquire) || self.exit.load(Ordering::Acquire) {
            trace!("dropping {:?}: client not connected", pending.request);
            return false;
        }

        outbound.push_back(pending);
        true
    }

    fn submit(&self, request: Request) {
        self.enqueue(Pending {
            request,
            completion: None,
        });
    }

    /// Enqueues `request` and blocks until it has been answered.
    fn submit_and_wait(&self, request: Request) -> Result<String> {
        let (tx, rx) = mpsc::sync_channel(1);
        let command = request.command();
        if !self.enqueue(Pending {
            request,
            completion: Some(tx),
        }) {
            return Err(Error::unavailable("not connected to playback service"));
        }

        rx.recv().map_err(|e| {
            debug!("{command:?} was discarded before completion");
            e.into()
        })
    }

    fn publish(&self, transport: &dyn Transport) {
        self.connection
            .store(transport.state() as u8, Ordering::Release);
    }

    /// Latches the error flag and discards every queued request.
    fn fail(&self, reason: &Error) {
        let discarded = {
            let mut outbound = lock(&self.outbound);
            self.error.store(true, Ordering::Release);
            std::mem::take(&mut *outbound)
        };

        error!("{reason}; cleared {} queued request(s)", discarded.len());
    }

    /// Opens a fresh connection and checks the protocol version.
    fn handshake(transport: &mut dyn Transport) -> Result<()> {
        transport.connect()?;

        let frame = Frame::new(Command::Version).encode()?;
        transport.write(&frame)?;
        let response = transport.read()?;
        if response.is_empty() {
            return Err(Error::unavailable("empty protocol version response"));
        }

        let version: i32 = response.trim().parse()?;
        if version != VERSION {
            return Err(Error::failed_precondition(format!(
                "protocol version mismatch (service: {version}, client: {VERSION})"
            )));
        }

        Ok(())
    }

    fn reconnect(&self) -> Result<()> {
        let mut transport = lock(&self.transport);
        if let Err(e) = Self::handshake(transport.as_mut()) {
            transport.close();
            self.publish(&**transport);
            drop(transport);
            self.fail(&e);
            return Err(e);
        }
        self.publish(&**transport);
        drop(transport);

        self.error.store(false, Ordering::Release);
        info!("connected to playback service (protocol version {VERSION})");

        self.submit(Request::full_queue(&self.config));
        self.submit(Request::full_sub_queue(&self.config));
        Ok(())
    }

    /// Sends one request and reads its response.
    fn exchange(transport: &mut dyn Transport, request: &Request, frame: &str) -> Result<String> {
        transport.write(frame)?;
        let response = transport.read()?;
        if response.is_empty() && !request.accepts_empty() {
            return Err(Error::unavailable(format!(
                "empty response to {:?}",
                request.command()
            )));
        }
        Ok(response)
    }

    /// Services queued requests in order until the queue is empty or an
    /// exchange fails. Returns the number of requests answered.
    fn drain(&self) -> usize {
        let started = Instant::now();
        let mut transport = lock(&self.transport);
        let mut drained = 0;

        loop {
            let Some(pending) = lock(&self.outbound).pop_front() else {
                break;
            };

            let frame = match pending.request.frame().encode() {
                Ok(frame) => frame,
                Err(e) => {
                    error!("not sending {:?}: {e}", pending.request);
                    continue;
                }
            };

            let result = Self::exchange(transport.as_mut(), &pending.request, &frame).and_then(
                |response| {
                    pending.request.apply(&response, &self.state, &self.config, |follow_up| {
                        self.submit(follow_up);
                    })?;
                    Ok(response)
                },
            );

            match result {
                Ok(response) => {
                    if let Some(completion) = pending.completion {
                        // The waiter may have given up already.
                        let _ = completion.try_send(response);
                    }
                    drained += 1;
                }
                Err(e) => {
                    self.fail(&Error::new(
                        e.kind,
                        format!("error processing request queue: {e}"),
                    ));
                    // Only wake the waiter once the error flag is visible.
                    drop(pending);
                    break;
                }
            }
        }

        self.publish(&**transport);
        if drained > 0 {
            trace!("drained {drained} request(s) in {:?}", started.elapsed());
        }
        drained
    }

    /// Runs one iteration of the processing loop.
    fn iterate(&self, last_refresh: &mut Instant) {
        if self.error.load(Ordering::Acquire) {
            thread::sleep(self.config.error_backoff);
            return;
        }

        let drained = self.drain();

        let refresh_due = last_refresh.elapsed() >= self.config.refresh_interval;
        if refresh_due {
            for request in Request::refresh_battery() {
                self.submit(request);
            }
            *last_refresh = Instant::now();
        }

        if drained == 0 && !refresh_due {
            thread::sleep(self.config.idle_sleep);
        }
    }

    fn run(&self) {
        debug!("processing loop started");
        let mut last_refresh = Instant::now();
        while !self.exit.load(Ordering::Acquire) {
            self.iterate(&mut last_refresh);
        }

        // Wake any waiters that are still queued.
        lock(&self.outbound).clear();
        debug!("processing loop stopped");
    }
}

/// Thread-safe handle to the playback service.
///
/// All request methods are fire-and-forget: they return immediately and
/// their effect shows up in [`Client::state`] once the service answered.
/// Requests made while [`Client::error`] is set are silently dropped.
pub struct Client {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Client {
    /// Connects to the service at the configured address.
    ///
    /// A failed connection does not fail construction: the client starts
    /// in its error state, see [`Client::reconnect`].
    ///
    /// # Errors
    ///
    /// Returns an error if the processing thread cannot be spawned.
    pub fn new(config: Config) -> Result<Self> {
        let transport = TcpTransport::new(config.address, config.timeout);
        Self::with_transport(config, transport)
    }

    /// Like [`Client::new`], over a caller supplied transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the processing thread cannot be spawned.
    pub fn with_transport<T>(config: Config, transport: T) -> Result<Self>
    where
        T: Transport + 'static,
    {
        let shared = Arc::new(Shared::new(config, Box::new(transport)));

        if let Err(e) = shared.reconnect() {
            warn!("starting disconnected: {e}");
        }

        let worker = thread::Builder::new()
            .name(env!("CARGO_PKG_NAME").to_owned())
            .spawn({
                let shared = Arc::clone(&shared);
                move || shared.run()
            })?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Cached playback state.
    #[must_use]
    pub fn state(&self) -> &State {
        &self.shared.state
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Whether the connection is unusable. While set, cached state may be
    /// stale and requests are dropped.
    #[must_use]
    pub fn error(&self) -> bool {
        self.shared.error.load(Ordering::Acquire)
    }

    /// State of the connection as of the last exchange. Does not wait for
    /// an exchange in progress.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        if self.error() {
            return ConnectionState::Errored;
        }
        ConnectionState::from(self.shared.connection.load(Ordering::Acquire))
    }

    /// Whether the processing loop is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// Recreates the connection and repeats the handshake. On success the
    /// error flag is cleared and both queues are fetched again.
    ///
    /// Waits for a drain in progress to finish first.
    ///
    /// # Errors
    ///
    /// Returns an error if the service is unreachable or speaks another
    /// protocol version. The error flag stays set in that case.
    pub fn reconnect(&self) -> Result<()> {
        self.shared.reconnect()
    }

    /// Resets the service and blocks until it confirmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is errored, or becomes errored before
    /// the service answered.
    pub fn wait_reset(&self) -> Result<()> {
        self.shared.submit_and_wait(Request::Reset).map(|_| ())
    }

    /// Polls the queue index and blocks until the service answered.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is errored, or becomes errored before
    /// the service answered.
    pub fn wait_queue_index(&self) -> Result<usize> {
        let response = self.shared.submit_and_wait(Request::GetQueueIndex)?;
        Ok(response.trim().parse()?)
    }

    pub fn resume(&self) {
        self.shared.submit(Request::Resume);
    }

    pub fn pause(&self) {
        self.shared.submit(Request::Pause);
    }

    pub fn previous(&self) {
        self.shared.submit(Request::Previous);
    }

    pub fn next(&self) {
        self.shared.submit(Request::Next);
    }

    /// Sets the volume, clamped to 0 through 100.
    pub fn set_volume(&self, volume: f64) {
        self.shared.submit(Request::SetVolume(volume.clamp(0.0, 100.0)));
    }

    /// Seeks within the current song.
    ///
    /// The cached position is updated right away and corrected by the
    /// service's answer.
    pub fn set_position(&self, seconds: f64) {
        let seconds = seconds.max(0.0);
        self.shared.state.set_position(seconds);
        self.shared.submit(Request::SetPosition(seconds));
    }

    /// Jumps to the song at `index` in the main queue.
    pub fn set_queue_index(&self, index: usize) {
        self.shared.submit(Request::SetQueueIndex(index));
    }

    /// Replaces the main queue.
    pub fn set_queue(&self, songs: &[SongId]) {
        self.shared.submit(Request::SetQueue(songs.to_vec()));
    }

    pub fn remove_from_queue(&self, position: usize) {
        self.shared.submit(Request::RemoveFromQueue(position));
    }

    /// Appends a song to the play-next sub-queue.
    pub fn add_to_sub_queue(&self, id: SongId) {
        self.shared.submit(Request::AddToSubQueue(id));
    }

    pub fn remove_from_sub_queue(&self, position: usize) {
        self.shared.submit(Request::RemoveFromSubQueue(position));
    }

    /// Drops the next `count` songs of the sub-queue.
    pub fn skip_sub_queue_songs(&self, count: usize) {
        self.shared.submit(Request::SkipSubQueueSongs(count));
    }

    pub fn set_repeat(&self, mode: RepeatMode) {
        self.shared.submit(Request::SetRepeat(mode));
    }

    /// Sets the shuffle mode. The main queue is fetched again afterwards,
    /// because shuffling reorders it.
    pub fn set_shuffle(&self, mode: ShuffleMode) {
        self.shared.submit(Request::SetShuffle(mode));
    }

    /// Fetches the whole main queue.
    pub fn refresh_queue(&self) {
        self.shared.submit(Request::full_queue(&self.shared.config));
    }

    /// Fetches the whole sub-queue.
    pub fn refresh_sub_queue(&self) {
        self.shared.submit(Request::full_sub_queue(&self.shared.config));
    }

    /// Enqueues the refresh battery ahead of schedule.
    pub fn refresh(&self) {
        for request in Request::refresh_battery() {
            self.shared.submit(request);
        }
    }

    /// Signals the processing loop to stop after its current iteration.
    pub fn exit(&self) {
        self.shared.exit.store(true, Ordering::Release);
    }

    /// Stops the processing loop and closes the connection.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.exit();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("processing loop panicked");
            }
            info!("disconnected from playback service");
        }

        let mut transport = lock(&self.shared.transport);
        transport.close();
        self.shared.publish(&**transport);
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.shared.config)
            .field("error", &self.error())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorKind, protocol::DELIMITER};
    use std::time::Duration;

    type Responder = Box<dyn FnMut(&Frame) -> Option<String> + Send>;

    /// Answers like a service with empty queues that echoes every setter.
    /// Returns `None` for requests it cannot answer.
    fn service(frame: &Frame) -> Option<String> {
        let echo = || frame.args.first().cloned();
        let response = match frame.command {
            Command::Version => VERSION.to_string(),
            Command::GetQueue | Command::GetSubQueue => String::new(),
            Command::GetQueueSize
            | Command::GetSubQueueSize
            | Command::GetQueueIndex
            | Command::GetRepeat
            | Command::GetShuffle
            | Command::GetPosition
            | Command::Reset => "0".to_owned(),
            Command::Resume
            | Command::Pause
            | Command::Previous
            | Command::Next
            | Command::GetSong => "-1".to_owned(),
            Command::GetStatus => "3".to_owned(),
            Command::GetVolume => "100".to_owned(),
            Command::SetQueue => frame.args.len().to_string(),
            Command::SetVolume
            | Command::SetQueueIndex
            | Command::RemoveFromQueue
            | Command::AddToSubQueue
            | Command::RemoveFromSubQueue
            | Command::SkipSubQueueSongs
            | Command::SetRepeat
            | Command::SetShuffle
            | Command::SetPosition => echo()?,
        };
        Some(response)
    }

    /// In-memory transport that records every frame written.
    struct ScriptedTransport {
        written: Arc<Mutex<Vec<String>>>,
        responder: Responder,
        reply: Option<String>,
        state: ConnectionState,
    }

    impl ScriptedTransport {
        fn new<F>(responder: F) -> (Self, Arc<Mutex<Vec<String>>>)
        where
            F: FnMut(&Frame) -> Option<String> + Send + 'static,
        {
            let written = Arc::new(Mutex::new(Vec::new()));
            let transport = Self {
                written: Arc::clone(&written),
                responder: Box::new(responder),
                reply: None,
                state: ConnectionState::Disconnected,
            };
            (transport, written)
        }
    }

    impl Transport for ScriptedTransport {
        fn connect(&mut self) -> Result<()> {
            self.state = ConnectionState::Connected;
            Ok(())
        }

        fn write(&mut self, frame: &str) -> Result<()> {
            if self.state != ConnectionState::Connected {
                return Err(Error::unavailable("not connected"));
            }
            self.written.lock().unwrap().push(frame.to_owned());
            self.reply = (self.responder)(&frame.parse().unwrap());
            Ok(())
        }

        fn read(&mut self) -> Result<String> {
            self.reply.take().ok_or_else(|| {
                self.state = ConnectionState::Errored;
                Error::deadline_exceeded("no response")
            })
        }

        fn close(&mut self) {
            self.state = ConnectionState::Disconnected;
        }

        fn state(&self) -> ConnectionState {
            self.state
        }
    }

    /// Configuration that never refreshes on its own.
    fn quiet_config() -> Config {
        Config {
            refresh_interval: Duration::from_secs(3_600),
            idle_sleep: Duration::from_millis(1),
            error_backoff: Duration::from_millis(1),
            ..Config::default()
        }
    }

    fn shared<F>(responder: F) -> (Shared, Arc<Mutex<Vec<String>>>)
    where
        F: FnMut(&Frame) -> Option<String> + Send + 'static,
    {
        let (transport, written) = ScriptedTransport::new(responder);
        (Shared::new(quiet_config(), Box::new(transport)), written)
    }

    fn frame(request: &Request) -> String {
        request.frame().encode().unwrap()
    }

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for condition");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn handshake_gate_blocks_all_requests() {
        let (transport, written) = ScriptedTransport::new(|frame: &Frame| match frame.command {
            Command::Version => Some("2".to_owned()),
            _ => service(frame),
        });
        let mut client = Client::with_transport(quiet_config(), transport).unwrap();
        assert!(client.error());
        assert_eq!(client.connection_state(), ConnectionState::Errored);

        client.next();
        client.set_volume(10.0);
        assert_eq!(
            client.wait_queue_index().unwrap_err().kind,
            ErrorKind::Unavailable
        );
        thread::sleep(Duration::from_millis(20));

        client.shutdown();
        assert_eq!(*written.lock().unwrap(), vec!["0".to_owned()]);
    }

    #[test]
    fn connect_fetches_queues() {
        let (transport, written) = ScriptedTransport::new(|frame: &Frame| match frame.command {
            Command::GetQueue => Some(format!("5{DELIMITER}9{DELIMITER}12")),
            _ => service(frame),
        });
        let mut client = Client::with_transport(quiet_config(), transport).unwrap();
        assert!(!client.error());

        wait_for(|| client.state().queue_changed());
        assert_eq!(client.state().queue(), vec![5, 9, 12]);
        assert!(!client.state().queue_changed());

        client.shutdown();
        let written = written.lock().unwrap();
        assert_eq!(written[1], format!("10{DELIMITER}0{DELIMITER}25000"));
        assert_eq!(written[2], format!("14{DELIMITER}0{DELIMITER}5000"));
    }

    #[test]
    fn requests_are_serviced_in_order() {
        let (shared, written) = shared(service);
        shared.reconnect().unwrap();

        let requests: Vec<Request> = (0..50).map(Request::RemoveFromQueue).collect();
        for request in &requests {
            shared.submit(request.clone());
        }
        assert_eq!(shared.drain(), 52);

        let written = written.lock().unwrap();
        let sent: Vec<&String> = written.iter().skip(3).collect();
        let expected: Vec<String> = requests.iter().map(frame).collect();
        assert_eq!(sent.len(), expected.len());
        assert!(sent.iter().zip(&expected).all(|(a, b)| *a == b));
    }

    #[test]
    fn concurrent_producers_keep_their_order() {
        let (transport, written) = ScriptedTransport::new(service);
        let client = Arc::new(Client::with_transport(quiet_config(), transport).unwrap());

        let producers: Vec<_> = (0..4)
            .map(|t| {
                let client = Arc::clone(&client);
                thread::spawn(move || {
                    for k in 0..25 {
                        client.remove_from_queue(t * 1_000 + k);
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        client.wait_reset().unwrap();

        let written = written.lock().unwrap();
        for t in 0..4 {
            let positions: Vec<usize> = written
                .iter()
                .filter_map(|wire| {
                    let frame: Frame = wire.parse().unwrap();
                    (frame.command == Command::RemoveFromQueue)
                        .then(|| frame.args[0].parse::<usize>().unwrap())
                })
                .filter(|position| position / 1_000 == t)
                .collect();
            let expected: Vec<usize> = (0..25).map(|k| t * 1_000 + k).collect();
            assert_eq!(positions, expected);
        }
    }

    #[test]
    fn failure_discards_remaining_requests() {
        let (shared, written) = shared(|frame: &Frame| match frame.command {
            Command::AddToSubQueue if frame.args[0] == "3" => None,
            _ => service(frame),
        });
        shared.reconnect().unwrap();
        assert_eq!(shared.drain(), 2);

        let receivers: Vec<_> = (1..=5)
            .map(|id| {
                let (tx, rx) = mpsc::sync_channel(1);
                assert!(shared.enqueue(Pending {
                    request: Request::AddToSubQueue(id),
                    completion: Some(tx),
                }));
                rx
            })
            .collect();

        assert_eq!(shared.drain(), 2);
        assert!(shared.error.load(Ordering::Acquire));
        assert!(lock(&shared.outbound).is_empty());

        assert_eq!(receivers[0].try_recv().unwrap(), "1");
        assert_eq!(receivers[1].try_recv().unwrap(), "2");
        for rx in &receivers[2..] {
            assert_eq!(rx.try_recv(), Err(mpsc::TryRecvError::Disconnected));
        }

        let written = written.lock().unwrap();
        assert_eq!(written.len(), 6);
        assert_eq!(written[5], frame(&Request::AddToSubQueue(3)));

        // Nothing is accepted until a reconnect.
        shared.submit(Request::Next);
        assert!(lock(&shared.outbound).is_empty());
    }

    #[test]
    fn empty_response_is_a_failure() {
        let (shared, _) = shared(|frame: &Frame| match frame.command {
            Command::GetSong => Some(String::new()),
            _ => service(frame),
        });
        shared.reconnect().unwrap();
        shared.submit(Request::GetSong);
        shared.submit(Request::GetVolume);
        shared.submit(Request::GetStatus);

        assert_eq!(shared.drain(), 2);
        assert!(shared.error.load(Ordering::Acquire));
        assert!(lock(&shared.outbound).is_empty());
    }

    #[test]
    fn malformed_response_is_a_failure() {
        let (shared, _) = shared(|frame: &Frame| match frame.command {
            Command::GetVolume => Some("loud".to_owned()),
            _ => service(frame),
        });
        shared.reconnect().unwrap();
        shared.submit(Request::GetVolume);
        shared.submit(Request::GetSong);

        assert_eq!(shared.drain(), 2);
        assert!(shared.error.load(Ordering::Acquire));
        assert!((shared.state.volume() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn size_change_refetches_queue_next() {
        let (shared, written) = shared(|frame: &Frame| match frame.command {
            Command::GetQueueSize => Some("3".to_owned()),
            Command::GetQueue => Some(format!("1{DELIMITER}2{DELIMITER}3")),
            _ => service(frame),
        });
        shared.reconnect().unwrap();
        shared.drain();
        written.lock().unwrap().clear();

        shared.submit(Request::GetQueueSize);
        assert_eq!(shared.drain(), 2);
        assert_eq!(
            *written.lock().unwrap(),
            vec![
                frame(&Request::GetQueueSize),
                frame(&Request::full_queue(&shared.config)),
            ]
        );
        assert_eq!(shared.state.queue_size(), 3);
        assert_eq!(shared.state.queue(), vec![1, 2, 3]);
    }

    #[test]
    fn refresh_battery_is_queued_when_due() {
        let (transport, written) = ScriptedTransport::new(service);
        let config = Config {
            refresh_interval: Duration::ZERO,
            ..quiet_config()
        };
        let shared = Shared::new(config, Box::new(transport));
        shared.reconnect().unwrap();
        shared.drain();
        written.lock().unwrap().clear();

        let mut last_refresh = Instant::now();
        shared.iterate(&mut last_refresh);
        assert_eq!(lock(&shared.outbound).len(), 9);

        shared.drain();
        let expected: Vec<String> = Request::refresh_battery().iter().map(frame).collect();
        assert_eq!(*written.lock().unwrap(), expected);
    }

    #[test]
    fn errored_loop_does_no_io() {
        let (shared, written) = shared(service);
        let mut last_refresh = Instant::now();
        shared.iterate(&mut last_refresh);
        assert!(written.lock().unwrap().is_empty());
    }

    #[test]
    fn reconnect_clears_error_and_refetches() {
        let (shared, written) = shared(|frame: &Frame| match frame.command {
            Command::Next => None,
            _ => service(frame),
        });
        shared.reconnect().unwrap();
        shared.submit(Request::Next);
        shared.drain();
        assert!(shared.error.load(Ordering::Acquire));
        written.lock().unwrap().clear();

        shared.reconnect().unwrap();
        assert!(!shared.error.load(Ordering::Acquire));
        assert_eq!(shared.drain(), 2);
        assert_eq!(
            *written.lock().unwrap(),
            vec![
                "0".to_owned(),
                frame(&Request::full_queue(&shared.config)),
                frame(&Request::full_sub_queue(&shared.config)),
            ]
        );
    }

    #[test]
    fn waits_return_answers() {
        let (transport, _) = ScriptedTransport::new(|frame: &Frame| match frame.command {
            Command::GetQueueIndex => Some("7".to_owned()),
            _ => service(frame),
        });
        let client = Client::with_transport(quiet_config(), transport).unwrap();
        client.wait_reset().unwrap();
        assert_eq!(client.wait_queue_index().unwrap(), 7);
        assert_eq!(client.state().queue_index(), 7);
    }

    #[test]
    fn wait_fails_when_request_is_discarded() {
        let (transport, _) = ScriptedTransport::new(|frame: &Frame| match frame.command {
            Command::Reset => None,
            _ => service(frame),
        });
        let client = Client::with_transport(quiet_config(), transport).unwrap();
        assert_eq!(client.wait_reset().unwrap_err().kind, ErrorKind::Cancelled);
        assert!(client.error());
    }

    #[test]
    fn set_position_is_optimistic() {
        let (transport, _) = ScriptedTransport::new(|frame: &Frame| match frame.command {
            Command::Version => Some("2".to_owned()),
            _ => service(frame),
        });
        let client = Client::with_transport(quiet_config(), transport).unwrap();
        client.set_position(42.5);
        assert!((client.state().position() - 42.5).abs() < f64::EPSILON);
    }

    /// Answers like [`service`], but takes `delay` to answer `Next`.
    fn slow_next(delay: Duration) -> impl FnMut(&Frame) -> Option<String> + Send + 'static {
        move |frame: &Frame| {
            if frame.command == Command::Next {
                thread::sleep(delay);
            }
            service(frame)
        }
    }

    #[test]
    fn connection_state_does_not_wait_for_drain() {
        let (transport, written) = ScriptedTransport::new(slow_next(Duration::from_millis(800)));
        let client = Client::with_transport(quiet_config(), transport).unwrap();
        let next = frame(&Request::Next);
        client.next();
        wait_for(|| written.lock().unwrap().contains(&next));

        let started = Instant::now();
        assert_eq!(client.connection_state(), ConnectionState::Connected);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn reconnect_waits_for_drain_in_progress() {
        let (transport, written) = ScriptedTransport::new(slow_next(Duration::from_millis(200)));
        let client = Arc::new(Client::with_transport(quiet_config(), transport).unwrap());
        let next = frame(&Request::Next);
        client.next();
        for position in 0..5 {
            client.remove_from_queue(position);
        }
        wait_for(|| written.lock().unwrap().contains(&next));

        let reconnecting = thread::spawn({
            let client = Arc::clone(&client);
            move || client.reconnect()
        });
        reconnecting.join().unwrap().unwrap();
        assert!(!client.error());
        client.wait_reset().unwrap();

        let config = quiet_config();
        let handshake = [
            "0".to_owned(),
            frame(&Request::full_queue(&config)),
            frame(&Request::full_sub_queue(&config)),
        ];
        let mut expected = handshake.to_vec();
        expected.push(next);
        expected.extend((0..5).map(|position| frame(&Request::RemoveFromQueue(position))));
        expected.extend(handshake);
        expected.push(frame(&Request::Reset));
        assert_eq!(*written.lock().unwrap(), expected);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let (transport, _) = ScriptedTransport::new(service);
        let mut client = Client::with_transport(quiet_config(), transport).unwrap();
        assert!(client.is_running());

        client.shutdown();
        client.shutdown();
        assert!(!client.is_running());
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);

        client.next();
        assert!(client.wait_reset().is_err());
    }
}
