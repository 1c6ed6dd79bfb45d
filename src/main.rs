use std::{error::Error, net::SocketAddr, path::PathBuf, process, time::Duration};

use clap::{command, Parser, Subcommand, ValueHint};
use log::{debug, error, info, LevelFilter};

use playctl::{
    client::Client,
    config::Config,
    protocol::{RepeatMode, ShuffleMode, SongId},
    state::State,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    ///
    /// TOML file with connection and polling settings. Defaults apply to
    /// every setting that is not present.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, env = "PLAYCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Address of the playback service
    ///
    /// [default: 127.0.0.1:3333]
    #[arg(short, long, env = "PLAYCTL_ADDRESS")]
    address: Option<SocketAddr>,

    /// Socket timeout in milliseconds
    #[arg(short, long, value_name = "MS")]
    timeout: Option<u64>,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,

    #[command(subcommand)]
    action: Action,
}

#[derive(Clone, Debug, Subcommand)]
enum Action {
    /// Print the playback state
    Status,
    /// Print the playback state whenever it changes, until interrupted
    Watch,
    /// Print the main queue and the sub-queue
    Queue,
    /// Resume playback
    Play,
    /// Pause playback
    Pause,
    /// Skip to the next song
    Next,
    /// Go back to the previous song
    Previous,
    /// Stop playback and clear both queues
    Reset,
    /// Set the volume (0 to 100)
    Volume { volume: f64 },
    /// Seek within the current song
    Seek { seconds: f64 },
    /// Set the repeat mode (off, one, all)
    Repeat { mode: RepeatMode },
    /// Set the shuffle mode (off, on)
    Shuffle { mode: ShuffleMode },
    /// Play the song at an index of the main queue
    Jump { index: usize },
    /// Replace the main queue
    SetQueue { songs: Vec<SongId> },
    /// Remove the song at a position of the main queue
    Remove { position: usize },
    /// Add songs to the play-next sub-queue
    Enqueue { songs: Vec<SongId> },
    /// Skip songs of the sub-queue
    Skip {
        #[arg(default_value_t = 1)]
        count: usize,
    },
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of the library and binary alike.
        logger.filter_module("playctl", level);
    }

    logger.init();
}

/// Builds the client configuration from the configuration file, if any,
/// and the command line overrides.
fn load_config(args: &Args) -> playctl::error::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(address) = args.address {
        config.address = address;
    }
    if let Some(timeout) = args.timeout {
        config.timeout = Duration::from_millis(timeout);
    }

    Ok(config)
}

fn print_status(state: &State) {
    let song = state
        .current_song()
        .map_or_else(|| String::from("none"), |id| id.to_string());

    println!("status:    {}", state.status());
    println!("song:      {song}");
    println!("position:  {:.1}s", state.position());
    println!("volume:    {:.0}", state.volume());
    println!("repeat:    {}", state.repeat_mode());
    println!("shuffle:   {}", state.shuffle_mode());
    println!("queue:     {}/{}", state.queue_index(), state.queue_size());
    println!("sub-queue: {}", state.sub_queue_size());
}

fn format_songs(songs: &[SongId]) -> String {
    songs
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Blocks until every request submitted so far has been answered.
fn settle(client: &Client) -> playctl::error::Result<()> {
    tokio::task::block_in_place(|| client.wait_queue_index()).map(|_| ())
}

/// Prints the state each refresh interval in which it changed.
async fn watch(client: &Client) -> Result<(), Box<dyn Error>> {
    let mut ticker = tokio::time::interval(client.config().refresh_interval);
    let mut last = None;

    loop {
        tokio::select! {
            // Prioritize shutdown signals.
            biased;

            _ = tokio::signal::ctrl_c() => {
                info!("shutting down gracefully");
                break Ok(());
            }

            _ = ticker.tick() => {
                if client.error() {
                    return Err("lost connection to playback service".into());
                }

                let state = client.state();
                let snapshot = (
                    state.status(),
                    state.current_song(),
                    state.queue_index(),
                    state.repeat_mode(),
                    state.shuffle_mode(),
                    state.volume().to_bits(),
                    // Whole seconds, to print at most once per second.
                    state.position().trunc().to_bits(),
                );
                let queues_changed = state.queue_changed() | state.sub_queue_changed();

                if last != Some(snapshot) || queues_changed {
                    print_status(state);
                    println!();
                    last = Some(snapshot);
                }
            }
        }
    }
}

/// Main application logic.
///
/// # Errors
///
/// Returns an error when the playback service cannot be reached, speaks
/// another protocol version, or the connection breaks while carrying out
/// the action.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args)?;
    let address = config.address;
    let mut client = Client::new(config)?;
    if client.error() {
        // Repeat once to learn why construction could not connect.
        client
            .reconnect()
            .map_err(|e| format!("could not connect to {address}: {e}"))?;
    }

    match args.action {
        Action::Status => {
            client.refresh();
            settle(&client)?;
            print_status(client.state());
        }
        Action::Watch => watch(&client).await?,
        Action::Queue => {
            client.refresh_queue();
            client.refresh_sub_queue();
            settle(&client)?;
            println!("queue:     {}", format_songs(&client.state().queue()));
            println!("sub-queue: {}", format_songs(&client.state().sub_queue()));
        }
        Action::Play => client.resume(),
        Action::Pause => client.pause(),
        Action::Next => client.next(),
        Action::Previous => client.previous(),
        Action::Reset => tokio::task::block_in_place(|| client.wait_reset())?,
        Action::Volume { volume } => client.set_volume(volume),
        Action::Seek { seconds } => client.set_position(seconds),
        Action::Repeat { mode } => client.set_repeat(mode),
        Action::Shuffle { mode } => client.set_shuffle(mode),
        Action::Jump { index } => client.set_queue_index(index),
        Action::SetQueue { songs } => client.set_queue(&songs),
        Action::Remove { position } => client.remove_from_queue(position),
        Action::Enqueue { songs } => {
            for id in songs {
                client.add_to_sub_queue(id);
            }
        }
        Action::Skip { count } => client.skip_sub_queue_songs(count),
    }

    settle(&client)?;
    tokio::task::block_in_place(|| client.shutdown());
    Ok(())
}

/// Main entry point of the application.
///
/// This function initializes the logger facade, parses the command line
/// arguments, and carries out the requested action.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    debug!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
