//! Command-line runner for light sequences
//!
//! Runs one pattern over a list of KNX group addresses. Channel changes are
//! reported through `tracing` rather than written to a bus.
//!
//! ```text
//! myrtio-light-sequencer -a 1/0/1,1/0/2,1/0/3 skip-back --forward-span 3 --back-span 2
//! ```

use std::process::ExitCode;
use std::thread;
use std::time::Duration as StdDuration;

use clap::{Args, Parser, Subcommand};
use embassy_futures::block_on;
use embassy_time::Delay;
use myrtio_light_sequencer::pattern::{
    DEFAULT_BACK_SPAN, DEFAULT_FORWARD_SPAN, DEFAULT_OFF_DELAY, DEFAULT_ON_DELAY,
    DEFAULT_REPEAT_COUNT, DEFAULT_STEP_DELAY, DEFAULT_SWEEP_DELAY, DEFAULT_TOGGLE_OFF_DELAY,
};
use myrtio_light_sequencer::{
    BulkCycleOptions, Duration, GroupAddress, Outcome, PatternId, PatternParams, RequestQueue,
    SequenceController, SequenceError, SequenceRequest, Sequencer, StopSignal,
    TraversalParameters,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod driver;

use driver::TracingDriver;

/// Maximum number of channels a run can address
const MAX_CHANNELS: usize = 256;

/// Request queue size
const REQUEST_QUEUE_SIZE: usize = 4;

const EXIT_DRIVER_ERROR: u8 = 1;
const EXIT_CONFIGURATION_ERROR: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

static REQUESTS: RequestQueue<REQUEST_QUEUE_SIZE> = RequestQueue::new();
static STOP: StopSignal = StopSignal::new();

/// Light sequencer - switch channels in patterns
#[derive(Parser)]
#[command(name = "myrtio-light-sequencer")]
#[command(version)]
#[command(about = "Switch lighting channels on and off in patterns")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Channel addresses in walk order (main/middle/sub, main/sub or raw)
    #[arg(
        short,
        long,
        required = true,
        value_delimiter = ',',
        value_parser = parse_address
    )]
    addresses: Vec<GroupAddress>,

    /// Request a stop after this many milliseconds
    #[arg(long)]
    stop_after_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Switch channels on one by one
    Sweep {
        /// Delay between channels (ms)
        #[arg(long, default_value_t = DEFAULT_SWEEP_DELAY.as_millis())]
        delay_ms: u64,
    },
    /// Switch each channel on and off before moving to the next
    Toggle {
        /// Time each channel stays on (ms)
        #[arg(long, default_value_t = DEFAULT_TOGGLE_OFF_DELAY.as_millis())]
        off_delay_ms: u64,
    },
    /// Switch all channels on and off together
    Bulk(BulkArgs),
    /// Walk forward and back in overlapping spans
    SkipBack(SkipBackArgs),
}

#[derive(Args)]
struct BulkArgs {
    /// Number of on/off cycles
    #[arg(long, default_value_t = DEFAULT_REPEAT_COUNT)]
    repeat: usize,
    /// Delay after switching on, before switching off (ms)
    #[arg(long, default_value_t = DEFAULT_OFF_DELAY.as_millis())]
    off_delay_ms: u64,
    /// Delay after switching off, before switching on again (ms)
    #[arg(long, default_value_t = DEFAULT_ON_DELAY.as_millis())]
    on_delay_ms: u64,
    /// Leave the channels on after the last cycle
    #[arg(long)]
    leave_on: bool,
}

#[derive(Args)]
struct SkipBackArgs {
    /// Channels to move forward before turning back
    #[arg(long, default_value_t = DEFAULT_FORWARD_SPAN)]
    forward_span: usize,
    /// Channels to move back before turning forward
    #[arg(long, default_value_t = DEFAULT_BACK_SPAN)]
    back_span: usize,
    /// Time each visited channel stays on (ms)
    #[arg(long, default_value_t = DEFAULT_STEP_DELAY.as_millis())]
    step_delay_ms: u64,
}

fn parse_address(s: &str) -> Result<GroupAddress, String> {
    GroupAddress::parse_from_str(s).map_err(|e| format!("invalid address '{s}': {e}"))
}

impl Command {
    fn to_request(&self) -> SequenceRequest {
        let mut params = PatternParams::DEFAULT;
        let pattern = match self {
            Self::Sweep { delay_ms } => {
                params.sweep_delay = Duration::from_millis(*delay_ms);
                PatternId::Sweep
            }
            Self::Toggle { off_delay_ms } => {
                params.toggle_off_delay = Duration::from_millis(*off_delay_ms);
                PatternId::Toggle
            }
            Self::Bulk(args) => {
                params.bulk = BulkCycleOptions::DEFAULT
                    .with_repeat_count(args.repeat)
                    .with_delays(
                        Duration::from_millis(args.off_delay_ms),
                        Duration::from_millis(args.on_delay_ms),
                    )
                    .with_leave_on_at_end(args.leave_on);
                PatternId::Bulk
            }
            Self::SkipBack(args) => {
                params.traversal = TraversalParameters::new(
                    args.forward_span,
                    args.back_span,
                    Duration::from_millis(args.step_delay_ms),
                );
                PatternId::SkipBack
            }
        };
        SequenceRequest::new(pattern).with_params(params)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let sequencer = Sequencer::new(TracingDriver::default(), Delay);
    let mut controller = match SequenceController::<_, _, _, MAX_CHANNELS, REQUEST_QUEUE_SIZE>::new(
        REQUESTS.receiver(),
        &cli.addresses,
        sequencer,
    ) {
        Ok(controller) => controller,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(EXIT_CONFIGURATION_ERROR);
        }
    };

    let request = cli.command.to_request();
    info!(
        pattern = request.pattern.as_str(),
        channels = cli.addresses.len(),
        "starting sequence"
    );
    if REQUESTS.sender().try_send(request).is_err() {
        error!("request queue is full");
        return ExitCode::from(EXIT_CONFIGURATION_ERROR);
    }

    if let Some(ms) = cli.stop_after_ms {
        thread::spawn(move || {
            thread::sleep(StdDuration::from_millis(ms));
            warn!("stop requested after {ms} ms");
            STOP.request();
        });
    }

    let result = block_on(controller.run_pending(&STOP));
    let writes = controller.sequencer().driver().writes();

    match result {
        Ok(Outcome::Completed { steps }) => {
            info!(steps, writes, "sequence completed");
            ExitCode::SUCCESS
        }
        Ok(Outcome::Cancelled { steps }) => {
            warn!(steps, writes, "sequence cancelled");
            ExitCode::from(EXIT_CANCELLED)
        }
        Err(e @ SequenceError::Configuration(_)) => {
            error!("{e}");
            ExitCode::from(EXIT_CONFIGURATION_ERROR)
        }
        Err(e @ SequenceError::Driver { .. }) => {
            error!("{e}; channels already switched keep their state");
            ExitCode::from(EXIT_DRIVER_ERROR)
        }
    }
}
