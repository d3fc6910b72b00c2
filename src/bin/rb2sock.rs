use std::process::ExitCode;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use clap::Parser;
use daq_evtstream::{
    logging, EnqueueResult, EventQueue, EventSocketChannel, ForwarderExit, FramedBuffer,
    QueueBuilder, QueueToSocketForwarder, StreamConfig, EXIT_INTERRUPTED, MAXEVTSIZE,
};
use tracing::{debug, error, info, warn};

/// How long Ctrl+C waits for room to queue the terminate.
const TERMINATE_DEADLINE: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "rb2sock")]
#[command(about = "Drain an event queue into a TCP connection", long_about = None)]
struct Args {
    /// Name of the local event queue
    queue_name: String,
    remote_host: String,
    remote_port: u16,

    #[arg(long, default_value_t = 128 * 1024 * 1024, help = "Queue band size in bytes when creating")]
    queue_size: usize,
    #[arg(long, default_value_t = MAXEVTSIZE, help = "Largest frame accepted, header included")]
    max_event_size: usize,
    #[arg(long, default_value = "info", help = "Log level (error, warn, info, debug, trace)")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(&args.log_level);
    debug!(?args, "rb2sock configuration");

    let config = StreamConfig::new()
        .with_queue_size(args.queue_size)
        .with_max_event_size(args.max_event_size);

    let queue = match QueueBuilder::from_config(args.queue_name.as_str(), &config).open() {
        Ok(queue) => queue,
        Err(e) => {
            error!(error = %e, "cannot open queue");
            return ExitCode::FAILURE;
        }
    };

    // Ctrl+C injects a terminate so everything already queued is still sent.
    // If the queue stays full the process exits instead; a second Ctrl+C always does.
    let name = args.queue_name.clone();
    let retry = config.enqueue_retry;
    let presses = AtomicU32::new(0);
    let handler = ctrlc::set_handler(move || {
        if presses.fetch_add(1, Ordering::AcqRel) > 0 {
            warn!("interrupted again, exiting");
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        }
        warn!("interrupted, queueing terminate");
        let queued = EventQueue::attach(&name).and_then(|q| {
            q.enqueue_timeout(&FramedBuffer::terminate().to_bytes(), TERMINATE_DEADLINE, retry)
        });
        match queued {
            Ok(EnqueueResult::Enqueued) => {}
            Ok(EnqueueResult::WouldBlock) => {
                error!(waited = ?TERMINATE_DEADLINE, "queue stayed full, exiting without terminate");
                std::process::exit(i32::from(EXIT_INTERRUPTED));
            }
            Err(e) => {
                error!(error = %e, "cannot queue terminate");
                std::process::exit(i32::from(EXIT_INTERRUPTED));
            }
        }
    });
    if let Err(e) = handler {
        warn!(error = %e, "Ctrl+C handler not installed");
    }

    let channel =
        match EventSocketChannel::connect_sender_with(&args.remote_host, args.remote_port, &config) {
            Ok(channel) => channel,
            Err(e) => {
                error!(error = %e, "cannot connect");
                return ExitCode::FAILURE;
            }
        };

    let mut forwarder = QueueToSocketForwarder::new(queue, channel, &config);
    match forwarder.run() {
        Ok(ForwarderExit::Terminated) => {
            info!(forwarded = forwarder.forwarded(), "rb2sock finished");
            ExitCode::SUCCESS
        }
        Ok(ForwarderExit::Disconnected) => {
            warn!(forwarded = forwarder.forwarded(), "rb2sock stopped without terminate");
            ExitCode::SUCCESS
        }
        Ok(ForwarderExit::Interrupted) => ExitCode::from(EXIT_INTERRUPTED),
        Err(e) => {
            error!(error = %e, forwarded = forwarder.forwarded(), "rb2sock failed");
            ExitCode::FAILURE
        }
    }
}
