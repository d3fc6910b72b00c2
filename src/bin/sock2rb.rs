use std::process::ExitCode;

use clap::Parser;
use daq_evtstream::{
    logging, EventSocketChannel, ForwarderExit, Interrupt, QueueBuilder, SocketToQueueForwarder,
    StreamConfig, EXIT_INTERRUPTED, MAXEVTSIZE,
};
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "sock2rb")]
#[command(about = "Receive framed events over TCP into an event queue", long_about = None)]
struct Args {
    /// Name of the local event queue
    queue_name: String,
    local_port: u16,

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
    debug!(?args, "sock2rb configuration");

    // Until a sender is connected an interrupt exits at once.
    let interrupt = match Interrupt::install() {
        Ok(interrupt) => interrupt,
        Err(e) => {
            warn!(error = %e, "Ctrl+C handler not installed");
            std::sync::Arc::new(Interrupt::new())
        }
    };

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

    let channel =
        match EventSocketChannel::listen_receiver_with(("0.0.0.0", args.local_port), true, &config) {
            Ok(channel) => channel,
            Err(e) => {
                error!(error = %e, "cannot accept a sender");
                return ExitCode::FAILURE;
            }
        };

    match channel.try_clone_stream() {
        Ok(stream) => interrupt.watch(stream),
        Err(e) => {
            error!(error = %e, "cannot watch the connection");
            return ExitCode::FAILURE;
        }
    }

    let mut forwarder = SocketToQueueForwarder::new(channel, queue, &config);
    match forwarder.run_until(interrupt.flag()) {
        Ok(ForwarderExit::Terminated) => {
            info!(forwarded = forwarder.forwarded(), "sock2rb finished");
            ExitCode::SUCCESS
        }
        Ok(ForwarderExit::Disconnected) => {
            warn!(forwarded = forwarder.forwarded(), "sender left without terminate");
            ExitCode::SUCCESS
        }
        Ok(ForwarderExit::Interrupted) => {
            warn!(forwarded = forwarder.forwarded(), "sock2rb interrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            error!(error = %e, forwarded = forwarder.forwarded(), "sock2rb failed");
            ExitCode::FAILURE
        }
    }
}
