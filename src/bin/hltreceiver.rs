use std::process::ExitCode;

use clap::Parser;
use daq_evtstream::{
    logging, ForwarderExit, Interrupt, QueueBuilder, StreamConfig, StreamReassembler,
    TerminatePolicy, EXIT_INTERRUPTED, MAXEVTSIZE,
};
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "hltreceiver")]
#[command(about = "Collect EOS-delimited messages from TCP sources into an event queue", long_about = None)]
struct Args {
    /// Name of the local event queue
    queue_name: String,
    local_port: u16,

    #[arg(long, default_value_t = 1, help = "Number of source connections to accept")]
    sources: usize,
    #[arg(long, default_value = "first", value_parser = parse_policy, help = "When the session ends: first, all")]
    policy: TerminatePolicy,
    #[arg(long, default_value = "EOS", help = "End-of-segment tag")]
    eos_tag: String,
    #[arg(long, default_value = "Terminate", help = "Message that ends a source")]
    terminate_tag: String,
    #[arg(long, default_value_t = 128 * 1024 * 1024, help = "Queue band size in bytes when creating")]
    queue_size: usize,
    #[arg(long, default_value_t = MAXEVTSIZE, help = "Largest frame accepted, header included")]
    max_event_size: usize,
    #[arg(long, default_value = "info", help = "Log level (error, warn, info, debug, trace)")]
    log_level: String,
}

fn parse_policy(policy: &str) -> Result<TerminatePolicy, String> {
    match policy.to_lowercase().as_str() {
        "first" | "first-source" => Ok(TerminatePolicy::FirstSource),
        "all" | "all-sources" => Ok(TerminatePolicy::AllSources),
        _ => Err(format!(
            "Invalid terminate policy: {}. Valid options: first, all",
            policy
        )),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(&args.log_level);
    debug!(?args, "hltreceiver configuration");

    let interrupt = match Interrupt::install() {
        Ok(interrupt) => interrupt,
        Err(e) => {
            warn!(error = %e, "Ctrl+C handler not installed");
            std::sync::Arc::new(Interrupt::new())
        }
    };

    let config = StreamConfig::new()
        .with_queue_size(args.queue_size)
        .with_max_event_size(args.max_event_size)
        .with_sources(args.sources)
        .with_terminate_policy(args.policy)
        .with_eos_tag(args.eos_tag.as_bytes())
        .with_terminate_tag(args.terminate_tag.as_bytes());

    let queue = match QueueBuilder::from_config(args.queue_name.as_str(), &config).open() {
        Ok(queue) => queue,
        Err(e) => {
            error!(error = %e, "cannot open queue");
            return ExitCode::FAILURE;
        }
    };

    let collector = match StreamReassembler::bind(args.local_port, queue, config) {
        Ok(collector) => collector,
        Err(e) => {
            error!(error = %e, "cannot start collector");
            return ExitCode::FAILURE;
        }
    };

    // The collector polls the stop flag and shuts its sources down itself.
    interrupt.defer();
    match collector.run_until(interrupt.flag()) {
        Ok(ForwarderExit::Terminated) => {
            info!(stats = ?collector.queue().stats(), "hltreceiver finished");
            ExitCode::SUCCESS
        }
        Ok(ForwarderExit::Disconnected) => {
            warn!("all sources left without terminate");
            ExitCode::SUCCESS
        }
        Ok(ForwarderExit::Interrupted) => {
            warn!(stats = ?collector.queue().stats(), "hltreceiver interrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            error!(error = %e, "hltreceiver failed");
            ExitCode::FAILURE
        }
    }
}
