// Drain framed events from a named queue until the terminate sentinel.
use daq_evtstream::frame::is_terminate_record;
use daq_evtstream::{FramedBuffer, QueueBuilder};
use sha2::{Digest, Sha256};
use std::env;
use std::time::{Duration, Instant};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <queue-name>", args[0]);
        std::process::exit(2);
    }

    let queue = QueueBuilder::new().with_name(args[1].as_str()).open()?;
    println!("Consumer: waiting on '{}'", queue.name());

    let retry = Duration::from_micros(20);
    let mut digest = Sha256::new();
    let mut received = 0usize;
    let mut start = None;

    loop {
        let record = queue.dequeue_blocking(retry);
        start.get_or_insert_with(Instant::now);
        if is_terminate_record(&record) {
            break;
        }
        let frame = FramedBuffer::from_bytes(&record)?;
        digest.update(frame.payload());
        received += 1;

        if received % 100_000 == 0 {
            println!("Consumer: {} events so far", received);
        }
    }

    let elapsed = start.map(|s| s.elapsed()).unwrap_or_default();
    println!(
        "Consumer: received {} events in {:.2?}, digest {:x}",
        received,
        elapsed,
        digest.finalize()
    );
    println!("Consumer: {:?}", queue.stats());
    Ok(())
}
