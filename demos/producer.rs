// Enqueue framed events into a named queue, then a terminate sentinel.
use daq_evtstream::{FramedBuffer, QueueBuilder};
use sha2::{Digest, Sha256};
use std::env;
use std::time::{Duration, Instant};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <queue-name> <num_messages>", args[0]);
        std::process::exit(2);
    }

    let name = &args[1];
    let num_messages: usize = args[2].parse()?;

    let queue = QueueBuilder::new().with_name(name.as_str()).open()?;
    println!("Producer: queue '{}' ({} bytes)", queue.name(), queue.capacity());

    let retry = Duration::from_micros(20);
    let mut digest = Sha256::new();
    let start = Instant::now();

    for i in 0..num_messages {
        let payload = format!("message_{}", i);
        digest.update(payload.as_bytes());
        queue.enqueue_blocking(&FramedBuffer::new(payload).to_bytes(), retry)?;
    }
    queue.enqueue_blocking(&FramedBuffer::terminate().to_bytes(), retry)?;

    println!(
        "Producer: sent {} events in {:.2?}, digest {:x}",
        num_messages,
        start.elapsed(),
        digest.finalize()
    );
    Ok(())
}
