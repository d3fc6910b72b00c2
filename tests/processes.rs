// Queues shared between separate processes.

mod common;

#[cfg(target_os = "linux")]
mod linux {
    use super::common::TestQueueName;
    use daq_evtstream::frame::is_terminate_record;
    use daq_evtstream::Core::futex::lock_word;
    use daq_evtstream::Core::region::QueueRegion;
    use daq_evtstream::{DequeueResult, EnqueueResult, EventQueue, FramedBuffer};
    use sha2::{Digest, Sha256};
    use std::process::Command;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    const RETRY: Duration = Duration::from_micros(20);
    /// Small enough that both sides wrap the band and block on each other.
    const QUEUE_SIZE: usize = 4096;
    const EVENTS: usize = 2000;
    const CHILD_QUEUE_ENV: &str = "DAQ_EVTSTREAM_TEST_PRODUCER_QUEUE";

    fn payload(i: usize) -> Vec<u8> {
        let len = 1 + (i * 37) % 300;
        let mut p = format!("event_{i}_").into_bytes();
        p.resize(len.max(p.len()), (i % 251) as u8);
        p
    }

    /// Producer half of the cross-process test. Only does work when started
    /// by `test_events_cross_process_boundary` with the queue name in the env.
    #[test]
    fn child_producer() {
        let Ok(name) = std::env::var(CHILD_QUEUE_ENV) else {
            return;
        };
        let queue = EventQueue::open(&name, QUEUE_SIZE).unwrap();
        for i in 0..EVENTS {
            queue
                .enqueue_blocking(&FramedBuffer::new(payload(i)).to_bytes(), RETRY)
                .unwrap();
        }
        queue
            .enqueue_blocking(&FramedBuffer::terminate().to_bytes(), RETRY)
            .unwrap();
    }

    #[test]
    fn test_events_cross_process_boundary() {
        let name = TestQueueName::new("xproc");

        let mut child = Command::new(std::env::current_exe().unwrap())
            .args(["linux::child_producer", "--exact", "--nocapture", "--test-threads=1"])
            .env(CHILD_QUEUE_ENV, name.as_str())
            .spawn()
            .unwrap();

        // Races the child's open: one side creates, the other attaches.
        let queue = EventQueue::open(name.as_str(), QUEUE_SIZE).unwrap();

        let mut expected = Sha256::new();
        let mut received = Sha256::new();
        let mut count = 0usize;
        loop {
            let record = queue
                .dequeue_timeout(Duration::from_secs(30), RETRY)
                .expect("producer process stalled");
            if is_terminate_record(&record) {
                break;
            }
            let frame = FramedBuffer::from_bytes(&record).unwrap();
            let want = payload(count);
            assert_eq!(frame.payload(), &want[..], "event {count} out of order");
            expected.update(&want);
            received.update(frame.payload());
            count += 1;
        }

        assert!(child.wait().unwrap().success());
        assert_eq!(count, EVENTS);
        assert_eq!(received.finalize(), expected.finalize());
        assert_eq!(queue.try_dequeue(), DequeueResult::Empty);
    }

    #[test]
    fn test_lock_recovered_after_holder_process_dies() {
        let name = TestQueueName::new("deadholder");
        let queue = EventQueue::open(name.as_str(), QUEUE_SIZE).unwrap();
        assert_eq!(queue.try_enqueue(b"survivor").unwrap(), EnqueueResult::Enqueued);

        let region = QueueRegion::attach(name.as_str()).unwrap();
        let header = region.header_ptr();

        // The child inherits the mapping, takes the lock and exits holding it.
        let pid = unsafe { libc::fork() };
        assert!(pid >= 0);
        if pid == 0 {
            unsafe {
                lock_word(&(*header).lock);
                libc::_exit(0);
            }
        }
        let mut status = 0;
        assert_eq!(unsafe { libc::waitpid(pid, &mut status, 0) }, pid);

        let (tx, rx) = mpsc::channel();
        let handle = EventQueue::attach(name.as_str()).unwrap();
        thread::spawn(move || {
            let _ = tx.send(handle.try_dequeue());
        });
        let got = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("dequeue stayed blocked on the dead holder's lock");
        assert_eq!(got, DequeueResult::Record(b"survivor".to_vec()));

        // The recovered lock is released normally afterwards.
        assert_eq!(queue.try_enqueue(b"next").unwrap(), EnqueueResult::Enqueued);
        assert_eq!(queue.try_dequeue().into_record().unwrap(), b"next".to_vec());
    }
}
