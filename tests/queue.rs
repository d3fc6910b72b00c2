// BoundedEventQueue behaviour: FIFO order, all-or-nothing admission, sharing by name.

mod common;

use common::TestQueueName;
use daq_evtstream::{DequeueResult, EnqueueResult, EventQueue, QueueBuilder, QueueError};
use serial_test::serial;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const RETRY: Duration = Duration::from_micros(20);

#[test]
fn test_fifo_order() {
    let name = TestQueueName::new("fifo");
    let queue = EventQueue::open(name.as_str(), 4096).unwrap();
    assert!(queue.is_creator());
    assert!(queue.is_empty());

    for record in [&b"A"[..], b"BB", b"", b"CCC"] {
        assert_eq!(queue.try_enqueue(record).unwrap(), EnqueueResult::Enqueued);
    }
    assert_eq!(queue.len(), 4);

    let mut drained = Vec::new();
    while let DequeueResult::Record(r) = queue.try_dequeue() {
        drained.push(r);
    }
    assert_eq!(drained, vec![b"A".to_vec(), b"BB".to_vec(), vec![], b"CCC".to_vec()]);
    assert_eq!(queue.try_dequeue(), DequeueResult::Empty);
}

#[test]
fn test_would_block_leaves_queue_unchanged() {
    let name = TestQueueName::new("full");
    let queue = EventQueue::open(name.as_str(), 64).unwrap();

    // 4-byte length prefix + 60 bytes fills the band exactly
    assert_eq!(queue.try_enqueue(&[7u8; 60]).unwrap(), EnqueueResult::Enqueued);
    let before = queue.stats();
    assert_eq!(before.free_bytes(), 0);

    assert_eq!(queue.try_enqueue(b"").unwrap(), EnqueueResult::WouldBlock);
    assert_eq!(queue.stats(), before);

    assert_eq!(queue.try_dequeue().into_record().unwrap(), vec![7u8; 60]);
    assert_eq!(queue.try_enqueue(b"x").unwrap(), EnqueueResult::Enqueued);
}

#[test]
fn test_record_too_large() {
    let name = TestQueueName::new("toolarge");
    let queue = EventQueue::open(name.as_str(), 64).unwrap();
    assert_eq!(queue.max_record_len(), 60);

    let err = queue.try_enqueue(&[0u8; 61]).unwrap_err();
    assert!(matches!(err, QueueError::RecordTooLarge { len: 61, capacity: 64 }));
    assert!(matches!(
        queue.enqueue_blocking(&[0u8; 61], RETRY),
        Err(QueueError::RecordTooLarge { .. })
    ));
    assert!(queue.is_empty());
}

#[test]
fn test_wraparound_keeps_records_intact() {
    let name = TestQueueName::new("wrap");
    let queue = EventQueue::open(name.as_str(), 100).unwrap();

    for round in 0..50u8 {
        let record: Vec<u8> = (0..(round as usize % 23) + 1).map(|i| round ^ i as u8).collect();
        queue.try_enqueue(&record).unwrap();
        queue.try_enqueue(&record).unwrap();
        assert_eq!(queue.try_dequeue().into_record().unwrap(), record);
        assert_eq!(queue.try_dequeue().into_record().unwrap(), record);
    }
    let stats = queue.stats();
    assert_eq!(stats.total_enqueued, 100);
    assert_eq!(stats.total_dequeued, 100);
    assert_eq!(stats.used_bytes, 0);
}

#[test]
fn test_second_handle_shares_records() {
    let name = TestQueueName::new("share");
    let producer = EventQueue::open(name.as_str(), 4096).unwrap();
    let consumer = EventQueue::attach(name.as_str()).unwrap();
    assert!(!consumer.is_creator());
    assert_eq!(consumer.capacity(), 4096);

    producer.try_enqueue(b"hello").unwrap();
    assert_eq!(consumer.try_dequeue().into_record().unwrap(), b"hello");
    assert!(producer.is_empty());
}

#[test]
fn test_open_existing_with_other_size() {
    let name = TestQueueName::new("incompat");
    let _first = EventQueue::open(name.as_str(), 4096).unwrap();

    let same = EventQueue::open(name.as_str(), 4096).unwrap();
    assert!(!same.is_creator());

    let err = EventQueue::open(name.as_str(), 8192).unwrap_err();
    assert!(matches!(
        err,
        QueueError::Incompatible { existing: 4096, requested: 8192, .. }
    ));
}

#[test]
fn test_invalid_arguments() {
    assert!(matches!(
        EventQueue::open("a/b", 4096),
        Err(QueueError::NameInvalid(_))
    ));
    let name = TestQueueName::new("small");
    assert!(matches!(
        EventQueue::open(name.as_str(), 8),
        Err(QueueError::InvalidSize { requested: 8, .. })
    ));
    let missing = TestQueueName::new("missing");
    assert!(matches!(
        EventQueue::attach(missing.as_str()),
        Err(QueueError::Attach { .. })
    ));
}

#[test]
fn test_unlink() {
    let name = TestQueueName::new("unlink");
    let queue = EventQueue::open(name.as_str(), 4096).unwrap();
    EventQueue::unlink(name.as_str()).unwrap();

    // Existing handle keeps working; a new open creates a fresh queue
    queue.try_enqueue(b"still here").unwrap();
    let fresh = EventQueue::open(name.as_str(), 4096).unwrap();
    assert!(fresh.is_creator());
    assert!(fresh.is_empty());
    assert_eq!(queue.try_dequeue().into_record().unwrap(), b"still here");
}

#[test]
fn test_builder() {
    let name = TestQueueName::new("builder");
    let created = QueueBuilder::new()
        .with_name(name.as_str())
        .with_size(1024)
        .open()
        .unwrap();
    let attached = QueueBuilder::new()
        .with_name(name.as_str())
        .attach_only(true)
        .open()
        .unwrap();
    assert_eq!(attached.capacity(), created.capacity());
}

#[test]
#[serial]
fn test_dequeue_timeout() {
    let name = TestQueueName::new("timeout");
    let queue = EventQueue::open(name.as_str(), 1024).unwrap();
    assert_eq!(queue.dequeue_timeout(Duration::from_millis(20), RETRY), None);
    queue.try_enqueue(b"late").unwrap();
    assert_eq!(
        queue.dequeue_timeout(Duration::from_millis(20), RETRY),
        Some(b"late".to_vec())
    );
}

#[test]
#[serial]
fn test_enqueue_timeout_gives_up_on_full_queue() {
    let name = TestQueueName::new("enq_timeout");
    let queue = EventQueue::open(name.as_str(), 64).unwrap();
    queue.try_enqueue(&[1u8; 60]).unwrap();
    let before = queue.stats();

    let start = std::time::Instant::now();
    assert_eq!(
        queue.enqueue_timeout(b"stuck", Duration::from_millis(30), RETRY).unwrap(),
        EnqueueResult::WouldBlock
    );
    assert!(start.elapsed() >= Duration::from_millis(30));
    assert_eq!(queue.stats(), before);

    queue.try_dequeue();
    assert_eq!(
        queue.enqueue_timeout(b"fits", Duration::from_millis(30), RETRY).unwrap(),
        EnqueueResult::Enqueued
    );
    assert!(matches!(
        queue.enqueue_timeout(&[0u8; 61], Duration::from_millis(30), RETRY),
        Err(QueueError::RecordTooLarge { .. })
    ));
}

#[test]
#[serial]
fn test_blocking_enqueue_waits_for_space() {
    let name = TestQueueName::new("blocking");
    let queue = Arc::new(EventQueue::open(name.as_str(), 64).unwrap());
    queue.try_enqueue(&[1u8; 60]).unwrap();

    let q = Arc::clone(&queue);
    let producer = thread::spawn(move || q.enqueue_blocking(&[2u8; 10], RETRY));

    thread::sleep(Duration::from_millis(20));
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.dequeue_blocking(RETRY), vec![1u8; 60]);

    producer.join().unwrap().unwrap();
    assert_eq!(queue.dequeue_blocking(RETRY), vec![2u8; 10]);
}

#[test]
#[serial]
fn test_multi_producer_multi_consumer() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 2000;

    let name = TestQueueName::new("mpmc");
    let queue = Arc::new(EventQueue::open(name.as_str(), 2048).unwrap());

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let q = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    // Length and contents both derive from (p, i) so torn records show up
                    let len = 1 + (i % 97);
                    let mut record = vec![p as u8; len];
                    record[0] = (i % 251) as u8;
                    q.enqueue_blocking(&record, RETRY).unwrap();
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..2)
        .map(|_| {
            let q = Arc::clone(&queue);
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(record) = q.dequeue_timeout(Duration::from_millis(500), RETRY) {
                    seen.push(record);
                }
                seen
            })
        })
        .collect();

    for p in producers {
        p.join().unwrap();
    }
    let mut total = 0;
    for c in consumers {
        for record in c.join().unwrap() {
            let p = *record.last().unwrap();
            if record.len() > 1 {
                assert!(record[1..].iter().all(|&b| b == p), "torn record");
            }
            total += 1;
        }
    }
    assert_eq!(total, PRODUCERS * PER_PRODUCER);
}
