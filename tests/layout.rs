// Layout conformance tests for the queue control block.
// Non-Rust producers map the same region, so offsets are part of the ABI.
use crossbeam_utils::CachePadded;
use daq_evtstream::Queue::Ring::layout::{band_offset, region_size, QueueHeader, BAND_ALIGN};
use memoffset::offset_of;
use std::mem::{align_of, size_of};
use std::sync::atomic::AtomicU64;

fn round_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

#[test]
fn test_queue_header_layout() {
    let pad = align_of::<CachePadded<AtomicU64>>();
    let padded = size_of::<CachePadded<AtomicU64>>();

    let off_magic = offset_of!(QueueHeader, magic);
    let off_version = offset_of!(QueueHeader, version);
    let off_flags = offset_of!(QueueHeader, flags);
    let off_capacity = offset_of!(QueueHeader, capacity);
    let off_lock = offset_of!(QueueHeader, lock);
    let off_data_signal = offset_of!(QueueHeader, data_signal);
    let off_space_signal = offset_of!(QueueHeader, space_signal);
    let off_waiters = offset_of!(QueueHeader, waiters);
    let off_tail = offset_of!(QueueHeader, tail);
    let off_head = offset_of!(QueueHeader, head);
    let off_records = offset_of!(QueueHeader, records);

    println!(
        "QueueHeader => size: {}, align: {}, offsets: [magic:{off_magic}, version:{off_version}, flags:{off_flags}, capacity:{off_capacity}, lock:{off_lock}, tail:{off_tail}, head:{off_head}, records:{off_records}]",
        size_of::<QueueHeader>(),
        align_of::<QueueHeader>()
    );

    assert_eq!(off_magic, 0);
    assert_eq!(off_version, 8);
    assert_eq!(off_flags, 12);
    assert_eq!(off_capacity, 16);
    assert_eq!(off_lock, 24);
    assert_eq!(off_data_signal, 28);
    assert_eq!(off_space_signal, 32);
    assert_eq!(off_waiters, 36);
    assert_eq!(off_tail, round_up(40, pad));
    assert_eq!(off_head, off_tail + padded);
    assert_eq!(off_records, off_head + padded);
    assert_eq!(align_of::<QueueHeader>(), BAND_ALIGN.max(pad));
}

#[test]
fn test_cursors_on_separate_cache_lines() {
    let off_tail = offset_of!(QueueHeader, tail);
    let off_head = offset_of!(QueueHeader, head);
    assert!(off_head - off_tail >= 64);
}

#[test]
fn test_band_offset() {
    assert_eq!(band_offset() % BAND_ALIGN, 0);
    assert!(band_offset() >= size_of::<QueueHeader>());
    assert_eq!(region_size(4096), band_offset() + 4096);
}
