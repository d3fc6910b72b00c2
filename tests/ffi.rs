// C ABI round trips, called from Rust the way a C producer/consumer would.

mod common;

use common::TestQueueName;
use daq_evtstream::ffi::*;
use std::ffi::CString;
use std::ptr;

#[test]
fn test_ffi_enqueue_dequeue() {
    let name = TestQueueName::new("ffi");
    let cname = CString::new(name.as_str()).unwrap();

    unsafe {
        let producer = daq_queue_open(cname.as_ptr(), 64);
        assert!(!producer.is_null());
        let consumer = daq_queue_open(cname.as_ptr(), 0);
        assert!(!consumer.is_null());

        let record = b"hello";
        assert_eq!(daq_queue_try_enqueue(producer, record.as_ptr(), record.len()), DAQ_SUCCESS);
        assert_eq!(
            daq_queue_try_enqueue(producer, [0u8; 61].as_ptr(), 61),
            DAQ_ERROR_TOO_LARGE
        );

        // Too small a buffer reports the size and keeps the record
        let mut buf = [0u8; 2];
        let mut len = buf.len();
        assert_eq!(
            daq_queue_try_dequeue(consumer, buf.as_mut_ptr(), &mut len),
            DAQ_ERROR_INVALID_ARG
        );
        assert_eq!(len, 5);

        let mut buf = [0u8; 16];
        let mut len = buf.len();
        assert_eq!(daq_queue_try_dequeue(consumer, buf.as_mut_ptr(), &mut len), DAQ_SUCCESS);
        assert_eq!(&buf[..len], b"hello");
        assert_eq!(
            daq_queue_try_dequeue(consumer, buf.as_mut_ptr(), &mut len),
            DAQ_ERROR_EMPTY
        );

        assert_eq!(daq_queue_close(consumer), DAQ_SUCCESS);
        assert_eq!(daq_queue_close(producer), DAQ_SUCCESS);
        assert_eq!(daq_queue_unlink(cname.as_ptr()), DAQ_SUCCESS);
    }
}

#[test]
fn test_ffi_would_block_and_null_checks() {
    let name = TestQueueName::new("ffi_full");
    let cname = CString::new(name.as_str()).unwrap();

    unsafe {
        assert!(daq_queue_open(ptr::null(), 64).is_null());
        assert_eq!(
            daq_queue_try_enqueue(ptr::null_mut(), ptr::null(), 0),
            DAQ_ERROR_NULL_POINTER
        );

        let handle = daq_queue_open(cname.as_ptr(), 64);
        assert!(!handle.is_null());
        assert_eq!(daq_queue_try_enqueue(handle, [1u8; 60].as_ptr(), 60), DAQ_SUCCESS);
        assert_eq!(
            daq_queue_try_enqueue(handle, ptr::null(), 0),
            DAQ_ERROR_WOULD_BLOCK
        );
        assert_eq!(daq_queue_close(handle), DAQ_SUCCESS);
        assert_eq!(daq_queue_close(ptr::null_mut()), DAQ_ERROR_NULL_POINTER);
    }
}

#[test]
fn test_ffi_close_reports_discarded_record() {
    let name = TestQueueName::new("ffi_close");
    let cname = CString::new(name.as_str()).unwrap();

    unsafe {
        let handle = daq_queue_open(cname.as_ptr(), 64);
        assert!(!handle.is_null());
        assert_eq!(daq_queue_try_enqueue(handle, b"held".as_ptr(), 4), DAQ_SUCCESS);

        let mut buf = [0u8; 1];
        let mut len = buf.len();
        assert_eq!(
            daq_queue_try_dequeue(handle, buf.as_mut_ptr(), &mut len),
            DAQ_ERROR_INVALID_ARG
        );
        assert_eq!(len, 4);

        // The record already left the queue; closing now loses it
        assert_eq!(daq_queue_close(handle), DAQ_ERROR_RECORD_DISCARDED);

        let other = daq_queue_open(cname.as_ptr(), 0);
        let mut buf = [0u8; 16];
        let mut len = buf.len();
        assert_eq!(daq_queue_try_dequeue(other, buf.as_mut_ptr(), &mut len), DAQ_ERROR_EMPTY);
        assert_eq!(daq_queue_close(other), DAQ_SUCCESS);
    }
}
