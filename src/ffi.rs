//! C ABI over [`EventQueue`] so non-Rust producers and consumers can share a queue.

use std::ffi::CStr;
use std::os::raw::c_char;
use std::ptr;

use tracing::{error, warn};

use crate::error::QueueError;
use crate::Queue::Structs::{DequeueResult, EnqueueResult};
use crate::Queue::EventQueue;

// Error codes
pub const DAQ_SUCCESS: i32 = 0;
pub const DAQ_ERROR_NULL_POINTER: i32 = -1;
pub const DAQ_ERROR_INVALID_ARG: i32 = -2;
pub const DAQ_ERROR_ATTACH_FAILED: i32 = -3;
pub const DAQ_ERROR_WOULD_BLOCK: i32 = -4;
pub const DAQ_ERROR_EMPTY: i32 = -5;
pub const DAQ_ERROR_TOO_LARGE: i32 = -6;
pub const DAQ_ERROR_RECORD_DISCARDED: i32 = -7;

/// Handle to an open queue (opaque pointer)
pub struct QueueHandle {
    inner: EventQueue,
    /// Record taken by a dequeue whose caller buffer was too small.
    pending: Option<Vec<u8>>,
}

unsafe fn queue_name<'a>(name: *const c_char) -> Option<&'a str> {
    if name.is_null() {
        return None;
    }
    CStr::from_ptr(name).to_str().ok()
}

/// Open the named queue, creating it with a `size_bytes` band if absent.
/// A `size_bytes` of 0 attaches to an existing queue of any size.
///
/// # Returns
/// * Pointer to `QueueHandle`, or NULL on failure.
///
/// # Safety
/// `name` must be NULL or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn daq_queue_open(name: *const c_char, size_bytes: usize) -> *mut QueueHandle {
    let Some(name) = queue_name(name) else {
        error!("daq_queue_open: missing or non UTF-8 queue name");
        return ptr::null_mut();
    };

    let opened = if size_bytes == 0 {
        EventQueue::attach(name)
    } else {
        EventQueue::open(name, size_bytes)
    };
    match opened {
        Ok(queue) => Box::into_raw(Box::new(QueueHandle {
            inner: queue,
            pending: None,
        })),
        Err(e) => {
            error!(queue = %name, error = %e, "daq_queue_open failed");
            ptr::null_mut()
        }
    }
}

/// Append one record without waiting.
///
/// # Returns
/// * 0 on success, `DAQ_ERROR_WOULD_BLOCK` if the queue is short of space,
///   `DAQ_ERROR_TOO_LARGE` if the record can never fit.
///
/// # Safety
/// `handle` must come from `daq_queue_open`; `data` must point to `len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn daq_queue_try_enqueue(
    handle: *mut QueueHandle,
    data: *const u8,
    len: usize,
) -> i32 {
    if handle.is_null() || (data.is_null() && len > 0) {
        return DAQ_ERROR_NULL_POINTER;
    }

    let queue = &(*handle).inner;
    let record = if len == 0 {
        &[][..]
    } else {
        std::slice::from_raw_parts(data, len)
    };

    match queue.try_enqueue(record) {
        Ok(EnqueueResult::Enqueued) => DAQ_SUCCESS,
        Ok(EnqueueResult::WouldBlock) => DAQ_ERROR_WOULD_BLOCK,
        Err(QueueError::RecordTooLarge { .. }) => DAQ_ERROR_TOO_LARGE,
        Err(e) => {
            error!(error = %e, "daq_queue_try_enqueue failed");
            DAQ_ERROR_INVALID_ARG
        }
    }
}

/// Remove the oldest record without waiting.
///
/// # Arguments
/// * `out_len` - Input: size of `out_buf`, Output: size of the record.
///
/// # Returns
/// * 0 on success, `DAQ_ERROR_EMPTY` if nothing is queued.
/// * `DAQ_ERROR_INVALID_ARG` if `out_buf` is too small; `*out_len` then holds the
///   required size and the record is kept for the next call on this handle.
///
/// # Safety
/// `handle` must come from `daq_queue_open`; `out_buf` must hold `*out_len` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn daq_queue_try_dequeue(
    handle: *mut QueueHandle,
    out_buf: *mut u8,
    out_len: *mut usize,
) -> i32 {
    if handle.is_null() || out_len.is_null() {
        return DAQ_ERROR_NULL_POINTER;
    }

    let handle = &mut *handle;
    let max_len = *out_len;

    let record = match handle.pending.take() {
        Some(record) => record,
        None => match handle.inner.try_dequeue() {
            DequeueResult::Record(record) => record,
            DequeueResult::Empty => return DAQ_ERROR_EMPTY,
        },
    };

    if record.len() > max_len || (out_buf.is_null() && !record.is_empty()) {
        *out_len = record.len();
        handle.pending = Some(record);
        return DAQ_ERROR_INVALID_ARG;
    }

    if !record.is_empty() {
        ptr::copy_nonoverlapping(record.as_ptr(), out_buf, record.len());
    }
    *out_len = record.len();
    DAQ_SUCCESS
}

/// Close a handle. The queue itself stays until unlinked.
///
/// A record held back by `daq_queue_try_dequeue` after a too-small buffer has
/// already left the queue. Closing before fetching it discards it: this is
/// logged and reported as `DAQ_ERROR_RECORD_DISCARDED`.
///
/// # Returns
/// * `DAQ_SUCCESS`, or `DAQ_ERROR_NULL_POINTER`
/// * `DAQ_ERROR_RECORD_DISCARDED` if a held-back record was dropped; the handle is closed anyway
///
/// # Safety
/// `handle` must come from `daq_queue_open` and must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn daq_queue_close(handle: *mut QueueHandle) -> i32 {
    if handle.is_null() {
        return DAQ_ERROR_NULL_POINTER;
    }
    let handle = Box::from_raw(handle);
    match &handle.pending {
        Some(record) => {
            warn!(
                queue = %handle.inner.name(),
                len = record.len(),
                "handle closed with an undelivered record; record discarded"
            );
            DAQ_ERROR_RECORD_DISCARDED
        }
        None => DAQ_SUCCESS,
    }
}

/// Remove the queue name from the system.
///
/// # Safety
/// `name` must be NULL or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn daq_queue_unlink(name: *const c_char) -> i32 {
    let Some(name) = queue_name(name) else {
        return DAQ_ERROR_NULL_POINTER;
    };
    match EventQueue::unlink(name) {
        Ok(()) => DAQ_SUCCESS,
        Err(e) => {
            error!(queue = %name, error = %e, "daq_queue_unlink failed");
            DAQ_ERROR_INVALID_ARG
        }
    }
}
