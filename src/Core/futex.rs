// Futex helpers for words that live in a MAP_SHARED region.
// No FUTEX_PRIVATE_FLAG: waiters and wakers may be different processes.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tracing::warn;

/// Spins before a contended lock falls back to the kernel.
const LOCK_SPINS: u32 = 100;

/// Longest single kernel wait while the lock is held by someone else.
/// After each one the holder's process is checked for liveness.
const OWNER_CHECK: Duration = Duration::from_millis(10);

const UNLOCKED: u32 = 0;
/// Set on the word when some waiter sleeps in the kernel.
const CONTENDED: u32 = 1 << 31;
const OWNER_MASK: u32 = !CONTENDED;

/// Sleep until `atomic` changes from `expected`, a wake arrives, or `timeout` passes.
#[cfg(target_os = "linux")]
pub fn futex_wait_timeout(atomic: &AtomicU32, expected: u32, timeout: Option<Duration>) {
    use std::ptr;

    // Check condition first to avoid syscall if possible
    if atomic.load(Ordering::Acquire) != expected {
        return;
    }

    let ts = timeout.map(|t| libc::timespec {
        tv_sec: t.as_secs() as libc::time_t,
        tv_nsec: t.subsec_nanos() as libc::c_long,
    });
    let ts_ptr = ts
        .as_ref()
        .map_or(ptr::null(), |t| t as *const libc::timespec);

    // EINTR, EAGAIN and ETIMEDOUT all just mean "look again".
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAIT,
            expected,
            ts_ptr,
            ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(target_os = "linux")]
fn futex_wake_n(atomic: &AtomicU32, n: i32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAKE,
            n,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wait_timeout(atomic: &AtomicU32, expected: u32, timeout: Option<Duration>) {
    // Fallback for non-Linux: bounded sleep instead of a kernel wait
    if atomic.load(Ordering::Acquire) != expected {
        return;
    }
    match timeout {
        Some(t) => std::thread::sleep(t),
        None => std::thread::yield_now(),
    }
}

#[cfg(not(target_os = "linux"))]
fn futex_wake_n(_atomic: &AtomicU32, _n: i32) {}

pub fn futex_wake_one(atomic: &AtomicU32) {
    futex_wake_n(atomic, 1);
}

pub fn futex_wake_all(atomic: &AtomicU32) {
    futex_wake_n(atomic, i32::MAX);
}

/// Lock word value identifying this process as the holder.
fn owner_tag() -> u32 {
    std::process::id() & OWNER_MASK
}

/// True when the process that stamped `owner` on a lock word no longer exists.
#[cfg(unix)]
fn owner_is_dead(owner: u32) -> bool {
    if owner == 0 || owner == owner_tag() {
        return false;
    }
    let rc = unsafe { libc::kill(owner as libc::pid_t, 0) };
    rc == -1 && std::io::Error::last_os_error().raw_os_error() == Some(libc::ESRCH)
}

#[cfg(not(unix))]
fn owner_is_dead(_owner: u32) -> bool {
    false
}

/// Acquire a process-shared lock word.
///
/// The word holds the holder's pid (0 when free) with the top bit set once a
/// waiter sleeps. Waits are bounded by [`OWNER_CHECK`]; if the holder's
/// process has exited, the lock is taken over instead of waiting forever.
/// Callers keep shared state consistent by publishing cursors only after
/// their copies, so a holder dying mid-copy leaves nothing half visible.
pub fn lock_word(word: &AtomicU32) {
    let me = owner_tag();
    for _ in 0..LOCK_SPINS {
        if word
            .compare_exchange_weak(UNLOCKED, me, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            return;
        }
        std::hint::spin_loop();
    }

    // Taken with CONTENDED set; unlock may wake a waiter that already left.
    let mine = me | CONTENDED;
    let mut state = word.load(Ordering::Relaxed);
    loop {
        if state == UNLOCKED {
            match word.compare_exchange(UNLOCKED, mine, Ordering::Acquire, Ordering::Relaxed) {
                Ok(_) => return,
                Err(now) => {
                    state = now;
                    continue;
                }
            }
        }

        let marked = state | CONTENDED;
        if state != marked {
            if let Err(now) =
                word.compare_exchange(state, marked, Ordering::Relaxed, Ordering::Relaxed)
            {
                state = now;
                continue;
            }
        }

        futex_wait_timeout(word, marked, Some(OWNER_CHECK));
        state = word.load(Ordering::Relaxed);

        if state == marked && owner_is_dead(marked & OWNER_MASK) {
            if word
                .compare_exchange(marked, mine, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                warn!(dead_owner = marked & OWNER_MASK, "lock holder exited; lock recovered");
                return;
            }
            state = word.load(Ordering::Relaxed);
        }
    }
}

pub fn unlock_word(word: &AtomicU32) {
    if word.swap(UNLOCKED, Ordering::Release) & CONTENDED != 0 {
        futex_wake_one(word);
    }
}

/// RAII guard over a shared lock word.
pub struct WordGuard<'a> {
    word: &'a AtomicU32,
}

impl<'a> WordGuard<'a> {
    pub fn lock(word: &'a AtomicU32) -> Self {
        lock_word(word);
        Self { word }
    }
}

impl Drop for WordGuard<'_> {
    fn drop(&mut self) {
        unlock_word(self.word);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn guard_serialises_threads() {
        let word = Arc::new(AtomicU32::new(0));
        let counter = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let word = word.clone();
                let counter = counter.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let _g = WordGuard::lock(&word);
                        // non-atomic read-modify-write under the lock
                        let v = counter.load(Ordering::Relaxed);
                        counter.store(v + 1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 4000);
        assert_eq!(word.load(Ordering::SeqCst), UNLOCKED);
    }

    #[test]
    fn held_word_carries_owner_pid() {
        let word = AtomicU32::new(0);
        {
            let _g = WordGuard::lock(&word);
            assert_eq!(word.load(Ordering::SeqCst) & OWNER_MASK, std::process::id());
        }
        assert_eq!(word.load(Ordering::SeqCst), UNLOCKED);
    }

    #[test]
    fn lock_held_by_exited_process_is_recovered() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let dead_pid = child.id();
        child.wait().unwrap();

        let word = AtomicU32::new(dead_pid | CONTENDED);
        let start = std::time::Instant::now();
        {
            let _g = WordGuard::lock(&word);
            assert_eq!(word.load(Ordering::SeqCst) & OWNER_MASK, std::process::id());
        }
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(word.load(Ordering::SeqCst), UNLOCKED);
    }

    #[test]
    fn live_holder_is_waited_for() {
        let word = Arc::new(AtomicU32::new(0));
        let guard = WordGuard::lock(&word);
        let waiter = {
            let word = word.clone();
            thread::spawn(move || {
                let _g = WordGuard::lock(&word);
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.join().unwrap();
        assert_eq!(word.load(Ordering::SeqCst), UNLOCKED);
    }

    #[test]
    fn wait_returns_when_value_differs() {
        let word = AtomicU32::new(5);
        // Must not block: the value is not the expected one.
        futex_wait_timeout(&word, 4, None);
    }

    #[test]
    fn wait_times_out() {
        let word = AtomicU32::new(0);
        let start = std::time::Instant::now();
        futex_wait_timeout(&word, 0, Some(Duration::from_millis(5)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
