use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Best mapping cardinality known across all workers. Workers keep the
/// mapping itself thread-local; only the size is shared, so pruning needs no
/// lock.
#[derive(Debug, Default)]
pub struct AtomicIncumbent {
    value: AtomicU32,
}

impl AtomicIncumbent {
    pub fn new() -> Self {
        Self {
            value: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn get(&self) -> u32 {
        self.value.load(Ordering::SeqCst)
    }

    /// Raises the bound to `v` if it is strictly better. Returns false when a
    /// concurrent update already published an equal or larger value.
    pub fn update(&self, v: u32) -> bool {
        loop {
            let current = self.value.load(Ordering::SeqCst);
            if v <= current {
                return false;
            }
            if self
                .value
                .compare_exchange(current, v, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return true;
            }
        }
    }
}

/// Whole-search cancellation flag, raised either by the timeout thread or by
/// normal completion. Search threads poll it and unwind; nobody blocks on it.
#[derive(Debug, Default)]
pub struct AbortFlag {
    aborted: AtomicBool,
    timed_out: AtomicBool,
    finished: Mutex<bool>,
    cv: Condvar,
}

impl AbortFlag {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }

    /// True iff the abort was raised by the deadline rather than completion.
    pub fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst)
    }

    /// Signals normal completion: raises the flag and wakes the timer thread
    /// so it can be joined.
    pub fn finish(&self) {
        let mut finished = self.finished.lock().unwrap();
        *finished = true;
        self.aborted.store(true, Ordering::SeqCst);
        self.cv.notify_all();
    }
}

/// Spawns the deadline watcher. It sleeps on the flag's condition variable
/// until either the deadline elapses (raising the abort flag and marking the
/// run as timed out) or [`AbortFlag::finish`] wakes it.
pub fn spawn_timeout_thread(flag: &Arc<AbortFlag>, timeout: Duration) -> JoinHandle<()> {
    let flag = Arc::clone(flag);
    std::thread::spawn(move || {
        let deadline = Instant::now() + timeout;
        let mut finished = flag.finished.lock().unwrap();
        loop {
            if *finished {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                flag.timed_out.store(true, Ordering::SeqCst);
                break;
            }
            let (guard, _) = flag.cv.wait_timeout(finished, deadline - now).unwrap();
            finished = guard;
        }
        drop(finished);
        flag.aborted.store(true, Ordering::SeqCst);
    })
}
