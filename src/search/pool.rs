use crate::graph::{Node, MAX_GRAPHS};
use arrayvec::ArrayVec;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Recursion depth up to which frames publish themselves as stealable tasks.
pub const SPLIT_LEVELS: u32 = 4;

/// Identifies one published search frame. Ordered by depth, then by the
/// branch counters leading to it, so workers prefer shallow frames whose
/// subtrees are large.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    depth: u32,
    values: [u32; SPLIT_LEVELS as usize + 1],
}

impl Position {
    pub fn root() -> Self {
        Self::default()
    }

    /// Extends this position by branch counter `v` taken at `depth`.
    pub fn add(&mut self, depth: u32, v: u32) {
        self.depth = depth;
        if depth <= SPLIT_LEVELS {
            self.values[depth as usize] = v;
        }
    }
}

/// One mapping of the K-way search: a vertex per input graph.
pub type VertexTuple = ArrayVec<Node, MAX_GRAPHS>;

/// Mutable per-thread search state: the thread's node counter, its private
/// incumbent mapping, and how long it spent executing stolen tasks.
#[derive(Debug, Default)]
pub struct WorkerState {
    pub nodes: u64,
    pub incumbent: Vec<VertexTuple>,
    pub busy: Duration,
}

pub type TaskFn = Arc<dyn Fn(&mut WorkerState) + Send + Sync>;

struct Task {
    /// Cleared by the first worker that finishes executing it; until then any
    /// number of workers may pick the same task and cooperate through its
    /// captured branch counter.
    func: Option<TaskFn>,
    pending: usize,
}

/// Work-sharing pool: frames at shallow depth publish themselves into an
/// ordered task map and idle workers race the owning thread for branch
/// indices. The pool itself owns no threads; workers call [`HelperPool::run_worker`]
/// from wherever they were spawned.
#[derive(Default)]
pub struct HelperPool {
    tasks: Mutex<BTreeMap<Position, Task>>,
    cv: Condvar,
    finish: AtomicBool,
}

impl HelperPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `helper` at `position`, runs `main` on the calling thread,
    /// then blocks until every helper working on this task has drained.
    ///
    /// Panics if the position is already taken: positions come from a
    /// monotonic counter, so a collision is a logic error.
    pub fn get_help_with<F: FnOnce()>(&self, position: Position, helper: TaskFn, main: F) {
        {
            let mut tasks = self.tasks.lock().unwrap();
            let previous = tasks.insert(
                position,
                Task {
                    func: Some(helper),
                    pending: 0,
                },
            );
            assert!(
                previous.is_none(),
                "task already published at {:?}",
                position
            );
            self.cv.notify_all();
        }

        main();

        let mut tasks = self.tasks.lock().unwrap();
        while tasks.get(&position).map_or(0, |t| t.pending) != 0 {
            tasks = self.cv.wait(tasks).unwrap();
        }
        tasks.remove(&position);
    }

    /// Worker loop. Repeatedly claims the first task still carrying a
    /// function, executes it, and goes back to sleep when the map runs dry.
    /// Returns the worker's accumulated state once [`HelperPool::shutdown`]
    /// has been called.
    pub fn run_worker(&self) -> WorkerState {
        let mut state = WorkerState::default();

        while !self.finish.load(Ordering::SeqCst) {
            let mut tasks = self.tasks.lock().unwrap();

            let mut claimed = None;
            for (&position, task) in tasks.iter_mut() {
                if let Some(func) = &task.func {
                    task.pending += 1;
                    claimed = Some((position, Arc::clone(func)));
                    break;
                }
            }

            match claimed {
                Some((position, func)) => {
                    drop(tasks);

                    let started = Instant::now();
                    (*func)(&mut state);
                    state.busy += started.elapsed();

                    let mut tasks = self.tasks.lock().unwrap();
                    let task = tasks
                        .get_mut(&position)
                        .expect("task erased while still pending");
                    task.func = None;
                    task.pending -= 1;
                    if task.pending == 0 {
                        self.cv.notify_all();
                    }
                }
                None => {
                    if !self.finish.load(Ordering::SeqCst) {
                        let _guard = self.cv.wait(tasks).unwrap();
                    }
                }
            }
        }

        state
    }

    /// Wakes all idle workers and lets them return from their loops.
    pub fn shutdown(&self) {
        let _guard = self.tasks.lock().unwrap();
        self.finish.store(true, Ordering::SeqCst);
        self.cv.notify_all();
    }
}
