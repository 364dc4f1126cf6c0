//! The shell worker pool.
//!
//! A fixed set of worker threads drains a FIFO of queued tasks. Tasks
//! are dispatched in enqueue order; completion order is up to the
//! scheduler. Shutdown is cooperative: workers finish whatever is
//! still queued, then exit, and `destroy` joins them.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use tracing::debug;

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Queue {
  tasks: VecDeque<Task>,
  running: bool,
}

struct PoolInner {
  queue: Mutex<Queue>,
  cond: Condvar,
}

/// Fixed-size worker pool over a FIFO task queue.
pub struct ThreadPool {
  inner: Arc<PoolInner>,
  workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPool {
  pub fn new() -> Self {
    Self {
      inner: Arc::new(PoolInner {
        queue: Mutex::new(Queue { tasks: VecDeque::new(), running: false }),
        cond: Condvar::new(),
      }),
      workers: Mutex::new(Vec::new()),
    }
  }

  /// Spawn `size` workers. Tasks pushed before `init` sit in the queue
  /// until a worker exists to take them.
  pub fn init(&self, size: usize) {
    self.inner.queue.lock().unwrap().running = true;
    let mut workers = self.workers.lock().unwrap();
    for _ in 0..size {
      let inner = Arc::clone(&self.inner);
      workers.push(std::thread::spawn(move || worker_loop(&inner)));
    }
    debug!(workers = size, "worker pool started");
  }

  /// Append a task to the queue and wake one worker.
  pub fn push(&self, task: impl FnOnce() + Send + 'static) {
    let mut queue = self.inner.queue.lock().unwrap();
    queue.tasks.push_back(Box::new(task));
    drop(queue);
    self.inner.cond.notify_one();
  }

  /// Stop accepting idle waits, let workers drain the queue and join
  /// them. Idempotent.
  pub fn destroy(&self) {
    {
      let mut queue = self.inner.queue.lock().unwrap();
      if !queue.running {
        return;
      }
      queue.running = false;
    }
    self.inner.cond.notify_all();
    let workers = std::mem::take(&mut *self.workers.lock().unwrap());
    for handle in workers {
      let _ = handle.join();
    }
    debug!("worker pool stopped");
  }
}

impl Default for ThreadPool {
  fn default() -> Self {
    Self::new()
  }
}

impl Drop for ThreadPool {
  fn drop(&mut self) {
    self.destroy();
  }
}

fn worker_loop(inner: &PoolInner) {
  loop {
    let task = {
      let mut queue = inner.queue.lock().unwrap();
      while queue.running && queue.tasks.is_empty() {
        queue = inner.cond.wait(queue).unwrap();
      }
      match queue.tasks.pop_front() {
        Some(task) => task,
        // shutdown observed with an empty queue
        None => return,
      }
    };
    task();
  }
}

/// Hardware concurrency of the host, at least 1.
pub fn num_cpus() -> usize {
  std::thread::available_parallelism()
    .map(|n| n.get())
    .unwrap_or(1)
}
