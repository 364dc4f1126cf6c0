//! Counted-completion barriers.
//!
//! Every rule invocation stacks one barrier; `shell` tasks increment
//! the barrier on enqueue and decrement it when they finish, and the
//! owner blocks until the count drains back to zero. The first task to
//! observe a non-zero exit status latches it as the barrier result.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// A latch counting outstanding tasks, with a first-failure-wins
/// result slot.
#[derive(Default)]
pub struct RuleBarrier {
  count: Mutex<u32>,
  cond: Condvar,
  result: AtomicI32,
}

impl RuleBarrier {
  pub fn new() -> Self {
    Self::default()
  }

  /// Account for one more outstanding task.
  pub fn incr(&self) {
    let mut count = self.count.lock().unwrap();
    *count += 1;
  }

  /// Retire one task, waking waiters when the count reaches zero.
  pub fn decr(&self) {
    let mut count = self.count.lock().unwrap();
    debug_assert!(*count > 0, "barrier decremented below zero");
    *count -= 1;
    if *count == 0 {
      drop(count);
      self.cond.notify_all();
    }
  }

  /// Block until every accounted task has retired.
  pub fn wait(&self) {
    let mut count = self.count.lock().unwrap();
    while *count > 0 {
      count = self.cond.wait(count).unwrap();
    }
  }

  /// Latch a non-zero exit code; only the first one sticks.
  pub fn fail(&self, code: i32) {
    let _ = self
      .result
      .compare_exchange(0, code, Ordering::SeqCst, Ordering::SeqCst);
  }

  /// The latched result, zero if every task succeeded.
  pub fn result(&self) -> i32 {
    self.result.load(Ordering::SeqCst)
  }

  /// Account for one task and hand back a guard that retires it on
  /// drop, so the barrier drains on every task exit path.
  pub fn enter(self: &Arc<Self>) -> BarrierGuard {
    self.incr();
    BarrierGuard { barrier: Arc::clone(self) }
  }
}

/// Decrements its barrier when dropped.
pub struct BarrierGuard {
  barrier: Arc<RuleBarrier>,
}

impl Drop for BarrierGuard {
  fn drop(&mut self) {
    self.barrier.decr();
  }
}
