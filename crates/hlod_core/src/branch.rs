//! Fan-out/join over independent units of work ("branches").
//!
//! Branches are spawned onto a rayon scope with [`BranchSet::launch`], which
//! returns immediately. [`BranchSet::join_all`] then blocks until every branch
//! reached a terminal state, forwarding the mean branch progress to a callback.
//!
//! # Usage
//!
//! ```ignore
//! let result = rayon::in_place_scope(|scope| {
//!   let mut branches = BranchSet::new();
//!   for item in items.iter_mut() {
//!     branches.launch(scope, "item", move |progress| work(item, progress));
//!   }
//!   branches.join_all(&mut |p| println!("{p}"))
//! });
//! ```
//!
//! Each branch receives its own `&mut` borrow, so siblings cannot touch each
//! other's data. A failing or panicking branch does not stop its siblings: join
//! waits for all of them, then returns the first failure in launch order.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::error::{BranchError, StageError};

/// Poll interval of [`BranchSet::join_all`] when no branch finishes.
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Highest aggregate progress reported while any branch is unfinished or
/// failed.
const UNFINISHED_PROGRESS_CAP: f32 = 0.999;

/// Progress of one branch, in [0, 1].
#[derive(Debug, Default)]
pub struct BranchProgress {
  bits: AtomicU32,
}

impl BranchProgress {
  pub fn new() -> Self {
    Self::default()
  }

  /// Report progress. Values are clamped to [0, 1]; NaN is ignored.
  pub fn set(&self, progress: f32) {
    if progress.is_nan() {
      return;
    }
    self
      .bits
      .store(progress.clamp(0.0, 1.0).to_bits(), Ordering::Release);
  }

  pub fn get(&self) -> f32 {
    f32::from_bits(self.bits.load(Ordering::Acquire))
  }
}

#[derive(Debug)]
enum BranchState {
  Running,
  Succeeded,
  Failed(BranchError),
}

#[derive(Debug)]
struct Branch {
  name: String,
  progress: Arc<BranchProgress>,
  state: BranchState,
}

impl Branch {
  fn is_running(&self) -> bool {
    matches!(self.state, BranchState::Running)
  }

  /// Contribution to the aggregate; terminal branches count as complete.
  fn weight(&self) -> f32 {
    match self.state {
      BranchState::Running => self.progress.get(),
      _ => 1.0,
    }
  }
}

type Completion = (usize, Result<(), BranchError>);

/// A set of launched branches awaiting [`join_all`](BranchSet::join_all).
pub struct BranchSet {
  branches: Vec<Branch>,
  sender: Sender<Completion>,
  receiver: Receiver<Completion>,
}

impl Default for BranchSet {
  fn default() -> Self {
    Self::new()
  }
}

impl BranchSet {
  pub fn new() -> Self {
    let (sender, receiver) = crossbeam_channel::unbounded();
    Self {
      branches: Vec::new(),
      sender,
      receiver,
    }
  }

  pub fn len(&self) -> usize {
    self.branches.len()
  }

  pub fn is_empty(&self) -> bool {
    self.branches.is_empty()
  }

  /// Spawn `work` on `scope` as a new branch (non-blocking).
  ///
  /// Returns the branch's launch index.
  pub fn launch<'scope, F>(
    &mut self,
    scope: &rayon::Scope<'scope>,
    name: impl Into<String>,
    work: F,
  ) -> usize
  where
    F: FnOnce(&BranchProgress) -> Result<(), StageError> + Send + 'scope,
  {
    let index = self.branches.len();
    let name = name.into();
    let progress = Arc::new(BranchProgress::new());

    let sender = self.sender.clone();
    let branch_progress = Arc::clone(&progress);
    let branch_name = name.clone();
    scope.spawn(move |_| {
      let _span = tracing::debug_span!("branch", index, name = %branch_name).entered();
      let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(&branch_progress)));
      let result = match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(BranchError::Failed {
          index,
          name: branch_name,
          source,
        }),
        Err(payload) => Err(BranchError::Panicked {
          index,
          name: branch_name,
          message: panic_message(payload.as_ref()),
        }),
      };
      // The set owns a sender too, so the channel is open while it is alive.
      let _ = sender.send((index, result));
    });

    self.branches.push(Branch {
      name,
      progress,
      state: BranchState::Running,
    });
    index
  }

  /// Mean progress over all branches, capped below 1.0 until every branch
  /// succeeded.
  pub fn progress(&self) -> f32 {
    if self.branches.is_empty() {
      return 1.0;
    }
    let all_succeeded = self
      .branches
      .iter()
      .all(|b| matches!(b.state, BranchState::Succeeded));
    if all_succeeded {
      return 1.0;
    }
    let mean = self.branches.iter().map(Branch::weight).sum::<f32>() / self.branches.len() as f32;
    mean.min(UNFINISHED_PROGRESS_CAP)
  }

  /// Block until every launched branch is terminal.
  ///
  /// `on_progress` receives non-decreasing aggregate progress; it sees `1.0`
  /// only if every branch succeeded. Returns the failure of the lowest-index
  /// failed branch.
  pub fn join_all(mut self, on_progress: &mut dyn FnMut(f32)) -> Result<(), BranchError> {
    let mut reported: Option<f32> = None;

    loop {
      while let Ok(completion) = self.receiver.try_recv() {
        self.record(completion);
      }

      let progress = self.progress();
      let advanced = match reported {
        Some(last) => progress > last,
        None => true,
      };
      if advanced {
        reported = Some(progress);
        on_progress(progress);
      }

      if !self.branches.iter().any(Branch::is_running) {
        break;
      }
      self.wait_for_completion();
    }

    let failed = self
      .branches
      .iter()
      .filter(|b| matches!(b.state, BranchState::Failed(_)))
      .count();
    tracing::debug!(branches = self.branches.len(), failed, "branches joined");

    let first_failure = self.branches.into_iter().find_map(|branch| match branch.state {
      BranchState::Failed(error) => Some(error),
      _ => None,
    });
    match first_failure {
      Some(error) => Err(error),
      None => Ok(()),
    }
  }

  fn record(&mut self, (index, result): Completion) {
    let Some(branch) = self.branches.get_mut(index) else {
      return;
    };
    branch.state = match result {
      Ok(()) => {
        branch.progress.set(1.0);
        BranchState::Succeeded
      }
      Err(error) => {
        tracing::debug!(index, name = %branch.name, %error, "branch failed");
        BranchState::Failed(error)
      }
    };
  }

  /// Wait for the next completion without starving the pool.
  ///
  /// On a rayon worker the branches may be queued behind the caller, so the
  /// worker runs pending jobs instead of blocking.
  fn wait_for_completion(&mut self) {
    if rayon::current_thread_index().is_some() {
      if !matches!(rayon::yield_now(), Some(rayon::Yield::Executed)) {
        std::thread::sleep(JOIN_POLL_INTERVAL);
      }
      return;
    }

    match self.receiver.recv_timeout(JOIN_POLL_INTERVAL) {
      Ok(completion) => self.record(completion),
      Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
    }
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    (*message).to_owned()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic payload".to_owned()
  }
}

#[cfg(test)]
#[path = "branch_test.rs"]
mod branch_test;
