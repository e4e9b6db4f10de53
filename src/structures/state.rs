use std::sync::atomic::{AtomicU8, Ordering};

use crate::structures::Error;

/// Which public operation a fetcher is currently running.
///
/// Stored as a single atomic value and acquired by compare-and-swap, so two
/// conflicting operations can never run at once on the same fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FetcherState {
  Idle = 0,
  Checking = 1,
  Downloading = 2,
  Installing = 3,
}

impl FetcherState {
  pub(crate) fn from_u8(value: u8) -> FetcherState {
    match value {
      1 => FetcherState::Checking,
      2 => FetcherState::Downloading,
      3 => FetcherState::Installing,
      _ => FetcherState::Idle,
    }
  }
}

impl std::fmt::Display for FetcherState {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    match self {
      FetcherState::Idle => write!(f, "idle"),
      FetcherState::Checking => write!(f, "checking for updates"),
      FetcherState::Downloading => write!(f, "downloading updates"),
      FetcherState::Installing => write!(f, "installing updates"),
    }
  }
}

/// RAII claim on the fetcher state slot; the slot returns to `Idle` on drop,
/// including every error path out of the operation that holds it.
pub(crate) struct OperationGuard<'a> {
  slot: &'a AtomicU8,
}

impl<'a> OperationGuard<'a> {
  pub(crate) fn acquire(slot: &'a AtomicU8, state: FetcherState) -> Result<OperationGuard<'a>, Error> {
    match slot.compare_exchange(FetcherState::Idle as u8, state as u8, Ordering::SeqCst, Ordering::SeqCst) {
      Ok(_) => Ok(OperationGuard { slot }),
      Err(current) => Err(Error::OperationInProgress(FetcherState::from_u8(current))),
    }
  }
}

impl Drop for OperationGuard<'_> {
  fn drop(&mut self) {
    self.slot.store(FetcherState::Idle as u8, Ordering::SeqCst);
  }
}
