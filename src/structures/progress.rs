use std::sync::atomic::AtomicU64;
use std::sync::Mutex;

/// Live counters for the operation currently running on a fetcher.
///
/// Cheap to read from another task while a download or install is in flight.
/// Each pair is (done so far, total).
pub struct Progress {
  pub(crate) current_action: Mutex<String>,
  pub(crate) downloaded_files: (AtomicU64, AtomicU64),
  pub(crate) downloaded_bytes: (AtomicU64, AtomicU64),
  pub(crate) installed_files: (AtomicU64, AtomicU64),
}
