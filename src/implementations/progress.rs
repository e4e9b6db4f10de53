use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tracing::info;

use crate::structures::Progress;

impl Progress {
  pub fn new() -> Self {
    Self {
      current_action: Mutex::new(String::new()),
      downloaded_files: (AtomicU64::new(0), AtomicU64::new(0)),
      downloaded_bytes: (AtomicU64::new(0), AtomicU64::new(0)),
      installed_files: (AtomicU64::new(0), AtomicU64::new(0)),
    }
  }

  pub fn get_current_action(&self) -> String {
    match self.current_action.lock() {
      Ok(action) => action.clone(),
      Err(poisoned) => poisoned.into_inner().clone(),
    }
  }

  pub(crate) fn set_current_action(&self, value: &str) {
    info!("Current action: {}", value);
    match self.current_action.lock() {
      Ok(mut action) => *action = value.to_string(),
      Err(poisoned) => *poisoned.into_inner() = value.to_string(),
    }
  }

  /// Downloaded files so far out of the total selected for this batch.
  pub fn downloaded_files(&self) -> (u64, u64) {
    (self.downloaded_files.0.load(Ordering::Relaxed), self.downloaded_files.1.load(Ordering::Relaxed))
  }

  /// Downloaded bytes so far out of the summed entry sizes.
  pub fn downloaded_bytes(&self) -> (u64, u64) {
    (self.downloaded_bytes.0.load(Ordering::Relaxed), self.downloaded_bytes.1.load(Ordering::Relaxed))
  }

  /// Package entries installed so far out of the total selected.
  pub fn installed_files(&self) -> (u64, u64) {
    (self.installed_files.0.load(Ordering::Relaxed), self.installed_files.1.load(Ordering::Relaxed))
  }

  pub(crate) fn set_download_totals(&self, files: u64, bytes: u64) {
    self.downloaded_files.0.store(0, Ordering::Relaxed);
    self.downloaded_files.1.store(files, Ordering::Relaxed);
    self.downloaded_bytes.0.store(0, Ordering::Relaxed);
    self.downloaded_bytes.1.store(bytes, Ordering::Relaxed);
  }

  pub(crate) fn add_downloaded_bytes(&self, amount: u64) {
    self.downloaded_bytes.0.fetch_add(amount, Ordering::Relaxed);
  }

  pub(crate) fn increment_downloaded_files(&self) {
    self.downloaded_files.0.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn set_install_total(&self, files: u64) {
    self.installed_files.0.store(0, Ordering::Relaxed);
    self.installed_files.1.store(files, Ordering::Relaxed);
  }

  pub(crate) fn increment_installed_files(&self) {
    self.installed_files.0.fetch_add(1, Ordering::Relaxed);
  }
}

impl Default for Progress {
  fn default() -> Self {
    Self::new()
  }
}
