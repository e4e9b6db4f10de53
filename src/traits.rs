use std::path::Path;

use async_trait::async_trait;

use crate::structures::{Error, Release};

/// Where releases and their assets come from.
///
/// The fetcher is written entirely against this trait; swapping the hosting
/// service means writing one more implementation, not touching the update
/// flow. Implementations are expected to be cheap to share behind an `Arc`.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
  /// The newest release the source is willing to offer this client.
  async fn latest_release(&self) -> Result<Release, Error>;

  /// Fetches a small text asset (the release manifest) into memory.
  async fn fetch_text(&self, url: &str) -> Result<String, Error>;

  /// Streams an asset to `dest`, reporting `(bytes received, content length)`
  /// after every chunk.
  async fn fetch_file(&self, url: &str, dest: &Path, on_chunk: &mut (dyn FnMut(u64, Option<u64>) + Send)) -> Result<(), Error>;
}

pub trait AsString {
  fn as_string_option(&self) -> Option<String>;
}

impl AsString for json::JsonValue {
  fn as_string_option(&self) -> Option<String> {
    match *self {
      json::JsonValue::Short(ref value) => Some(value.to_string()),
      json::JsonValue::String(ref value) => Some(value.to_string()),
      _ => None,
    }
  }
}
