/// The latest release as reported by a release source.
#[derive(Debug, Clone)]
pub struct Release {
  pub id: u64,
  pub tag: String,
  pub assets: Vec<ReleaseAsset>,
}

/// One downloadable asset attached to a release.
#[derive(Debug, Clone)]
pub struct ReleaseAsset {
  pub name: String,
  pub size: u64,
  pub download_url: String,
}

/// Structured error payload returned by a release source on failure.
#[derive(Debug, Clone)]
pub struct SourceError {
  pub message: String,
  pub documentation_url: String,
}

/// Coarse classification of a release source response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
  Success,
  ClientError,
  ServerError,
  NoResponse,
}

impl ResponseStatus {
  pub fn from_code(code: u16) -> ResponseStatus {
    match code {
      200..=299 => ResponseStatus::Success,
      400..=499 => ResponseStatus::ClientError,
      500..=599 => ResponseStatus::ServerError,
      _ => ResponseStatus::NoResponse,
    }
  }
}
