use semver::Version;

/// A single package file published in a release manifest.
#[derive(Debug, Clone)]
pub struct UpdateEntry {
  /// File name of the package asset, unique within one manifest
  pub filename: String,
  /// Size of the package in bytes, as listed in the manifest
  pub filesize: u64,
  /// Upper-hex SHA256 of the package content, as listed in the manifest
  pub content_hash: String,
  /// Whether this package carries binary diffs instead of full files
  pub is_delta: bool,
  /// Version this package updates the application to
  pub version: Version,
  /// Whether the publisher flagged this update as required
  pub update_required: bool,
  /// Id of the release this entry was published under
  pub release_id: u64,
  /// Resolved download location, absent until asset matching completes
  pub download_uri: Option<String>,
  /// Hash computed during the last verification of this entry, for diagnostics
  pub computed_hash: Option<String>,
}

impl UpdateEntry {
  pub(crate) fn new(release_id: u64, content_hash: &str, filename: &str, filesize: u64, update_required: bool) -> Self {
    UpdateEntry {
      filename: filename.trim().to_string(),
      filesize,
      content_hash: content_hash.trim().to_string(),
      is_delta: false,
      version: Version::new(0, 0, 0),
      update_required,
      release_id,
      download_uri: None,
      computed_hash: None,
    }
  }
}
