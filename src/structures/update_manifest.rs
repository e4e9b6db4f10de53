use semver::Version;

use crate::structures::UpdateEntry;

/// The fully resolved set of updates discovered by one check.
///
/// A manifest is never mutated after resolution; a later check replaces it
/// wholesale on the fetcher that produced it.
#[derive(Debug, Clone)]
pub struct UpdateManifest {
  /// All resolved entries, sorted by (is_delta, version) ascending
  pub entries: Vec<UpdateEntry>,
  /// Highest version present in the manifest
  pub newest_version: Version,
  /// Whether the newest version is ahead of the running one
  pub has_update: bool,
  /// Whether any entry was flagged as required by the publisher
  pub update_required: bool,
  /// Whether the running version itself appears in the manifest
  pub installed_version_in_manifest: bool,
}
