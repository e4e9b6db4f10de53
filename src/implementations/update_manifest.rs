use semver::Version;

use crate::chain;
use crate::resolve;
use crate::structures::{Error, UpdateEntry, UpdateManifest};

impl UpdateManifest {
  /// Builds the resolved manifest from parsed entries and the running version.
  pub(crate) fn from_entries(mut entries: Vec<UpdateEntry>, installed: &Version) -> Result<UpdateManifest, Error> {
    if entries.is_empty() {
      return Err(Error::ManifestEmpty());
    }
    chain::sort_entries(&mut entries);
    let newest_version = entries
      .iter()
      .map(|entry| resolve::normalized(&entry.version))
      .max()
      .unwrap_or_else(|| Version::new(0, 0, 0));
    let has_update = newest_version > resolve::normalized(installed);
    let update_required = entries.iter().any(|entry| entry.update_required);
    let installed_version_in_manifest = resolve::has_installed_version(&entries, installed);
    Ok(UpdateManifest {
      entries,
      newest_version,
      has_update,
      update_required,
      installed_version_in_manifest,
    })
  }

  /// The ordered subset of entries to actually download and apply.
  pub fn selected_entries(&self, installed: &Version) -> Vec<UpdateEntry> {
    chain::select_entries(&self.entries, installed, self.installed_version_in_manifest)
  }
}
