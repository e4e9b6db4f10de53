use std::fs::File;
use std::io::Read;
use std::path::Path;

use semver::Version;
use tracing::debug;

use crate::structures::{Error, UpdateEntry};

/// Name of the metadata file embedded at the root of every package archive.
pub(crate) const PACKAGE_METADATA_FILE: &str = "package.json";

/// Versions compare as plain `major.minor.patch`; pre-release and build
/// metadata are not preserved through the comparisons used for "has update".
pub(crate) fn normalized(version: &Version) -> Version {
  Version::new(version.major, version.minor, version.patch)
}

/// Derives `(version, is_delta)` from a package filename following the
/// `<name>-<version>-<full|delta>.<ext>` convention. Returns `None` for any
/// filename that does not follow it, which sends the caller down the
/// archive-inspection fallback.
pub(crate) fn version_and_kind_from_filename(filename: &str) -> Option<(Version, bool)> {
  let first = filename.find('-')?;
  let last = filename.rfind('-')?;
  if first == last {
    return None;
  }
  let tail = &filename[last + 1..];
  let kind = &tail[..tail.find('.')?];
  let is_delta = match kind {
    "delta" => true,
    "full" => false,
    _ => return None,
  };
  let version = Version::parse(&filename[first + 1..last]).ok()?;
  Some((version, is_delta))
}

/// Opens a downloaded package archive and reads its embedded metadata:
/// the `version` field of the root metadata file, and whether the archive
/// carries delta content (any checksum manifest or diff payload counts).
pub(crate) fn inspect_package(path: &Path) -> Result<(Version, bool), Error> {
  let file = File::open(path)?;
  let mut archive = zip::ZipArchive::new(file)?;
  let is_delta = archive
    .file_names()
    .any(|name| name.ends_with(".shasum") || name.ends_with(".diff") || name.ends_with(".bsdiff"));
  let mut metadata = String::new();
  archive.by_name(PACKAGE_METADATA_FILE)?.read_to_string(&mut metadata)?;
  let metadata = json::parse(&metadata)?;
  let version = match metadata["version"].as_str() {
    Some(version) => Version::parse(version)?,
    None => return Err(Error::ManifestCorrupt(format!("{} in {:?} has no version field", PACKAGE_METADATA_FILE, path))),
  };
  debug!("resolved {:?} from package metadata: version {}, delta: {}", path, version, is_delta);
  Ok((version, is_delta))
}

/// True iff some entry's version equals the version of the running binary.
/// When it does, the files on disk are known to match a published baseline
/// and a delta can be applied directly on top of them.
pub(crate) fn has_installed_version(entries: &[UpdateEntry], installed: &Version) -> bool {
  let installed = normalized(installed);
  entries.iter().any(|entry| normalized(&entry.version) == installed)
}
