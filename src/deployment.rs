use std::path::{Path, PathBuf};

use semver::Version;
use tracing::debug;

use crate::structures::Error;

/// Where the running application lives on disk and how versions sit next to
/// each other.
///
/// An installed application runs out of `<root>/app-<version>/`; every
/// version gets its own sibling directory and downloads stage under
/// `<root>/staging`. A binary running from anywhere else (a build tree, a
/// plain unpacked archive) is not an installed deployment and must never be
/// patched in place.
#[derive(Debug, Clone)]
pub struct Deployment {
  root: PathBuf,
  pub installed_version: Version,
  pub is_installed: bool,
}

const VERSION_DIR_PREFIX: &str = "app-";
const STAGING_DIR: &str = "staging";

impl Deployment {
  /// Classifies the directory the running executable sits in.
  pub fn detect(installed_version: Version) -> Result<Deployment, Error> {
    let executable = std::env::current_exe()?;
    let exe_dir = match executable.parent() {
      Some(dir) => dir.to_path_buf(),
      None => return Err(Error::NotInstalledDeployment()),
    };
    Ok(Deployment::at_dir(&exe_dir, installed_version))
  }

  /// Classifies an explicit application directory; split out of [`detect`]
  /// so tests can build deployments without moving executables around.
  pub fn at_dir(app_dir: &Path, installed_version: Version) -> Deployment {
    let is_installed = app_dir
      .file_name()
      .and_then(|name| name.to_str())
      .map(|name| name.starts_with(VERSION_DIR_PREFIX))
      .unwrap_or(false)
      && app_dir.parent().is_some();
    let root = match (is_installed, app_dir.parent()) {
      (true, Some(parent)) => parent.to_path_buf(),
      _ => app_dir.to_path_buf(),
    };
    debug!("deployment root {:?}, installed: {}", root, is_installed);
    Deployment { root, installed_version, is_installed }
  }

  /// Deployment rooted directly at `root`, for freshly created installs.
  pub fn at_root(root: &Path, installed_version: Version) -> Deployment {
    Deployment { root: root.to_path_buf(), installed_version, is_installed: true }
  }

  /// Directory downloads land in before they are verified and installed.
  pub fn staging_dir(&self) -> PathBuf {
    self.root.join(STAGING_DIR)
  }

  /// Directory of the currently installed version.
  pub fn current_install_dir(&self) -> PathBuf {
    self.install_dir_for(&self.installed_version)
  }

  /// Directory a given version installs into, existing or not.
  pub fn install_dir_for(&self, version: &Version) -> PathBuf {
    self.root.join(format!("{}{}", VERSION_DIR_PREFIX, crate::resolve::normalized(version)))
  }

  /// Variant subtree tag for the running host, matched against the
  /// `lib/<variant>/` directories inside a package.
  pub fn host_variant_tag() -> &'static str {
    if cfg!(target_os = "windows") {
      "win"
    } else if cfg!(target_os = "macos") {
      "osx"
    } else {
      "linux"
    }
  }
}
