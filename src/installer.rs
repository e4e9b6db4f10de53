use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use crate::deployment::Deployment;
use crate::hashes;
use crate::patch;
use crate::structures::{Error, Progress, UpdateEntry};

const VARIANT_ROOT: &str = "lib/";

/// Installs every staged package in order and promotes the final result
/// into its version directory next to the current install.
///
/// Entries arrive in apply order: a full package first when one was
/// selected, then at most one delta on top. A delta is applied against the
/// tree the previous entry produced, or against the current install when it
/// is the only entry. Intermediate entries exist only as scratch trees under
/// staging; a single version directory appears, that of the final entry.
/// `on_progress` gets aggregate completion in percent after each entry;
/// `on_failure` fires once with the entry that failed before the error is
/// returned.
pub(crate) fn install_entries(
  deployment: &Deployment,
  entries: &[UpdateEntry],
  progress: &Progress,
  cancelled: &AtomicBool,
  mut on_progress: impl FnMut(&UpdateEntry, f64),
  mut on_failure: impl FnMut(&UpdateEntry, &Error),
) -> Result<PathBuf, Error> {
  let host_tag = Deployment::host_variant_tag();
  let mut base_dir = if deployment.is_installed { Some(deployment.current_install_dir()) } else { None };
  let mut scratch: Option<PathBuf> = None;
  let mut final_version = None;
  for (index, entry) in entries.iter().enumerate() {
    if cancelled.load(Ordering::SeqCst) {
      return Err(Error::Cancelled());
    }
    progress.set_current_action(&format!("installing {}", entry.filename));
    let built = match install_entry(deployment, entry, host_tag, base_dir.as_deref(), progress) {
      Ok(dir) => dir,
      Err(error) => {
        on_failure(entry, &error);
        return Err(error);
      }
    };
    base_dir = Some(built.clone());
    if let Some(previous) = scratch.replace(built) {
      std::fs::remove_dir_all(previous)?;
    }
    final_version = Some(&entry.version);
    on_progress(entry, (index as f64 + 1.0) / entries.len() as f64 * 100.0);
  }
  let (scratch, version) = match (scratch, final_version) {
    (Some(scratch), Some(version)) => (scratch, version),
    _ => return Err(Error::NotInstalledDeployment()),
  };
  let install_dir = deployment.install_dir_for(version);
  atomic_replace(&install_dir, &scratch)?;
  info!("installed into {:?}", install_dir);
  Ok(install_dir)
}

/// Materializes one package into a scratch tree under staging and returns
/// it. The version directory itself is never touched here; promotion
/// happens once, through [`atomic_replace`], so a crash at any point leaves
/// either the previous tree or the new one, never a mix.
pub(crate) fn install_entry(
  deployment: &Deployment,
  entry: &UpdateEntry,
  host_tag: &str,
  base_dir: Option<&Path>,
  progress: &Progress,
) -> Result<PathBuf, Error> {
  let staged_package = deployment.staging_dir().join(&entry.filename);
  let file = File::open(&staged_package)?;
  let mut archive = zip::ZipArchive::new(file)?;
  let names: Vec<String> = archive.file_names().map(String::from).collect();

  let variant = select_variant(names.iter().map(|name| name.as_str()), host_tag, &entry.filename)?;
  let prefix = format!("{}{}/", VARIANT_ROOT, variant);
  // refuse os-specific diff payloads up front, before any file is touched
  if !cfg!(windows) && names.iter().any(|name| name.starts_with(&prefix) && name.ends_with(".diff")) {
    return Err(Error::UnsupportedHostForFormat(entry.filename.clone(), "msdelta diff payloads apply only on windows"));
  }

  let extract_dir = deployment.staging_dir().join(format!("extract-{}", crate::resolve::normalized(&entry.version)));
  if extract_dir.exists() {
    std::fs::remove_dir_all(&extract_dir)?;
  }
  std::fs::create_dir_all(&extract_dir)?;
  if entry.is_delta {
    match base_dir {
      Some(base) => copy_dir_recursive(base, &extract_dir)?,
      None => return Err(Error::NotInstalledDeployment()),
    }
  }

  let subtree: Vec<&String> = names.iter().filter(|name| name.starts_with(&prefix) && !name.ends_with('/')).collect();
  progress.set_install_total(subtree.len() as u64);
  let mut checksums: Vec<(PathBuf, String)> = Vec::new();

  for name in &subtree {
    let relative = &name[prefix.len()..];
    let mut content = Vec::new();
    archive.by_name(name)?.read_to_end(&mut content)?;

    if let Some(target) = relative.strip_suffix(".shasum") {
      // verified in a second pass, once the target file is materialized
      checksums.push((extract_dir.join(target), String::from_utf8(content)?));
    } else if let Some(target) = relative.strip_suffix(".bsdiff") {
      let target = extract_dir.join(target);
      let base = std::fs::read(&target)?;
      let rebuilt = patch::apply(&base, &content)?;
      std::fs::write(&target, rebuilt)?;
    } else if let Some(target) = relative.strip_suffix(".diff") {
      apply_msdelta(&extract_dir.join(target), &content, &entry.filename)?;
    } else if content.is_empty() && entry.is_delta {
      debug!("{} unchanged since the previous version", relative);
    } else {
      let dest = extract_dir.join(relative);
      if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
      }
      std::fs::write(&dest, content)?;
    }
    progress.increment_installed_files();
  }

  for (target, manifest) in checksums {
    let expected = match manifest.split_whitespace().next() {
      Some(hash) => hash.to_string(),
      None => return Err(Error::ManifestCorrupt(format!("empty checksum manifest for {:?}", target))),
    };
    let check = hashes::verify(&mut File::open(&target)?, &expected)?;
    if !check.matches {
      return Err(Error::HashMismatch(target.to_string_lossy().to_string(), expected, check.computed));
    }
  }

  std::fs::remove_file(&staged_package)?;
  debug!("built {} in {:?}", entry.filename, extract_dir);
  Ok(extract_dir)
}

/// Picks the single `lib/<variant>/` subtree a package offers this host.
///
/// A variant matches when its name contains the host tag. A package with
/// exactly one variant installs regardless of its name; anything else that
/// does not narrow down to one match is unavailable on this host.
pub(crate) fn select_variant<'a>(names: impl Iterator<Item = &'a str>, host_tag: &str, package: &str) -> Result<String, Error> {
  let mut variants: Vec<&str> = names
    .filter_map(|name| name.strip_prefix(VARIANT_ROOT))
    .filter_map(|rest| rest.split('/').next())
    .filter(|variant| !variant.is_empty())
    .collect();
  variants.sort_unstable();
  variants.dedup();

  let matches: Vec<&&str> = variants.iter().filter(|variant| variant.contains(host_tag)).collect();
  match (matches.len(), variants.len()) {
    (1, _) => Ok(matches[0].to_string()),
    (0, 1) => Ok(variants[0].to_string()),
    _ => Err(Error::VariantUnavailable(format!("{} offers [{}] for host {}", package, variants.join(", "), host_tag))),
  }
}

/// Swaps a fully built tree into place with two renames.
///
/// The crash window between them leaves a `<dir>.old` next to a missing
/// destination; the leftover cleanup at the top makes the swap safe to
/// retry.
pub(crate) fn atomic_replace(dest: &Path, staged: &Path) -> Result<(), Error> {
  let old = match dest.file_name().and_then(|name| name.to_str()) {
    Some(name) => dest.with_file_name(format!("{}.old", name)),
    None => return Err(Error::IoError(std::io::Error::new(std::io::ErrorKind::InvalidInput, "destination has no directory name"))),
  };
  if old.exists() {
    std::fs::remove_dir_all(&old)?;
  }
  if dest.exists() {
    std::fs::rename(dest, &old)?;
  }
  std::fs::rename(staged, dest)?;
  if old.exists() {
    std::fs::remove_dir_all(&old)?;
  }
  Ok(())
}

pub(crate) fn copy_dir_recursive(from: &Path, to: &Path) -> Result<(), Error> {
  std::fs::create_dir_all(to)?;
  for entry in std::fs::read_dir(from)? {
    let entry = entry?;
    let dest = to.join(entry.file_name());
    if entry.file_type()?.is_dir() {
      copy_dir_recursive(&entry.path(), &dest)?;
    } else {
      std::fs::copy(entry.path(), &dest)?;
    }
  }
  Ok(())
}

#[cfg(windows)]
fn apply_msdelta(target: &Path, delta: &[u8], _package: &str) -> Result<(), Error> {
  let base = std::fs::read(target)?;
  let rebuilt = msdelta::apply(&base, delta)?;
  std::fs::write(target, rebuilt)?;
  Ok(())
}

#[cfg(not(windows))]
fn apply_msdelta(_target: &Path, _delta: &[u8], package: &str) -> Result<(), Error> {
  Err(Error::UnsupportedHostForFormat(package.to_string(), "msdelta diff payloads apply only on windows"))
}

#[cfg(windows)]
mod msdelta {
  use crate::structures::Error;
  use std::ffi::c_void;

  #[repr(C)]
  struct DeltaInput {
    start: *const c_void,
    size: usize,
    editable: i32,
  }

  #[repr(C)]
  struct DeltaOutput {
    start: *mut c_void,
    size: usize,
  }

  #[link(name = "msdelta")]
  extern "system" {
    fn ApplyDeltaB(apply_flags: i64, source: DeltaInput, delta: DeltaInput, target: *mut DeltaOutput) -> i32;
    fn DeltaFree(memory: *mut c_void) -> i32;
  }

  pub(super) fn apply(base: &[u8], delta: &[u8]) -> Result<Vec<u8>, Error> {
    let source = DeltaInput { start: base.as_ptr() as *const c_void, size: base.len(), editable: 0 };
    let patch = DeltaInput { start: delta.as_ptr() as *const c_void, size: delta.len(), editable: 0 };
    let mut output = DeltaOutput { start: std::ptr::null_mut(), size: 0 };
    // SAFETY: both inputs outlive the call and the output buffer is owned by
    // msdelta until DeltaFree below
    unsafe {
      if ApplyDeltaB(0, source, patch, &mut output) == 0 {
        return Err(Error::CorruptPatch("msdelta rejected the diff payload"));
      }
      let rebuilt = std::slice::from_raw_parts(output.start as *const u8, output.size).to_vec();
      DeltaFree(output.start);
      Ok(rebuilt)
    }
  }
}
