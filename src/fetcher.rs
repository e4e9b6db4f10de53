use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::deployment::Deployment;
use crate::downloader;
use crate::hashes;
use crate::installer;
use crate::manifest::parse_manifest;
use crate::resolve;
use crate::structures::{Error, FetcherState, OperationGuard, Progress, UpdateEntry, UpdateManifest};
use crate::traits::ReleaseSource;

/// Assets whose name starts with this are release manifests.
pub(crate) const MANIFEST_ASSET_PREFIX: &str = "RELEASES";
pub(crate) const PACKAGE_EXTENSION: &str = ".zip";

/// What a check produced: a manifest when the release source answered, a
/// diagnostic when it did not. Checking never faults the caller.
#[derive(Debug, Clone, Default)]
pub struct CheckOutcome {
  pub manifest: Option<Arc<UpdateManifest>>,
  pub diagnostic: Option<String>,
}

impl CheckOutcome {
  pub fn has_update(&self) -> bool {
    self.manifest.as_ref().map(|manifest| manifest.has_update).unwrap_or(false)
  }
}

/// Drives the whole update flow against one release source: check, download,
/// install. One operation at a time; a second call while one is running
/// returns [`Error::OperationInProgress`] instead of queueing.
pub struct UpdateFetcher<S: ReleaseSource> {
  source: S,
  deployment: Deployment,
  state: AtomicU8,
  cancelled: AtomicBool,
  progress: Arc<Progress>,
  manifest: Mutex<Option<Arc<UpdateManifest>>>,
}

impl<S: ReleaseSource> UpdateFetcher<S> {
  pub fn new(source: S, deployment: Deployment) -> UpdateFetcher<S> {
    UpdateFetcher {
      source,
      deployment,
      state: AtomicU8::new(FetcherState::Idle as u8),
      cancelled: AtomicBool::new(false),
      progress: Arc::new(Progress::new()),
      manifest: Mutex::new(None),
    }
  }

  pub fn state(&self) -> FetcherState {
    FetcherState::from_u8(self.state.load(Ordering::SeqCst))
  }

  pub fn progress(&self) -> Arc<Progress> {
    self.progress.clone()
  }

  /// The manifest produced by the most recent successful check.
  pub fn manifest(&self) -> Option<Arc<UpdateManifest>> {
    self.manifest.lock().ok().and_then(|guard| guard.clone())
  }

  /// Requests that the running operation stop at the next entry boundary.
  pub fn cancel(&self) {
    self.cancelled.store(true, Ordering::SeqCst);
  }

  /// Queries the release source for updates. Never returns an error: a
  /// failed check reports its cause as a diagnostic so callers at app
  /// startup do not have to guard the happy path.
  pub async fn check_for_update(&self) -> CheckOutcome {
    match self.try_check().await {
      Ok(manifest) => CheckOutcome { manifest: Some(manifest), diagnostic: None },
      Err(error) => {
        warn!("update check failed: {}", error);
        CheckOutcome { manifest: None, diagnostic: Some(error.to_string()) }
      }
    }
  }

  async fn try_check(&self) -> Result<Arc<UpdateManifest>, Error> {
    self.ensure_installed()?;
    let _guard = OperationGuard::acquire(&self.state, FetcherState::Checking)?;
    self.cancelled.store(false, Ordering::SeqCst);
    self.progress.set_current_action("checking for updates");

    let release = self.source.latest_release().await?;
    info!("latest release is {} (id {})", release.tag, release.id);

    let mut manifests = release.assets.iter().filter(|asset| asset.name.starts_with(MANIFEST_ASSET_PREFIX));
    let manifest_asset = match manifests.next() {
      Some(asset) => asset,
      None => return Err(Error::ManifestMissing()),
    };
    if manifests.next().is_some() {
      warn!("release {} carries more than one manifest asset, using {}", release.tag, manifest_asset.name);
    }

    let text = self.source.fetch_text(&manifest_asset.download_url).await?;
    if text.trim().is_empty() {
      return Err(Error::ManifestEmpty());
    }
    let parsed = parse_manifest(&text, release.id)?;

    let mut entries: Vec<UpdateEntry> = Vec::with_capacity(parsed.len());
    for (_, mut entry) in parsed {
      if !entry.filename.ends_with(PACKAGE_EXTENSION) {
        warn!("{} does not look like a package asset", entry.filename);
      }
      entry.download_uri = release
        .assets
        .iter()
        .find(|asset| asset.name == entry.filename)
        .map(|asset| asset.download_url.clone());
      if entry.download_uri.is_none() {
        return Err(Error::ManifestCorrupt(format!("manifest lists {} but the release has no such asset", entry.filename)));
      }
      self.resolve_entry(&mut entry).await?;
      entries.push(entry);
    }

    let manifest = Arc::new(UpdateManifest::from_entries(entries, &self.deployment.installed_version)?);
    if let Ok(mut slot) = self.manifest.lock() {
      *slot = Some(manifest.clone());
    }
    self.progress.set_current_action("check complete");
    Ok(manifest)
  }

  /// Fills in version and kind for one entry, from its filename when it
  /// follows the naming convention, otherwise from the metadata inside the
  /// archive. The fallback stages the download; a later download pass
  /// reuses the staged file instead of fetching it again.
  async fn resolve_entry(&self, entry: &mut UpdateEntry) -> Result<(), Error> {
    if let Some((version, is_delta)) = resolve::version_and_kind_from_filename(&entry.filename) {
      entry.version = version;
      entry.is_delta = is_delta;
      return Ok(());
    }
    info!("{} does not resolve from its name, inspecting the archive", entry.filename);
    let staging = self.deployment.staging_dir();
    std::fs::create_dir_all(&staging)?;
    let staged = staging.join(&entry.filename);
    let reusable = staged.is_file() && hashes::get_hash(&staged)?.eq_ignore_ascii_case(&entry.content_hash);
    if !reusable {
      let uri = match &entry.download_uri {
        Some(uri) => uri.clone(),
        None => return Err(Error::ManifestCorrupt(format!("{} has no resolved download location", entry.filename))),
      };
      self.source.fetch_file(&uri, &staged, &mut |_, _| {}).await?;
      let check = hashes::verify(&mut std::fs::File::open(&staged)?, &entry.content_hash)?;
      if !check.matches {
        std::fs::remove_file(&staged)?;
        return Err(Error::HashMismatch(entry.filename.clone(), entry.content_hash.clone(), check.computed));
      }
    }
    let (version, is_delta) = resolve::inspect_package(&staged)?;
    entry.version = version;
    entry.is_delta = is_delta;
    Ok(())
  }

  /// Downloads the given entries into staging, with per-file and aggregate
  /// completion callbacks in percent.
  pub async fn download_updates(
    &self,
    entries: &[UpdateEntry],
    on_total: impl FnMut(f64) + Send,
    on_file: impl FnMut(&UpdateEntry, f64) + Send,
    on_failure: impl FnMut(&UpdateEntry, &Error) + Send,
  ) -> Result<(), Error> {
    self.ensure_installed()?;
    let _guard = OperationGuard::acquire(&self.state, FetcherState::Downloading)?;
    self.cancelled.store(false, Ordering::SeqCst);
    downloader::download_entries(
      &self.source,
      &self.deployment.staging_dir(),
      entries,
      &self.progress,
      &self.cancelled,
      on_total,
      on_file,
      on_failure,
    )
    .await
  }

  /// Downloads the selected chain without callbacks, for callers that only
  /// poll [`progress`].
  pub async fn download_pending(&self) -> Result<(), Error> {
    // no cached manifest means nobody checked yet, do it now
    let manifest = match self.manifest() {
      Some(manifest) => manifest,
      None => self.try_check().await?,
    };
    let selected = manifest.selected_entries(&self.deployment.installed_version);
    self.download_updates(&selected, |_| {}, |_, _| {}, |_, _| {}).await
  }

  /// Installs the given entries in order, returning the directory of the
  /// final version. `on_progress` reports aggregate percent after each
  /// entry; `on_failure` fires once with the entry that failed. The running
  /// version's directory is never modified.
  pub fn install_updates(
    &self,
    entries: &[UpdateEntry],
    on_progress: impl FnMut(&UpdateEntry, f64),
    on_failure: impl FnMut(&UpdateEntry, &Error),
  ) -> Result<PathBuf, Error> {
    self.ensure_installed()?;
    let _guard = OperationGuard::acquire(&self.state, FetcherState::Installing)?;
    self.cancelled.store(false, Ordering::SeqCst);
    installer::install_entries(&self.deployment, entries, &self.progress, &self.cancelled, on_progress, on_failure)
  }

  /// Installs the selected chain without callbacks.
  pub fn install_pending(&self) -> Result<PathBuf, Error> {
    let manifest = self.manifest().ok_or(Error::ManifestMissing())?;
    let selected = manifest.selected_entries(&self.deployment.installed_version);
    self.install_updates(&selected, |_, _| {}, |_, _| {})
  }

  fn ensure_installed(&self) -> Result<(), Error> {
    // development builds run out of a build tree, let them exercise the flow
    if !self.deployment.is_installed && !cfg!(debug_assertions) {
      return Err(Error::NotInstalledDeployment());
    }
    Ok(())
  }
}
