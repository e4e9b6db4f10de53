pub(crate) mod support {
  use std::collections::HashMap;
  use std::io::Write;
  use std::path::Path;

  use async_trait::async_trait;
  use zip::write::SimpleFileOptions;

  use crate::structures::{Error, Release, ReleaseAsset, SourceError};
  use crate::traits::ReleaseSource;

  /// In-memory release source: a canned release, text assets and file
  /// assets keyed by url.
  #[derive(Default)]
  pub(crate) struct MockSource {
    pub(crate) release: Option<Release>,
    pub(crate) texts: HashMap<String, String>,
    pub(crate) files: HashMap<String, Vec<u8>>,
  }

  impl MockSource {
    pub(crate) fn set_release(&mut self, id: u64, tag: &str, assets: &[(&str, &str)]) {
      self.release = Some(Release {
        id,
        tag: tag.to_string(),
        assets: assets
          .iter()
          .map(|(name, url)| ReleaseAsset {
            name: name.to_string(),
            size: self.files.get(*url).map(|content| content.len() as u64).unwrap_or(0),
            download_url: url.to_string(),
          })
          .collect(),
      });
    }

    pub(crate) fn add_text(&mut self, url: &str, text: &str) {
      self.texts.insert(url.to_string(), text.to_string());
    }

    pub(crate) fn add_file(&mut self, url: &str, content: &[u8]) {
      self.files.insert(url.to_string(), content.to_vec());
    }
  }

  #[async_trait]
  impl ReleaseSource for MockSource {
    async fn latest_release(&self) -> Result<Release, Error> {
      self.release.clone().ok_or(Error::NoResponse())
    }

    async fn fetch_text(&self, url: &str) -> Result<String, Error> {
      self
        .texts
        .get(url)
        .cloned()
        .ok_or_else(|| Error::UnsuccessfulResponse(SourceError { message: format!("no text asset at {}", url), documentation_url: String::new() }))
    }

    async fn fetch_file(&self, url: &str, dest: &Path, on_chunk: &mut (dyn FnMut(u64, Option<u64>) + Send)) -> Result<(), Error> {
      let content = self
        .files
        .get(url)
        .ok_or_else(|| Error::UnsuccessfulResponse(SourceError { message: format!("no file asset at {}", url), documentation_url: String::new() }))?;
      std::fs::write(dest, content)?;
      on_chunk(content.len() as u64, Some(content.len() as u64));
      Ok(())
    }
  }

  pub(crate) fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, content) in entries {
      writer.start_file(*name, SimpleFileOptions::default()).unwrap();
      writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
  }

  pub(crate) fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    std::fs::write(path, zip_bytes(entries)).unwrap();
  }

  pub(crate) fn manifest_record(content: &[u8], filename: &str) -> String {
    let hash = crate::hashes::hash_reader(&mut &content[..]).unwrap();
    format!("{} {} {}\r", hash, filename, content.len())
  }
}

#[cfg(test)]
mod flow {
  use super::support::{manifest_record, zip_bytes, MockSource};
  use crate::deployment::Deployment;
  use crate::fetcher::UpdateFetcher;
  use crate::structures::{Error, FetcherState};
  use semver::Version;

  const MANIFEST_URL: &str = "mock://RELEASES";
  const PACKAGE_URL: &str = "mock://package";

  fn source_with_package(filename: &str, package: &[u8]) -> MockSource {
    let mut source = MockSource::default();
    source.add_file(PACKAGE_URL, package);
    source.add_text(MANIFEST_URL, &manifest_record(package, filename));
    source.set_release(9, "v2.0.0", &[("RELEASES", MANIFEST_URL), (filename, PACKAGE_URL)]);
    source
  }

  fn fetcher_at(root: &std::path::Path, installed: Version, source: MockSource) -> UpdateFetcher<MockSource> {
    UpdateFetcher::new(source, Deployment::at_root(root, installed))
  }

  #[tokio::test]
  async fn a_newer_release_reports_an_update() {
    let root = tempfile::tempdir().unwrap();
    let package = zip_bytes(&[("package.json", br#"{"version":"2.0.0"}"#), ("lib/linux/app.bin", b"v2")]);
    let fetcher = fetcher_at(root.path(), Version::new(1, 5, 0), source_with_package("app-2.0.0-full.zip", &package));
    let outcome = fetcher.check_for_update().await;
    assert!(outcome.has_update());
    let manifest = outcome.manifest.unwrap();
    assert_eq!(manifest.newest_version, Version::new(2, 0, 0));
    assert!(!manifest.installed_version_in_manifest);
    assert_eq!(manifest.entries[0].download_uri.as_deref(), Some(PACKAGE_URL));
    assert_eq!(fetcher.state(), FetcherState::Idle);
  }

  #[tokio::test]
  async fn the_installed_version_is_not_an_update() {
    let root = tempfile::tempdir().unwrap();
    let package = zip_bytes(&[("package.json", br#"{"version":"1.5.0"}"#)]);
    let fetcher = fetcher_at(root.path(), Version::new(1, 5, 0), source_with_package("app-1.5.0-full.zip", &package));
    let outcome = fetcher.check_for_update().await;
    assert!(!outcome.has_update());
    let manifest = outcome.manifest.unwrap();
    assert!(manifest.installed_version_in_manifest);
  }

  #[tokio::test]
  async fn unconventional_names_resolve_from_the_archive() {
    let root = tempfile::tempdir().unwrap();
    let package = zip_bytes(&[("package.json", br#"{"version":"2.0.0"}"#), ("lib/linux/app.bin", b"v2")]);
    let fetcher = fetcher_at(root.path(), Version::new(1, 0, 0), source_with_package("payload.zip", &package));
    let outcome = fetcher.check_for_update().await;
    let manifest = outcome.manifest.expect("archive inspection should resolve the entry");
    assert_eq!(manifest.entries[0].version, Version::new(2, 0, 0));
    assert!(!manifest.entries[0].is_delta);
    // the inspected download stays staged for the download phase to reuse
    assert!(root.path().join("staging/payload.zip").is_file());
  }

  #[tokio::test]
  async fn an_unreachable_source_is_a_diagnostic_not_a_fault() {
    let root = tempfile::tempdir().unwrap();
    let fetcher = fetcher_at(root.path(), Version::new(1, 0, 0), MockSource::default());
    let outcome = fetcher.check_for_update().await;
    assert!(!outcome.has_update());
    assert!(outcome.manifest.is_none());
    assert!(outcome.diagnostic.is_some());
    assert_eq!(fetcher.state(), FetcherState::Idle);
  }

  #[tokio::test]
  async fn a_release_without_a_manifest_asset_is_missing() {
    let root = tempfile::tempdir().unwrap();
    let mut source = MockSource::default();
    source.set_release(9, "v2.0.0", &[("app-2.0.0-full.zip", PACKAGE_URL)]);
    let fetcher = fetcher_at(root.path(), Version::new(1, 0, 0), source);
    let outcome = fetcher.check_for_update().await;
    assert!(outcome.manifest.is_none());
  }

  #[tokio::test]
  async fn downloading_without_a_prior_check_checks_first() {
    let root = tempfile::tempdir().unwrap();
    let package = zip_bytes(&[("package.json", br#"{"version":"2.0.0"}"#), ("lib/linux/app.bin", b"v2")]);
    let fetcher = fetcher_at(root.path(), Version::new(1, 0, 0), source_with_package("app-2.0.0-full.zip", &package));
    fetcher.download_pending().await.unwrap();
    assert!(fetcher.manifest().is_some());
    assert!(root.path().join("staging/app-2.0.0-full.zip").is_file());
  }

  #[tokio::test]
  async fn downloading_against_an_unreachable_source_surfaces_the_fault() {
    let root = tempfile::tempdir().unwrap();
    let fetcher = fetcher_at(root.path(), Version::new(1, 0, 0), MockSource::default());
    assert!(matches!(fetcher.download_pending().await, Err(Error::NoResponse())));
  }

  #[tokio::test]
  async fn installing_before_checking_is_refused() {
    let root = tempfile::tempdir().unwrap();
    let fetcher = fetcher_at(root.path(), Version::new(1, 0, 0), MockSource::default());
    assert!(matches!(fetcher.install_pending(), Err(Error::ManifestMissing())));
  }

  #[tokio::test]
  async fn source_errors_carry_their_payload() {
    let source = MockSource::default();
    match crate::traits::ReleaseSource::fetch_text(&source, "mock://absent").await {
      Err(Error::UnsuccessfulResponse(payload)) => assert!(payload.message.contains("mock://absent")),
      other => panic!("expected an UnsuccessfulResponse, got {:?}", other.map(|_| ())),
    }
  }

  #[tokio::test]
  async fn install_failures_surface_through_the_callback() {
    let root = tempfile::tempdir().unwrap();
    let package = zip_bytes(&[("package.json", br#"{"version":"2.0.0"}"#), ("lib/linux/app.bin", b"v2")]);
    let fetcher = fetcher_at(root.path(), Version::new(1, 0, 0), source_with_package("app-2.0.0-full.zip", &package));
    std::fs::create_dir_all(root.path().join("app-1.0.0")).unwrap();
    let outcome = fetcher.check_for_update().await;
    let manifest = outcome.manifest.unwrap();
    fetcher.download_pending().await.unwrap();
    // corrupt the staged archive after verification, the installer has to notice
    std::fs::write(root.path().join("staging/app-2.0.0-full.zip"), b"not a zip archive").unwrap();
    let selected = manifest.selected_entries(&Version::new(1, 0, 0));
    let mut failures: Vec<String> = Vec::new();
    let result = fetcher.install_updates(&selected, |_, _| {}, |failed, _| failures.push(failed.filename.clone()));
    assert!(result.is_err());
    assert_eq!(failures, vec!["app-2.0.0-full.zip".to_string()]);
    assert!(!root.path().join("app-2.0.0").exists());
  }

  #[tokio::test]
  async fn check_download_install_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let host = Deployment::host_variant_tag();
    let package = zip_bytes(&[
      ("package.json", br#"{"version":"2.0.0"}"#),
      (&format!("lib/{}/app.bin", host), b"version two"),
    ]);
    let fetcher = fetcher_at(root.path(), Version::new(1, 0, 0), source_with_package("app-2.0.0-full.zip", &package));
    // the running version exists on disk as its own directory
    std::fs::create_dir_all(root.path().join("app-1.0.0")).unwrap();

    let outcome = fetcher.check_for_update().await;
    assert!(outcome.has_update());
    fetcher.download_pending().await.unwrap();
    assert!(root.path().join("staging/app-2.0.0-full.zip").is_file());

    let installed = fetcher.install_pending().unwrap();
    assert_eq!(installed, root.path().join("app-2.0.0"));
    assert_eq!(std::fs::read(installed.join("app.bin")).unwrap(), b"version two");
    // the staged package was consumed by the install
    assert!(!root.path().join("staging/app-2.0.0-full.zip").exists());
    assert_eq!(fetcher.state(), FetcherState::Idle);
  }
}
