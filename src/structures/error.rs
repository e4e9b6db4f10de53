use crate::structures::{FetcherState, SourceError};

#[derive(Debug)]
pub enum Error {
  /// The release source could not be reached at all
  NetworkUnavailable(reqwest::Error),
  /// The release source answered with an empty body
  NoResponse(),
  /// The release source answered with an error payload
  UnsuccessfulResponse(SourceError),
  /// The latest release carries no manifest asset
  ManifestMissing(),
  /// The manifest asset exists but has no content
  ManifestEmpty(),
  /// The manifest asset could not be parsed; detail of the offending record
  ManifestCorrupt(String),
  /// A patch stream failed structural validation
  CorruptPatch(&'static str),
  /// A file's content hash did not match; file, expected hash, computed hash
  HashMismatch(String, String, String),
  /// No single variant subtree in a package matches the running host
  VariantUnavailable(String),
  /// A diff payload uses a codec the running host cannot apply; file, detail
  UnsupportedHostForFormat(String, &'static str),
  /// The running process is not an installed deployment
  NotInstalledDeployment(),
  /// Another operation currently holds the fetcher
  OperationInProgress(FetcherState),
  /// The operation was cancelled between entries
  Cancelled(),
  InvalidVersion(semver::Error),
  InvalidUri(url::ParseError),
  IoError(std::io::Error),
  ZipError(zip::result::ZipError),
  JsonError(json::Error),
  NotUtf8(std::string::FromUtf8Error),
}
