use crate::structures::Error;

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    match self {
      Error::NetworkUnavailable(error) => write!(f, "the release source could not be reached: {}", error),
      Error::NoResponse() => write!(f, "the release source gave no response"),
      Error::UnsuccessfulResponse(source_error) => {
        write!(f, "the release source answered with an error: {} (see {})", source_error.message, source_error.documentation_url)
      }
      Error::ManifestMissing() => write!(f, "the latest release has no manifest file"),
      Error::ManifestEmpty() => write!(f, "the manifest file has no content"),
      Error::ManifestCorrupt(detail) => write!(f, "the manifest file is corrupt: {}", detail),
      Error::CorruptPatch(reason) => write!(f, "corrupt patch: {}", reason),
      Error::HashMismatch(file, expected, computed) => {
        write!(f, "hash for {} is incorrect!\nGot hash: {}\nExpected hash: {}", file, computed, expected)
      }
      Error::VariantUnavailable(detail) => write!(f, "no usable variant in package: {}", detail),
      Error::UnsupportedHostForFormat(file, detail) => {
        write!(f, "{} cannot be applied on this host: {}", file, detail)
      }
      Error::NotInstalledDeployment() => {
        write!(f, "this is not an installed application, install it before updating")
      }
      Error::OperationInProgress(state) => write!(f, "the fetcher is already {}", state),
      Error::Cancelled() => write!(f, "the operation was cancelled"),
      Error::InvalidVersion(error) => write!(f, "invalid version: {}", error),
      Error::InvalidUri(error) => write!(f, "invalid uri: {}", error),
      Error::IoError(error) => write!(f, "io error: {}", error),
      Error::ZipError(error) => write!(f, "package archive error: {}", error),
      Error::JsonError(error) => write!(f, "json error: {}", error),
      Error::NotUtf8(error) => write!(f, "response was not utf-8: {}", error),
    }
  }
}

impl From<reqwest::Error> for Error {
  #[track_caller]
  #[inline(always)]
  fn from(error: reqwest::Error) -> Self {
    log_error(&error);
    Self::NetworkUnavailable(error)
  }
}

impl From<semver::Error> for Error {
  #[track_caller]
  #[inline(always)]
  fn from(error: semver::Error) -> Self {
    log_error(&error);
    Self::InvalidVersion(error)
  }
}

impl From<url::ParseError> for Error {
  #[track_caller]
  #[inline(always)]
  fn from(error: url::ParseError) -> Self {
    log_error(&error);
    Self::InvalidUri(error)
  }
}

impl From<std::io::Error> for Error {
  #[track_caller]
  #[inline(always)]
  fn from(error: std::io::Error) -> Self {
    log_error(&error);
    Self::IoError(error)
  }
}

impl From<zip::result::ZipError> for Error {
  #[track_caller]
  #[inline(always)]
  fn from(error: zip::result::ZipError) -> Self {
    log_error(&error);
    Self::ZipError(error)
  }
}

impl From<json::Error> for Error {
  #[track_caller]
  #[inline(always)]
  fn from(error: json::Error) -> Self {
    log_error(&error);
    Self::JsonError(error)
  }
}

impl From<std::string::FromUtf8Error> for Error {
  #[track_caller]
  #[inline(always)]
  fn from(error: std::string::FromUtf8Error) -> Self {
    log_error(&error);
    Self::NotUtf8(error)
  }
}

#[track_caller]
fn log_error(error: &(impl std::error::Error + ?Sized)) {
  tracing::error!("{:?}", error);
}
