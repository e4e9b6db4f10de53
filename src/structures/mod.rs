pub mod update_entry;
pub use update_entry::UpdateEntry;

pub mod update_manifest;
pub use update_manifest::UpdateManifest;

pub mod release;
pub use release::{Release, ReleaseAsset, ResponseStatus, SourceError};

pub mod patch_header;
pub use patch_header::PatchHeader;

pub mod progress;
pub use progress::Progress;

pub mod error;
pub use error::Error;

pub mod state;
pub use state::FetcherState;
pub(crate) use state::OperationGuard;
