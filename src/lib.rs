//! Self-update client for desktop applications.
//!
//! The flow runs in three explicit phases driven by an [`UpdateFetcher`]:
//! check the release source for a manifest, download and verify the selected
//! packages into staging, then install each package into its own version
//! directory next to the running one. Delta packages carry bsdiff payloads
//! and apply on top of a known baseline; anything else re-baselines from a
//! full package.

mod chain;
mod downloader;
mod implementations;
mod installer;
mod manifest;
mod resolve;

pub mod deployment;
pub mod fetcher;
pub mod github;
pub mod hashes;
pub mod patch;
pub mod structures;
pub mod traits;

#[cfg(test)]
pub(crate) mod tests;

pub use crate::deployment::Deployment;
pub use crate::fetcher::{CheckOutcome, UpdateFetcher};
pub use crate::github::GithubSource;
pub use crate::structures::{Error, FetcherState, Progress, UpdateEntry, UpdateManifest};
pub use crate::traits::ReleaseSource;
