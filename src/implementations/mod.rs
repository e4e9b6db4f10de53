mod error;
mod progress;
mod update_manifest;
