use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::hashes;
use crate::structures::{Error, Progress, UpdateEntry};
use crate::traits::ReleaseSource;

/// Downloads every entry into the staging directory, verifying each file
/// against its manifest hash as it completes.
///
/// Already staged files whose hash matches are reused without touching the
/// network, which is what makes an interrupted batch resumable. A staged
/// file that fails verification is deleted and fetched again once; a fresh
/// download that still fails verification deletes the file, reports the
/// failure and halts the batch. Later entries are not attempted, partial
/// update sets must never reach the installer.
pub(crate) async fn download_entries<S>(
  source: &S,
  staging_dir: &Path,
  entries: &[UpdateEntry],
  progress: &Progress,
  cancelled: &AtomicBool,
  mut on_total: impl FnMut(f64) + Send,
  mut on_file: impl FnMut(&UpdateEntry, f64) + Send,
  mut on_failure: impl FnMut(&UpdateEntry, &Error) + Send,
) -> Result<(), Error>
where
  S: ReleaseSource + ?Sized,
{
  std::fs::create_dir_all(staging_dir)?;
  let total_files = entries.len() as u64;
  let total_bytes: u64 = entries.iter().map(|entry| entry.filesize).sum();
  progress.set_download_totals(total_files, total_bytes);

  for (index, entry) in entries.iter().enumerate() {
    if cancelled.load(Ordering::SeqCst) {
      return Err(Error::Cancelled());
    }
    progress.set_current_action(&format!("downloading {}", entry.filename));
    let staged = staging_dir.join(&entry.filename);

    if staged.is_file() {
      match hashes::get_hash(&staged) {
        Ok(computed) if computed.eq_ignore_ascii_case(&entry.content_hash) => {
          info!("{} already staged with a matching hash, skipping download", entry.filename);
          progress.add_downloaded_bytes(entry.filesize);
          progress.increment_downloaded_files();
          on_file(entry, 100.0);
          on_total((index as f64 + 1.0) / total_files as f64 * 100.0);
          continue;
        }
        Ok(computed) => {
          warn!("staged {} has hash {}, expected {}, refetching", entry.filename, computed, entry.content_hash);
          std::fs::remove_file(&staged)?;
        }
        Err(error) => {
          warn!("staged {} is unreadable ({}), refetching", entry.filename, error);
          std::fs::remove_file(&staged)?;
        }
      }
    }

    let uri = match &entry.download_uri {
      Some(uri) => uri.as_str(),
      None => return Err(Error::ManifestCorrupt(format!("{} has no resolved download location", entry.filename))),
    };
    debug!("fetching {} from {}", entry.filename, uri);
    let mut reported: u64 = 0;
    let fallback_size = entry.filesize;
    {
      let mut on_chunk = |received: u64, content_length: Option<u64>| {
        let expected = content_length.unwrap_or(fallback_size).max(1);
        let fraction = (received as f64 / expected as f64).min(1.0);
        progress.add_downloaded_bytes(received.saturating_sub(reported));
        reported = received;
        on_file(entry, fraction * 100.0);
        on_total((index as f64 + fraction) / total_files as f64 * 100.0);
      };
      source.fetch_file(uri, &staged, &mut on_chunk).await?;
    }

    let check = hashes::verify(&mut std::fs::File::open(&staged)?, &entry.content_hash)?;
    if !check.matches {
      std::fs::remove_file(&staged)?;
      let error = Error::HashMismatch(entry.filename.clone(), entry.content_hash.clone(), check.computed.clone());
      let mut failed = entry.clone();
      failed.computed_hash = Some(check.computed);
      on_failure(&failed, &error);
      return Err(error);
    }

    progress.increment_downloaded_files();
    on_file(entry, 100.0);
    on_total((index as f64 + 1.0) / total_files as f64 * 100.0);
  }
  progress.set_current_action("downloads complete");
  Ok(())
}
