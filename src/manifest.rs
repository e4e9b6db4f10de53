use std::collections::BTreeMap;

use crate::structures::{Error, UpdateEntry};

/// Parses a release manifest blob into entries keyed by filename.
///
/// Records are separated by carriage return and hold
/// `<hex-hash> <filename> <filesize>[ <required>]`. Blank records are
/// skipped; a malformed size or required flag fails the whole parse, since a
/// partially understood manifest must never drive an update.
pub(crate) fn parse_manifest(text: &str, release_id: u64) -> Result<BTreeMap<String, UpdateEntry>, Error> {
  let mut entries = BTreeMap::new();
  for record in text.split('\r') {
    let record = record.trim();
    if record.is_empty() {
      continue;
    }
    let fields: Vec<&str> = record.split(' ').collect();
    if fields.len() < 3 {
      return Err(Error::ManifestCorrupt(format!("record {:?} has {} fields, expected at least 3", record, fields.len())));
    }
    let filesize = fields[2]
      .trim()
      .parse::<u64>()
      .map_err(|_| Error::ManifestCorrupt(format!("{:?} is not a valid file size", fields[2])))?;
    let update_required = match fields.get(3) {
      Some(flag) => flag
        .trim()
        .parse::<bool>()
        .map_err(|_| Error::ManifestCorrupt(format!("{:?} is not a valid required flag", flag)))?,
      None => false,
    };
    let entry = UpdateEntry::new(release_id, fields[0], fields[1], filesize, update_required);
    // duplicate filenames: the last record wins
    entries.insert(entry.filename.clone(), entry);
  }
  Ok(entries)
}
