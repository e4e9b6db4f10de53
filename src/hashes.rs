use std::fs::OpenOptions;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::structures::Error;

/// Outcome of a hash comparison; the computed digest is kept even on
/// mismatch so failures can report both sides.
#[derive(Debug, Clone)]
pub struct HashCheck {
  pub matches: bool,
  pub computed: String,
}

///
/// Opens a file and calculates its SHA256 hash
///
pub(crate) fn get_hash(file_path: &Path) -> Result<String, Error> {
  let mut file = OpenOptions::new().read(true).open(file_path)?;
  hash_reader(&mut file)
}

pub(crate) fn hash_reader(reader: &mut impl Read) -> Result<String, Error> {
  let mut sha256 = Sha256::new();
  std::io::copy(reader, &mut sha256)?;
  Ok(hex::encode_upper(sha256.finalize()))
}

/// Compares a stream against an expected upper-hex digest.
pub fn verify(reader: &mut impl Read, expected: &str) -> Result<HashCheck, Error> {
  let computed = hash_reader(reader)?;
  let matches = computed.eq_ignore_ascii_case(expected.trim());
  Ok(HashCheck { matches, computed })
}
