//! bsdiff40 differ and applier.
//!
//! A patch stream is a 32 byte header followed by three bzip2 regions:
//!
//! ```text
//! 0   8  "BSDIFF40"
//! 8   8  compressed length of the control block
//! 16  8  compressed length of the diff block
//! 24  8  size of the reconstructed file
//! 32  .. bzip2(control block) | bzip2(diff block) | bzip2(extra block)
//! ```
//!
//! The control block is a sequence of `(copy, extra, seek)` triples: add
//! `copy` bytes of the base file to `copy` bytes of the diff block, copy
//! `extra` bytes from the extra block verbatim, then move the base cursor by
//! `seek` (which may be negative). All 64-bit fields are sign-magnitude:
//! seven magnitude bytes plus a sign/flag byte whose top bit marks negative.

use std::io::{Read, Write};

use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;

use crate::structures::{Error, PatchHeader};

pub(crate) const MAGIC: &[u8; 8] = b"BSDIFF40";
pub(crate) const HEADER_SIZE: usize = 32;

impl PatchHeader {
  /// Parses and validates the fixed-size header at the front of a patch.
  pub(crate) fn parse(patch: &[u8]) -> Result<PatchHeader, Error> {
    if patch.len() < HEADER_SIZE {
      return Err(Error::CorruptPatch("patch is shorter than its header"));
    }
    if &patch[0..8] != MAGIC {
      return Err(Error::CorruptPatch("bad magic"));
    }
    let control_length = decode_offset(&patch[8..16]);
    let diff_length = decode_offset(&patch[16..24]);
    let new_size = decode_offset(&patch[24..32]);
    if control_length < 0 || diff_length < 0 || new_size < 0 {
      return Err(Error::CorruptPatch("negative length field"));
    }
    Ok(PatchHeader { control_length, diff_length, new_size })
  }
}

/// One control-block step; lives only for the loop iteration that reads it.
struct ControlTriple {
  copy_len: i64,
  extra_len: i64,
  seek: i64,
}

impl ControlTriple {
  fn read_from(control: &mut impl Read) -> Result<ControlTriple, Error> {
    let mut buffer = [0u8; 24];
    read_exact_or_corrupt(control, &mut buffer, "control block ended early")?;
    Ok(ControlTriple {
      copy_len: decode_offset(&buffer[0..8]),
      extra_len: decode_offset(&buffer[8..16]),
      seek: decode_offset(&buffer[16..24]),
    })
  }
}

fn decode_offset(buffer: &[u8]) -> i64 {
  let mut value = (buffer[7] & 0x7F) as i64;
  for index in (0..7).rev() {
    value = value.wrapping_mul(256).wrapping_add(buffer[index] as i64);
  }
  if buffer[7] & 0x80 != 0 {
    -value
  } else {
    value
  }
}

fn encode_offset(value: i64, buffer: &mut [u8]) {
  let mut magnitude = value.unsigned_abs();
  for slot in buffer.iter_mut().take(8) {
    *slot = (magnitude & 0xFF) as u8;
    magnitude >>= 8;
  }
  if value < 0 {
    buffer[7] |= 0x80;
  }
}

fn read_exact_or_corrupt(reader: &mut impl Read, buffer: &mut [u8], reason: &'static str) -> Result<(), Error> {
  reader.read_exact(buffer).map_err(|_| Error::CorruptPatch(reason))
}

/// Reconstructs target content from base content and a patch stream.
///
/// Pure over its inputs: no file-system decisions happen here. Every
/// structural violation in the patch surfaces as `Error::CorruptPatch`
/// rather than silently truncated output.
pub fn apply(base: &[u8], patch: &[u8]) -> Result<Vec<u8>, Error> {
  let header = PatchHeader::parse(patch)?;
  let control_end = match (header.control_length as u64).try_into().ok().and_then(|l: usize| HEADER_SIZE.checked_add(l)) {
    Some(end) => end,
    None => return Err(Error::CorruptPatch("control block length overflows")),
  };
  let diff_end = match (header.diff_length as u64).try_into().ok().and_then(|l: usize| control_end.checked_add(l)) {
    Some(end) => end,
    None => return Err(Error::CorruptPatch("diff block length overflows")),
  };
  if diff_end > patch.len() {
    return Err(Error::CorruptPatch("blocks extend past the end of the patch"));
  }
  // the three regions decompress independently
  let mut control = BzDecoder::new(&patch[HEADER_SIZE..control_end]);
  let mut diff = BzDecoder::new(&patch[control_end..diff_end]);
  let mut extra = BzDecoder::new(&patch[diff_end..]);

  let new_size = header.new_size as usize;
  let mut target: Vec<u8> = Vec::with_capacity(new_size);
  let mut old_pos: i64 = 0;

  while target.len() < new_size {
    let triple = ControlTriple::read_from(&mut control)?;
    if triple.copy_len < 0 || triple.extra_len < 0 {
      return Err(Error::CorruptPatch("negative control length"));
    }

    let copy_len = triple.copy_len as usize;
    if target.len() + copy_len > new_size {
      return Err(Error::CorruptPatch("diff copy runs past the target size"));
    }
    let mut block = vec![0u8; copy_len];
    read_exact_or_corrupt(&mut diff, &mut block, "diff block ended early")?;
    if old_pos < 0 {
      return Err(Error::CorruptPatch("base cursor seeked before the start"));
    }
    // add base bytes into the diff bytes modulo 256; where the base is
    // exhausted the diff bytes pass through unmodified
    let from = old_pos as usize;
    let available = base.len().saturating_sub(from).min(copy_len);
    for index in 0..available {
      block[index] = block[index].wrapping_add(base[from + index]);
    }
    target.extend_from_slice(&block);
    old_pos += triple.copy_len;

    let extra_len = triple.extra_len as usize;
    if target.len() + extra_len > new_size {
      return Err(Error::CorruptPatch("extra copy runs past the target size"));
    }
    let mut block = vec![0u8; extra_len];
    read_exact_or_corrupt(&mut extra, &mut block, "extra block ended early")?;
    target.extend_from_slice(&block);

    old_pos += triple.seek;
  }

  Ok(target)
}

/// Produces a patch stream that [`apply`] turns `base` into `target` with.
///
/// Matches against the base are found through a suffix array; runs that
/// mostly agree with the base become diff bytes, the rest goes to the extra
/// block verbatim.
pub fn create(base: &[u8], target: &[u8]) -> Result<Vec<u8>, Error> {
  let suffix_array = suffix_sort(base);
  let mut control_block: Vec<u8> = Vec::new();
  let mut diff_block: Vec<u8> = Vec::new();
  let mut extra_block: Vec<u8> = Vec::new();

  let old_size = base.len() as i64;
  let new_size = target.len() as i64;

  let mut scan: i64 = 0;
  let mut pos: i64 = 0;
  let mut len: i64 = 0;
  let mut last_scan: i64 = 0;
  let mut last_pos: i64 = 0;
  let mut last_offset: i64 = 0;

  while scan < new_size {
    let mut old_score: i64 = 0;
    scan += len;
    let mut scsc = scan;
    while scan < new_size {
      let (found_pos, found_len) = search(&suffix_array, base, &target[scan as usize..]);
      pos = found_pos;
      len = found_len;
      while scsc < scan + len {
        if scsc + last_offset < old_size && base[(scsc + last_offset) as usize] == target[scsc as usize] {
          old_score += 1;
        }
        scsc += 1;
      }
      if (len == old_score && len != 0) || len > old_score + 8 {
        break;
      }
      if scan + last_offset < old_size && base[(scan + last_offset) as usize] == target[scan as usize] {
        old_score -= 1;
      }
      scan += 1;
    }

    if len != old_score || scan == new_size {
      // grow the copy region forward from the previous match
      let mut len_forward: i64 = 0;
      {
        let mut score: i64 = 0;
        let mut best: i64 = 0;
        let mut i: i64 = 0;
        while last_scan + i < scan && last_pos + i < old_size {
          if base[(last_pos + i) as usize] == target[(last_scan + i) as usize] {
            score += 1;
          }
          i += 1;
          if score * 2 - i > best * 2 - len_forward {
            best = score;
            len_forward = i;
          }
        }
      }
      // and backward from the new match
      let mut len_backward: i64 = 0;
      if scan < new_size {
        let mut score: i64 = 0;
        let mut best: i64 = 0;
        let mut i: i64 = 1;
        while scan >= last_scan + i && pos >= i {
          if base[(pos - i) as usize] == target[(scan - i) as usize] {
            score += 1;
          }
          if score * 2 - i > best * 2 - len_backward {
            best = score;
            len_backward = i;
          }
          i += 1;
        }
      }
      // the two regions may overlap; split at the most agreeable point
      if last_scan + len_forward > scan - len_backward {
        let overlap = (last_scan + len_forward) - (scan - len_backward);
        let mut score: i64 = 0;
        let mut best: i64 = 0;
        let mut split: i64 = 0;
        for i in 0..overlap {
          if target[(last_scan + len_forward - overlap + i) as usize] == base[(last_pos + len_forward - overlap + i) as usize] {
            score += 1;
          }
          if target[(scan - len_backward + i) as usize] == base[(pos - len_backward + i) as usize] {
            score -= 1;
          }
          if score > best {
            best = score;
            split = i + 1;
          }
        }
        len_forward += split - overlap;
        len_backward -= split;
      }

      for i in 0..len_forward {
        diff_block.push(target[(last_scan + i) as usize].wrapping_sub(base[(last_pos + i) as usize]));
      }
      let extra_len = (scan - len_backward) - (last_scan + len_forward);
      for i in 0..extra_len {
        extra_block.push(target[(last_scan + len_forward + i) as usize]);
      }
      let seek = (pos - len_backward) - (last_pos + len_forward);

      let mut buffer = [0u8; 8];
      encode_offset(len_forward, &mut buffer);
      control_block.extend_from_slice(&buffer);
      encode_offset(extra_len, &mut buffer);
      control_block.extend_from_slice(&buffer);
      encode_offset(seek, &mut buffer);
      control_block.extend_from_slice(&buffer);

      last_scan = scan - len_backward;
      last_pos = pos - len_backward;
      last_offset = pos - scan;
    }
  }

  let control_compressed = bz_compress(&control_block)?;
  let diff_compressed = bz_compress(&diff_block)?;
  let extra_compressed = bz_compress(&extra_block)?;

  let mut patch = Vec::with_capacity(HEADER_SIZE + control_compressed.len() + diff_compressed.len() + extra_compressed.len());
  patch.extend_from_slice(MAGIC);
  let mut buffer = [0u8; 8];
  encode_offset(control_compressed.len() as i64, &mut buffer);
  patch.extend_from_slice(&buffer);
  encode_offset(diff_compressed.len() as i64, &mut buffer);
  patch.extend_from_slice(&buffer);
  encode_offset(target.len() as i64, &mut buffer);
  patch.extend_from_slice(&buffer);
  patch.extend_from_slice(&control_compressed);
  patch.extend_from_slice(&diff_compressed);
  patch.extend_from_slice(&extra_compressed);
  Ok(patch)
}

fn bz_compress(data: &[u8]) -> Result<Vec<u8>, Error> {
  let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
  encoder.write_all(data)?;
  Ok(encoder.finish()?)
}

fn suffix_sort(data: &[u8]) -> Vec<usize> {
  let mut suffixes: Vec<usize> = (0..data.len()).collect();
  suffixes.sort_unstable_by(|&a, &b| data[a..].cmp(&data[b..]));
  suffixes
}

/// Longest match of `needle` against any base suffix, by binary search over
/// the sorted suffixes. Returns `(position in base, match length)`.
fn search(suffix_array: &[usize], base: &[u8], needle: &[u8]) -> (i64, i64) {
  if suffix_array.is_empty() || needle.is_empty() {
    return (0, 0);
  }
  let mut low = 0usize;
  let mut high = suffix_array.len() - 1;
  while high - low >= 2 {
    let mid = low + (high - low) / 2;
    let start = suffix_array[mid];
    let shared = std::cmp::min(base.len() - start, needle.len());
    if base[start..start + shared] < needle[..shared] {
      low = mid;
    } else {
      high = mid;
    }
  }
  let low_len = match_length(&base[suffix_array[low]..], needle);
  let high_len = match_length(&base[suffix_array[high]..], needle);
  if low_len > high_len {
    (suffix_array[low] as i64, low_len as i64)
  } else {
    (suffix_array[high] as i64, high_len as i64)
  }
}

fn match_length(a: &[u8], b: &[u8]) -> usize {
  a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}
