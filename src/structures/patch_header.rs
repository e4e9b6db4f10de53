/// Fixed-size header of a bsdiff40 patch stream.
///
/// Eight bytes of magic followed by three sign-magnitude 64-bit fields; the
/// three compressed regions follow back-to-back after the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchHeader {
  /// Compressed length of the control block
  pub control_length: i64,
  /// Compressed length of the diff block
  pub diff_length: i64,
  /// Size of the reconstructed target content
  pub new_size: i64,
}
