use semver::Version;
use tracing::{debug, warn};

use crate::resolve::normalized;
use crate::structures::UpdateEntry;

/// Orders entries the way selection expects them: full packages before
/// deltas, oldest version first within each kind.
pub(crate) fn sort_entries(entries: &mut [UpdateEntry]) {
  entries.sort_by(|a, b| {
    (a.is_delta, normalized(&a.version)).cmp(&(b.is_delta, normalized(&b.version)))
  });
}

/// Chooses the smallest correct sequence of packages to download and apply.
///
/// When the installed version appears in the manifest, the files on disk
/// match a published baseline and the newest delta alone suffices. When it
/// does not, nothing guarantees the deltas' expected base, so a full package
/// re-establishes the baseline first. Deltas are never chained across more
/// than one version gap; those updates fall back to the full package.
pub(crate) fn select_entries(entries: &[UpdateEntry], installed: &Version, base_in_manifest: bool) -> Vec<UpdateEntry> {
  if entries.is_empty() {
    return Vec::new();
  }
  let mut ordered = entries.to_vec();
  sort_entries(&mut ordered);

  let installed = normalized(installed);
  let newest = match ordered.iter().map(|entry| normalized(&entry.version)).max() {
    Some(version) => version,
    None => return Vec::new(),
  };
  let full_at = |version: &Version| {
    ordered.iter().find(|entry| !entry.is_delta && normalized(&entry.version) == *version).cloned()
  };
  let delta_at = |version: &Version| {
    ordered.iter().find(|entry| entry.is_delta && normalized(&entry.version) == *version).cloned()
  };
  let mut versions_above: Vec<Version> = ordered
    .iter()
    .map(|entry| normalized(&entry.version))
    .filter(|version| *version > installed)
    .collect();
  versions_above.sort();
  versions_above.dedup();

  let selected: Vec<UpdateEntry> = if base_in_manifest {
    if versions_above.len() <= 1 {
      // at most one hop above a known baseline, the delta alone suffices
      delta_at(&newest).or_else(|| full_at(&newest)).into_iter().collect()
    } else {
      warn!("{} versions between {} and {}, re-baselining from the full package", versions_above.len(), installed, newest);
      full_at(&newest).or_else(|| delta_at(&newest)).into_iter().collect()
    }
  } else {
    // unknown baseline: full package first, then at most one delta hop on top
    let newest_full = ordered
      .iter()
      .filter(|entry| !entry.is_delta)
      .map(|entry| normalized(&entry.version))
      .max();
    match newest_full {
      Some(baseline) => {
        let mut picked: Vec<UpdateEntry> = full_at(&baseline).into_iter().collect();
        let mut deltas_above: Vec<Version> = ordered
          .iter()
          .filter(|entry| entry.is_delta)
          .map(|entry| normalized(&entry.version))
          .filter(|version| *version > baseline)
          .collect();
        deltas_above.sort();
        deltas_above.dedup();
        if deltas_above.len() == 1 {
          picked.extend(delta_at(&deltas_above[0]));
        } else if deltas_above.len() > 1 {
          warn!("{} delta versions above the {} baseline, stopping at the full package", deltas_above.len(), baseline);
        }
        picked
      }
      // no full package anywhere, the delta has to go against the installed files
      None => delta_at(&newest).into_iter().collect(),
    }
  };

  if selected.is_empty() {
    debug!("selection filtered every entry out, falling back to the full ordered set");
    return ordered;
  }
  selected
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(filename: &str, version: &str, is_delta: bool) -> UpdateEntry {
    let mut entry = UpdateEntry::new(1, "AA", filename, 1, false);
    entry.version = Version::parse(version).unwrap();
    entry.is_delta = is_delta;
    entry
  }

  #[test]
  fn known_baseline_prefers_the_delta() {
    let entries = vec![entry("app-2.0.0-full.zip", "2.0.0", false), entry("app-2.0.0-delta.zip", "2.0.0", true)];
    let selected = select_entries(&entries, &Version::new(1, 0, 0), true);
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].filename, "app-2.0.0-delta.zip");
  }

  #[test]
  fn unknown_baseline_takes_the_full_package() {
    let entries = vec![entry("app-2.0.0-full.zip", "2.0.0", false)];
    let selected = select_entries(&entries, &Version::new(1, 0, 0), false);
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].filename, "app-2.0.0-full.zip");
  }

  #[test]
  fn unknown_baseline_appends_a_single_delta_hop() {
    let entries = vec![
      entry("app-2.0.0-full.zip", "2.0.0", false),
      entry("app-2.1.0-delta.zip", "2.1.0", true),
    ];
    let selected = select_entries(&entries, &Version::new(1, 0, 0), false);
    let names: Vec<&str> = selected.iter().map(|e| e.filename.as_str()).collect();
    assert_eq!(names, vec!["app-2.0.0-full.zip", "app-2.1.0-delta.zip"]);
  }

  #[test]
  fn multiple_version_gaps_fall_back_to_full() {
    let entries = vec![
      entry("app-1.1.0-delta.zip", "1.1.0", true),
      entry("app-1.2.0-delta.zip", "1.2.0", true),
      entry("app-1.2.0-full.zip", "1.2.0", false),
    ];
    let selected = select_entries(&entries, &Version::new(1, 0, 0), true);
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].filename, "app-1.2.0-full.zip");
  }

  #[test]
  fn multiple_delta_hops_above_the_baseline_are_not_chained() {
    let entries = vec![
      entry("app-2.0.0-full.zip", "2.0.0", false),
      entry("app-2.1.0-delta.zip", "2.1.0", true),
      entry("app-2.2.0-delta.zip", "2.2.0", true),
    ];
    let selected = select_entries(&entries, &Version::new(1, 0, 0), false);
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].filename, "app-2.0.0-full.zip");
  }

  #[test]
  fn delta_only_manifests_still_select() {
    let entries = vec![entry("app-2.0.0-delta.zip", "2.0.0", true)];
    let selected = select_entries(&entries, &Version::new(1, 0, 0), false);
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].filename, "app-2.0.0-delta.zip");
  }

  #[test]
  fn selection_never_returns_empty_for_non_empty_input() {
    // everything sits at or below the installed version
    let entries = vec![entry("app-1.0.0-full.zip", "1.0.0", false)];
    let selected = select_entries(&entries, &Version::new(1, 0, 0), true);
    assert!(!selected.is_empty());
  }

  #[test]
  fn sort_puts_fulls_before_deltas_and_orders_versions() {
    let mut entries = vec![
      entry("d2", "2.0.0", true),
      entry("f2", "2.0.0", false),
      entry("d1", "1.5.0", true),
      entry("f1", "1.0.0", false),
    ];
    sort_entries(&mut entries);
    let names: Vec<&str> = entries.iter().map(|e| e.filename.as_str()).collect();
    assert_eq!(names, vec!["f1", "f2", "d1", "d2"]);
  }
}
