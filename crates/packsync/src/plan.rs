use std::collections::BTreeSet;

use crate::manifest::Manifest;
use crate::scan::LocalState;

/// What it takes to turn a local state into the manifest's.
///
/// The three sets are disjoint. Paths in none of them are already correct.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub to_add: BTreeSet<String>,
    pub to_update: BTreeSet<String>,
    pub to_delete: BTreeSet<String>,
    /// Manifest size of everything in `to_add` and `to_update`.
    pub total_bytes: u64,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// Paths to download, in lexicographic order.
    pub fn transfers(&self) -> impl Iterator<Item = &String> {
        self.to_add.union(&self.to_update)
    }

    pub fn transfer_count(&self) -> usize {
        self.to_add.len() + self.to_update.len()
    }
}

/// Compare by hash alone; sizes and timestamps never decide.
pub fn plan(manifest: &Manifest, local: &LocalState) -> SyncPlan {
    let mut plan = SyncPlan::default();

    for entry in manifest.iter() {
        match local.get(&entry.path) {
            None => {
                plan.to_add.insert(entry.path.clone());
            }
            Some(record) if record.hash != entry.hash => {
                plan.to_update.insert(entry.path.clone());
            }
            Some(_) => continue,
        }
        plan.total_bytes += entry.size;
    }

    plan.to_delete = local
        .iter()
        .filter(|record| !manifest.contains(&record.path))
        .map(|record| record.path.clone())
        .collect();

    plan
}

#[cfg(test)]
mod tests {
    use packsync_verify::ContentHash;

    use super::*;
    use crate::manifest::ManifestEntry;
    use crate::scan::LocalFileRecord;

    fn hash(byte: u8) -> ContentHash {
        ContentHash::from_bytes([byte; 32])
    }

    fn manifest(entries: &[(&str, u8, u64)]) -> Manifest {
        Manifest::from_entries(entries.iter().map(|(path, h, size)| ManifestEntry {
            path: path.to_string(),
            hash: hash(*h),
            size: *size,
        }))
        .unwrap()
    }

    fn local(records: &[(&str, u8)]) -> LocalState {
        LocalState::from_records(records.iter().map(|(path, h)| LocalFileRecord {
            path: path.to_string(),
            hash: hash(*h),
            size: 1,
        }))
    }

    fn set(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_plan_classifies_paths() {
        let plan = plan(
            &manifest(&[("a.txt", 1, 10), ("b.txt", 2, 20), ("c.txt", 3, 30)]),
            &local(&[("a.txt", 1), ("b.txt", 9), ("d.txt", 4)]),
        );
        assert_eq!(plan.to_add, set(&["c.txt"]));
        assert_eq!(plan.to_update, set(&["b.txt"]));
        assert_eq!(plan.to_delete, set(&["d.txt"]));
        assert_eq!(plan.total_bytes, 50);
        assert_eq!(plan.transfers().collect::<Vec<_>>(), ["b.txt", "c.txt"]);
        assert_eq!(plan.transfer_count(), 2);
    }

    #[test]
    fn test_plan_ignores_size_differences() {
        // Local size 1 differs from the manifest's 10, but the hash matches.
        let plan = plan(&manifest(&[("a.txt", 1, 10)]), &local(&[("a.txt", 1)]));
        assert!(plan.is_empty());
        assert_eq!(plan.total_bytes, 0);
    }

    #[test]
    fn test_empty_manifest_deletes_everything() {
        let plan = plan(&Manifest::default(), &local(&[("a.txt", 1), ("x/y.txt", 2)]));
        assert_eq!(plan.to_delete, set(&["a.txt", "x/y.txt"]));
        assert!(plan.to_add.is_empty());
    }

    #[test]
    fn test_empty_local_adds_everything() {
        let plan = plan(&manifest(&[("a.txt", 1, 3), ("b.txt", 2, 4)]), &LocalState::default());
        assert_eq!(plan.to_add, set(&["a.txt", "b.txt"]));
        assert_eq!(plan.total_bytes, 7);
    }
}
