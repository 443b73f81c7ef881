//! Property tests for overlay merge guarantees

use proptest::prelude::*;
use schemagen::overlay::{apply_overlay, MemoryTarget, Overlay};
use std::collections::BTreeMap;

fn segment() -> impl Strategy<Value = String> {
    "[a-d]{1,3}"
}

/// Relative file paths one to three segments deep, with small contents.
fn file_sets() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map(
        prop::collection::vec(segment(), 1..=3).prop_map(|parts| format!("{}.go", parts.join("/"))),
        prop::collection::vec(any::<u8>(), 0..16),
        1..12,
    )
}

/// Build an overlay, skipping paths that clash with an earlier file or directory.
fn overlay_from(files: &BTreeMap<String, Vec<u8>>) -> Overlay {
    let mut overlay = Overlay::new();
    for (path, content) in files {
        let _ = overlay.add_file(path, content.clone());
    }
    overlay
}

proptest! {
    #[test]
    fn prop_second_merge_is_noop(files in file_sets()) {
        let overlay = overlay_from(&files);
        let target = MemoryTarget::new();

        apply_overlay(&overlay, &target, &mut Vec::new()).unwrap();
        let dirs = target.dirs_created();
        let writes = target.files_written();

        let report = apply_overlay(&overlay, &target, &mut Vec::new()).unwrap();
        prop_assert!(report.is_noop());
        prop_assert_eq!(target.dirs_created(), dirs);
        prop_assert_eq!(target.files_written(), writes);
    }

    #[test]
    fn prop_merge_preserves_foreign_files(files in file_sets(), foreign in prop::collection::vec(any::<u8>(), 0..16)) {
        let overlay = overlay_from(&files);
        let target = MemoryTarget::new().with_file("zz-handwritten/keep.txt", foreign.clone());

        apply_overlay(&overlay, &target, &mut Vec::new()).unwrap();

        prop_assert_eq!(target.file("zz-handwritten/keep.txt"), Some(foreign));
    }

    #[test]
    fn prop_only_differing_files_are_written(files in file_sets(), flip in any::<prop::sample::Index>()) {
        let overlay = overlay_from(&files);
        let paths: Vec<_> = overlay
            .entries()
            .filter(|(_, e)| !e.is_dir())
            .map(|(p, _)| p.to_path_buf())
            .collect();
        let changed = flip.get(&paths).clone();

        let mut seeded = MemoryTarget::new();
        for path in &paths {
            let mut content = overlay.file(path).unwrap().to_vec();
            if *path == changed {
                content.push(0xff);
            }
            seeded = seeded.with_file(path, content);
        }

        let report = apply_overlay(&overlay, &seeded, &mut Vec::new()).unwrap();
        let written: Vec<_> = report.written_paths().map(|p| p.to_path_buf()).collect();
        prop_assert_eq!(written, vec![changed]);
        prop_assert_eq!(report.dirs_created(), 0);
    }

    #[test]
    fn prop_log_is_deterministic(files in file_sets()) {
        let overlay = overlay_from(&files);
        let mut reversed = Overlay::new();
        for (path, content) in files.iter().rev() {
            let _ = reversed.add_file(path, content.clone());
        }
        prop_assume!(reversed == overlay);

        let mut first = Vec::new();
        let mut second = Vec::new();
        apply_overlay(&overlay, &MemoryTarget::new(), &mut first).unwrap();
        apply_overlay(&reversed, &MemoryTarget::new(), &mut second).unwrap();
        prop_assert_eq!(first, second);
    }
}
