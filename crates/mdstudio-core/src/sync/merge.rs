//! Reconciliation of the cloud cache with a fresh remote listing
//!
//! Local content always wins for notes that exist on both sides: the remote
//! only contributes new paths and the current version token of known paths.
//! Cached notes whose path is missing remotely are kept.

use tracing::debug;

use crate::models::{Note, NoteCollection, NoteRef};

/// What a merge changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Remote notes appended to the cache
    pub added: usize,
    /// Cached notes whose version token was refreshed
    pub rekeyed: usize,
}

/// Merge `remote` into `cache`
pub fn merge_remote(cache: &mut NoteCollection, remote: Vec<Note>) -> MergeReport {
    let mut report = MergeReport::default();

    for note in remote {
        let Some(ref path) = note.path else {
            continue;
        };

        match cache.find_by_path(path) {
            Some(existing) if existing.id != note.id => {
                debug!("Refreshing version of {} ({} -> {})", path, existing.id, note.id);
                cache.record_version(&NoteRef::Path(path.clone()), path, &note.id);
                report.rekeyed += 1;
            }
            Some(_) => {}
            None => {
                cache.append(note);
                report.added += 1;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(id: &str, path: &str, content: &str) -> Note {
        Note {
            id: id.into(),
            path: Some(path.into()),
            title: path.into(),
            content: content.into(),
        }
    }

    #[test]
    fn test_local_content_wins_and_new_paths_append() {
        let mut cache = NoteCollection::from_notes(
            vec![remote("s1", "1_a.md", "local A"), remote("s2", "2_b.md", "local B")],
            Some(&NoteRef::Path("1_a.md".into())),
        )
        .unwrap();

        let report = merge_remote(
            &mut cache,
            vec![
                remote("s1x", "1_a.md", "remote A"),
                remote("s3", "3_c.md", "remote C"),
                remote("s2", "2_b.md", "remote B"),
            ],
        );

        assert_eq!(report, MergeReport { added: 1, rekeyed: 1 });
        assert_eq!(cache.len(), 3);

        let a = cache.find_by_path("1_a.md").unwrap();
        assert_eq!(a.id, "s1x");
        assert_eq!(a.content, "local A");
        assert_eq!(cache.find_by_path("2_b.md").unwrap().content, "local B");
        assert_eq!(cache.find_by_path("3_c.md").unwrap().content, "remote C");

        // Active pointer follows the refreshed note
        assert_eq!(cache.active_id(), "s1x");
        // Appended at the end
        assert_eq!(cache.notes()[2].path.as_deref(), Some("3_c.md"));
    }

    #[test]
    fn test_refresh_touches_only_the_matching_path() {
        // Identical bodies share a blob SHA
        let mut cache = NoteCollection::from_notes(
            vec![remote("S", "2_b.md", "same"), remote("S", "1_a.md", "same")],
            Some(&NoteRef::Path("2_b.md".into())),
        )
        .unwrap();

        let report = merge_remote(
            &mut cache,
            vec![remote("S2", "1_a.md", "same"), remote("S", "2_b.md", "same")],
        );

        assert_eq!(report, MergeReport { added: 0, rekeyed: 1 });
        assert_eq!(cache.find_by_path("1_a.md").unwrap().id, "S2");
        assert_eq!(cache.find_by_path("2_b.md").unwrap().id, "S");
        assert_eq!(cache.active().path.as_deref(), Some("2_b.md"));
    }

    #[test]
    fn test_missing_remote_paths_are_kept() {
        let mut cache =
            NoteCollection::from_notes(vec![remote("s1", "1_gone.md", "keep me")], None).unwrap();
        let report = merge_remote(&mut cache, Vec::new());

        assert_eq!(report, MergeReport::default());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.active().content, "keep me");
    }

    #[test]
    fn test_unsynced_notes_untouched() {
        let mut cache = NoteCollection::single(Note::new("# Draft"));
        let id = cache.active_id().to_string();

        merge_remote(&mut cache, vec![remote("s9", "9_x.md", "x")]);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.active_id(), id);
        assert!(cache.active().path.is_none());
    }
}
