//! File-operation clipboard
//!
//! One pending copy/cut entry at most. Setting a new entry silently
//! replaces the previous one; paste performs the server-side operation,
//! reconciles the listing cache and clears the slot only on success.

use crate::api::{ApiError, FileEntry, FileOps};
use crate::cache::ListingCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipOp {
    Copy,
    Cut,
}

/// The single pending clipboard operation.
#[derive(Debug, Clone)]
pub struct ClipboardEntry {
    pub entry: FileEntry,
    pub op: ClipOp,
    /// Backend path the entry was captured from.
    pub source_path: String,
}

/// What a successful paste did, for notification purposes.
#[derive(Debug, Clone)]
pub struct PasteOutcome {
    pub entry: FileEntry,
    pub op: ClipOp,
    pub source_path: String,
    pub target_path: String,
}

#[derive(Debug, Default)]
pub struct Clipboard {
    slot: Option<ClipboardEntry>,
}

impl Clipboard {
    pub fn new() -> Clipboard {
        Clipboard::default()
    }

    /// Capture an entry for copying. Overwrites any prior slot content.
    pub fn copy(&mut self, entry: FileEntry, source_path: &str) {
        self.slot = Some(ClipboardEntry {
            entry,
            op: ClipOp::Copy,
            source_path: source_path.to_string(),
        });
    }

    /// Capture an entry for moving. Overwrites any prior slot content.
    pub fn cut(&mut self, entry: FileEntry, source_path: &str) {
        self.slot = Some(ClipboardEntry {
            entry,
            op: ClipOp::Cut,
            source_path: source_path.to_string(),
        });
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }

    pub fn current(&self) -> Option<&ClipboardEntry> {
        self.slot.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    /// Paste the pending entry into `target_path`.
    ///
    /// An empty clipboard is a silent no-op (`Ok(None)`). Copy invalidates
    /// the target's cache slot; cut invalidates source and target and
    /// force-refetches the source so the removal is visible immediately.
    /// On failure the slot is left intact so the user can retry, and the
    /// error propagates to the caller for display.
    pub async fn paste(
        &mut self,
        ops: &dyn FileOps,
        cache: &ListingCache,
        target_path: &str,
    ) -> Result<Option<PasteOutcome>, ApiError> {
        let Some(pending) = self.slot.clone() else {
            return Ok(None);
        };

        match pending.op {
            ClipOp::Copy => {
                ops.copy_file(&pending.entry.id, target_path).await?;
                cache.invalidate(target_path).await;
            }
            ClipOp::Cut => {
                ops.move_file(&pending.entry.id, target_path).await?;
                cache.invalidate(&pending.source_path).await;
                cache.invalidate(target_path).await;
                cache.refetch(&pending.source_path).await;
            }
        }

        self.slot = None;
        Ok(Some(PasteOutcome {
            entry: pending.entry,
            op: pending.op,
            source_path: pending.source_path,
            target_path: target_path.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FileCategory, FileKind, ListingSource};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn entry(name: &str) -> FileEntry {
        FileEntry {
            id: format!("id-{}", name),
            name: name.to_string(),
            kind: FileKind::File,
            category: FileCategory::Photo,
            size_mb: 1.0,
            thumbnail: None,
            parent_path: "/src".to_string(),
        }
    }

    #[derive(Default)]
    struct RecordingOps {
        calls: Mutex<Vec<(String, String, String)>>,
        fail: bool,
    }

    impl RecordingOps {
        fn calls(&self) -> Vec<(String, String, String)> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, op: &str, a: &str, b: &str) -> Result<(), ApiError> {
            self.calls
                .lock()
                .unwrap()
                .push((op.to_string(), a.to_string(), b.to_string()));
            if self.fail {
                Err(ApiError::Http {
                    status: 500,
                    detail: Some("boom".to_string()),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl FileOps for RecordingOps {
        async fn copy_file(&self, file_id: &str, target_path: &str) -> Result<(), ApiError> {
            self.record("copy", file_id, target_path)
        }
        async fn move_file(&self, file_id: &str, target_path: &str) -> Result<(), ApiError> {
            self.record("move", file_id, target_path)
        }
        async fn rename_file(&self, file_id: &str, new_name: &str) -> Result<(), ApiError> {
            self.record("rename", file_id, new_name)
        }
        async fn delete_file(&self, file_id: &str) -> Result<(), ApiError> {
            self.record("delete", file_id, "")
        }
        async fn create_folder(&self, name: &str, current_path: &str) -> Result<(), ApiError> {
            self.record("mkdir", name, current_path)
        }
    }

    struct NullSource {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ListingSource for NullSource {
        async fn fetch_listing(&self, _path: &str) -> Result<Vec<FileEntry>, ApiError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn cache_with_counter() -> (ListingCache, Arc<NullSource>) {
        let source = Arc::new(NullSource {
            fetches: AtomicUsize::new(0),
        });
        (ListingCache::new(source.clone()), source)
    }

    #[test]
    fn test_last_write_wins() {
        let mut clipboard = Clipboard::new();
        clipboard.copy(entry("a"), "/src");
        clipboard.copy(entry("b"), "/src");
        let current = clipboard.current().unwrap();
        assert_eq!(current.entry.name, "b");
        assert_eq!(current.op, ClipOp::Copy);

        clipboard.cut(entry("c"), "/other");
        let current = clipboard.current().unwrap();
        assert_eq!(current.entry.name, "c");
        assert_eq!(current.op, ClipOp::Cut);
        assert_eq!(current.source_path, "/other");
    }

    #[tokio::test]
    async fn test_paste_empty_clipboard_is_silent_noop() {
        let ops = RecordingOps::default();
        let (cache, source) = cache_with_counter();
        let mut clipboard = Clipboard::new();

        let outcome = clipboard.paste(&ops, &cache, "/dst").await.unwrap();
        assert!(outcome.is_none());
        assert!(ops.calls().is_empty());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_copy_paste_hits_copy_endpoint_and_clears() {
        let ops = RecordingOps::default();
        let (cache, source) = cache_with_counter();
        let mut clipboard = Clipboard::new();
        clipboard.copy(entry("a"), "/src");

        let outcome = clipboard.paste(&ops, &cache, "/dst").await.unwrap().unwrap();
        assert_eq!(
            ops.calls(),
            vec![("copy".to_string(), "id-a".to_string(), "/dst".to_string())]
        );
        assert_eq!(outcome.op, ClipOp::Copy);
        assert!(clipboard.is_empty());
        // Copy does not force a refetch of anything.
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cut_paste_moves_and_refetches_source() {
        let ops = RecordingOps::default();
        let (cache, source) = cache_with_counter();
        let mut clipboard = Clipboard::new();
        clipboard.cut(entry("x"), "/src");

        let outcome = clipboard.paste(&ops, &cache, "/dst").await.unwrap().unwrap();
        assert_eq!(
            ops.calls(),
            vec![("move".to_string(), "id-x".to_string(), "/dst".to_string())]
        );
        assert_eq!(outcome.source_path, "/src");
        assert_eq!(outcome.target_path, "/dst");
        assert!(clipboard.is_empty());
        // The source was force-refetched exactly once.
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_paste_keeps_slot_for_retry() {
        let ops = RecordingOps {
            fail: true,
            ..Default::default()
        };
        let (cache, source) = cache_with_counter();
        let mut clipboard = Clipboard::new();
        clipboard.cut(entry("x"), "/src");

        let err = clipboard.paste(&ops, &cache, "/dst").await.unwrap_err();
        assert_eq!(err.user_message(), "boom");
        assert!(!clipboard.is_empty());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }
}
