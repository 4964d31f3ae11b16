//! Explorer orchestration
//!
//! Glue between the navigation model, clipboard, listing cache and API
//! client. Listing presentation (virtual-folder merge, category filter,
//! search) is a pure function so it can be tested without any transport;
//! mutating flows are two-phase (request → confirm) and reconcile the
//! cache afterwards. Every error becomes a user-visible notification.

use std::fmt;
use std::sync::Arc;

use crate::api::{ApiClient, ApiError, FileCategory, FileEntry, FileOps, ListingSource, ProgressFn};
use crate::cache::{Listing, ListingCache};
use crate::clipboard::{ClipOp, Clipboard, ClipboardEntry};
use crate::config::Prefs;
use crate::nav::{Filter, NavPath, Navigator};

// ─── Notifications ───────────────────────────────────────────────────────

/// Sink for the success/failure notifications the orchestrator emits.
pub trait Notifier: Send {
    fn success(&mut self, message: &str);
    fn error(&mut self, message: &str);
}

/// Notifier that routes to the log, for headless use.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&mut self, message: &str) {
        tracing::info!("{}", message);
    }
    fn error(&mut self, message: &str) {
        tracing::error!("{}", message);
    }
}

// ─── Pure listing presentation ───────────────────────────────────────────

/// Compute the entries to display for `(path, filter, query, raw)`.
///
/// Precedence: at root with no category filter, virtual folders ∪ user
/// folders (virtual wins on a name collision, plain files excluded).
/// Inside a category or matching virtual folder, entries whose category
/// matches; folders always pass so sub-navigation stays possible. Inside a
/// user folder, exactly the backend listing. The case-insensitive
/// substring search applies last in every mode.
pub fn visible_entries(
    path: &NavPath,
    filter: Filter,
    query: &str,
    raw: &[FileEntry],
) -> Vec<FileEntry> {
    let category = match filter {
        Filter::Category(category) => Some(category),
        Filter::All => FileCategory::from_virtual_folder(path.last_segment()),
    };

    let mut shown: Vec<FileEntry> = if path.is_root() && category.is_none() {
        let mut merged: Vec<FileEntry> = FileCategory::BROWSABLE
            .iter()
            .filter_map(|c| FileEntry::virtual_folder(*c))
            .collect();
        for entry in raw.iter().filter(|e| e.is_folder()) {
            if !merged.iter().any(|existing| existing.name == entry.name) {
                merged.push(entry.clone());
            }
        }
        merged
    } else if let Some(category) = category {
        raw.iter()
            .filter(|e| e.is_folder() || e.category == category)
            .cloned()
            .collect()
    } else {
        raw.to_vec()
    };

    if !query.is_empty() {
        let needle = query.to_lowercase();
        shown.retain(|e| e.name.to_lowercase().contains(&needle));
    }
    shown
}

/// Per-category file counts and total size over a raw listing, as the
/// sidebar displays them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SidebarStats {
    pub all: usize,
    pub document: usize,
    pub photo: usize,
    pub video: usize,
    pub audio: usize,
    pub voice: usize,
    pub total_size_mb: f64,
}

pub fn sidebar_stats(raw: &[FileEntry]) -> SidebarStats {
    let mut stats = SidebarStats {
        all: raw.len(),
        ..Default::default()
    };
    for entry in raw {
        stats.total_size_mb += entry.size_mb;
        match entry.category {
            FileCategory::Document => stats.document += 1,
            FileCategory::Photo => stats.photo += 1,
            FileCategory::Video => stats.video += 1,
            FileCategory::Audio => stats.audio += 1,
            FileCategory::Voice => stats.voice += 1,
            FileCategory::Folder => {}
        }
    }
    stats
}

// ─── Connectivity recovery ───────────────────────────────────────────────

/// The backend could not be reached on the initial listing fetch. Carries
/// the configured base URL so the caller can offer reconfigure / reset /
/// retry instead of a dead end.
#[derive(Debug, Clone)]
pub struct ConnectivityError {
    pub base_url: String,
    pub error: ApiError,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot reach backend at {}: {}", self.base_url, self.error)
    }
}

impl std::error::Error for ConnectivityError {}

// ─── Two-phase mutating flows ────────────────────────────────────────────

// A pending action is the confirmation affordance: dropping it cancels
// with no network call and no state change.

#[derive(Debug, Clone)]
pub struct PendingRename {
    pub entry: FileEntry,
}

#[derive(Debug, Clone)]
pub struct PendingDelete {
    pub entry: FileEntry,
}

#[derive(Debug, Clone)]
pub struct PendingMove {
    pub entry: FileEntry,
    pub target_path: String,
}

#[derive(Debug, Clone)]
pub struct PendingNewFolder {
    pub parent_path: String,
}

/// What the explorer shows for the current path.
#[derive(Debug, Clone)]
pub struct ExplorerView {
    pub entries: Vec<FileEntry>,
    pub stats: SidebarStats,
    pub is_loading: bool,
    pub error: Option<ApiError>,
}

// ─── Explorer ────────────────────────────────────────────────────────────

pub struct Explorer<B: ListingSource + FileOps + 'static> {
    backend: Arc<B>,
    cache: ListingCache,
    nav: Navigator,
    clipboard: Clipboard,
    prefs: Prefs,
    notifier: Box<dyn Notifier>,
    base_url: String,
    search_query: String,
}

impl<B: ListingSource + FileOps + 'static> Explorer<B> {
    /// Build an explorer, restoring the persisted path when there is one.
    pub fn new(backend: Arc<B>, prefs: Prefs, notifier: Box<dyn Notifier>) -> Explorer<B> {
        let initial = prefs
            .last_path
            .as_deref()
            .map(NavPath::from_backend)
            .unwrap_or_default();
        let base_url = prefs.resolve_base_url();
        let cache = ListingCache::new(backend.clone() as Arc<dyn ListingSource>);
        Explorer {
            backend,
            cache,
            nav: Navigator::new(initial),
            clipboard: Clipboard::new(),
            prefs,
            notifier,
            base_url,
            search_query: String::new(),
        }
    }

    pub fn path(&self) -> &NavPath {
        self.nav.path()
    }

    pub fn backend_path(&self) -> String {
        self.nav.backend_path()
    }

    pub fn filter(&self) -> Filter {
        self.nav.filter()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn clipboard_entry(&self) -> Option<&ClipboardEntry> {
        self.clipboard.current()
    }

    pub fn set_search_query(&mut self, query: &str) {
        self.search_query = query.to_string();
    }

    // ─── Bootstrap / connectivity ────────────────────────────────────────

    /// First listing fetch of a session. A transport-level failure becomes
    /// a [`ConnectivityError`] so the caller can route to the recovery
    /// affordance; HTTP-level failures are notified like any other error.
    pub async fn bootstrap(&mut self) -> Result<ExplorerView, ConnectivityError> {
        let listing = self.cache.get_listing(&self.nav.backend_path()).await;
        if let Some(error) = &listing.error {
            if error.is_connectivity() {
                return Err(ConnectivityError {
                    base_url: self.base_url.clone(),
                    error: error.clone(),
                });
            }
            self.notifier.error(&error.user_message());
        }
        Ok(self.present(listing))
    }

    /// Persist a new backend URL override (validated first). Takes effect
    /// on the next session, matching the original's reload-after-save.
    pub fn set_base_url(&mut self, url: &str) -> Result<(), ApiError> {
        self.prefs.set_server_url(Some(url.to_string()))?;
        if let Err(e) = self.prefs.save() {
            tracing::warn!("failed to persist backend URL: {}", e);
        }
        Ok(())
    }

    /// Drop the override and fall back to environment/default resolution.
    pub fn reset_base_url(&mut self) {
        self.prefs.server_url = None;
        if let Err(e) = self.prefs.save() {
            tracing::warn!("failed to persist backend URL reset: {}", e);
        }
    }

    // ─── Viewing ─────────────────────────────────────────────────────────

    /// Fetch (or serve from cache) the current path's listing and apply the
    /// presentation rules.
    pub async fn view(&mut self) -> ExplorerView {
        let listing = self.cache.get_listing(&self.nav.backend_path()).await;
        if let Some(error) = &listing.error {
            self.notifier.error(&error.user_message());
        }
        self.present(listing)
    }

    fn present(&self, listing: Listing) -> ExplorerView {
        let entries = visible_entries(
            self.nav.path(),
            self.nav.filter(),
            &self.search_query,
            &listing.entries,
        );
        ExplorerView {
            stats: sidebar_stats(&listing.entries),
            entries,
            is_loading: listing.is_loading,
            error: listing.error,
        }
    }

    /// The window regained focus; cached listings revalidate on next read.
    pub async fn focus_regained(&self) {
        self.cache.focus_regained().await;
    }

    /// Resolve a display name against the raw backend listing of the
    /// current path.
    pub async fn find_entry(&self, name: &str) -> Option<FileEntry> {
        let listing = self.cache.get_listing(&self.nav.backend_path()).await;
        listing.entries.iter().find(|e| e.name == name).cloned()
    }

    // ─── Navigation (persisted) ──────────────────────────────────────────

    async fn known_folders(&self) -> Vec<String> {
        let mut names: Vec<String> = FileCategory::BROWSABLE
            .iter()
            .filter_map(|c| c.virtual_folder_name().map(String::from))
            .collect();
        if let Some(listing) = self.cache.peek(&self.nav.backend_path()).await {
            names.extend(
                listing
                    .entries
                    .iter()
                    .filter(|e| e.is_folder())
                    .map(|e| e.name.clone()),
            );
        }
        names
    }

    pub async fn navigate(&mut self, segment: &str) -> bool {
        let known = self.known_folders().await;
        let moved = self.nav.navigate(segment, &known);
        if moved {
            self.persist_path();
        }
        moved
    }

    pub fn back(&mut self) -> bool {
        let moved = self.nav.back();
        if moved {
            self.persist_path();
        }
        moved
    }

    pub fn breadcrumb_click(&mut self, index: usize) -> bool {
        let moved = self.nav.breadcrumb_click(index);
        if moved {
            self.persist_path();
        }
        moved
    }

    pub fn set_filter(&mut self, filter: Filter) -> bool {
        let moved = self.nav.set_filter(filter);
        if moved {
            self.persist_path();
        }
        moved
    }

    pub fn history_back(&mut self) -> bool {
        let moved = self.nav.history_back();
        if moved {
            self.persist_path();
        }
        moved
    }

    pub fn history_forward(&mut self) -> bool {
        let moved = self.nav.history_forward();
        if moved {
            self.persist_path();
        }
        moved
    }

    /// Jump straight to an absolute backend path (session restore, deep
    /// links, CLI arguments). Resets history.
    pub fn jump_to(&mut self, backend_path: &str) {
        self.nav = Navigator::new(NavPath::from_backend(backend_path));
        self.persist_path();
    }

    fn persist_path(&mut self) {
        self.prefs.last_path = Some(self.nav.backend_path());
        if let Err(e) = self.prefs.save() {
            tracing::warn!("failed to persist path: {}", e);
        }
    }

    // ─── Clipboard ───────────────────────────────────────────────────────

    pub fn copy_entry(&mut self, entry: &FileEntry) {
        self.clipboard.copy(entry.clone(), &self.nav.backend_path());
        self.notifier.success(&format!("Copied \"{}\"", entry.name));
    }

    pub fn cut_entry(&mut self, entry: &FileEntry) {
        self.clipboard.cut(entry.clone(), &self.nav.backend_path());
        self.notifier.success(&format!("Cut \"{}\"", entry.name));
    }

    /// Paste the clipboard into the current path. Empty clipboard is a
    /// silent no-op.
    pub async fn paste(&mut self) -> Result<(), ApiError> {
        let target = self.nav.backend_path();
        match self
            .clipboard
            .paste(self.backend.as_ref(), &self.cache, &target)
            .await
        {
            Ok(None) => Ok(()),
            Ok(Some(outcome)) => {
                let message = match outcome.op {
                    ClipOp::Copy => format!("Pasted \"{}\"", outcome.entry.name),
                    ClipOp::Cut => {
                        format!("Moved \"{}\" to {}", outcome.entry.name, outcome.target_path)
                    }
                };
                self.notifier.success(&message);
                Ok(())
            }
            Err(error) => {
                self.notifier.error(&error.user_message());
                Err(error)
            }
        }
    }

    // ─── Two-phase mutations ─────────────────────────────────────────────

    pub fn request_rename(&self, entry: &FileEntry) -> PendingRename {
        PendingRename {
            entry: entry.clone(),
        }
    }

    pub async fn confirm_rename(
        &mut self,
        pending: PendingRename,
        new_name: &str,
    ) -> Result<(), ApiError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return self.fail(ApiError::Validation("name cannot be empty".to_string()));
        }
        if pending.entry.is_virtual() {
            return self.fail(ApiError::Validation(
                "virtual folders cannot be renamed".to_string(),
            ));
        }
        if let Err(error) = self.backend.rename_file(&pending.entry.id, new_name).await {
            return self.fail(error);
        }
        self.reconcile(&self.nav.backend_path()).await;
        self.notifier.success(&format!(
            "Renamed \"{}\" to \"{}\"",
            pending.entry.name, new_name
        ));
        Ok(())
    }

    pub fn request_delete(&self, entry: &FileEntry) -> PendingDelete {
        PendingDelete {
            entry: entry.clone(),
        }
    }

    pub async fn confirm_delete(&mut self, pending: PendingDelete) -> Result<(), ApiError> {
        if pending.entry.is_virtual() {
            return self.fail(ApiError::Validation(
                "virtual folders cannot be deleted".to_string(),
            ));
        }
        if let Err(error) = self.backend.delete_file(&pending.entry.id).await {
            return self.fail(error);
        }
        self.reconcile(&self.nav.backend_path()).await;
        self.notifier
            .success(&format!("Deleted \"{}\"", pending.entry.name));
        Ok(())
    }

    pub fn request_move(&self, entry: &FileEntry, target_path: &str) -> PendingMove {
        PendingMove {
            entry: entry.clone(),
            target_path: target_path.to_string(),
        }
    }

    pub async fn confirm_move(&mut self, pending: PendingMove) -> Result<(), ApiError> {
        if pending.entry.is_virtual() {
            return self.fail(ApiError::Validation(
                "virtual folders cannot be moved".to_string(),
            ));
        }
        if let Err(error) = self
            .backend
            .move_file(&pending.entry.id, &pending.target_path)
            .await
        {
            return self.fail(error);
        }
        self.cache.invalidate(&pending.target_path).await;
        self.reconcile(&self.nav.backend_path()).await;
        self.notifier.success(&format!(
            "Moved \"{}\" to {}",
            pending.entry.name, pending.target_path
        ));
        Ok(())
    }

    pub fn request_new_folder(&self) -> PendingNewFolder {
        PendingNewFolder {
            parent_path: self.nav.backend_path(),
        }
    }

    pub async fn confirm_new_folder(
        &mut self,
        pending: PendingNewFolder,
        name: &str,
    ) -> Result<(), ApiError> {
        let name = name.trim();
        if name.is_empty() {
            return self.fail(ApiError::Validation(
                "folder name cannot be empty".to_string(),
            ));
        }
        if let Err(error) = self.backend.create_folder(name, &pending.parent_path).await {
            return self.fail(error);
        }
        self.reconcile(&pending.parent_path).await;
        self.notifier
            .success(&format!("Created folder \"{}\"", name));
        Ok(())
    }

    /// Invalidate and immediately refetch a path after a mutation.
    async fn reconcile(&self, path: &str) {
        self.cache.invalidate(path).await;
        self.cache.refetch(path).await;
    }

    fn fail(&mut self, error: ApiError) -> Result<(), ApiError> {
        self.notifier.error(&error.user_message());
        Err(error)
    }
}

/// Operations that only exist on the real client (streaming endpoints).
impl Explorer<ApiClient> {
    /// Download a file by display name into `dest`.
    pub async fn download(
        &mut self,
        name: &str,
        dest: &std::path::Path,
        on_progress: Option<ProgressFn>,
    ) -> Result<u64, ApiError> {
        match self.backend.download(name, dest, on_progress).await {
            Ok(written) => {
                self.notifier
                    .success(&format!("Downloaded \"{}\" ({} bytes)", name, written));
                Ok(written)
            }
            Err(error) => {
                self.notifier.error(&error.user_message());
                Err(error)
            }
        }
    }

    /// Fetch a thumbnail preview by id.
    pub async fn thumbnail(&mut self, thumbnail_id: &str) -> Result<Vec<u8>, ApiError> {
        match self.backend.thumbnail(thumbnail_id).await {
            Ok(bytes) => Ok(bytes),
            Err(error) => {
                self.notifier.error(&error.user_message());
                Err(error)
            }
        }
    }
}
