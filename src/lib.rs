// AeroDrive - remote file explorer client
// Listing, navigation, clipboard file operations and cache reconciliation
// against the AeroDrive backend REST API.

pub mod api;
pub mod cache;
pub mod clipboard;
pub mod config;
pub mod explorer;
pub mod nav;

pub use api::{ApiClient, ApiError, FileCategory, FileEntry, FileKind, FileOps, ListingSource};
pub use cache::{Listing, ListingCache};
pub use clipboard::{ClipOp, Clipboard, ClipboardEntry};
pub use config::{Prefs, TransportMode};
pub use explorer::{
    sidebar_stats, visible_entries, ConnectivityError, Explorer, ExplorerView, Notifier,
    SidebarStats, TracingNotifier,
};
pub use nav::{Filter, NavPath, Navigator, ROOT_SEGMENT};
