//! Navigation model
//!
//! Single source of truth for "where the user is": an ordered list of path
//! segments rooted at the `Home` sentinel, the backend path derived from
//! it, the active category filter, and a back/forward history that replays
//! prior paths without duplicating entries.

use crate::api::FileCategory;

/// First segment of every path.
pub const ROOT_SEGMENT: &str = "Home";

/// Logical client path. Invariant: never empty, first segment is always
/// [`ROOT_SEGMENT`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavPath {
    segments: Vec<String>,
}

impl Default for NavPath {
    fn default() -> Self {
        Self::root()
    }
}

impl NavPath {
    pub fn root() -> NavPath {
        NavPath {
            segments: vec![ROOT_SEGMENT.to_string()],
        }
    }

    /// Rebuild a path from a backend path string ("/" or "/a/b").
    pub fn from_backend(path: &str) -> NavPath {
        let mut nav = NavPath::root();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            nav.segments.push(segment.to_string());
        }
        nav
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    pub fn last_segment(&self) -> &str {
        self.segments.last().expect("path is never empty")
    }

    /// The slash-delimited path string sent to the server: `/` at root,
    /// otherwise `/` + the non-root segments joined with `/`.
    pub fn backend_path(&self) -> String {
        if self.is_root() {
            "/".to_string()
        } else {
            format!("/{}", self.segments[1..].join("/"))
        }
    }

    fn push(&mut self, segment: &str) {
        self.segments.push(segment.to_string());
    }

    fn pop(&mut self) {
        if self.segments.len() > 1 {
            self.segments.pop();
        }
    }

    fn truncate(&mut self, keep: usize) {
        self.segments.truncate(keep.max(1));
    }
}

/// Sidebar category filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    All,
    Category(FileCategory),
}

impl Filter {
    /// Parse a sidebar keyword ("all", "photo", ...).
    pub fn from_keyword(keyword: &str) -> Option<Filter> {
        if keyword == "all" {
            return Some(Filter::All);
        }
        FileCategory::from_keyword(keyword).map(Filter::Category)
    }
}

/// Filter implied by a path: a category when the path sits at a virtual
/// folder, `All` otherwise.
fn derived_filter(path: &NavPath) -> Filter {
    if path.segments().len() == 2 {
        if let Some(category) = FileCategory::from_virtual_folder(path.last_segment()) {
            return Filter::Category(category);
        }
    }
    Filter::All
}

/// Navigation state machine. Pure and deterministic; persistence and
/// listing lookups are the orchestrator's job.
#[derive(Debug, Clone, Default)]
pub struct Navigator {
    path: NavPath,
    filter: Filter,
    back_stack: Vec<NavPath>,
    forward_stack: Vec<NavPath>,
}

impl Navigator {
    pub fn new(initial: NavPath) -> Navigator {
        let filter = derived_filter(&initial);
        Navigator {
            path: initial,
            filter,
            back_stack: Vec::new(),
            forward_stack: Vec::new(),
        }
    }

    pub fn path(&self) -> &NavPath {
        &self.path
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn backend_path(&self) -> String {
        self.path.backend_path()
    }

    /// Record the pre-change path in history. A fresh user navigation
    /// invalidates the forward stack, exactly like a browser.
    fn record(&mut self, previous: NavPath) {
        self.back_stack.push(previous);
        self.forward_stack.clear();
    }

    /// Descend into `segment` if it names a known folder (virtual or
    /// returned by the last listing). Unknown segments are a no-op.
    /// Resets the category filter to All.
    pub fn navigate(&mut self, segment: &str, known_folders: &[String]) -> bool {
        if !known_folders.iter().any(|name| name == segment) {
            return false;
        }
        let previous = self.path.clone();
        self.path.push(segment);
        self.filter = Filter::All;
        self.record(previous);
        true
    }

    /// Pop the last segment. Root is a fixed point.
    pub fn back(&mut self) -> bool {
        if self.path.is_root() {
            return false;
        }
        let previous = self.path.clone();
        self.path.pop();
        self.filter = derived_filter(&self.path);
        self.record(previous);
        true
    }

    /// Truncate the path to `index + 1` segments; index 0 is the root.
    pub fn breadcrumb_click(&mut self, index: usize) -> bool {
        if index + 1 >= self.path.segments().len() {
            return false;
        }
        let previous = self.path.clone();
        self.path.truncate(index + 1);
        self.filter = derived_filter(&self.path);
        self.record(previous);
        true
    }

    /// Replace the path wholesale with a category's virtual folder; `All`
    /// resets to root alone.
    pub fn set_filter(&mut self, filter: Filter) -> bool {
        let target = match filter {
            Filter::All => NavPath::root(),
            Filter::Category(category) => match category.virtual_folder_name() {
                Some(name) => {
                    let mut path = NavPath::root();
                    path.push(name);
                    path
                }
                // `Folder` has no virtual folder; treat as All.
                None => NavPath::root(),
            },
        };
        if target == self.path {
            self.filter = derived_filter(&self.path);
            return false;
        }
        let previous = self.path.clone();
        self.path = target;
        self.filter = derived_filter(&self.path);
        self.record(previous);
        true
    }

    /// Replay the previous path (platform history back). Does not push a
    /// duplicate history entry.
    pub fn history_back(&mut self) -> bool {
        match self.back_stack.pop() {
            Some(previous) => {
                self.forward_stack.push(std::mem::replace(&mut self.path, previous));
                self.filter = derived_filter(&self.path);
                true
            }
            None => false,
        }
    }

    /// Replay an undone path (platform history forward).
    pub fn history_forward(&mut self) -> bool {
        match self.forward_stack.pop() {
            Some(next) => {
                self.back_stack.push(std::mem::replace(&mut self.path, next));
                self.filter = derived_filter(&self.path);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_backend_path_derivation() {
        assert_eq!(NavPath::root().backend_path(), "/");
        let mut nav = Navigator::new(NavPath::root());
        nav.navigate("Images", &known(&["Images"]));
        assert_eq!(nav.backend_path(), "/Images");
        nav.navigate("Trips", &known(&["Trips"]));
        assert_eq!(nav.backend_path(), "/Images/Trips");
    }

    #[test]
    fn test_backend_path_round_trip_keeps_last_segment() {
        for backend in ["/", "/Images", "/Images/Trips", "/Projects/2024/src"] {
            let path = NavPath::from_backend(backend);
            let round = NavPath::from_backend(&path.backend_path());
            assert_eq!(round.last_segment(), path.last_segment());
        }
    }

    #[test]
    fn test_navigate_unknown_folder_is_noop() {
        let mut nav = Navigator::new(NavPath::root());
        assert!(!nav.navigate("Nope", &known(&["Images"])));
        assert!(nav.path().is_root());
    }

    #[test]
    fn test_back_at_root_is_idempotent() {
        let mut nav = Navigator::new(NavPath::root());
        assert!(!nav.back());
        assert!(!nav.back());
        assert!(nav.path().is_root());
        assert_eq!(nav.backend_path(), "/");
    }

    #[test]
    fn test_breadcrumb_truncates_and_root_resets() {
        let mut nav = Navigator::new(NavPath::from_backend("/a/b/c"));
        assert!(nav.breadcrumb_click(1));
        assert_eq!(nav.backend_path(), "/a");
        assert!(nav.breadcrumb_click(0));
        assert!(nav.path().is_root());
        // Clicking the segment we already stand on changes nothing.
        assert!(!nav.breadcrumb_click(0));
    }

    #[test]
    fn test_set_filter_replaces_path_wholesale() {
        let mut nav = Navigator::new(NavPath::from_backend("/Projects/deep"));
        nav.set_filter(Filter::Category(FileCategory::Photo));
        assert_eq!(nav.backend_path(), "/Images");
        assert_eq!(nav.filter(), Filter::Category(FileCategory::Photo));
        nav.set_filter(Filter::All);
        assert!(nav.path().is_root());
        assert_eq!(nav.filter(), Filter::All);
    }

    #[test]
    fn test_navigate_resets_filter() {
        let mut nav = Navigator::new(NavPath::root());
        nav.set_filter(Filter::Category(FileCategory::Document));
        nav.navigate("Projects", &known(&["Projects"]));
        assert_eq!(nav.filter(), Filter::All);
    }

    #[test]
    fn test_history_replays_without_duplicates() {
        let mut nav = Navigator::new(NavPath::root());
        nav.navigate("Images", &known(&["Images"]));
        nav.navigate("Trips", &known(&["Trips"]));

        assert!(nav.history_back());
        assert_eq!(nav.backend_path(), "/Images");
        assert!(nav.history_back());
        assert_eq!(nav.backend_path(), "/");
        assert!(!nav.history_back());

        assert!(nav.history_forward());
        assert_eq!(nav.backend_path(), "/Images");
        assert!(nav.history_forward());
        assert_eq!(nav.backend_path(), "/Images/Trips");
        assert!(!nav.history_forward());

        // Going back then navigating somewhere new drops the forward stack.
        nav.history_back();
        nav.navigate("Summer", &known(&["Summer"]));
        assert!(!nav.history_forward());
        assert_eq!(nav.backend_path(), "/Images/Summer");
    }
}
