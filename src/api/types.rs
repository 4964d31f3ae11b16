//! Shared types for the AeroDrive API client
//!
//! Wire-level types mirroring the backend JSON, the client-side `FileEntry`
//! domain type, and the error type every layer above the transport reports.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// File categories as reported by the backend, plus `Folder`.
///
/// This is a closed set: icon selection, filter matching and virtual-folder
/// naming are exhaustive matches over it, not string comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Document,
    Video,
    Photo,
    Voice,
    Audio,
    Folder,
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileCategory::Document => write!(f, "document"),
            FileCategory::Video => write!(f, "video"),
            FileCategory::Photo => write!(f, "photo"),
            FileCategory::Voice => write!(f, "voice"),
            FileCategory::Audio => write!(f, "audio"),
            FileCategory::Folder => write!(f, "folder"),
        }
    }
}

impl FileCategory {
    /// Categories that have a virtual folder at the root of the explorer.
    pub const BROWSABLE: [FileCategory; 5] = [
        FileCategory::Photo,
        FileCategory::Document,
        FileCategory::Video,
        FileCategory::Audio,
        FileCategory::Voice,
    ];

    /// Display name of this category's virtual folder. `None` for `Folder`,
    /// which is a real backend object, not a synthetic one.
    pub fn virtual_folder_name(self) -> Option<&'static str> {
        match self {
            FileCategory::Photo => Some("Images"),
            FileCategory::Document => Some("Documents"),
            FileCategory::Video => Some("Videos"),
            FileCategory::Audio => Some("Audio"),
            FileCategory::Voice => Some("Voice Messages"),
            FileCategory::Folder => None,
        }
    }

    /// Inverse of [`FileCategory::virtual_folder_name`].
    pub fn from_virtual_folder(name: &str) -> Option<FileCategory> {
        Self::BROWSABLE
            .into_iter()
            .find(|c| c.virtual_folder_name() == Some(name))
    }

    /// Parse a sidebar filter keyword ("all" is handled by the caller).
    pub fn from_keyword(keyword: &str) -> Option<FileCategory> {
        match keyword {
            "document" => Some(FileCategory::Document),
            "video" => Some(FileCategory::Video),
            "photo" => Some(FileCategory::Photo),
            "voice" => Some(FileCategory::Voice),
            "audio" => Some(FileCategory::Audio),
            "folder" => Some(FileCategory::Folder),
            _ => None,
        }
    }
}

/// Whether an entry is a plain file or a folder.
///
/// This is the single folder discriminant used everywhere in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Folder,
}

// ─── Wire Types ──────────────────────────────────────────────────────────

/// One file record as the backend serializes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiFile {
    pub id: String,
    #[serde(default)]
    pub chat_id: i64,
    #[serde(default)]
    pub message_id: i64,
    pub file_type: FileCategory,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub file_unique_id: Option<String>,
    /// Size in megabytes. Folders report none.
    #[serde(default)]
    pub file_size: f64,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_caption: Option<String>,
    /// Backend path of the directory the file resides under.
    #[serde(default)]
    pub file_path: String,
}

/// Response body of `GET /api/files`.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesResponse {
    pub files: Vec<ApiFile>,
}

/// Response body of the auth endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthStatus {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoogleLoginRequest {
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileTargetRequest {
    pub file_id: String,
    pub target_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenameRequest {
    pub file_id: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteRequest {
    pub file_id: String,
}

/// `POST /api/folders/create` uses camelCase keys, unlike the other bodies.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    pub folder_name: String,
    pub current_path: String,
}

/// Error body the backend attaches to non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
}

// ─── Domain Type ─────────────────────────────────────────────────────────

/// Client-side snapshot of one remote file or folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: String,
    pub name: String,
    pub kind: FileKind,
    pub category: FileCategory,
    /// Size in megabytes, as the backend reports it. 0 for folders.
    pub size_mb: f64,
    /// Thumbnail id usable with `GET /api/file/<id>/thumbnail`.
    pub thumbnail: Option<String>,
    /// Backend path of the directory this entry resides under.
    pub parent_path: String,
}

impl FileEntry {
    /// Synthesize a client-only virtual folder for a category.
    pub fn virtual_folder(category: FileCategory) -> Option<FileEntry> {
        let name = category.virtual_folder_name()?;
        Some(FileEntry {
            id: format!("virtual:{}", category),
            name: name.to_string(),
            kind: FileKind::Folder,
            category,
            size_mb: 0.0,
            thumbnail: None,
            parent_path: "/".to_string(),
        })
    }

    pub fn is_folder(&self) -> bool {
        self.kind == FileKind::Folder
    }

    /// True for the synthetic category folders that exist only in the client.
    pub fn is_virtual(&self) -> bool {
        self.id.starts_with("virtual:")
    }

    pub fn extension(&self) -> Option<&str> {
        if self.is_folder() {
            return None;
        }
        self.name
            .rsplit('.')
            .next()
            .filter(|ext| ext.len() < self.name.len())
    }

    /// Icon glyph for display. Exhaustive over the category set, refined by
    /// extension for documents.
    pub fn icon(&self) -> &'static str {
        match self.category {
            FileCategory::Folder => "📁",
            FileCategory::Photo => "🖼️",
            FileCategory::Video => "🎬",
            FileCategory::Audio | FileCategory::Voice => "🎵",
            FileCategory::Document => match self.extension() {
                Some("doc") | Some("docx") => "📝",
                Some("xls") | Some("xlsx") => "📊",
                Some("zip") | Some("rar") | Some("7z") => "📦",
                _ => "📄",
            },
        }
    }
}

impl From<ApiFile> for FileEntry {
    fn from(api: ApiFile) -> Self {
        // Unnamed uploads render as "<category>_<message id>".
        let name = api
            .file_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("{}_{}", api.file_type, api.message_id));

        let kind = if api.file_type == FileCategory::Folder {
            FileKind::Folder
        } else {
            FileKind::File
        };

        FileEntry {
            id: api.id,
            name,
            kind,
            category: api.file_type,
            size_mb: if kind == FileKind::Folder { 0.0 } else { api.file_size },
            thumbnail: api.thumbnail,
            parent_path: api.file_path,
        }
    }
}

/// Format a size reported in megabytes for display.
pub fn format_size(size_mb: f64) -> String {
    if size_mb == 0.0 {
        return "0 MB".to_string();
    }
    if size_mb < 1.0 {
        return format!("{} KB", (size_mb * 1024.0 * 100.0).round() / 100.0);
    }
    if size_mb < 1024.0 {
        return format!("{} MB", (size_mb * 100.0).round() / 100.0);
    }
    format!("{} GB", (size_mb / 1024.0 * 100.0).round() / 100.0)
}

// ─── Errors ──────────────────────────────────────────────────────────────

/// Error type of the API client and everything built on it.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("server returned {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Http { status: u16, detail: Option<String> },

    #[error("invalid response: {0}")]
    Parse(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    State(String),
}

impl ApiError {
    /// Connectivity failures route the user to the backend-URL recovery
    /// affordance instead of a plain error notification.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Timeout)
    }

    /// Human-readable message, preferring the server-provided detail.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Http {
                detail: Some(detail),
                ..
            } => detail.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_folder_names_round_trip() {
        for category in FileCategory::BROWSABLE {
            let name = category.virtual_folder_name().unwrap();
            assert_eq!(FileCategory::from_virtual_folder(name), Some(category));
        }
        assert_eq!(FileCategory::Folder.virtual_folder_name(), None);
        assert_eq!(FileCategory::from_virtual_folder("Downloads"), None);
    }

    #[test]
    fn test_api_file_to_entry_named_file() {
        let api = ApiFile {
            id: "f1".into(),
            chat_id: 7,
            message_id: 42,
            file_type: FileCategory::Photo,
            thumbnail: Some("t1".into()),
            file_unique_id: Some("u1".into()),
            file_size: 2.5,
            file_name: Some("cat.png".into()),
            file_caption: None,
            file_path: "/Images".into(),
        };
        let entry = FileEntry::from(api);
        assert_eq!(entry.name, "cat.png");
        assert_eq!(entry.kind, FileKind::File);
        assert_eq!(entry.extension(), Some("png"));
        assert_eq!(entry.icon(), "🖼️");
        assert_eq!(entry.parent_path, "/Images");
    }

    #[test]
    fn test_api_file_to_entry_unnamed_falls_back_to_message_id() {
        let api = ApiFile {
            id: "f2".into(),
            chat_id: 0,
            message_id: 99,
            file_type: FileCategory::Voice,
            thumbnail: None,
            file_unique_id: None,
            file_size: 0.3,
            file_name: None,
            file_caption: None,
            file_path: "/".into(),
        };
        assert_eq!(FileEntry::from(api).name, "voice_99");
    }

    #[test]
    fn test_folder_discriminant_from_category() {
        let api = ApiFile {
            id: "d1".into(),
            chat_id: 0,
            message_id: 0,
            file_type: FileCategory::Folder,
            thumbnail: None,
            file_unique_id: None,
            file_size: 0.0,
            file_name: Some("Projects".into()),
            file_caption: None,
            file_path: "/".into(),
        };
        let entry = FileEntry::from(api);
        assert!(entry.is_folder());
        assert!(!entry.is_virtual());
        assert_eq!(entry.extension(), None);
        assert_eq!(entry.icon(), "📁");
    }

    #[test]
    fn test_create_folder_body_uses_camel_case() {
        let body = CreateFolderRequest {
            folder_name: "New Folder".into(),
            current_path: "/".into(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("folderName").is_some());
        assert!(json.get("currentPath").is_some());
    }

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(0.0), "0 MB");
        assert_eq!(format_size(0.5), "512 KB");
        assert_eq!(format_size(12.0), "12 MB");
        assert_eq!(format_size(2048.0), "2 GB");
    }

    #[test]
    fn test_user_message_prefers_server_detail() {
        let err = ApiError::Http {
            status: 409,
            detail: Some("name already exists".into()),
        };
        assert_eq!(err.user_message(), "name already exists");
        assert!(ApiError::Timeout.is_connectivity());
        assert!(!err.is_connectivity());
    }
}
