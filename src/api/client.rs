//! HTTP client for the AeroDrive backend
//!
//! Resolves one base URL per session, attaches authentication according to
//! the transport mode, enforces a bounded per-request timeout, and wraps
//! every backend endpoint. Non-2xx responses are parsed for the backend's
//! JSON `{detail}` field so callers always see a human-readable message.

use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Method, Response, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::{Prefs, TransportMode};

use super::retry::{send_once, send_with_retry, RetryConfig};
use super::types::{
    ApiError, AuthStatus, CreateFolderRequest, DeleteRequest, ErrorBody, FileEntry,
    FileTargetRequest, FilesResponse, GoogleLoginRequest, LoginRequest, RenameRequest,
};
use super::{FileOps, ListingSource};

/// Default per-request budget.
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Connectivity checks get a little more slack than data requests.
const HEALTH_TIMEOUT_MS: u64 = 5000;

/// Downloads wait longer for first byte; the body itself streams unbounded.
const DOWNLOAD_TIMEOUT_MS: u64 = 30_000;

/// Thumbnails are small; refuse to buffer anything bigger than this.
const MAX_THUMBNAIL_BYTES: u64 = 8 * 1024 * 1024;

/// Progress callback: (bytes so far, total bytes or 0 if unknown).
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    transport: TransportMode,
    /// Token cached after login in token mode. Interior mutability because
    /// the client is shared behind an `Arc` once the explorer starts.
    auth_token: RwLock<Option<String>>,
    timeout: Duration,
    retry: RetryConfig,
}

impl ApiClient {
    /// Build a client from preferences. The base URL is resolved once here
    /// and fixed for the session.
    pub fn new(prefs: &Prefs) -> Result<ApiClient, ApiError> {
        let base_url = prefs.resolve_base_url();
        crate::config::validate_base_url(&base_url)?;

        let http = reqwest::Client::builder()
            .cookie_store(prefs.transport == TransportMode::CookieSession)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {}", e)))?;

        info!("backend base URL: {}", base_url);
        Ok(ApiClient {
            http,
            base_url,
            transport: prefs.transport,
            auth_token: RwLock::new(prefs.auth_token.clone()),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            retry: RetryConfig::default(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth_token(&self) -> Option<String> {
        self.auth_token.read().expect("auth token lock poisoned").clone()
    }

    pub fn set_auth_token(&self, token: Option<String>) {
        *self.auth_token.write().expect("auth token lock poisoned") = token;
    }

    /// Endpoint path -> full URL under `<base>/api`.
    fn api_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        let endpoint = if endpoint.starts_with('/') {
            endpoint.to_string()
        } else {
            format!("/{}", endpoint)
        };
        format!("{}/api{}", self.base_url, endpoint)
    }

    /// Attach the `X-Auth-Token` header in token mode. Cookie-session mode
    /// rides on the client's cookie store instead.
    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.transport == TransportMode::TokenHeader {
            if let Some(token) = self.auth_token() {
                return builder.header("X-Auth-Token", token);
            }
        }
        builder
    }

    /// Perform a request against a relative or absolute endpoint.
    ///
    /// The timeout (default 3000 ms) aborts the in-flight request and yields
    /// [`ApiError::Timeout`]. Transport failure yields [`ApiError::Network`].
    /// Non-2xx statuses are NOT an error at this layer; the response is
    /// returned for the caller to interpret. GETs retry on 429/5xx, anything
    /// else is sent exactly once.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<serde_json::Value>,
        timeout_ms: Option<u64>,
    ) -> Result<Response, ApiError> {
        let url = self.api_url(endpoint);
        let timeout = Duration::from_millis(timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS));
        debug!("{} {}", method, url);

        let mut builder = self.apply_auth(self.http.request(method.clone(), &url));
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        if method == Method::GET {
            send_with_retry(builder, timeout, &self.retry).await
        } else {
            send_once(builder, timeout).await
        }
    }

    /// Turn a non-2xx response into `ApiError::Http`, keeping the backend's
    /// `{detail}` message when the body carries one.
    async fn expect_ok(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(http_error(status, &body))
    }

    async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    // ─── Listings ────────────────────────────────────────────────────────

    /// `GET /api/files?path=<encoded>` for one backend path.
    pub async fn fetch_files(&self, path: &str) -> Result<Vec<FileEntry>, ApiError> {
        let endpoint = format!("/files?path={}", urlencoding::encode(path));
        let response = self.request(Method::GET, &endpoint, None, None).await?;
        let response = Self::expect_ok(response).await?;
        let files: FilesResponse = Self::parse_json(response).await?;
        Ok(files.files.into_iter().map(FileEntry::from).collect())
    }

    // ─── Auth ────────────────────────────────────────────────────────────

    pub async fn check_auth(&self) -> Result<AuthStatus, ApiError> {
        let response = self.request(Method::GET, "/auth/check", None, None).await?;
        let response = Self::expect_ok(response).await?;
        Self::parse_json(response).await
    }

    /// Password login. In token mode the returned token is cached on the
    /// client; the caller persists it to preferences.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthStatus, ApiError> {
        let body = serde_json::to_value(LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })
        .map_err(|e| ApiError::Parse(e.to_string()))?;
        let response = self
            .request(Method::POST, "/auth/login", Some(body), None)
            .await?;
        let response = Self::expect_ok(response).await?;
        let status: AuthStatus = Self::parse_json(response).await?;
        if self.transport == TransportMode::TokenHeader {
            if let Some(ref token) = status.auth_token {
                self.set_auth_token(Some(token.clone()));
            }
        }
        Ok(status)
    }

    /// Google sign-in with an identity token.
    pub async fn login_google(&self, token: &str) -> Result<AuthStatus, ApiError> {
        let body = serde_json::to_value(GoogleLoginRequest {
            token: token.to_string(),
        })
        .map_err(|e| ApiError::Parse(e.to_string()))?;
        let response = self
            .request(Method::POST, "/auth/google", Some(body), None)
            .await?;
        let response = Self::expect_ok(response).await?;
        let status: AuthStatus = Self::parse_json(response).await?;
        if self.transport == TransportMode::TokenHeader {
            if let Some(ref t) = status.auth_token {
                self.set_auth_token(Some(t.clone()));
            }
        }
        Ok(status)
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        let response = self.request(Method::POST, "/auth/logout", None, None).await?;
        Self::expect_ok(response).await?;
        self.set_auth_token(None);
        Ok(())
    }

    // ─── Connectivity ────────────────────────────────────────────────────

    /// Probe the backend. Reachable means 2xx, or 405 when the server does
    /// not implement OPTIONS on the health route.
    pub async fn health_check(&self) -> Result<bool, ApiError> {
        let response = self
            .request(Method::OPTIONS, "/health", None, Some(HEALTH_TIMEOUT_MS))
            .await?;
        let status = response.status();
        Ok(status.is_success() || status == StatusCode::METHOD_NOT_ALLOWED)
    }

    // ─── Downloads ───────────────────────────────────────────────────────

    /// Download `GET /api/dl/<name>` streaming into `dest`.
    pub async fn download(
        &self,
        name: &str,
        dest: &Path,
        on_progress: Option<ProgressFn>,
    ) -> Result<u64, ApiError> {
        let endpoint = format!("/dl/{}", urlencoding::encode(name));
        let response = self
            .request(Method::GET, &endpoint, None, Some(DOWNLOAD_TIMEOUT_MS))
            .await?;
        let response = Self::expect_ok(response).await?;

        let total = response.content_length().unwrap_or(0);
        let mut stream = response.bytes_stream();
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| ApiError::Network(format!("cannot create {:?}: {}", dest, e)))?;
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ApiError::Network(format!("download stream: {}", e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| ApiError::Network(format!("write: {}", e)))?;
            written += chunk.len() as u64;
            if let Some(ref cb) = on_progress {
                cb(written, total);
            }
        }
        file.flush()
            .await
            .map_err(|e| ApiError::Network(format!("flush: {}", e)))?;

        debug!("downloaded {} ({} bytes)", name, written);
        Ok(written)
    }

    /// Fetch thumbnail bytes for `GET /api/file/<id>/thumbnail`.
    pub async fn thumbnail(&self, thumbnail_id: &str) -> Result<Vec<u8>, ApiError> {
        let endpoint = format!("/file/{}/thumbnail", urlencoding::encode(thumbnail_id));
        let response = self.request(Method::GET, &endpoint, None, None).await?;
        let response = Self::expect_ok(response).await?;
        if response.content_length().unwrap_or(0) > MAX_THUMBNAIL_BYTES {
            return Err(ApiError::Parse("thumbnail exceeds size limit".to_string()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(format!("thumbnail stream: {}", e)))?;
        Ok(bytes.to_vec())
    }

    // ─── Mutations ───────────────────────────────────────────────────────

    async fn post_mutation<B: serde::Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Parse(e.to_string()))?;
        let response = self.request(Method::POST, endpoint, Some(body), None).await?;
        Self::expect_ok(response).await?;
        Ok(())
    }
}

/// Build `ApiError::Http` from a status and raw response body, extracting
/// the `{detail}` field when present.
fn http_error(status: StatusCode, body: &str) -> ApiError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
        .filter(|d| !d.is_empty());
    ApiError::Http {
        status: status.as_u16(),
        detail,
    }
}

#[async_trait]
impl ListingSource for ApiClient {
    async fn fetch_listing(&self, path: &str) -> Result<Vec<FileEntry>, ApiError> {
        self.fetch_files(path).await
    }
}

#[async_trait]
impl FileOps for ApiClient {
    async fn copy_file(&self, file_id: &str, target_path: &str) -> Result<(), ApiError> {
        self.post_mutation(
            "/files/copy",
            &FileTargetRequest {
                file_id: file_id.to_string(),
                target_path: target_path.to_string(),
            },
        )
        .await
    }

    async fn move_file(&self, file_id: &str, target_path: &str) -> Result<(), ApiError> {
        self.post_mutation(
            "/files/move",
            &FileTargetRequest {
                file_id: file_id.to_string(),
                target_path: target_path.to_string(),
            },
        )
        .await
    }

    async fn rename_file(&self, file_id: &str, new_name: &str) -> Result<(), ApiError> {
        self.post_mutation(
            "/files/rename",
            &RenameRequest {
                file_id: file_id.to_string(),
                new_name: new_name.to_string(),
            },
        )
        .await
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), ApiError> {
        self.post_mutation(
            "/files/delete",
            &DeleteRequest {
                file_id: file_id.to_string(),
            },
        )
        .await
    }

    async fn create_folder(&self, folder_name: &str, current_path: &str) -> Result<(), ApiError> {
        self.post_mutation(
            "/folders/create",
            &CreateFolderRequest {
                folder_name: folder_name.to_string(),
                current_path: current_path.to_string(),
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(url: &str) -> ApiClient {
        let mut prefs = Prefs::default();
        prefs.server_url = Some(url.to_string());
        ApiClient::new(&prefs).unwrap()
    }

    #[test]
    fn test_api_url_joins_under_api() {
        let client = client_for("http://box.local:8000");
        assert_eq!(
            client.api_url("/files?path=%2F"),
            "http://box.local:8000/api/files?path=%2F"
        );
        assert_eq!(client.api_url("health"), "http://box.local:8000/api/health");
        assert_eq!(
            client.api_url("http://other.host/api/x"),
            "http://other.host/api/x"
        );
    }

    #[test]
    fn test_http_error_extracts_detail() {
        let err = http_error(StatusCode::CONFLICT, r#"{"detail":"already exists"}"#);
        match err {
            ApiError::Http { status, detail } => {
                assert_eq!(status, 409);
                assert_eq!(detail.as_deref(), Some("already exists"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_http_error_without_detail_body() {
        let err = http_error(StatusCode::BAD_GATEWAY, "<html>nginx</html>");
        match err {
            ApiError::Http { status, detail } => {
                assert_eq!(status, 502);
                assert!(detail.is_none());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_token_cached_from_prefs() {
        let mut prefs = Prefs::default();
        prefs.server_url = Some("http://box.local:8000".into());
        prefs.transport = TransportMode::TokenHeader;
        prefs.auth_token = Some("tok-9".into());
        let client = ApiClient::new(&prefs).unwrap();
        assert_eq!(client.auth_token().as_deref(), Some("tok-9"));
        client.set_auth_token(None);
        assert!(client.auth_token().is_none());
    }
}
