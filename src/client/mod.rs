//! Typed client for the HTTP API.
//!
//! Requests carry the stored bearer token. A `401` triggers one refresh and
//! one retry; if the refresh fails the session is cleared and
//! [`ClientError::SessionExpired`] is returned.

mod store;

pub use store::{
    FileTokenStore, MemoryTokenStore, TokenService, TokenStore, REFRESH_TOKEN_KEY, TOKEN_KEY,
    USER_KEY,
};

use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::http::ApiResponse;
use crate::types::{AuthResponse, LoginRequest, RefreshTokenRequest, RegisterRequest, UserSummary};

const DEFAULT_ERROR: &str = "An error occurred";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Session expired. Please login again.")]
    SessionExpired,

    #[error("token store error: {0}")]
    TokenStore(String),

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    tokens: TokenService,
    refresh_lock: Mutex<()>,
}

impl ApiClient {
    pub fn new(base_url: &str, tokens: TokenService) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            tokens,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        method: &Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Response, ClientError> {
        let mut request = self.http.request(method.clone(), self.url(path));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    /// Decode the envelope, turning non-2xx answers into [`ClientError::Api`].
    async fn envelope<T: DeserializeOwned>(
        response: Response,
    ) -> Result<ApiResponse<T>, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiResponse<Value>>()
                .await
                .ok()
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_ERROR.to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<ApiResponse<T>>().await?)
    }

    /// Authenticated request with refresh-once-on-401.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<ApiResponse<T>, ClientError> {
        let token = self.tokens.token()?;
        let response = self.send(&method, path, query, body.as_ref(), token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::envelope(response).await;
        }

        debug!(path, "access token rejected, refreshing");
        if !self.refresh_after(token.as_deref()).await {
            self.tokens.clear()?;
            return Err(ClientError::SessionExpired);
        }
        let token = self.tokens.token()?;
        let retry = self.send(&method, path, query, body.as_ref(), token.as_deref()).await?;
        Self::envelope(retry).await
    }

    /// Refresh unless another caller already replaced `stale` while we
    /// waited for the lock.
    async fn refresh_after(&self, stale: Option<&str>) -> bool {
        let _guard = self.refresh_lock.lock().await;
        match self.tokens.token() {
            Ok(Some(current)) if Some(current.as_str()) != stale => true,
            _ => self.refresh().await,
        }
    }

    /// Exchange the stored refresh token. `false` on any failure.
    pub async fn refresh(&self) -> bool {
        let Ok(Some(refresh_token)) = self.tokens.refresh_token() else {
            return false;
        };
        let response = self
            .http
            .post(self.url("/api/auth/refresh-token"))
            .json(&RefreshTokenRequest { refresh_token })
            .send()
            .await;
        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!(status = %r.status(), "refresh rejected");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "refresh request failed");
                return false;
            }
        };
        let Ok(envelope) = response.json::<ApiResponse<AuthResponse>>().await else {
            return false;
        };
        match envelope.data {
            Some(auth) if envelope.success => self.tokens.store_session(&auth).is_ok(),
            _ => false,
        }
    }

    /// Unauthenticated call. Credentials errors come back as `Api`, never
    /// as an expired session.
    async fn public_post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
    ) -> Result<ApiResponse<T>, ClientError> {
        let response = self.send(&Method::POST, path, &[], Some(&body), None).await?;
        Self::envelope(response).await
    }

    fn to_value<B: Serialize>(body: &B) -> Result<Value, ClientError> {
        Ok(serde_json::to_value(body)?)
    }

    pub async fn login(
        &self,
        req: &LoginRequest,
    ) -> Result<ApiResponse<AuthResponse>, ClientError> {
        let envelope: ApiResponse<AuthResponse> = self.public_post("/api/auth/login", Self::to_value(req)?).await?;
        if let Some(auth) = envelope.data.as_ref().filter(|_| envelope.success) {
            self.tokens.store_session(auth)?;
        }
        Ok(envelope)
    }

    pub async fn register(
        &self,
        req: &RegisterRequest,
    ) -> Result<ApiResponse<AuthResponse>, ClientError> {
        let envelope: ApiResponse<AuthResponse> = self.public_post("/api/auth/register", Self::to_value(req)?).await?;
        if let Some(auth) = envelope.data.as_ref().filter(|_| envelope.success) {
            self.tokens.store_session(auth)?;
        }
        Ok(envelope)
    }

    /// Tell the server, then clear the local session whatever it answered.
    pub async fn logout(&self) -> Result<(), ClientError> {
        if let Err(e) = self.request::<Value>(Method::POST, "/api/auth/logout", &[], None).await {
            warn!(error = %e, "logout call failed, clearing session anyway");
        }
        self.tokens.clear()
    }

    pub async fn current_user(&self) -> Result<ApiResponse<UserSummary>, ClientError> {
        let envelope: ApiResponse<UserSummary> = self.get("/api/auth/me").await?;
        if let Some(user) = envelope.data.as_ref() {
            self.tokens.set_user(user)?;
        }
        Ok(envelope)
    }

    pub async fn verify_email(&self, token: &str) -> Result<ApiResponse<Value>, ClientError> {
        self.request(Method::GET, "/api/auth/verify-email", &[("token", token)], None)
            .await
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<ApiResponse<T>, ClientError> {
        self.request(Method::GET, path, &[], None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>, ClientError> {
        self.request(Method::POST, path, &[], Some(Self::to_value(body)?)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>, ClientError> {
        self.request(Method::PUT, path, &[], Some(Self::to_value(body)?)).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<ApiResponse<T>, ClientError> {
        self.request(Method::DELETE, path, &[], None).await
    }
}
