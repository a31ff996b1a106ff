//! Idempotency guard: admits a protected request only if it presents a token
//! that this call is the first to consume.
//!
//! The guard holds no per-token state. Exactly-once admission comes entirely
//! from [`TokenStore::atomic_consume`], so it holds across processes.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::config::{Config, Messages};
use crate::errors::AppError;
use crate::store::TokenStore;
use crate::token::UNUSED_MARKER;

/// Largest form body buffered while looking for the token parameter.
pub const MAX_FORM_BYTES: usize = 1024 * 1024;

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Token consumed by this call. The protected operation may run once.
    Allow,
    /// No non-blank token in any accepted location. The store was not contacted.
    RejectMissingToken,
    /// Never issued, already consumed, or expired.
    RejectInvalidOrReused,
    /// The store gave no answer. Fail closed.
    RejectStorageError,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }

    /// Map a reject onto the error the boundary layer renders.
    pub fn into_result(self, messages: &Messages) -> Result<(), AppError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::RejectMissingToken => {
                Err(AppError::IllegalArgument(messages.illegal_argument.clone()))
            }
            Decision::RejectInvalidOrReused => {
                Err(AppError::RepetitiveOperation(messages.repetitive_operation.clone()))
            }
            Decision::RejectStorageError => {
                Err(AppError::StorageUnavailable(messages.storage_unavailable.clone()))
            }
        }
    }
}

/// The parts of a request a token may be carried in.
#[derive(Debug, Clone, Copy)]
pub struct GuardRequest<'a> {
    pub headers: &'a HeaderMap,
    pub query: Option<&'a str>,
    /// Raw `application/x-www-form-urlencoded` body, if one was read.
    pub form: Option<&'a [u8]>,
}

impl<'a> GuardRequest<'a> {
    pub fn new(headers: &'a HeaderMap) -> Self {
        Self {
            headers,
            query: None,
            form: None,
        }
    }

    pub fn query(mut self, query: Option<&'a str>) -> Self {
        self.query = query;
        self
    }

    pub fn form(mut self, form: Option<&'a [u8]>) -> Self {
        self.form = form;
        self
    }
}

pub struct IdempotencyGuard {
    store: Arc<dyn TokenStore>,
    token_name: String,
    prefix: String,
    messages: Messages,
}

impl IdempotencyGuard {
    pub fn new(
        store: Arc<dyn TokenStore>,
        token_name: impl Into<String>,
        prefix: impl Into<String>,
        messages: Messages,
    ) -> Self {
        Self {
            store,
            token_name: token_name.into().to_ascii_lowercase(),
            prefix: prefix.into(),
            messages,
        }
    }

    pub fn from_config(store: Arc<dyn TokenStore>, cfg: &Config) -> Self {
        Self::new(
            store,
            cfg.token_name.clone(),
            cfg.token_prefix.clone(),
            cfg.messages.clone(),
        )
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    /// Header first, then query string, then form body. Blank values count
    /// as absent at every step.
    pub fn extract_token(&self, req: &GuardRequest<'_>) -> Option<String> {
        self.token_from_header(req.headers)
            .or_else(|| req.query.and_then(|q| self.token_from_params(q.as_bytes())))
            .or_else(|| req.form.and_then(|f| self.token_from_params(f)))
    }

    /// Extract the token and consume it.
    pub async fn authorize(&self, req: &GuardRequest<'_>) -> Decision {
        self.admit(self.extract_token(req).as_deref()).await
    }

    /// Consume an already-extracted token.
    #[tracing::instrument(skip_all)]
    pub async fn admit(&self, token: Option<&str>) -> Decision {
        let Some(token) = token else {
            tracing::warn!("idempotency: request carries no token");
            return Decision::RejectMissingToken;
        };

        // Only issued keys may be deleted from a shared store. An empty prefix
        // disables the check and every token goes to the store.
        if !self.prefix.is_empty() && !token.starts_with(&self.prefix) {
            tracing::warn!("idempotency: token outside the issued namespace");
            return Decision::RejectInvalidOrReused;
        }

        match self.store.atomic_consume(token, UNUSED_MARKER).await {
            Ok(true) => {
                tracing::debug!("idempotency: token consumed, request admitted");
                Decision::Allow
            }
            Ok(false) => {
                tracing::warn!("idempotency: token unknown, expired or already used");
                Decision::RejectInvalidOrReused
            }
            Err(e) => {
                tracing::error!(error = %e, "idempotency: token store failed, rejecting");
                Decision::RejectStorageError
            }
        }
    }

    fn token_from_header(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get(self.token_name.as_str())
            .and_then(|v| v.to_str().ok())
            .and_then(non_blank)
    }

    fn token_from_params(&self, encoded: &[u8]) -> Option<String> {
        url::form_urlencoded::parse(encoded)
            .filter(|(k, _)| k.eq_ignore_ascii_case(&self.token_name))
            .find_map(|(_, v)| non_blank(&v))
    }
}

fn non_blank(v: &str) -> Option<String> {
    let v = v.trim();
    if v.is_empty() {
        None
    } else {
        Some(v.to_string())
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

/// Middleware: consumes the request's token before the protected handler runs.
///
/// Attach with [`crate::api::protect`]; routes that are not registered there
/// are never guarded. A form body is only buffered when neither the header
/// nor the query string carries the token, and is handed on intact.
pub async fn require_token(
    State(guard): State<Arc<IdempotencyGuard>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (parts, body) = req.into_parts();

    let mut token = guard.extract_token(&GuardRequest::new(&parts.headers).query(parts.uri.query()));

    let body = if token.is_none() && is_form(&parts.headers) {
        let bytes = axum::body::to_bytes(body, MAX_FORM_BYTES).await.map_err(|e| {
            tracing::warn!(error = %e, "idempotency: unreadable form body");
            AppError::IllegalArgument(guard.messages().illegal_argument.clone())
        })?;
        token = guard.token_from_params(&bytes);
        Body::from(bytes)
    } else {
        body
    };

    guard
        .admit(token.as_deref())
        .await
        .into_result(guard.messages())?;

    Ok(next.run(Request::from_parts(parts, body)).await)
}
