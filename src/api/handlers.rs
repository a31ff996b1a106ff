use std::sync::Arc;

use axum::extract::State;

use crate::errors::AppError;
use crate::response::ServerResponse;
use crate::token::Token;
use crate::AppState;

/// Issue endpoint: mints a token; `data` carries the token string.
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
) -> Result<ServerResponse<Token>, AppError> {
    let token = state.issuer.issue().await.map_err(|_| {
        AppError::StorageUnavailable(state.config.messages.storage_unavailable.clone())
    })?;
    Ok(ServerResponse::success_data(token))
}

/// Demo protected operation. Only reachable after the guard admitted the request.
pub async fn test_idempotent() -> ServerResponse<()> {
    ServerResponse::success_msg("test idempotent success")
}
