use crate::error::DabbleError;
use crate::registry::validate_account;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

pub const ACCOUNT_HEADER: &str = "x-account-id";

/// Account every request is scoped to, as set by the authenticating proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AccountId
where
    S: Send + Sync,
{
    type Rejection = DabbleError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let account = parts
            .headers
            .get(ACCOUNT_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .ok_or_else(|| {
                warn!("Request to {} without account header", parts.uri.path());
                DabbleError::Unauthorized {
                    message: "Missing X-Account-Id header".to_string(),
                }
            })?;

        validate_account(account)?;
        Ok(AccountId(account.to_string()))
    }
}
