use async_trait::async_trait;

use crate::{
    domain::{AccountId, AuthToken, WebAppData},
    profile::ProfileSnapshot,
    proxy::ProxySpec,
    Result,
};

/// Source of the Telegram web-app payload for an account.
///
/// Implementations return `Error::InvalidSession` when the account's
/// credentials are rejected; the farming loop treats that as fatal.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn web_app_data(&self, account: &AccountId, proxy: Option<&ProxySpec>)
        -> Result<WebAppData>;
}

/// Hexagonal port for the MMBump REST API.
///
/// Every call after login takes the token explicitly, so an unauthenticated
/// request cannot be expressed.
#[async_trait]
pub trait FarmApi: Send + Sync {
    async fn login(&self, init_data: &WebAppData) -> Result<AuthToken>;

    async fn profile(&self, token: &AuthToken) -> Result<ProfileSnapshot>;

    /// Returns the new balance.
    async fn claim_daily_grant(&self, token: &AuthToken) -> Result<i64>;

    /// Returns the status reported by the server.
    async fn start_farming(&self, token: &AuthToken) -> Result<String>;

    /// Returns the new balance.
    async fn finish_farming(&self, token: &AuthToken, tap_count: u64) -> Result<i64>;

    /// Egress IP as seen by a public echo endpoint (proxy diagnostic).
    async fn egress_ip(&self) -> Result<String>;
}
