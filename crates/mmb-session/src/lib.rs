//! File-backed sessions.
//!
//! Each `<name>.session` file in the sessions directory is one account. The
//! file holds either the Telegram web-view URL opened for the MMBump bot or the
//! raw `tgWebAppData` init string. It is re-read on every token refresh, so it
//! can be replaced while the bot is running.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use mmb_core::{
    domain::{AccountId, WebAppData},
    errors::Error,
    ports::AuthProvider,
    proxy::ProxySpec,
    Result,
};

pub const SESSION_EXTENSION: &str = "session";

const WEB_APP_DATA_KEY: &str = "tgWebAppData=";
const WEB_APP_VERSION_KEY: &str = "&tgWebAppVersion";

/// List accounts in `dir`, sorted by name.
pub fn discover_sessions(dir: &Path) -> Result<Vec<AccountId>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(SESSION_EXTENSION) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            out.push(AccountId(stem.to_string()));
        }
    }
    out.sort();
    Ok(out)
}

/// Pull the percent-decoded `tgWebAppData` value out of a web-view URL.
///
/// The value ends at `&tgWebAppVersion` or, failing that, at the next `&`.
pub fn extract_web_app_data(url: &str) -> Option<String> {
    let (_, rest) = url.split_once(WEB_APP_DATA_KEY)?;
    let raw = match rest.split_once(WEB_APP_VERSION_KEY) {
        Some((value, _)) => value,
        None => rest.split('&').next().unwrap_or(rest),
    };
    if raw.is_empty() {
        return None;
    }
    urlencoding::decode(raw).ok().map(|s| s.into_owned())
}

/// Turn session file contents into the login payload.
pub fn parse_session_contents(contents: &str) -> Option<WebAppData> {
    let text = contents.trim();
    if text.is_empty() {
        return None;
    }
    if text.contains(WEB_APP_DATA_KEY) {
        return extract_web_app_data(text).map(WebAppData);
    }
    // Already-decoded init data: `query_id=...&user=...&auth_date=...&hash=...`
    let looks_like_init_data = text
        .split('&')
        .any(|pair| pair.starts_with("hash=") && pair.len() > "hash=".len());
    looks_like_init_data.then(|| WebAppData(text.to_string()))
}

/// AuthProvider reading `<dir>/<account>.session`.
///
/// A missing, empty or unusable file means the session can never log in, so
/// it is reported as `Error::InvalidSession`.
#[derive(Clone, Debug)]
pub struct SessionFileAuth {
    dir: PathBuf,
}

impl SessionFileAuth {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn session_path(&self, account: &AccountId) -> PathBuf {
        self.dir.join(format!("{}.{SESSION_EXTENSION}", account.0))
    }
}

#[async_trait]
impl AuthProvider for SessionFileAuth {
    async fn web_app_data(
        &self,
        account: &AccountId,
        proxy: Option<&ProxySpec>,
    ) -> Result<WebAppData> {
        // The payload is read locally; the proxy only matters for the API client.
        let _ = proxy;

        let path = self.session_path(account);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::InvalidSession(format!(
                    "{account}: {} not found",
                    path.display()
                )))
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let data = parse_session_contents(&contents).ok_or_else(|| {
            Error::InvalidSession(format!("{account}: no tgWebAppData in {}", path.display()))
        })?;
        debug!(account = %account, bytes = data.0.len(), "Loaded web app data");
        Ok(data)
    }
}
