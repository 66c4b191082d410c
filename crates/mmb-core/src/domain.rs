use std::fmt;

use sha2::{Digest, Sha256};

/// Account (session) name. Stable for the lifetime of the process.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decoded `tgWebAppData` payload, sent as `initData` on login.
#[derive(Clone, PartialEq, Eq)]
pub struct WebAppData(pub String);

impl fmt::Debug for WebAppData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WebAppData({} bytes)", self.0.len())
    }
}

/// Token returned by `/v1/login`, sent verbatim as the `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short SHA-256 prefix, safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        digest[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthToken({})", self.fingerprint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_debug_never_prints_secret() {
        let token = AuthToken::new("super-secret-token");
        let shown = format!("{token:?}");
        assert!(!shown.contains("super-secret-token"));
        assert_eq!(token.fingerprint().len(), 8);
        assert_eq!(token.fingerprint(), AuthToken::new("super-secret-token").fingerprint());
    }
}
