use std::{fmt, str::FromStr};

use async_trait::async_trait;

/// Third-party identity providers accepted by `/oauth/login`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    /// Name as stored in the `providers` table.
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(OAuthProvider::Google),
            "github" => Ok(OAuthProvider::Github),
            other => anyhow::bail!("unknown oauth provider: {other}"),
        }
    }
}

/// Identity returned by a provider after a successful code exchange.
#[derive(Debug, Clone)]
pub struct ExternalIdentity {
    pub external_id: String,
    pub email: String,
    pub display_name: String,
}

/// Trades an authorization code for the provider's view of the user.
#[async_trait]
pub trait OAuthExchange: Send + Sync {
    async fn exchange(&self, provider: OAuthProvider, code: &str)
        -> anyhow::Result<ExternalIdentity>;
}

/// Exchanger used until provider clients are wired in; every exchange fails.
pub struct UnconfiguredExchange;

#[async_trait]
impl OAuthExchange for UnconfiguredExchange {
    async fn exchange(
        &self,
        provider: OAuthProvider,
        _code: &str,
    ) -> anyhow::Result<ExternalIdentity> {
        anyhow::bail!("{provider} oauth exchange is not configured")
    }
}
