use chunkwise_common::{Error, Result};
use chunkwise_config::{ApiKeyConfig, ApiKeyRole};
use ring::digest::{SHA256, digest};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Viewer,
}

impl From<ApiKeyRole> for Role {
    fn from(role: ApiKeyRole) -> Self {
        match role {
            ApiKeyRole::Admin => Role::Admin,
            ApiKeyRole::Viewer => Role::Viewer,
        }
    }
}

/// An authenticated caller. `identity` becomes `executed_by` on every
/// record the caller produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Caller {
    pub identity: String,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(Error::Forbidden(format!(
                "{} is not allowed to run migrations",
                self.identity
            )))
        }
    }
}

/// Lower-case hex SHA-256 of an API key, as stored in the config.
pub fn hash_key(key: &str) -> String {
    digest(&SHA256, key.as_bytes())
        .as_ref()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Resolves presented API keys against configured key hashes.
pub struct ApiKeyAuthenticator {
    keys: Vec<(String, Caller)>,
}

impl ApiKeyAuthenticator {
    pub fn new(keys: &[ApiKeyConfig]) -> Self {
        if keys.is_empty() {
            warn!("no api keys configured, every migration request will be rejected");
        }
        Self {
            keys: keys
                .iter()
                .map(|k| {
                    (
                        k.key_sha256.trim().to_ascii_lowercase(),
                        Caller {
                            identity: k.identity.clone(),
                            role: k.role.into(),
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn authenticate(&self, presented: Option<&str>) -> Result<Caller> {
        let key = presented
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Unauthorized("missing api key".into()))?;

        let hashed = hash_key(key);
        let caller = self
            .keys
            .iter()
            .find(|(hash, _)| constant_time_eq(hash.as_bytes(), hashed.as_bytes()))
            .map(|(_, caller)| caller.clone())
            .ok_or_else(|| Error::Unauthorized("invalid api key".into()))?;

        debug!(identity = %caller.identity, "caller authenticated");
        Ok(caller)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
