use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chunkwise_security::hash_key;
use rand::RngCore;

const KEY_BYTES: usize = 32;

/// A freshly generated API key and the digest that goes in the config.
pub struct GeneratedKey {
    pub key: String,
    pub sha256: String,
}

pub fn generate_key() -> GeneratedKey {
    let mut bytes = [0u8; KEY_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    let key = format!("cw_{}", URL_SAFE_NO_PAD.encode(bytes));
    let sha256 = hash_key(&key);
    GeneratedKey { key, sha256 }
}

/// YAML snippet for `gateway.api_keys`.
pub fn config_snippet(identity: &str, role: &str, sha256: &str) -> String {
    format!(
        "gateway:\n  api_keys:\n    - identity: {identity}\n      key_sha256: \"{sha256}\"\n      role: {role}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_unique_and_hash_consistently() {
        let a = generate_key();
        let b = generate_key();
        assert_ne!(a.key, b.key);
        assert!(a.key.starts_with("cw_"));
        assert_eq!(a.sha256, hash_key(&a.key));
        assert_eq!(a.sha256.len(), 64);
    }

    #[test]
    fn snippet_contains_digest_and_role() {
        let key = generate_key();
        let yaml = config_snippet("ops@example.com", "admin", &key.sha256);
        assert!(yaml.contains(&key.sha256));
        assert!(yaml.contains("role: admin"));
    }
}
