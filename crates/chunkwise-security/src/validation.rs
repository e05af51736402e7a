use std::sync::LazyLock;

use chunkwise_common::{Error, Result};
use regex::Regex;

const MAX_IDENTIFIER_LEN: usize = 128;
const MAX_SQL_BYTES: usize = 1024 * 1024;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("identifier pattern is valid"));

/// Checks on request fields, applied before anything is executed.
pub struct RequestValidator;

impl RequestValidator {
    /// Require `value` to be present and a well-formed identifier.
    pub fn require_identifier<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str> {
        let value = value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Validation(format!("{field} is required")))?;
        Self::validate_identifier(field, value)?;
        Ok(value)
    }

    pub fn validate_identifier(field: &str, value: &str) -> Result<()> {
        if value.len() > MAX_IDENTIFIER_LEN {
            return Err(Error::Validation(format!(
                "{field} exceeds {MAX_IDENTIFIER_LEN} characters"
            )));
        }
        if !IDENTIFIER.is_match(value) {
            return Err(Error::Validation(format!(
                "{field} may only contain letters, digits, '_', '.' and '-'"
            )));
        }
        Ok(())
    }

    pub fn require_sql(value: Option<&str>) -> Result<&str> {
        let sql = value
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::Validation("sql is required".into()))?;
        if sql.len() > MAX_SQL_BYTES {
            return Err(Error::Validation(format!(
                "sql exceeds {MAX_SQL_BYTES} bytes"
            )));
        }
        Ok(sql)
    }

    /// Remove control characters from free text such as a chunk label.
    pub fn sanitize(input: &str) -> String {
        input
            .chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect()
    }
}
