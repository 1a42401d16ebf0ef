// Environment variable interpolation

use crate::{ConfigError, Result};
use serde_json::Value;
use std::env;
use std::fmt;
use std::path::Path;

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Replaces `${NAME}` in string values with variables from a lookup.
///
/// `$$` is a literal `$`. Keys are never interpolated, only values.
pub struct Interpolator {
    lookup: Lookup,
}

impl Interpolator {
    /// Interpolate from the process environment.
    pub fn from_env() -> Self {
        Self::with_lookup(|name| env::var(name).ok())
    }

    /// Interpolate from a custom lookup.
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Box::new(lookup),
        }
    }

    /// Interpolate every string in a configuration tree.
    pub fn interpolate(&self, value: Value) -> Result<Value> {
        Ok(match value {
            Value::String(s) => Value::String(self.interpolate_str(&s)?),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.interpolate(item))
                    .collect::<Result<_>>()?,
            ),
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, item)| Ok((key, self.interpolate(item)?)))
                    .collect::<Result<_>>()?,
            ),
            other => other,
        })
    }

    /// Interpolate one string.
    pub fn interpolate_str(&self, input: &str) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            if let Some(tail) = after.strip_prefix('$') {
                out.push('$');
                rest = tail;
            } else if let Some(body) = after.strip_prefix('{') {
                let end = body.find('}').ok_or_else(|| {
                    ConfigError::ParseError("unterminated ${...} reference".to_string())
                })?;
                let name = body[..end].trim();
                if name.is_empty() {
                    return Err(ConfigError::ParseError("empty ${} reference".to_string()));
                }

                let value = (self.lookup)(name)
                    .ok_or_else(|| ConfigError::MissingVariable(name.to_string()))?;
                out.push_str(&value);
                rest = &body[end + 1..];
            } else {
                out.push('$');
                rest = after;
            }
        }

        out.push_str(rest);
        Ok(out)
    }
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::from_env()
    }
}

impl fmt::Debug for Interpolator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpolator").finish_non_exhaustive()
    }
}

/// Load a `.env` file into the process environment.
///
/// With no path, a missing `.env` in the working directory is ignored and
/// `false` is returned. An explicit path must exist.
pub fn load_dotenv(path: Option<&Path>) -> Result<bool> {
    match path {
        Some(path) => {
            dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            Ok(true)
        }
        None => Ok(dotenvy::dotenv().is_ok()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn interpolator() -> Interpolator {
        Interpolator::with_lookup(|name| match name {
            "ROBOT_TOKEN" => Some("abc123".to_string()),
            "CORP" => Some("corp-1".to_string()),
            _ => None,
        })
    }

    #[test]
    fn test_interpolate_str() {
        let i = interpolator();
        assert_eq!(
            i.interpolate_str("https://oapi/robot/send?access_token=${ROBOT_TOKEN}")
                .unwrap(),
            "https://oapi/robot/send?access_token=abc123"
        );
        assert_eq!(i.interpolate_str("${ CORP }-${CORP}").unwrap(), "corp-1-corp-1");
        assert_eq!(i.interpolate_str("no variables").unwrap(), "no variables");
    }

    #[test]
    fn test_dollar_escapes() {
        let i = interpolator();
        assert_eq!(i.interpolate_str("$${CORP}").unwrap(), "${CORP}");
        assert_eq!(i.interpolate_str("cost $5").unwrap(), "cost $5");
        assert_eq!(i.interpolate_str("trailing $").unwrap(), "trailing $");
    }

    #[test]
    fn test_missing_variable() {
        let err = interpolator().interpolate_str("${NOPE}").unwrap_err();
        assert!(matches!(err, ConfigError::MissingVariable(ref name) if name == "NOPE"));
    }

    #[test]
    fn test_malformed_reference() {
        let i = interpolator();
        assert!(matches!(
            i.interpolate_str("${CORP"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            i.interpolate_str("${}"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_interpolate_tree() {
        let value = json!({
            "receivers": [
                {"name": "${CORP}", "corp_id": "${CORP}", "roster": ["${CORP}"], "agent_id": 7}
            ]
        });

        let value = interpolator().interpolate(value).unwrap();
        assert_eq!(value["receivers"][0]["corp_id"], "corp-1");
        assert_eq!(value["receivers"][0]["roster"][0], "corp-1");
        assert_eq!(value["receivers"][0]["agent_id"], 7);
    }

    #[test]
    fn test_missing_explicit_dotenv() {
        let result = load_dotenv(Some(Path::new("/nonexistent/alertwire/.env")));
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
