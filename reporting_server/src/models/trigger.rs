//! Trigger request/response shapes.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Raw `POST /api/trigger` body. Fields stay loose until validated: a value
/// of the wrong JSON type reads as absent instead of failing the body, so
/// `validate` still decides which error the caller sees.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    #[serde(default, deserialize_with = "loose_string")]
    pub pipeline_type: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub stack: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub app: Option<String>,
    #[serde(default, deserialize_with = "loose_pr_number")]
    pub pr_number: Option<PrNumber>,
    #[serde(default, deserialize_with = "loose_string")]
    pub git_url: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub git_revision: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub image_registry: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub version_overrides: Option<String>,
    #[serde(default, deserialize_with = "truthy")]
    pub build_images: Option<bool>,
    #[serde(default, deserialize_with = "loose_string")]
    pub storage_class: Option<String>,
}

/// Strings only; any other JSON type is dropped.
fn loose_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Numbers and strings; booleans, arrays and objects are dropped.
fn loose_pr_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<PrNumber>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => Some(match n.as_u64() {
            Some(n) => PrNumber::Number(n),
            None => PrNumber::Text(n.to_string()),
        }),
        Some(Value::String(s)) => Some(PrNumber::Text(s)),
        _ => None,
    })
}

/// JavaScript-style truthiness: `false`, `0`, `""` and `null` are false.
fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?.map(|value| match value {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }))
}

/// PR numbers arrive either as JSON numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrNumber {
    Number(u64),
    Text(String),
}

impl PrNumber {
    /// `0` and blank strings count as missing.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Number(n) => *n == 0,
            Self::Text(s) => s.trim().is_empty(),
        }
    }
}

impl fmt::Display for PrNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s.trim()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineType {
    Pr,
    Bootstrap,
    Merge,
}

impl PipelineType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pr" => Some(Self::Pr),
            "bootstrap" => Some(Self::Bootstrap),
            "merge" => Some(Self::Merge),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pr => "pr",
            Self::Bootstrap => "bootstrap",
            Self::Merge => "merge",
        }
    }
}

impl fmt::Display for PipelineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trigger that passed validation, with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTrigger {
    pub pipeline_type: PipelineType,
    pub stack: String,
    pub app: String,
    /// Present exactly when `pipeline_type` is `Pr`.
    pub pr_number: Option<String>,
    pub git_url: String,
    pub git_revision: String,
    pub image_registry: String,
    pub version_overrides: Option<String>,
    pub build_images: bool,
    /// Empty when not supplied.
    pub storage_class: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub ok: bool,
    pub pipeline_run: String,
    pub namespace: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pr_number_accepts_number_or_string() {
        let req: TriggerRequest =
            serde_json::from_str(r#"{"pipelineType":"pr","prNumber":42}"#).unwrap();
        assert_eq!(req.pr_number, Some(PrNumber::Number(42)));

        let req: TriggerRequest = serde_json::from_str(r#"{"prNumber":"17"}"#).unwrap();
        assert_eq!(req.pr_number.unwrap().to_string(), "17");
    }

    #[test]
    fn mistyped_fields_read_as_absent() {
        let req: TriggerRequest = serde_json::from_str(
            r#"{"pipelineType":"widget","stack":5,"app":["a"],"prNumber":true,
                "versionOverrides":{"demo-fe":"1.2.3"}}"#,
        )
        .unwrap();
        assert_eq!(req.pipeline_type.as_deref(), Some("widget"));
        assert_eq!(req.stack, None);
        assert_eq!(req.app, None);
        assert_eq!(req.pr_number, None);
        assert_eq!(req.version_overrides, None);
    }

    #[test]
    fn build_images_follows_truthiness() {
        let parse = |raw: &str| {
            serde_json::from_str::<TriggerRequest>(&format!(r#"{{"buildImages":{raw}}}"#))
                .unwrap()
                .build_images
        };
        assert_eq!(parse("true"), Some(true));
        assert_eq!(parse(r#""true""#), Some(true));
        assert_eq!(parse(r#""false""#), Some(true));
        assert_eq!(parse("1"), Some(true));
        assert_eq!(parse("{}"), Some(true));
        assert_eq!(parse("0"), Some(false));
        assert_eq!(parse(r#""""#), Some(false));
        assert_eq!(parse("null"), None);
    }

    #[test]
    fn zero_and_blank_pr_numbers_are_blank() {
        assert!(PrNumber::Number(0).is_blank());
        assert!(PrNumber::Text("  ".to_string()).is_blank());
        assert!(!PrNumber::Text("3".to_string()).is_blank());
    }
}
