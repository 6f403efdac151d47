//! Prompt/response contract layer
//!
//! Model output is never trusted to be clean JSON. Every completion goes
//! through `clean_completion`, is parsed, and is then checked against the
//! expected shape. A completion that fails any step becomes
//! `ContractOutcome::Invalid`, which keeps the raw and cleaned text so the
//! near-miss can be logged or shown.

pub mod extraction;
pub mod insights;
pub mod prompts;

use crate::error::AiError;
use serde_json::Value;

/// Result of checking one completion against a contract
#[derive(Debug, Clone, PartialEq)]
pub enum ContractOutcome<T> {
    Valid(T),
    Invalid {
        reason: String,
        raw: String,
        cleaned: String,
    },
}

impl<T> ContractOutcome<T> {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ContractOutcome<U> {
        match self {
            Self::Valid(value) => ContractOutcome::Valid(f(value)),
            Self::Invalid {
                reason,
                raw,
                cleaned,
            } => ContractOutcome::Invalid {
                reason,
                raw,
                cleaned,
            },
        }
    }

    /// Convert into a `Result`, turning a near-miss into `AiError::ContractValidation`
    pub fn into_result(self) -> Result<T, AiError> {
        match self {
            Self::Valid(value) => Ok(value),
            Self::Invalid {
                reason,
                raw,
                cleaned,
            } => Err(AiError::ContractValidation {
                reason,
                raw,
                cleaned,
            }),
        }
    }
}

/// Strip code fences and surrounding commentary from a completion
///
/// Removes every ```` ```json ```` / ```` ``` ```` marker, trims, and then
/// slices to the outermost JSON value: the `[`..`]` span when the text
/// starts with `[`, otherwise the span from the first `{` to the last `}`.
/// Text without such a span is returned trimmed but otherwise untouched.
pub fn clean_completion(raw: &str) -> String {
    let stripped = strip_fences(raw);
    let text = stripped.trim();

    let span = if text.starts_with('[') {
        outer_span(text, '[', ']')
    } else {
        outer_span(text, '{', '}')
    };
    span.unwrap_or(text).to_string()
}

fn strip_fences(raw: &str) -> String {
    const FENCE: &str = "```";
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find(FENCE) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + FENCE.len()..];
        if rest
            .get(..4)
            .is_some_and(|tag| tag.eq_ignore_ascii_case("json"))
        {
            rest = &rest[4..];
        }
    }
    out.push_str(rest);
    out
}

fn outer_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Clean, parse, and validate one completion
///
/// `validate` receives the parsed JSON and returns the typed value or a
/// description of the first mismatch.
pub fn evaluate<T, F>(raw: &str, validate: F) -> ContractOutcome<T>
where
    F: FnOnce(Value) -> Result<T, String>,
{
    let cleaned = clean_completion(raw);
    let parsed = match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => value,
        Err(e) => {
            return ContractOutcome::Invalid {
                reason: format!("model output is not valid JSON: {}", e),
                raw: raw.to_string(),
                cleaned,
            };
        }
    };

    match validate(parsed) {
        Ok(value) => ContractOutcome::Valid(value),
        Err(reason) => ContractOutcome::Invalid {
            reason,
            raw: raw.to_string(),
            cleaned,
        },
    }
}
