//! The external reasoning service seam.
//!
//! The service turns encoded movement text into a verdict. It is treated as
//! a best-effort oracle: any field may be missing or malformed, and the
//! call itself may fail. Parsing here is deliberately lenient so that a
//! partially usable answer still yields something.

use crate::core::sampler::SampleMode;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// One request to the reasoning service.
#[derive(Debug, Clone, Serialize)]
pub struct ReasoningRequest {
    /// Live or full pass
    pub mode: SampleMode,
    /// Exercise label, when known
    pub exercise: Option<String>,
    /// Instructions and format legend
    pub prompt_context: String,
    /// Output of the feature encoder (never empty)
    pub encoded: String,
    /// Number of encoded frames
    pub frame_count: usize,
}

/// Best-effort structured answer. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReasoningResponse {
    pub rep_count: Option<i64>,
    pub form_score: Option<f64>,
    pub feedback: Option<String>,
    pub issues: Option<Vec<String>>,
}

impl ReasoningResponse {
    /// Read fields from a JSON object, ignoring anything malformed.
    ///
    /// Keys may be camelCase or snake_case; numbers may arrive as strings.
    pub fn from_value(value: &Value) -> Self {
        let field = |camel: &str, snake: &str| value.get(camel).or_else(|| value.get(snake));

        let rep_count = field("repCount", "rep_count").and_then(|v| match v {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
            Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
            _ => None,
        });

        let form_score = field("formScore", "form_score").and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        });

        let feedback = field("feedback", "feedback")
            .and_then(Value::as_str)
            .map(str::to_string);

        let issues = field("issues", "issues").and_then(|v| match v {
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            ),
            Value::String(s) => Some(vec![s.clone()]),
            _ => None,
        });

        Self {
            rep_count,
            form_score,
            feedback,
            issues,
        }
    }

    /// Extract the first JSON object embedded in free text (e.g. fenced model output).
    ///
    /// Parsing stops at the end of that object, so trailing prose is ignored.
    pub fn from_text(text: &str) -> Result<Self, ReasoningError> {
        let start = text
            .find('{')
            .ok_or_else(|| ReasoningError::Format("no JSON object in response".to_string()))?;

        let value = serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<Value>()
            .next()
            .ok_or_else(|| ReasoningError::Format("unterminated JSON object".to_string()))?
            .map_err(|e| ReasoningError::Format(e.to_string()))?;
        if !value.is_object() {
            return Err(ReasoningError::Format("response is not an object".to_string()));
        }
        Ok(Self::from_value(&value))
    }
}

/// Reasoning service failures.
#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningError {
    /// Missing credential or endpoint; detected before any call
    Configuration(String),
    /// Network/transport error
    Connection(String),
    /// No answer within the allowed window
    Timeout { elapsed_ms: u64 },
    /// Service answered with an error status
    Server { status: u16, message: String },
    /// Answer could not be read
    Format(String),
}

impl ReasoningError {
    /// Failure category surfaced in result issues.
    pub fn category(&self) -> &'static str {
        match self {
            ReasoningError::Configuration(_) => "configuration",
            ReasoningError::Connection(_)
            | ReasoningError::Timeout { .. }
            | ReasoningError::Server { .. } => "connection",
            ReasoningError::Format(_) => "format",
        }
    }
}

impl std::fmt::Display for ReasoningError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReasoningError::Configuration(msg) => write!(f, "Reasoning config error: {msg}"),
            ReasoningError::Connection(msg) => write!(f, "Reasoning network error: {msg}"),
            ReasoningError::Timeout { elapsed_ms } => {
                write!(f, "Reasoning call timed out after {elapsed_ms}ms")
            }
            ReasoningError::Server { status, message } => {
                write!(f, "Reasoning server error ({status}): {message}")
            }
            ReasoningError::Format(msg) => write!(f, "Reasoning format error: {msg}"),
        }
    }
}

impl std::error::Error for ReasoningError {}

/// A service that converts encoded movement into a verdict.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Verify the service can be called at all (credentials, endpoint).
    fn check_ready(&self) -> Result<(), ReasoningError> {
        Ok(())
    }

    /// Analyze one encoded movement sequence.
    async fn analyze(&self, request: ReasoningRequest) -> Result<ReasoningResponse, ReasoningError>;

    /// Name for diagnostics.
    fn name(&self) -> &str;
}

/// Placeholder used when no service has been configured.
#[derive(Debug, Clone)]
pub struct UnconfiguredReasoner {
    reason: String,
}

impl UnconfiguredReasoner {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ReasoningService for UnconfiguredReasoner {
    fn check_ready(&self) -> Result<(), ReasoningError> {
        Err(ReasoningError::Configuration(self.reason.clone()))
    }

    async fn analyze(&self, _request: ReasoningRequest) -> Result<ReasoningResponse, ReasoningError> {
        Err(ReasoningError::Configuration(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_camel_case() {
        let response = ReasoningResponse::from_value(&json!({
            "repCount": 8,
            "formScore": 7.5,
            "feedback": "Good depth",
            "issues": ["slight forward lean"]
        }));
        assert_eq!(response.rep_count, Some(8));
        assert_eq!(response.form_score, Some(7.5));
        assert_eq!(response.feedback.as_deref(), Some("Good depth"));
        assert_eq!(response.issues, Some(vec!["slight forward lean".to_string()]));
    }

    #[test]
    fn test_from_value_lenient() {
        let response = ReasoningResponse::from_value(&json!({
            "rep_count": "6",
            "form_score": "8.2",
            "feedback": 42,
            "issues": [1, "elbows flare", null]
        }));
        assert_eq!(response.rep_count, Some(6));
        assert_eq!(response.form_score, Some(8.2));
        assert_eq!(response.feedback, None);
        assert_eq!(response.issues, Some(vec!["elbows flare".to_string()]));

        let junk = ReasoningResponse::from_value(&json!({"formScore": {"nested": true}}));
        assert_eq!(junk, ReasoningResponse::default());
    }

    #[test]
    fn test_from_text_fenced() {
        let text = "Here is my verdict:\n```json\n{\"repCount\": 3, \"formScore\": 6}\n```";
        let response = ReasoningResponse::from_text(text).unwrap();
        assert_eq!(response.rep_count, Some(3));
        assert_eq!(response.form_score, Some(6.0));
    }

    #[test]
    fn test_from_text_ignores_trailing_braces() {
        let text = "{\"repCount\": 4, \"formScore\": 7} Let me know if you need {more} detail.";
        let response = ReasoningResponse::from_text(text).unwrap();
        assert_eq!(response.rep_count, Some(4));
        assert_eq!(response.form_score, Some(7.0));

        let nested = "Verdict: {\"issues\": [\"hips rise first\"], \"meta\": {\"x\": 1}} {\"repCount\": 9}";
        let response = ReasoningResponse::from_text(nested).unwrap();
        assert_eq!(response.issues, Some(vec!["hips rise first".to_string()]));
        assert_eq!(response.rep_count, None);
    }

    #[test]
    fn test_from_text_errors() {
        assert!(matches!(
            ReasoningResponse::from_text("no json here"),
            Err(ReasoningError::Format(_))
        ));
        assert!(matches!(
            ReasoningResponse::from_text("{ broken"),
            Err(ReasoningError::Format(_))
        ));
        assert!(matches!(
            ReasoningResponse::from_text("{\"a\": [1, }"),
            Err(ReasoningError::Format(_))
        ));
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            ReasoningError::Configuration(String::new()).category(),
            "configuration"
        );
        assert_eq!(
            ReasoningError::Server {
                status: 500,
                message: String::new()
            }
            .category(),
            "connection"
        );
        assert_eq!(ReasoningError::Format(String::new()).category(), "format");
    }

    #[tokio::test]
    async fn test_unconfigured_reasoner() {
        let reasoner = UnconfiguredReasoner::new("FORM_REASONING_API_KEY is not set");
        assert!(matches!(
            reasoner.check_ready(),
            Err(ReasoningError::Configuration(_))
        ));
        assert_eq!(reasoner.name(), "unconfigured");
    }
}
