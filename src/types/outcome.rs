use serde::{Deserialize, Serialize};
use serde_json::Value;

/// FHIR issue codes used by the assembler
pub mod codes {
    pub const STRUCTURE: &str = "structure";
    pub const REQUIRED: &str = "required";
    pub const VALUE: &str = "value";
    pub const DUPLICATE: &str = "duplicate";
    pub const NOT_FOUND: &str = "not-found";
    pub const EXCEPTION: &str = "exception";
    pub const TIMEOUT: &str = "timeout";
    pub const BUSINESS_RULE: &str = "business-rule";
    pub const CONFLICT: &str = "conflict";
    pub const INFORMATIONAL: &str = "informational";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Fatal,
    Error,
    Warning,
    Information,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IssueDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationOutcomeIssue {
    pub severity: IssueSeverity,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<IssueDetails>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl OperationOutcomeIssue {
    pub fn new(severity: IssueSeverity, code: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.into(),
            details: Some(IssueDetails {
                text: Some(text.into()),
                extra: serde_json::Map::new(),
            }),
            extra: serde_json::Map::new(),
        }
    }

    pub fn error(code: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Error, code, text)
    }

    pub fn warning(code: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Warning, code, text)
    }

    pub fn information(text: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Information, codes::INFORMATIONAL, text)
    }

    /// Human-readable detail text, if any
    pub fn detail(&self) -> Option<&str> {
        self.details.as_ref().and_then(|d| d.text.as_deref())
    }

    pub fn is_error(&self) -> bool {
        matches!(self.severity, IssueSeverity::Error | IssueSeverity::Fatal)
    }
}

/// FHIR OperationOutcome restricted to what `$assemble` reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    #[serde(default = "OperationOutcome::resource_type_default")]
    pub resource_type: String,
    #[serde(default)]
    pub issue: Vec<OperationOutcomeIssue>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl OperationOutcome {
    pub const RESOURCE_TYPE: &'static str = "OperationOutcome";

    fn resource_type_default() -> String {
        Self::RESOURCE_TYPE.to_string()
    }

    pub fn from_issues(issue: Vec<OperationOutcomeIssue>) -> Self {
        Self {
            resource_type: Self::RESOURCE_TYPE.to_string(),
            issue,
            extra: serde_json::Map::new(),
        }
    }

    /// Single-issue error outcome
    pub fn error(code: impl Into<String>, text: impl Into<String>) -> Self {
        Self::from_issues(vec![OperationOutcomeIssue::error(code, text)])
    }

    pub fn has_errors(&self) -> bool {
        self.issue.iter().any(OperationOutcomeIssue::is_error)
    }

    /// Code of the first issue, handy for branching on failures
    pub fn first_code(&self) -> Option<&str> {
        self.issue.first().map(|i| i.code.as_str())
    }
}
