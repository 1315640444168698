use std::time::Duration;

use thiserror::Error;

use crate::types::{OperationOutcome, codes};

#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("{questionnaire} contains a circular dependency on the questionnaire {canonical}")]
    CircularReference {
        questionnaire: String,
        canonical: String,
    },

    #[error("{questionnaire} contains a malformed subQuestionnaire reference: {message}")]
    MalformedCanonical {
        questionnaire: String,
        message: String,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Fetching {canonical} returned an OperationOutcome")]
    RemoteOutcome {
        canonical: String,
        outcome: OperationOutcome,
    },

    #[error("The subquestionnaire {questionnaire} contains {attribute}, which is prohibited.")]
    ProhibitedAttribute {
        questionnaire: String,
        attribute: String,
    },

    #[error(
        "The subquestionnaire {questionnaire} has language '{language}', which differs from language '{expected}' of its parent questionnaire {parent}"
    )]
    LanguageMismatch {
        questionnaire: String,
        language: String,
        parent: String,
        expected: String,
    },

    #[error("The subquestionnaire {questionnaire} has a malformed {url} extension: {message}")]
    MalformedExtension {
        questionnaire: String,
        url: String,
        message: String,
    },

    #[error("The variable {name} is duplicated on {target}, which is prohibited.")]
    DuplicateVariable { name: String, target: String },

    #[error("Invalid $assemble input: {message}")]
    InvalidInput { message: String },

    #[error("Assembly did not complete within {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssembleError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn malformed_extension(
        questionnaire: impl Into<String>,
        url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedExtension {
            questionnaire: questionnaire.into(),
            url: url.into(),
            message: message.into(),
        }
    }

    /// FHIR issue code reported for this failure
    pub fn code(&self) -> &'static str {
        match self {
            Self::CircularReference { .. } => codes::DUPLICATE,
            Self::MalformedCanonical { .. } => codes::VALUE,
            Self::Fetch(err) => match err.kind {
                FetchErrorKind::NotFound | FetchErrorKind::UnexpectedResource => codes::NOT_FOUND,
                FetchErrorKind::Transport => codes::EXCEPTION,
            },
            Self::RemoteOutcome { .. } => codes::NOT_FOUND,
            Self::ProhibitedAttribute { .. } => codes::BUSINESS_RULE,
            Self::LanguageMismatch { .. } => codes::CONFLICT,
            Self::MalformedExtension { .. } => codes::STRUCTURE,
            Self::DuplicateVariable { .. } => codes::BUSINESS_RULE,
            Self::InvalidInput { .. } => codes::REQUIRED,
            Self::Timeout(_) => codes::TIMEOUT,
            Self::Serialization(_) => codes::STRUCTURE,
            Self::Io(_) => codes::EXCEPTION,
        }
    }
}

impl From<AssembleError> for OperationOutcome {
    fn from(err: AssembleError) -> Self {
        match err {
            AssembleError::RemoteOutcome { outcome, .. } => outcome,
            other => OperationOutcome::error(other.code(), other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Nothing matched the canonical
    NotFound,
    /// The response was not a Questionnaire or a Bundle holding one
    UnexpectedResource,
    /// The fetch callback itself failed
    Transport,
}

#[derive(Error, Debug)]
#[error("{message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
    pub canonical: Option<String>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            canonical: None,
            source: None,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Transport, message)
    }

    pub fn not_found(canonical: impl Into<String>) -> Self {
        let canonical = canonical.into();
        Self {
            message: format!("Unable to fetch questionnaire with canonical url '{canonical}'"),
            kind: FetchErrorKind::NotFound,
            canonical: Some(canonical),
            source: None,
        }
    }

    pub fn unexpected_resource(canonical: impl Into<String>, found: &str) -> Self {
        let canonical = canonical.into();
        Self {
            message: format!(
                "Unable to fetch questionnaire with canonical url '{canonical}': unexpected resource type '{found}'"
            ),
            kind: FetchErrorKind::UnexpectedResource,
            canonical: Some(canonical),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind: FetchErrorKind::Transport,
            message: message.into(),
            canonical: None,
            source: Some(Box::new(source)),
        }
    }

    pub fn with_canonical(mut self, canonical: impl Into<String>) -> Self {
        self.canonical = Some(canonical.into());
        self
    }
}

pub type Result<T> = std::result::Result<T, AssembleError>;
