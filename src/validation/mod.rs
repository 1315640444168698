//! Consistency checks run over assembled subquestionnaires before they are
//! merged into their parent.

use crate::core::AssembleConfig;
use crate::error::{AssembleError, Result};
use crate::types::Questionnaire;

/// A single rule every subquestionnaire of a parent must satisfy
pub trait SubquestionnaireCheck: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, subquestionnaires: &[Questionnaire], parent: &Questionnaire) -> Result<()>;
}

/// Root-only attributes must not appear on subquestionnaires
#[derive(Debug, Clone)]
pub struct ProhibitedAttributes {
    pub attributes: Vec<String>,
}

impl SubquestionnaireCheck for ProhibitedAttributes {
    fn name(&self) -> &'static str {
        "prohibited-attributes"
    }

    fn check(&self, subquestionnaires: &[Questionnaire], _parent: &Questionnaire) -> Result<()> {
        check_prohibited_attributes(subquestionnaires, &self.attributes)
    }
}

/// Subquestionnaire languages must agree with the parent's
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchingLanguage;

impl SubquestionnaireCheck for MatchingLanguage {
    fn name(&self) -> &'static str {
        "matching-language"
    }

    fn check(&self, subquestionnaires: &[Questionnaire], parent: &Questionnaire) -> Result<()> {
        check_matching_language(subquestionnaires, parent)
    }
}

pub fn check_prohibited_attributes(
    subquestionnaires: &[Questionnaire],
    prohibited: &[String],
) -> Result<()> {
    for subquestionnaire in subquestionnaires {
        if let Some(attribute) = prohibited
            .iter()
            .find(|attribute| subquestionnaire.has_attribute(attribute))
        {
            return Err(AssembleError::ProhibitedAttribute {
                questionnaire: subquestionnaire.label().to_string(),
                attribute: attribute.clone(),
            });
        }
    }
    Ok(())
}

/// An unset parent language accepts any subquestionnaire language
pub fn check_matching_language(
    subquestionnaires: &[Questionnaire],
    parent: &Questionnaire,
) -> Result<()> {
    let Some(expected) = parent.language.as_deref() else {
        return Ok(());
    };

    for subquestionnaire in subquestionnaires {
        if let Some(language) = subquestionnaire.language.as_deref() {
            if language != expected {
                return Err(AssembleError::LanguageMismatch {
                    questionnaire: subquestionnaire.label().to_string(),
                    language: language.to_string(),
                    parent: parent.label().to_string(),
                    expected: expected.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Runs its checks in order; the first failure wins
pub struct ConsistencyValidator {
    checks: Vec<Box<dyn SubquestionnaireCheck>>,
}

impl ConsistencyValidator {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    pub fn from_config(config: &AssembleConfig) -> Self {
        Self::new()
            .with_check(ProhibitedAttributes {
                attributes: config.prohibited_attributes.clone(),
            })
            .with_check(MatchingLanguage)
    }

    pub fn with_check(mut self, check: impl SubquestionnaireCheck + 'static) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    pub fn validate(&self, subquestionnaires: &[Questionnaire], parent: &Questionnaire) -> Result<()> {
        for check in &self.checks {
            if let Err(err) = check.check(subquestionnaires, parent) {
                tracing::debug!("Check '{}' failed for {}: {}", check.name(), parent.label(), err);
                return Err(err);
            }
        }
        Ok(())
    }
}

impl Default for ConsistencyValidator {
    fn default() -> Self {
        Self::from_config(&AssembleConfig::default())
    }
}

impl std::fmt::Debug for ConsistencyValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsistencyValidator")
            .field(
                "checks",
                &self.checks.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
