use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

use crate::canonical::get_canonical_urls;
use crate::collect::{get_contained_resources, get_extensions, get_items, get_urls};
use crate::core::{AssembleConfig, AssembleContext};
use crate::error::{AssembleError, Result};
use crate::fetch::{QuestionnaireFetcher, fetch_subquestionnaires};
use crate::propagate::{CollectedProperties, check_target_variables, propagate_properties};
use crate::types::{
    AssembleOutput, InputParameters, OperationOutcomeIssue, OutputParameters, Questionnaire,
};
use crate::validation::ConsistencyValidator;

/// Runs `$assemble` against a fetcher.
///
/// One `Assembler` can serve many invocations; each invocation gets its own
/// [`AssembleContext`].
pub struct Assembler {
    fetcher: Arc<dyn QuestionnaireFetcher>,
    validator: ConsistencyValidator,
    config: AssembleConfig,
}

impl Assembler {
    pub fn new(fetcher: impl QuestionnaireFetcher + 'static) -> Self {
        Self::with_config(fetcher, AssembleConfig::default())
    }

    pub fn with_config(fetcher: impl QuestionnaireFetcher + 'static, config: AssembleConfig) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            validator: ConsistencyValidator::from_config(&config),
            config,
        }
    }

    /// Replace the default consistency checks
    pub fn with_validator(mut self, validator: ConsistencyValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(&self) -> &AssembleConfig {
        &self.config
    }

    /// Assemble a root questionnaire. Failures are reported as an
    /// OperationOutcome, never as a partially assembled document.
    pub async fn assemble(&self, input: impl Into<InputParameters>) -> AssembleOutput {
        let InputParameters { questionnaire } = input.into();
        tracing::info!("Assembling {}", questionnaire.label());
        #[cfg(feature = "performance-metrics")]
        metrics::counter!("sdc_assemble_runs_total").increment(1);

        let mut context = AssembleContext::new();
        let result = match self.config.timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.assemble_questionnaire(&questionnaire, &mut context))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(AssembleError::Timeout(limit)),
                }
            }
            None => self.assemble_questionnaire(&questionnaire, &mut context).await,
        };

        package_output(result, context.into_issues())
    }

    /// Like [`Assembler::assemble`], starting from a raw Parameters or
    /// Questionnaire resource
    pub async fn assemble_value(&self, input: Value) -> AssembleOutput {
        match InputParameters::from_value(input) {
            Ok(input) => self.assemble(input).await,
            Err(err) => {
                tracing::warn!("Rejected $assemble input: {}", err);
                AssembleOutput::OperationOutcome(err.into())
            }
        }
    }

    /// Assemble one questionnaire and, recursively, everything it references.
    ///
    /// Returns the input unchanged when it has no subquestionnaires.
    pub fn assemble_questionnaire<'a>(
        &'a self,
        questionnaire: &'a Questionnaire,
        context: &'a mut AssembleContext,
    ) -> BoxFuture<'a, Result<Questionnaire>> {
        async move {
            let parent = questionnaire.clone();

            let canonicals = get_canonical_urls(&parent, context)?;
            if canonicals.is_empty() {
                return Ok(parent);
            }
            context.visit(canonicals.iter().cloned());

            let fetched =
                fetch_subquestionnaires(&canonicals, self.fetcher.as_ref(), &self.config, context)
                    .await?;

            let mut subquestionnaires = Vec::with_capacity(fetched.len());
            for subquestionnaire in &fetched {
                tracing::debug!(
                    "Assembling subquestionnaire {} of {}",
                    subquestionnaire.label(),
                    parent.label()
                );
                subquestionnaires.push(self.assemble_questionnaire(subquestionnaire, context).await?);
            }

            self.validator.validate(&subquestionnaires, &parent)?;

            let extensions = get_extensions(&subquestionnaires)?;
            check_target_variables(&parent, &canonicals, &extensions.item_level)?;

            let collected = CollectedProperties {
                urls: get_urls(&subquestionnaires),
                items: get_items(&parent, &subquestionnaires, &self.config.link_id_prefix, context),
                contained: get_contained_resources(&subquestionnaires, context),
                extensions,
            };

            Ok(propagate_properties(parent, &canonicals, collected, &self.config))
        }
        .boxed()
    }
}

impl std::fmt::Debug for Assembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assembler")
            .field("validator", &self.validator)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn package_output(result: Result<Questionnaire>, issues: Vec<OperationOutcomeIssue>) -> AssembleOutput {
    match result {
        Err(err) => {
            tracing::warn!("Assembly failed: {}", err);
            AssembleOutput::OperationOutcome(err.into())
        }
        Ok(questionnaire) if issues.is_empty() => {
            tracing::info!("Assembled {}", questionnaire.label());
            AssembleOutput::Questionnaire(questionnaire)
        }
        Ok(questionnaire) => {
            tracing::info!(
                "Assembled {} with {} issue(s)",
                questionnaire.label(),
                issues.len()
            );
            AssembleOutput::Parameters(OutputParameters::new(questionnaire, issues))
        }
    }
}

/// One-shot `$assemble` with default configuration
pub async fn assemble(
    input: impl Into<InputParameters>,
    fetcher: impl QuestionnaireFetcher + 'static,
) -> AssembleOutput {
    Assembler::new(fetcher).assemble(input).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::fetcher_fn;
    use crate::types::{QuestionnaireItem, codes};
    use serde_json::json;

    fn not_called() -> impl QuestionnaireFetcher {
        fetcher_fn(|url: String, _| async move {
            Err::<Value, _>(FetchError::transport(format!("unexpected fetch of {url}")))
        })
    }

    #[tokio::test]
    async fn test_no_subquestionnaires_is_identity() {
        let root = Questionnaire::new("root")
            .with_version("1.0.0")
            .with_item(QuestionnaireItem::new("q1", "string"));

        let output = assemble(root.clone(), not_called()).await;
        assert_eq!(output, AssembleOutput::Questionnaire(root));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_outcome() {
        let root = Questionnaire::new("root")
            .with_item(QuestionnaireItem::sub_questionnaire("sub", "http://example.com/sub"));

        let output = assemble(root, not_called()).await;
        assert!(output.is_error());
        assert_eq!(output.outcome().and_then(|o| o.first_code()), Some(codes::EXCEPTION));
    }

    #[tokio::test]
    async fn test_invalid_input_value() {
        let assembler = Assembler::new(not_called());
        let output = assembler
            .assemble_value(json!({ "resourceType": "Parameters", "parameter": [] }))
            .await;
        assert_eq!(output.outcome().and_then(|o| o.first_code()), Some(codes::REQUIRED));
    }

    #[tokio::test]
    async fn test_single_level_assembly() {
        let fetcher = fetcher_fn(|_, _| async {
            Ok::<_, FetchError>(json!({
                "resourceType": "Questionnaire",
                "id": "sub",
                "url": "http://example.com/sub",
                "version": "2.0",
                "item": [ { "linkId": "s1", "type": "string" } ]
            }))
        });
        let root = Questionnaire::new("root")
            .with_version("1.0.0")
            .with_item(QuestionnaireItem::sub_questionnaire("sub", "http://example.com/sub|2.0"));

        let output = assemble(root, fetcher).await;
        let assembled = output.questionnaire().unwrap();
        assert_eq!(assembled.item[0].link_id, "s1");
        assert_eq!(assembled.version.as_deref(), Some("1.0.0-assembled"));
    }
}
