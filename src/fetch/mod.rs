//! Boundary between the assembler and whatever resolves canonicals.
//!
//! Implementers provide a [`QuestionnaireFetcher`]; every raw response goes
//! through [`FetchedResource::parse`] before the assembler sees it.

#[cfg(feature = "directory-fetcher")]
pub mod directory;

use async_trait::async_trait;
use futures::{FutureExt, StreamExt, TryStreamExt, stream};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::canonical::Canonical;
use crate::core::{AssembleConfig, AssembleContext};
use crate::error::{AssembleError, FetchError, FetchErrorKind, Result};
use crate::types::{OperationOutcome, OperationOutcomeIssue, Questionnaire, codes};

#[cfg(feature = "directory-fetcher")]
pub use directory::DirectoryFetcher;

/// Resolves a canonical (`url` or `url|version`) to a raw FHIR resource.
///
/// The response must be a Questionnaire, a Bundle containing one, or an
/// OperationOutcome describing why nothing was found.
#[async_trait]
pub trait QuestionnaireFetcher: Send + Sync {
    async fn fetch(
        &self,
        canonical_url: &str,
        request_config: Option<&Value>,
    ) -> std::result::Result<Value, FetchError>;
}

#[async_trait]
impl<T: QuestionnaireFetcher + ?Sized> QuestionnaireFetcher for Arc<T> {
    async fn fetch(
        &self,
        canonical_url: &str,
        request_config: Option<&Value>,
    ) -> std::result::Result<Value, FetchError> {
        (**self).fetch(canonical_url, request_config).await
    }
}

#[async_trait]
impl<T: QuestionnaireFetcher + ?Sized> QuestionnaireFetcher for Box<T> {
    async fn fetch(
        &self,
        canonical_url: &str,
        request_config: Option<&Value>,
    ) -> std::result::Result<Value, FetchError> {
        (**self).fetch(canonical_url, request_config).await
    }
}

/// Adapter turning an async closure into a [`QuestionnaireFetcher`]
pub struct FnFetcher<F>(F);

/// Wrap `f(canonical_url, request_config)` as a fetcher
pub fn fetcher_fn<F, Fut>(f: F) -> FnFetcher<F>
where
    F: Fn(String, Option<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Value, FetchError>> + Send,
{
    FnFetcher(f)
}

#[async_trait]
impl<F, Fut> QuestionnaireFetcher for FnFetcher<F>
where
    F: Fn(String, Option<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Value, FetchError>> + Send,
{
    async fn fetch(
        &self,
        canonical_url: &str,
        request_config: Option<&Value>,
    ) -> std::result::Result<Value, FetchError> {
        (self.0)(canonical_url.to_string(), request_config.cloned()).await
    }
}

/// A fetch response after shape checking
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedResource {
    /// `matches` counts the Questionnaires a Bundle offered; the first is used
    Questionnaire {
        questionnaire: Box<Questionnaire>,
        matches: usize,
    },
    Outcome(OperationOutcome),
    NotFound,
    Unexpected(String),
    Invalid(String),
}

impl FetchedResource {
    pub fn parse(response: Value) -> Self {
        let response = unwrap_client_envelope(response);

        match resource_type(&response) {
            Some(Questionnaire::RESOURCE_TYPE) => parse_questionnaire(response, 1),
            Some("Bundle") => parse_bundle(response),
            Some(OperationOutcome::RESOURCE_TYPE) => {
                match serde_json::from_value::<OperationOutcome>(response) {
                    Ok(outcome) => FetchedResource::Outcome(outcome),
                    Err(e) => FetchedResource::Invalid(e.to_string()),
                }
            }
            Some(other) => FetchedResource::Unexpected(other.to_string()),
            None => FetchedResource::Unexpected("<none>".to_string()),
        }
    }

    /// Turn the parsed response into the questionnaire or the fetch failure
    pub fn into_questionnaire(self, canonical: &Canonical) -> Result<(Questionnaire, usize)> {
        match self {
            FetchedResource::Questionnaire {
                questionnaire,
                matches,
            } => Ok((*questionnaire, matches)),
            FetchedResource::Outcome(outcome) => Err(AssembleError::RemoteOutcome {
                canonical: canonical.to_string(),
                outcome,
            }),
            FetchedResource::NotFound => Err(FetchError::not_found(canonical.as_str()).into()),
            FetchedResource::Unexpected(found) => {
                Err(FetchError::unexpected_resource(canonical.as_str(), &found).into())
            }
            FetchedResource::Invalid(reason) => Err(FetchError::new(
                FetchErrorKind::UnexpectedResource,
                format!("Unable to read questionnaire with canonical url '{canonical}': {reason}"),
            )
            .with_canonical(canonical.as_str())
            .into()),
        }
    }
}

fn resource_type(value: &Value) -> Option<&str> {
    value.get("resourceType").and_then(Value::as_str)
}

/// HTTP clients commonly hand back `{ data, status, headers }`
fn unwrap_client_envelope(response: Value) -> Value {
    match response {
        Value::Object(mut map) if !map.contains_key("resourceType") && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn parse_questionnaire(value: Value, matches: usize) -> FetchedResource {
    match Questionnaire::from_value(value) {
        Ok(questionnaire) => FetchedResource::Questionnaire {
            questionnaire: Box::new(questionnaire),
            matches,
        },
        Err(e) => FetchedResource::Invalid(e.to_string()),
    }
}

fn parse_bundle(bundle: Value) -> FetchedResource {
    let mut resources: Vec<Value> = bundle
        .get("entry")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get("resource"))
                .filter(|resource| resource_type(resource) == Some(Questionnaire::RESOURCE_TYPE))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    if resources.is_empty() {
        return FetchedResource::NotFound;
    }
    let matches = resources.len();
    parse_questionnaire(resources.swap_remove(0), matches)
}

async fn fetch_subquestionnaire(
    canonical: &Canonical,
    fetcher: &dyn QuestionnaireFetcher,
    request_config: Option<&Value>,
) -> Result<(Questionnaire, Option<OperationOutcomeIssue>)> {
    tracing::debug!("Fetching subquestionnaire {}", canonical);
    #[cfg(feature = "performance-metrics")]
    metrics::counter!("sdc_assemble_fetches_total").increment(1);

    let response = fetcher
        .fetch(canonical.as_str(), request_config)
        .await
        .map_err(|e| {
            #[cfg(feature = "performance-metrics")]
            metrics::counter!("sdc_assemble_fetch_failures_total").increment(1);
            tracing::warn!("Fetching {} failed: {}", canonical, e);
            e.with_canonical(canonical.as_str())
        })?;

    let (questionnaire, matches) = FetchedResource::parse(response).into_questionnaire(canonical)?;

    let warning = (matches > 1).then(|| {
        OperationOutcomeIssue::warning(
            codes::DUPLICATE,
            format!(
                "{matches} questionnaires match canonical {canonical}; the first one was assembled"
            ),
        )
    });

    Ok((questionnaire, warning))
}

/// Fetch every canonical, preserving input order.
///
/// Any failure aborts the batch; with `max_concurrent_fetches == 1` later
/// canonicals are not requested at all once one fails.
pub async fn fetch_subquestionnaires(
    canonicals: &[Canonical],
    fetcher: &dyn QuestionnaireFetcher,
    config: &AssembleConfig,
    context: &mut AssembleContext,
) -> Result<Vec<Questionnaire>> {
    let request_config = config.request_config.as_ref();

    let requests: Vec<_> = canonicals
        .iter()
        .map(|canonical| fetch_subquestionnaire(canonical, fetcher, request_config).boxed())
        .collect();

    let fetched: Vec<(Questionnaire, Option<OperationOutcomeIssue>)> = stream::iter(requests)
        .buffered(config.max_concurrent_fetches.max(1))
        .try_collect()
        .await?;

    let mut subquestionnaires = Vec::with_capacity(fetched.len());
    for (questionnaire, warning) in fetched {
        if let Some(warning) = warning {
            context.push_issue(warning);
        }
        subquestionnaires.push(questionnaire);
    }

    tracing::debug!("Fetched {} subquestionnaire(s)", subquestionnaires.len());
    Ok(subquestionnaires)
}
