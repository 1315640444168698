//! Discovery of subquestionnaire references.
//!
//! A reference is a display item carrying the SDC `subQuestionnaire`
//! extension whose `valueCanonical` is `url` or `url|version`.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use url::Url;

use crate::core::AssembleContext;
use crate::error::{AssembleError, Result};
use crate::types::{Questionnaire, QuestionnaireItem};

static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s|]+$").expect("static version pattern"));

/// Parsed canonical reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Canonical {
    raw: String,
    url: String,
    version: Option<String>,
}

impl Canonical {
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let (url, version) = match raw.split_once('|') {
            Some((url, version)) => (url, Some(version)),
            None => (raw, None),
        };

        if url.is_empty() {
            return Err(format!("canonical '{raw}' has an empty url"));
        }
        if url.trim() != url {
            return Err(format!("canonical '{raw}' contains surrounding whitespace"));
        }
        Url::parse(url).map_err(|e| format!("canonical '{raw}' is not an absolute url: {e}"))?;

        if let Some(version) = version {
            if !VERSION_PATTERN.is_match(version) {
                return Err(format!("canonical '{raw}' has an invalid version '{version}'"));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            url: url.to_string(),
            version: version.map(str::to_string),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// `url=<url>&version=<version>` search parameters for servers that
    /// resolve canonicals through a Questionnaire search
    pub fn search_query(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("url", &self.url);
        if let Some(version) = &self.version {
            query.append_pair("version", version);
        }
        query.finish()
    }
}

impl FromStr for Canonical {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Canonical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Canonical a placeholder item points at, if it is a well-formed placeholder
pub fn placeholder_canonical(item: &QuestionnaireItem) -> Option<Canonical> {
    item.sub_questionnaire_extension()
        .and_then(|ext| ext.value_canonical())
        .and_then(|raw| Canonical::parse(raw).ok())
}

/// Collect the not-yet-visited subquestionnaire canonicals of `questionnaire`,
/// in document order.
///
/// A canonical that is already part of the run is a circular dependency.
/// Repeats inside the same questionnaire are collapsed with a warning.
pub fn get_canonical_urls(
    questionnaire: &Questionnaire,
    context: &mut AssembleContext,
) -> Result<Vec<Canonical>> {
    let mut canonicals: Vec<Canonical> = Vec::new();
    collect_item_canonicals(&questionnaire.item, questionnaire, context, &mut canonicals)?;

    if !canonicals.is_empty() {
        tracing::debug!(
            "Found {} subquestionnaire reference(s) in {}",
            canonicals.len(),
            questionnaire.label()
        );
    }
    Ok(canonicals)
}

fn collect_item_canonicals(
    items: &[QuestionnaireItem],
    questionnaire: &Questionnaire,
    context: &mut AssembleContext,
    canonicals: &mut Vec<Canonical>,
) -> Result<()> {
    for item in items {
        if let Some(extension) = item.sub_questionnaire_extension() {
            let raw = extension
                .value_canonical()
                .ok_or_else(|| AssembleError::MalformedCanonical {
                    questionnaire: questionnaire.label().to_string(),
                    message: format!(
                        "item '{}' has a subQuestionnaire extension without a valueCanonical",
                        item.link_id
                    ),
                })?;

            let canonical =
                Canonical::parse(raw).map_err(|message| AssembleError::MalformedCanonical {
                    questionnaire: questionnaire.label().to_string(),
                    message,
                })?;

            if context.is_visited(&canonical) {
                return Err(AssembleError::CircularReference {
                    questionnaire: questionnaire.label().to_string(),
                    canonical: canonical.to_string(),
                });
            }

            if canonicals.contains(&canonical) {
                context.add_duplicate_warning(format!(
                    "{} references {} more than once; only the first reference is assembled",
                    questionnaire.label(),
                    canonical
                ));
            } else {
                canonicals.push(canonical);
            }
        }

        collect_item_canonicals(&item.item, questionnaire, context, canonicals)?;
    }
    Ok(())
}
