//! Gathers what assembled subquestionnaires contribute to their parent.
//!
//! Each collector walks the subquestionnaires in fetch order, so every
//! per-child vector lines up with the canonicals that produced it.

use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::core::AssembleContext;
use crate::error::{AssembleError, Result};
use crate::linkid::{
    LinkIdRenames, collect_retained_link_ids, resolve_duplicate_enable_when,
    resolve_duplicate_link_ids,
};
use crate::types::{Extension, Questionnaire, QuestionnaireItem, codes, sdc};

/// Contained resources keyed by local id, in first-seen order
pub type ContainedResources = Map<String, Value>;

/// Extensions lifted out of subquestionnaires
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropagatedExtensions {
    /// Merged onto the parent questionnaire itself
    pub root_level: Vec<Extension>,
    /// Per subquestionnaire, merged onto the item enclosing its placeholder
    pub item_level: Vec<Vec<Extension>>,
}

/// Top-level items of each subquestionnaire, `None` when it has none.
///
/// linkIds clashing with the parent's own items or with an earlier
/// subquestionnaire are renamed and the subquestionnaire's own enableWhen
/// conditions follow the rename.
pub fn get_items(
    parent: &Questionnaire,
    subquestionnaires: &[Questionnaire],
    link_id_prefix: &str,
    context: &mut AssembleContext,
) -> Vec<Option<Vec<QuestionnaireItem>>> {
    let mut seen: HashSet<String> = HashSet::new();
    collect_retained_link_ids(&parent.item, &mut seen);

    subquestionnaires
        .iter()
        .map(|subquestionnaire| {
            if subquestionnaire.item.is_empty() {
                return None;
            }

            let mut items = subquestionnaire.item.clone();
            let mut renames = LinkIdRenames::new();
            for item in &mut items {
                resolve_duplicate_link_ids(item, &mut seen, link_id_prefix, &mut renames);
            }

            if !renames.is_empty() {
                for item in &mut items {
                    resolve_duplicate_enable_when(item, &renames);
                }
                for (original, renamed) in &renames {
                    context.add_information(format!(
                        "linkId '{original}' of {} duplicates an earlier item and was renamed to '{renamed}'",
                        subquestionnaire.label()
                    ));
                }
            }

            Some(items)
        })
        .collect()
}

/// `url|version` (or bare `url`) of every subquestionnaire that has a url
pub fn get_urls(subquestionnaires: &[Questionnaire]) -> Vec<String> {
    subquestionnaires
        .iter()
        .filter_map(Questionnaire::versioned_url)
        .collect()
}

/// Flatten contained resources; a later definition of the same id wins
pub fn get_contained_resources(
    subquestionnaires: &[Questionnaire],
    context: &mut AssembleContext,
) -> ContainedResources {
    let mut contained = ContainedResources::new();

    for subquestionnaire in subquestionnaires {
        for resource in &subquestionnaire.contained {
            let Some(id) = resource.get("id").and_then(Value::as_str) else {
                context.add_warning(
                    codes::REQUIRED,
                    format!(
                        "A contained resource of {} has no id and was not propagated",
                        subquestionnaire.label()
                    ),
                );
                continue;
            };

            if let Some(previous) = contained.insert(id.to_string(), resource.clone()) {
                if &previous != resource {
                    context.add_information(format!(
                        "Contained resource '{id}' from {} overwrites an earlier definition",
                        subquestionnaire.label()
                    ));
                }
            }
        }
    }

    contained
}

fn launch_context_name(extension: &Extension) -> Option<&str> {
    let name = extension.sub_extension("name")?;
    name.value_coding_code()
        .or_else(|| name.value_code())
        .or_else(|| name.value.get("valueId").and_then(Value::as_str))
}

/// Split subquestionnaire extensions into root-level and item-level ones.
///
/// Extensions outside both groups are not propagated.
pub fn get_extensions(subquestionnaires: &[Questionnaire]) -> Result<PropagatedExtensions> {
    let mut propagated = PropagatedExtensions::default();

    for subquestionnaire in subquestionnaires {
        let label = subquestionnaire.label();
        let mut item_level = Vec::new();
        let mut variables: HashSet<&str> = HashSet::new();
        let mut population_context = false;
        let mut extraction_context = false;

        for extension in &subquestionnaire.extension {
            match extension.url.as_str() {
                sdc::CQF_LIBRARY => {
                    if extension.value_canonical().is_none() {
                        return Err(AssembleError::malformed_extension(
                            label,
                            &extension.url,
                            "missing valueCanonical",
                        ));
                    }
                    propagated.root_level.push(extension.clone());
                }
                sdc::LAUNCH_CONTEXT => {
                    if launch_context_name(extension).is_none() {
                        return Err(AssembleError::malformed_extension(
                            label,
                            &extension.url,
                            "missing 'name' sub-extension with a code",
                        ));
                    }
                    propagated.root_level.push(extension.clone());
                }
                sdc::QUESTIONNAIRE_CONSTRAINT => item_level.push(extension.clone()),
                sdc::VARIABLE => {
                    let name = extension.value_expression_name().ok_or_else(|| {
                        AssembleError::malformed_extension(
                            label,
                            &extension.url,
                            "missing valueExpression.name",
                        )
                    })?;
                    if !variables.insert(name) {
                        return Err(AssembleError::malformed_extension(
                            label,
                            &extension.url,
                            format!("variable '{name}' is declared more than once"),
                        ));
                    }
                    item_level.push(extension.clone());
                }
                sdc::ITEM_POPULATION_CONTEXT => {
                    if std::mem::replace(&mut population_context, true) {
                        return Err(AssembleError::malformed_extension(
                            label,
                            &extension.url,
                            "more than one itemPopulationContext",
                        ));
                    }
                    item_level.push(extension.clone());
                }
                sdc::ITEM_EXTRACTION_CONTEXT => {
                    if std::mem::replace(&mut extraction_context, true) {
                        return Err(AssembleError::malformed_extension(
                            label,
                            &extension.url,
                            "more than one itemExtractionContext",
                        ));
                    }
                    item_level.push(extension.clone());
                }
                _ => {}
            }
        }

        propagated.item_level.push(item_level);
    }

    Ok(propagated)
}
