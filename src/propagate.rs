//! Merges what the collectors gathered back into the parent questionnaire.

use std::collections::HashSet;

use crate::canonical::{Canonical, placeholder_canonical};
use crate::collect::{ContainedResources, PropagatedExtensions};
use crate::core::AssembleConfig;
use crate::error::{AssembleError, Result};
use crate::types::{Extension, Questionnaire, QuestionnaireItem, sdc};

/// Everything the subquestionnaires of one parent contribute, indexed like
/// the canonicals they were fetched for
#[derive(Debug, Clone, Default)]
pub struct CollectedProperties {
    pub urls: Vec<String>,
    pub items: Vec<Option<Vec<QuestionnaireItem>>>,
    pub contained: ContainedResources,
    pub extensions: PropagatedExtensions,
}

fn placeholder_index(item: &QuestionnaireItem, canonicals: &[Canonical]) -> Option<usize> {
    let canonical = placeholder_canonical(item)?;
    canonicals.iter().position(|c| *c == canonical)
}

fn variable_names(extensions: &[Extension]) -> impl Iterator<Item = &str> {
    extensions
        .iter()
        .filter(|ext| ext.is(sdc::VARIABLE))
        .filter_map(Extension::value_expression_name)
}

/// Reject item-level variables that would end up duplicated on the item (or
/// questionnaire) enclosing their placeholder.
pub fn check_target_variables(
    parent: &Questionnaire,
    canonicals: &[Canonical],
    item_level: &[Vec<Extension>],
) -> Result<()> {
    let mut placed = vec![false; canonicals.len()];
    check_target(
        &parent.item,
        parent.label(),
        &parent.extension,
        canonicals,
        item_level,
        &mut placed,
    )
}

fn check_target<'a>(
    items: &'a [QuestionnaireItem],
    target: &str,
    target_extensions: &'a [Extension],
    canonicals: &[Canonical],
    item_level: &'a [Vec<Extension>],
    placed: &mut [bool],
) -> Result<()> {
    let mut names: HashSet<&'a str> = variable_names(target_extensions).collect();

    for item in items {
        if let Some(index) = placeholder_index(item, canonicals) {
            if std::mem::replace(&mut placed[index], true) {
                continue;
            }
            let merged = item_level.get(index).map(Vec::as_slice).unwrap_or_default();
            for name in variable_names(merged) {
                if !names.insert(name) {
                    return Err(AssembleError::DuplicateVariable {
                        name: name.to_string(),
                        target: target.to_string(),
                    });
                }
            }
            continue;
        }

        check_target(
            &item.item,
            &item.link_id,
            &item.extension,
            canonicals,
            item_level,
            placed,
        )?;
    }
    Ok(())
}

/// Replaces placeholders with the subquestionnaire items they point at
struct Splicer<'a> {
    canonicals: &'a [Canonical],
    items: &'a [Option<Vec<QuestionnaireItem>>],
    item_level: &'a [Vec<Extension>],
    placed: Vec<bool>,
}

impl Splicer<'_> {
    /// Returns the spliced items and the extensions owed to their enclosing target
    fn splice(&mut self, items: Vec<QuestionnaireItem>) -> (Vec<QuestionnaireItem>, Vec<Extension>) {
        let mut spliced = Vec::with_capacity(items.len());
        let mut target_extensions = Vec::new();

        for mut item in items {
            if let Some(index) = placeholder_index(&item, self.canonicals) {
                if std::mem::replace(&mut self.placed[index], true) {
                    continue;
                }
                if let Some(extensions) = self.item_level.get(index) {
                    target_extensions.extend(extensions.iter().cloned());
                }
                match self.items.get(index) {
                    Some(Some(child_items)) => spliced.extend(child_items.iter().cloned()),
                    _ => spliced.push(item),
                }
                continue;
            }

            let children = std::mem::take(&mut item.item);
            let (children, extensions) = self.splice(children);
            item.item = children;
            item.extension.extend(extensions);
            spliced.push(item);
        }

        (spliced, target_extensions)
    }
}

fn is_assemble_root(extension: &Extension) -> bool {
    extension.is(sdc::ASSEMBLE_EXPECTATION) && extension.value_code() == Some(sdc::ASSEMBLE_ROOT)
}

/// Compose the assembled parent. Never fails: everything that could be
/// rejected was checked before.
pub fn propagate_properties(
    mut parent: Questionnaire,
    canonicals: &[Canonical],
    collected: CollectedProperties,
    config: &AssembleConfig,
) -> Questionnaire {
    let CollectedProperties {
        urls,
        items,
        contained,
        extensions,
    } = collected;

    let mut splicer = Splicer {
        canonicals,
        items: &items,
        item_level: &extensions.item_level,
        placed: vec![false; canonicals.len()],
    };
    let (spliced, document_extensions) = splicer.splice(std::mem::take(&mut parent.item));
    parent.item = spliced;

    let parent_ids: HashSet<String> = parent
        .contained
        .iter()
        .filter_map(|resource| resource.get("id").and_then(|id| id.as_str()))
        .map(str::to_string)
        .collect();
    parent.contained.extend(
        contained
            .into_iter()
            .filter(|(id, _)| !parent_ids.contains(id))
            .map(|(_, resource)| resource),
    );

    parent.extension.retain(|ext| !is_assemble_root(ext));
    parent.extension.extend(document_extensions);
    parent.extension.extend(extensions.root_level);
    parent.extension.extend(
        urls.iter()
            .map(|url| Extension::canonical(sdc::ASSEMBLED_FROM, url.as_str())),
    );

    if let Some(version) = parent.version.as_mut() {
        version.push_str(&config.version_suffix);
    }

    if let Some(meta) = parent.meta.as_mut() {
        meta.profile.retain(|profile| profile != sdc::MODULAR_PROFILE);
    }

    parent.text = None;

    tracing::debug!(
        "Propagated {} subquestionnaire(s) into {}",
        urls.len(),
        parent.label()
    );
    parent
}
