//! Keeps linkIds unique when items of several subquestionnaires end up in one
//! questionnaire.

use std::collections::{BTreeMap, HashSet};

use crate::types::QuestionnaireItem;

/// Original linkId to the linkId it was renamed to
pub type LinkIdRenames = BTreeMap<String, String>;

/// First free `<prefix>-<id>`, then `<prefix>-1-<id>`, `<prefix>-2-<id>`, ...
pub fn unique_link_id(link_id: &str, seen: &HashSet<String>, prefix: &str) -> String {
    let mut candidate = format!("{prefix}-{link_id}");
    let mut count = 0usize;
    while seen.contains(&candidate) {
        count += 1;
        candidate = format!("{prefix}-{count}-{link_id}");
    }
    candidate
}

/// Rename every linkId of `item` and its descendants that is already in
/// `seen`. All resulting linkIds are added to `seen`.
pub fn resolve_duplicate_link_ids(
    item: &mut QuestionnaireItem,
    seen: &mut HashSet<String>,
    prefix: &str,
    renames: &mut LinkIdRenames,
) {
    if seen.contains(&item.link_id) {
        let renamed = unique_link_id(&item.link_id, seen, prefix);
        renames.insert(item.link_id.clone(), renamed.clone());
        item.link_id = renamed;
    }
    seen.insert(item.link_id.clone());

    for child in &mut item.item {
        resolve_duplicate_link_ids(child, seen, prefix, renames);
    }
}

/// Add every linkId of `items` that survives assembly to `seen`.
/// Placeholders are skipped since splicing removes them.
pub fn collect_retained_link_ids(items: &[QuestionnaireItem], seen: &mut HashSet<String>) {
    for item in items {
        if item.sub_questionnaire_extension().is_some() {
            continue;
        }
        seen.insert(item.link_id.clone());
        collect_retained_link_ids(&item.item, seen);
    }
}

/// Point `enableWhen.question` at renamed linkIds, recursively
pub fn resolve_duplicate_enable_when(item: &mut QuestionnaireItem, renames: &LinkIdRenames) {
    for condition in &mut item.enable_when {
        if let Some(renamed) = renames.get(&condition.question) {
            condition.question = renamed.clone();
        }
    }

    for child in &mut item.item {
        resolve_duplicate_enable_when(child, renames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "linkIdPrefix";

    fn seen(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_prefixes_duplicate() {
        let mut item = QuestionnaireItem::new("duplicateId", "string");
        let mut renames = LinkIdRenames::new();
        resolve_duplicate_link_ids(&mut item, &mut seen(&["duplicateId", "otherId"]), PREFIX, &mut renames);

        assert_eq!(item.link_id, "linkIdPrefix-duplicateId");
        assert_eq!(renames["duplicateId"], "linkIdPrefix-duplicateId");
    }

    #[test]
    fn test_unique_id_untouched() {
        let mut item = QuestionnaireItem::new("uniqueId", "string");
        let mut renames = LinkIdRenames::new();
        let mut ids = seen(&["otherId"]);
        resolve_duplicate_link_ids(&mut item, &mut ids, PREFIX, &mut renames);

        assert_eq!(item.link_id, "uniqueId");
        assert!(renames.is_empty());
        assert!(ids.contains("uniqueId"));
    }

    #[test]
    fn test_counter_increments() {
        let ids = seen(&[
            "duplicateId",
            "linkIdPrefix-duplicateId",
            "linkIdPrefix-1-duplicateId",
            "linkIdPrefix-2-duplicateId",
        ]);
        assert_eq!(unique_link_id("duplicateId", &ids, PREFIX), "linkIdPrefix-3-duplicateId");
    }

    #[test]
    fn test_nested_items() {
        let mut item = QuestionnaireItem::new("parentDuplicate", "group").with_item(
            QuestionnaireItem::new("level1", "group")
                .with_item(QuestionnaireItem::new("child1", "string")),
        );
        let mut renames = LinkIdRenames::new();
        resolve_duplicate_link_ids(
            &mut item,
            &mut seen(&["parentDuplicate", "child1"]),
            PREFIX,
            &mut renames,
        );

        assert_eq!(item.link_id, "linkIdPrefix-parentDuplicate");
        assert_eq!(item.item[0].link_id, "level1");
        assert_eq!(item.item[0].item[0].link_id, "linkIdPrefix-child1");
        assert_eq!(renames.len(), 2);
    }

    #[test]
    fn test_retained_ids_skip_placeholders() {
        let items = vec![
            QuestionnaireItem::new("intro", "display"),
            QuestionnaireItem::new("group", "group")
                .with_item(QuestionnaireItem::new("nested", "string"))
                .with_item(QuestionnaireItem::sub_questionnaire(
                    "placeholder",
                    "http://example.com/Questionnaire/sub",
                )),
        ];
        let mut ids = HashSet::new();
        collect_retained_link_ids(&items, &mut ids);

        assert_eq!(ids, seen(&["intro", "group", "nested"]));
    }

    #[test]
    fn test_enable_when_follows_renames() {
        let mut item = QuestionnaireItem::new("group1", "group")
            .with_enable_when("originalLinkId")
            .with_item(
                QuestionnaireItem::new("child1", "string")
                    .with_enable_when("duplicateLinkId")
                    .with_enable_when("untouched"),
            );
        let renames = LinkIdRenames::from([
            ("originalLinkId".to_string(), "linkIdPrefix-originalLinkId".to_string()),
            ("duplicateLinkId".to_string(), "linkIdPrefix-duplicateLinkId".to_string()),
        ]);

        resolve_duplicate_enable_when(&mut item, &renames);

        assert_eq!(item.enable_when[0].question, "linkIdPrefix-originalLinkId");
        assert_eq!(item.item[0].enable_when[0].question, "linkIdPrefix-duplicateLinkId");
        assert_eq!(item.item[0].enable_when[1].question, "untouched");
    }
}
