mod common;

#[cfg(feature = "directory-fetcher")]
mod directory_fetcher_tests {
    use super::common::*;
    use octofhir_sdc_assemble::*;
    use std::path::Path;

    fn write_json(dir: &Path, name: &str, questionnaire: &Questionnaire) {
        let content = serde_json::to_string_pretty(questionnaire).unwrap();
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[tokio::test]
    async fn test_assemble_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_json(dir.path(), "a.json", &create_subquestionnaire("a", &["a1"]));
        write_json(dir.path(), "b.json", &create_subquestionnaire("b", &["b1", "b2"]));

        let fetcher = DirectoryFetcher::load(dir.path()).await.unwrap();
        assert_eq!(fetcher.root(), Some(dir.path()));
        assert!(fetcher.contains(&canonical("a")));

        let output = assemble(create_root("root", &["a", "b"]), fetcher).await;

        let assembled = output.questionnaire().unwrap();
        let ids: Vec<&str> = assembled.item[0]
            .item
            .iter()
            .map(|item| item.link_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a1", "b1", "b2"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = DirectoryFetcher::load(dir.path()).await.unwrap();
        assert!(fetcher.is_empty());

        let output = assemble(create_root("root", &["absent"]), fetcher).await;

        assert!(output.is_error());
        let outcome = output.outcome().unwrap();
        assert_eq!(outcome.first_code(), Some("not-found"));
    }

    #[tokio::test]
    async fn test_unversioned_lookup_prefers_first_file() {
        let dir = tempfile::tempdir().unwrap();
        write_json(
            dir.path(),
            "1-first.json",
            &create_subquestionnaire("shared", &["first"]).with_version("1.0.0"),
        );
        write_json(
            dir.path(),
            "2-second.json",
            &create_subquestionnaire("shared", &["second"]).with_version("2.0.0"),
        );

        let fetcher = DirectoryFetcher::load(dir.path()).await.unwrap();
        let unversioned = fetcher
            .fetch(&format!("{BASE_URL}/shared"), None)
            .await
            .unwrap();
        assert_eq!(unversioned["version"], "1.0.0");

        let pinned = fetcher
            .fetch(&format!("{BASE_URL}/shared|2.0.0"), None)
            .await
            .unwrap();
        assert_eq!(pinned["item"][0]["linkId"], "second");
    }

    #[tokio::test]
    async fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "maxConcurrentFetches": 4, "prohibitedAttributes": ["implicitRules", "subjectType"] }"#,
        )
        .unwrap();

        let config = AssembleConfig::from_file(&path).unwrap();
        assert_eq!(config.max_concurrent_fetches, 4);
        assert_eq!(config.prohibited_attributes.len(), 2);
        assert_eq!(config.link_id_prefix, "linkIdPrefix");
    }
}
