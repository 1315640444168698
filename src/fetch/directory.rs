use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{FetchError, Result};
use crate::fetch::QuestionnaireFetcher;
use crate::types::{OperationOutcome, Questionnaire, codes};

/// Fetcher backed by a directory of Questionnaire (or Bundle) JSON files.
///
/// Every Questionnaire is indexed under `url|version` and under its bare
/// `url`; for the bare url the first file in path order wins.
#[derive(Debug, Clone, Default)]
pub struct DirectoryFetcher {
    root: Option<PathBuf>,
    index: HashMap<String, Value>,
}

impl DirectoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every `*.json` file directly under `dir`
    pub async fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut fetcher = Self {
            root: Some(dir.to_path_buf()),
            index: HashMap::new(),
        };

        for path in paths {
            let content = fs::read_to_string(&path).await?;
            match serde_json::from_str::<Value>(&content) {
                Ok(resource) => fetcher.insert_resource(resource),
                Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
            }
        }

        tracing::info!(
            "Indexed {} canonical(s) from {}",
            fetcher.index.len(),
            dir.display()
        );
        Ok(fetcher)
    }

    /// Add a Questionnaire, or every Questionnaire entry of a Bundle
    pub fn insert_resource(&mut self, resource: Value) {
        match resource.get("resourceType").and_then(Value::as_str) {
            Some(Questionnaire::RESOURCE_TYPE) => self.insert_questionnaire(resource),
            Some("Bundle") => {
                let entries = resource
                    .get("entry")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                for mut entry in entries {
                    if let Some(resource) = entry.get_mut("resource").map(Value::take) {
                        self.insert_resource(resource);
                    }
                }
            }
            _ => {}
        }
    }

    fn insert_questionnaire(&mut self, questionnaire: Value) {
        let Some(url) = questionnaire.get("url").and_then(Value::as_str) else {
            tracing::debug!("Skipping questionnaire without url");
            return;
        };
        let url = url.to_string();

        if let Some(version) = questionnaire.get("version").and_then(Value::as_str) {
            self.index
                .insert(format!("{url}|{version}"), questionnaire.clone());
        }
        self.index.entry(url).or_insert(questionnaire);
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, canonical_url: &str) -> bool {
        self.index.contains_key(canonical_url)
    }
}

#[async_trait]
impl QuestionnaireFetcher for DirectoryFetcher {
    async fn fetch(
        &self,
        canonical_url: &str,
        _request_config: Option<&Value>,
    ) -> std::result::Result<Value, FetchError> {
        match self.index.get(canonical_url) {
            Some(questionnaire) => Ok(questionnaire.clone()),
            None => {
                let outcome = OperationOutcome::error(
                    codes::NOT_FOUND,
                    format!("No questionnaire with canonical url '{canonical_url}' in directory"),
                );
                serde_json::to_value(outcome)
                    .map_err(|e| FetchError::with_source("Failed to encode OperationOutcome", e))
            }
        }
    }
}
