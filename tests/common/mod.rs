use async_trait::async_trait;
use octofhir_sdc_assemble::*;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE_URL: &str = "http://example.com/Questionnaire";
pub const VERSION: &str = "1.0.0";

#[allow(dead_code)]
pub fn canonical(id: &str) -> String {
    format!("{BASE_URL}/{id}|{VERSION}")
}

#[allow(dead_code)]
pub fn create_questionnaire(id: &str) -> Questionnaire {
    Questionnaire::new(id)
        .with_url(format!("{BASE_URL}/{id}"))
        .with_version(VERSION)
        .with_attribute("status", json!("draft"))
}

/// Subquestionnaire with one string item per linkId
#[allow(dead_code)]
pub fn create_subquestionnaire(id: &str, link_ids: &[&str]) -> Questionnaire {
    link_ids.iter().fold(create_questionnaire(id), |q, link_id| {
        q.with_item(QuestionnaireItem::new(*link_id, "string").with_text(format!("{id} {link_id}")))
    })
}

/// Root whose single group holds one placeholder per subquestionnaire id
#[allow(dead_code)]
pub fn create_root(id: &str, subquestionnaires: &[&str]) -> Questionnaire {
    let group = subquestionnaires
        .iter()
        .fold(QuestionnaireItem::new("root-group", "group"), |group, sub| {
            group.with_item(QuestionnaireItem::sub_questionnaire(
                format!("{sub}-placeholder"),
                canonical(sub),
            ))
        });

    create_questionnaire(id)
        .with_extension(
            Extension::new(sdc::ASSEMBLE_EXPECTATION).with_value("valueCode", json!(sdc::ASSEMBLE_ROOT)),
        )
        .with_item(group)
}

#[allow(dead_code)]
pub fn create_variable(name: &str) -> Extension {
    Extension::new(sdc::VARIABLE).with_value(
        "valueExpression",
        json!({ "name": name, "language": "text/fhirpath", "expression": "true" }),
    )
}

/// In-memory fetcher that records every request
#[allow(dead_code)]
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    responses: HashMap<String, Value>,
    delays: HashMap<String, Duration>,
    calls: Arc<Mutex<Vec<String>>>,
    request_configs: Arc<Mutex<Vec<Option<Value>>>>,
}

#[allow(dead_code)]
impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve the questionnaire under its `url|version` canonical
    pub fn with_questionnaire(self, questionnaire: &Questionnaire) -> Self {
        let key = questionnaire.versioned_url().expect("test questionnaire needs a url");
        let value = serde_json::to_value(questionnaire).expect("questionnaire serializes");
        self.with_response(key, value)
    }

    pub fn with_response(mut self, canonical: impl Into<String>, response: Value) -> Self {
        self.responses.insert(canonical.into(), response);
        self
    }

    pub fn with_delay(mut self, canonical: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(canonical.into(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn request_configs(&self) -> Vec<Option<Value>> {
        self.request_configs.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuestionnaireFetcher for MockFetcher {
    async fn fetch(
        &self,
        canonical_url: &str,
        request_config: Option<&Value>,
    ) -> std::result::Result<Value, FetchError> {
        self.calls.lock().unwrap().push(canonical_url.to_string());
        self.request_configs
            .lock()
            .unwrap()
            .push(request_config.cloned());

        if let Some(delay) = self.delays.get(canonical_url) {
            tokio::time::sleep(*delay).await;
        }

        Ok(self.responses.get(canonical_url).cloned().unwrap_or_else(|| {
            json!({ "resourceType": "Bundle", "type": "searchset", "total": 0 })
        }))
    }
}
