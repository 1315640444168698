use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Extension and profile urls that drive assembly
pub mod sdc {
    pub const SUB_QUESTIONNAIRE: &str =
        "http://hl7.org/fhir/uv/sdc/StructureDefinition/sdc-questionnaire-subQuestionnaire";
    pub const ASSEMBLE_EXPECTATION: &str =
        "http://hl7.org/fhir/uv/sdc/StructureDefinition/sdc-questionnaire-assemble-expectation";
    pub const ASSEMBLED_FROM: &str =
        "http://hl7.org/fhir/uv/sdc/StructureDefinition/sdc-questionnaire-assembledFrom";
    pub const LAUNCH_CONTEXT: &str =
        "http://hl7.org/fhir/uv/sdc/StructureDefinition/sdc-questionnaire-launchContext";
    pub const ITEM_POPULATION_CONTEXT: &str =
        "http://hl7.org/fhir/uv/sdc/StructureDefinition/sdc-questionnaire-itemPopulationContext";
    pub const ITEM_EXTRACTION_CONTEXT: &str =
        "http://hl7.org/fhir/uv/sdc/StructureDefinition/sdc-questionnaire-itemExtractionContext";
    pub const MODULAR_PROFILE: &str =
        "http://hl7.org/fhir/uv/sdc/StructureDefinition/sdc-questionnaire-modular";
    pub const CQF_LIBRARY: &str = "http://hl7.org/fhir/StructureDefinition/cqf-library";
    pub const VARIABLE: &str = "http://hl7.org/fhir/StructureDefinition/variable";
    pub const QUESTIONNAIRE_CONSTRAINT: &str =
        "http://hl7.org/fhir/StructureDefinition/questionnaire-constraint";

    /// valueCode of the expectation extension carried by root questionnaires
    pub const ASSEMBLE_ROOT: &str = "assemble-root";
}

/// URL-tagged annotation. The single `value[x]` and any other attributes live
/// in `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
    #[serde(flatten)]
    pub value: Map<String, Value>,
}

impl Extension {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            extension: Vec::new(),
            value: Map::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.value.insert(key.into(), value);
        self
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extension.push(extension);
        self
    }

    pub fn canonical(url: impl Into<String>, canonical: impl Into<String>) -> Self {
        Self::new(url).with_value("valueCanonical", Value::String(canonical.into()))
    }

    pub fn is(&self, url: &str) -> bool {
        self.url == url
    }

    fn value_str(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(Value::as_str)
    }

    pub fn value_canonical(&self) -> Option<&str> {
        self.value_str("valueCanonical")
    }

    pub fn value_code(&self) -> Option<&str> {
        self.value_str("valueCode")
    }

    pub fn value_coding_code(&self) -> Option<&str> {
        self.value
            .get("valueCoding")
            .and_then(|coding| coding.get("code"))
            .and_then(Value::as_str)
    }

    pub fn value_expression_name(&self) -> Option<&str> {
        self.value
            .get("valueExpression")
            .and_then(|expr| expr.get("name"))
            .and_then(Value::as_str)
    }

    /// First nested extension with the given url
    pub fn sub_extension(&self, url: &str) -> Option<&Extension> {
        self.extension.iter().find(|ext| ext.is(url))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnableWhen {
    pub question: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EnableWhen {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireItem {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
    pub link_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enable_when: Vec<EnableWhen>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub item: Vec<QuestionnaireItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QuestionnaireItem {
    pub fn new(link_id: impl Into<String>, item_type: impl Into<String>) -> Self {
        Self {
            extension: Vec::new(),
            link_id: link_id.into(),
            text: None,
            item_type: item_type.into(),
            enable_when: Vec::new(),
            item: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_item(mut self, item: QuestionnaireItem) -> Self {
        self.item.push(item);
        self
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extension.push(extension);
        self
    }

    pub fn with_enable_when(mut self, question: impl Into<String>) -> Self {
        self.enable_when.push(EnableWhen::new(question));
        self
    }

    /// Display placeholder pointing at a subquestionnaire
    pub fn sub_questionnaire(link_id: impl Into<String>, canonical: impl Into<String>) -> Self {
        Self::new(link_id, "display")
            .with_extension(Extension::canonical(sdc::SUB_QUESTIONNAIRE, canonical))
    }

    /// The subQuestionnaire extension of this item, if it is a placeholder
    pub fn sub_questionnaire_extension(&self) -> Option<&Extension> {
        self.extension
            .iter()
            .find(|ext| ext.is(sdc::SUB_QUESTIONNAIRE))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profile: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// FHIR R4 Questionnaire with the attributes assembly touches typed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Questionnaire {
    #[serde(default = "Questionnaire::resource_type_default")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implicit_rules: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contained: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifier_extension: Vec<Extension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub item: Vec<QuestionnaireItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Questionnaire {
    pub const RESOURCE_TYPE: &'static str = "Questionnaire";

    fn resource_type_default() -> String {
        Self::RESOURCE_TYPE.to_string()
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self {
            resource_type: Self::RESOURCE_TYPE.to_string(),
            id: Some(id.into()),
            meta: None,
            implicit_rules: None,
            language: None,
            text: None,
            contained: Vec::new(),
            extension: Vec::new(),
            modifier_extension: Vec::new(),
            url: None,
            version: None,
            item: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_item(mut self, item: QuestionnaireItem) -> Self {
        self.item.push(item);
        self
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extension.push(extension);
        self
    }

    pub fn with_contained(mut self, resource: Value) -> Self {
        self.contained.push(resource);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Parse a raw resource, rejecting anything that is not a Questionnaire
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        let questionnaire: Self = serde_json::from_value(value)?;
        if questionnaire.resource_type != Self::RESOURCE_TYPE {
            return Err(serde::de::Error::custom(format!(
                "expected resourceType 'Questionnaire', found '{}'",
                questionnaire.resource_type
            )));
        }
        Ok(questionnaire)
    }

    /// Whether a top-level attribute is declared, looked up by its JSON name
    pub fn has_attribute(&self, name: &str) -> bool {
        match name {
            "id" => self.id.is_some(),
            "meta" => self.meta.is_some(),
            "implicitRules" => self.implicit_rules.is_some(),
            "language" => self.language.is_some(),
            "text" => self.text.is_some(),
            "contained" => !self.contained.is_empty(),
            "extension" => !self.extension.is_empty(),
            "modifierExtension" => !self.modifier_extension.is_empty(),
            "url" => self.url.is_some(),
            "version" => self.version.is_some(),
            "item" => !self.item.is_empty(),
            other => self.extra.contains_key(other),
        }
    }

    /// `url|version`, or the bare url when unversioned
    pub fn versioned_url(&self) -> Option<String> {
        let url = self.url.as_deref()?;
        Some(match self.version.as_deref() {
            Some(version) => format!("{url}|{version}"),
            None => url.to_string(),
        })
    }

    /// Label used in log lines and issue texts
    pub fn label(&self) -> &str {
        self.url
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("<anonymous questionnaire>")
    }
}
