use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AssembleError, Result};
use crate::types::{OperationOutcome, OperationOutcomeIssue, Questionnaire};

/// Name of the input parameter carrying the root questionnaire
pub const QUESTIONNAIRE_PARAMETER: &str = "questionnaire";
pub const RETURN_PARAMETER: &str = "return";
pub const OUTCOME_PARAMETER: &str = "outcome";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametersParameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Generic FHIR Parameters resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    pub resource_type: String,
    #[serde(default)]
    pub parameter: Vec<ParametersParameter>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Parameters {
    pub const RESOURCE_TYPE: &'static str = "Parameters";

    pub fn get(&self, name: &str) -> Option<&ParametersParameter> {
        self.parameter.iter().find(|p| p.name == name)
    }
}

/// Input envelope of `$assemble`: exactly one root questionnaire
#[derive(Debug, Clone, PartialEq)]
pub struct InputParameters {
    pub questionnaire: Questionnaire,
}

impl InputParameters {
    pub fn new(questionnaire: Questionnaire) -> Self {
        Self { questionnaire }
    }

    /// Accepts a `Parameters` resource with a `questionnaire` parameter, or a
    /// bare Questionnaire.
    pub fn from_value(value: Value) -> Result<Self> {
        match value.get("resourceType").and_then(Value::as_str) {
            Some(Questionnaire::RESOURCE_TYPE) => Ok(Self::new(Questionnaire::from_value(value)?)),
            Some(Parameters::RESOURCE_TYPE) => {
                let parameters: Parameters = serde_json::from_value(value)?;
                let resource = parameters
                    .get(QUESTIONNAIRE_PARAMETER)
                    .and_then(|p| p.resource.clone())
                    .ok_or_else(|| {
                        AssembleError::invalid_input(
                            "Parameters does not contain a 'questionnaire' parameter with a resource",
                        )
                    })?;
                if !is_questionnaire(&resource) {
                    return Err(AssembleError::invalid_input(
                        "The 'questionnaire' parameter does not hold a Questionnaire resource",
                    ));
                }
                Ok(Self::new(Questionnaire::from_value(resource)?))
            }
            Some(other) => Err(AssembleError::invalid_input(format!(
                "Expected Parameters or Questionnaire input, found '{other}'"
            ))),
            None => Err(AssembleError::invalid_input(
                "Input is not a FHIR resource (missing resourceType)",
            )),
        }
    }

    pub fn to_parameters(&self) -> Result<Parameters> {
        Ok(Parameters {
            resource_type: Parameters::RESOURCE_TYPE.to_string(),
            parameter: vec![ParametersParameter {
                name: QUESTIONNAIRE_PARAMETER.to_string(),
                resource: Some(serde_json::to_value(&self.questionnaire)?),
                extra: Map::new(),
            }],
            extra: Map::new(),
        })
    }
}

impl From<Questionnaire> for InputParameters {
    fn from(questionnaire: Questionnaire) -> Self {
        Self::new(questionnaire)
    }
}

fn is_questionnaire(value: &Value) -> bool {
    value.get("resourceType").and_then(Value::as_str) == Some(Questionnaire::RESOURCE_TYPE)
}

/// Whether a raw value is a Parameters resource usable as `$assemble` input
pub fn is_input_parameters(value: &Value) -> bool {
    value.get("resourceType").and_then(Value::as_str) == Some(Parameters::RESOURCE_TYPE)
        && value
            .get("parameter")
            .and_then(Value::as_array)
            .is_some_and(|params| {
                params.iter().any(|p| {
                    p.get("name").and_then(Value::as_str) == Some(QUESTIONNAIRE_PARAMETER)
                        && p.get("resource").is_some_and(is_questionnaire)
                })
            })
}

/// Successful assembly that also produced warnings or information
#[derive(Debug, Clone, PartialEq)]
pub struct OutputParameters {
    pub questionnaire: Questionnaire,
    pub outcome: OperationOutcome,
}

impl OutputParameters {
    pub fn new(questionnaire: Questionnaire, issues: Vec<OperationOutcomeIssue>) -> Self {
        Self {
            questionnaire,
            outcome: OperationOutcome::from_issues(issues),
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum ResourceRef<'a> {
    Questionnaire(&'a Questionnaire),
    OperationOutcome(&'a OperationOutcome),
}

#[derive(Serialize)]
struct ParameterRef<'a> {
    name: &'static str,
    resource: ResourceRef<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParametersRef<'a> {
    resource_type: &'static str,
    parameter: [ParameterRef<'a>; 2],
}

impl Serialize for OutputParameters {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        ParametersRef {
            resource_type: Parameters::RESOURCE_TYPE,
            parameter: [
                ParameterRef {
                    name: RETURN_PARAMETER,
                    resource: ResourceRef::Questionnaire(&self.questionnaire),
                },
                ParameterRef {
                    name: OUTCOME_PARAMETER,
                    resource: ResourceRef::OperationOutcome(&self.outcome),
                },
            ],
        }
        .serialize(serializer)
    }
}

/// Result of `$assemble`, serialised as the matching FHIR resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AssembleOutput {
    Questionnaire(Questionnaire),
    OperationOutcome(OperationOutcome),
    Parameters(OutputParameters),
}

impl AssembleOutput {
    pub fn resource_type(&self) -> &'static str {
        match self {
            AssembleOutput::Questionnaire(_) => Questionnaire::RESOURCE_TYPE,
            AssembleOutput::OperationOutcome(_) => OperationOutcome::RESOURCE_TYPE,
            AssembleOutput::Parameters(_) => Parameters::RESOURCE_TYPE,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AssembleOutput::OperationOutcome(_))
    }

    /// The assembled questionnaire, bare or wrapped with an outcome
    pub fn questionnaire(&self) -> Option<&Questionnaire> {
        match self {
            AssembleOutput::Questionnaire(q) => Some(q),
            AssembleOutput::Parameters(p) => Some(&p.questionnaire),
            AssembleOutput::OperationOutcome(_) => None,
        }
    }

    /// The error report, or the non-fatal outcome of a wrapped result
    pub fn outcome(&self) -> Option<&OperationOutcome> {
        match self {
            AssembleOutput::OperationOutcome(o) => Some(o),
            AssembleOutput::Parameters(p) => Some(&p.outcome),
            AssembleOutput::Questionnaire(_) => None,
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
