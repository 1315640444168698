pub mod outcome;
pub mod parameters;
pub mod questionnaire;

pub use outcome::{IssueDetails, IssueSeverity, OperationOutcome, OperationOutcomeIssue, codes};
pub use parameters::{
    AssembleOutput, InputParameters, OutputParameters, Parameters, ParametersParameter,
    is_input_parameters,
};
pub use questionnaire::{EnableWhen, Extension, Meta, Questionnaire, QuestionnaireItem, sdc};
