use crate::canonical::Canonical;
use crate::types::{OperationOutcomeIssue, codes};

/// State shared by every recursive call of one `$assemble` run.
///
/// `visited` only ever grows: a canonical recorded here is never fetched or
/// merged again during the run. `issues` collects non-fatal findings in the
/// order they were produced.
#[derive(Debug, Default)]
pub struct AssembleContext {
    visited: Vec<Canonical>,
    issues: Vec<OperationOutcomeIssue>,
}

impl AssembleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visited(&self, canonical: &Canonical) -> bool {
        self.visited.contains(canonical)
    }

    pub fn visit<I>(&mut self, canonicals: I)
    where
        I: IntoIterator<Item = Canonical>,
    {
        self.visited.extend(canonicals);
    }

    pub fn push_issue(&mut self, issue: OperationOutcomeIssue) {
        self.issues.push(issue);
    }

    pub fn add_warning(&mut self, code: impl Into<String>, message: impl Into<String>) {
        self.push_issue(OperationOutcomeIssue::warning(code, message));
    }

    pub fn add_information(&mut self, message: impl Into<String>) {
        self.push_issue(OperationOutcomeIssue::information(message));
    }

    pub fn add_duplicate_warning(&mut self, message: impl Into<String>) {
        self.add_warning(codes::DUPLICATE, message);
    }

    pub fn issues(&self) -> &[OperationOutcomeIssue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<OperationOutcomeIssue> {
        self.issues
    }
}
