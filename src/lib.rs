//! # OctoFHIR SDC Assemble
//!
//! Implementation of the FHIR SDC `$assemble` operation: a modular root
//! Questionnaire that references subquestionnaires is turned into a single,
//! self-contained Questionnaire.
//!
//! ## Features
//!
//! - **Recursive assembly**: subquestionnaires are fetched, assembled and
//!   merged depth-first, with circular references detected up front
//! - **Pluggable fetching**: anything implementing [`QuestionnaireFetcher`],
//!   including plain async closures via [`fetcher_fn`]
//! - **Consistency checks**: prohibited attributes and language mismatches
//!   abort assembly with an OperationOutcome
//! - **Propagation**: items, contained resources and the SDC extensions are
//!   lifted into the parent; clashing linkIds are renamed
//! - **Directory fetcher**: resolve canonicals from a folder of JSON files
//!   (feature `directory-fetcher`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use octofhir_sdc_assemble::*;
//!
//! # async fn example() -> Result<()> {
//! let fetcher = DirectoryFetcher::load("questionnaires").await?;
//! let root: Questionnaire = serde_json::from_str(&std::fs::read_to_string("root.json")?)?;
//!
//! let output = assemble(root, fetcher).await;
//! println!("{}", serde_json::to_string_pretty(&output)?);
//! # Ok(())
//! # }
//! ```

pub mod canonical;
pub mod collect;
pub mod core;
pub mod error;
pub mod fetch;
pub mod linkid;
pub mod propagate;
pub mod types;
pub mod validation;

pub use canonical::{Canonical, get_canonical_urls};
pub use collect::{PropagatedExtensions, get_contained_resources, get_extensions, get_items, get_urls};
pub use crate::core::{AssembleConfig, AssembleContext, Assembler, assemble};
pub use error::Result;
pub use error::{AssembleError, FetchError, FetchErrorKind};
pub use fetch::{FetchedResource, QuestionnaireFetcher, fetch_subquestionnaires, fetcher_fn};
pub use propagate::{CollectedProperties, check_target_variables, propagate_properties};
pub use types::*;
pub use validation::{ConsistencyValidator, SubquestionnaireCheck};

#[cfg(feature = "directory-fetcher")]
pub use fetch::DirectoryFetcher;
