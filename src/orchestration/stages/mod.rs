// Pipeline stages

mod analyzer;
mod optimizer;
mod requirements;

pub use analyzer::{AnalyzerStage, group_by_material, rank_by_emissions};
pub use optimizer::{NO_REQUIREMENTS_NOTE, OptimizerInput, OptimizerStage, RequirementsContext};
pub use requirements::RequirementsStage;

use super::types::StageKind;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// One step of the pipeline with a declared input and output schema.
///
/// The orchestrator renders [`Stage::instructions`], [`Stage::output_schema`]
/// and [`Stage::payload`] into a prompt, parses the generator's text into
/// [`Stage::Response`], then hands it to [`Stage::finalize`], which checks it
/// against the input and builds the typed output.
pub trait Stage: Send + Sync {
    type Input: Sync;
    type Response: DeserializeOwned;
    type Output;

    fn kind(&self) -> StageKind;

    /// Fixed instructions for the generator
    fn instructions(&self) -> &str;

    /// JSON structure the generator must answer with
    fn output_schema(&self) -> &str;

    /// Serialized input handed to the generator
    fn payload(&self, input: &Self::Input) -> Result<String, serde_json::Error>;

    fn finalize(&self, input: &Self::Input, response: Self::Response) -> Result<Self::Output, StageError>;
}

pub(crate) fn to_payload<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Non-blank, trimmed entries
pub(crate) fn clean_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Output that parsed but does not satisfy the stage's contract
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("Missing or empty field: {0}")]
    MissingField(&'static str),

    #[error("Unknown product referenced: {0}")]
    UnknownProduct(String),

    #[error("No recommendation for product: {0}")]
    MissingRecommendation(String),

    #[error("More than one recommendation for product: {0}")]
    DuplicateRecommendation(String),

    #[error("Recommendation for {0} has no actionable strategy")]
    EmptyStrategies(String),
}
