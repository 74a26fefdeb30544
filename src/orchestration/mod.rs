// Orchestration - the Analyzer, Requirements and Optimizer pipeline

pub mod extract;
pub mod generator;
pub mod ingest;
pub mod orchestrator;
pub mod stages;
pub mod store;
pub mod types;

pub use extract::{ExtractError, JsonExtraction, extract_json_object, parse_json_object};
pub use generator::{Generator, GeneratorError, OllamaGenerator, StagePrompt};
pub use ingest::{CarbonData, EmissionsSummary, InputError, ProductFootprint};
pub use orchestrator::{Orchestrator, PipelineError};
pub use stages::{Stage, StageError};
pub use store::{FileRequirementsStore, InMemoryRequirementsStore, RequirementsStore, StoreError};
pub use types::*;
