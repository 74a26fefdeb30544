// Orchestrator - runs the stages in order and enforces their contracts

use super::extract::parse_json_object;
use super::generator::{Generator, GeneratorError, OllamaGenerator, StagePrompt};
use super::ingest::{CarbonData, InputError};
use super::stages::{AnalyzerStage, OptimizerInput, OptimizerStage, RequirementsStage, Stage};
use super::store::{FileRequirementsStore, RequirementsStore, StoreError};
use super::types::{
    AnalysisResult, BusinessRequirements, LineItem, OptimizationPlan, PipelineRun, StageKind,
};
use crate::config::PipelineConfig;
use std::sync::Arc;
use std::time::Instant;

/// Sequential pipeline: Analyzer, then Requirements, then Optimizer.
///
/// Each stage only starts once the previous stage's output has been parsed
/// and validated. Nothing runs in parallel.
pub struct Orchestrator {
    config: PipelineConfig,
    generator: Arc<dyn Generator>,
    store: Arc<dyn RequirementsStore>,
}

impl Orchestrator {
    pub fn new(
        generator: Arc<dyn Generator>,
        store: Arc<dyn RequirementsStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            config,
            generator,
            store,
        }
    }

    /// Ollama generator and file-backed requirements store from the config
    pub fn from_config(config: PipelineConfig) -> Result<Self, PipelineError> {
        let generator = OllamaGenerator::new(&config).map_err(PipelineError::Setup)?;
        let store = FileRequirementsStore::new(config.requirements_path.clone());
        Ok(Self::new(Arc::new(generator), Arc::new(store), config))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole pipeline over one footprint document
    pub async fn run(&self, data: &CarbonData) -> Result<PipelineRun, PipelineError> {
        let items = data.line_items()?;
        tracing::info!(products = items.len(), model = self.generator.model(), "starting pipeline");

        let analysis = self.analyze(items).await?;

        // A fresh draft is only persisted once the plan built on it validates
        let drafted = if self.config.draft_requirements {
            Some(self.run_stage(&RequirementsStage::new(), &analysis).await?)
        } else {
            tracing::info!("skipping requirements stage");
            None
        };

        let requirements = match &drafted {
            Some(artifact) => Some(artifact.clone()),
            None => self.load_requirements().await?,
        };
        let plan = self.optimize_with(&analysis, requirements.clone()).await?;

        if let Some(artifact) = &drafted {
            self.store.save(artifact).await?;
            tracing::info!(objectives = artifact.objectives.len(), "saved business requirements");
        }

        tracing::info!(
            recommendations = plan.recommendations().count(),
            "pipeline complete"
        );

        Ok(PipelineRun {
            analysis,
            requirements,
            plan,
        })
    }

    /// Partition, rank and group the products, with generated narrative
    pub async fn analyze(&self, items: Vec<LineItem>) -> Result<AnalysisResult, PipelineError> {
        let analysis = self.run_stage(&AnalyzerStage::new(), &items).await?;

        let categories = &analysis.impact_categories;
        tracing::info!(
            high = categories.high_impact.len(),
            medium = categories.medium_impact.len(),
            low = categories.low_impact.len(),
            "analysis complete"
        );

        Ok(analysis)
    }

    /// Draft the requirements artifact and persist it
    pub async fn draft_requirements(&self, analysis: &AnalysisResult) -> Result<BusinessRequirements, PipelineError> {
        let artifact = self.run_stage(&RequirementsStage::new(), analysis).await?;
        self.store.save(&artifact).await?;
        tracing::info!(objectives = artifact.objectives.len(), "saved business requirements");
        Ok(artifact)
    }

    /// Recommendations for the high and medium impact products, against
    /// whatever requirements are currently persisted
    pub async fn optimize(&self, analysis: &AnalysisResult) -> Result<OptimizationPlan, PipelineError> {
        let requirements = self.load_requirements().await?;
        self.optimize_with(analysis, requirements).await
    }

    async fn load_requirements(&self) -> Result<Option<BusinessRequirements>, PipelineError> {
        let requirements = self.store.load().await?;
        if requirements.is_none() {
            tracing::warn!("no business requirements on record, optimizing without them");
        }
        Ok(requirements)
    }

    pub async fn optimize_with(
        &self,
        analysis: &AnalysisResult,
        requirements: Option<BusinessRequirements>,
    ) -> Result<OptimizationPlan, PipelineError> {
        let input = OptimizerInput::new(analysis, requirements);
        if input.is_empty() {
            tracing::info!("nothing above the low impact threshold, skipping optimizer");
            return Ok(OptimizerStage::empty_plan());
        }

        tracing::debug!(excluded = ?input.excluded(), "low impact products left out");
        self.run_stage(&OptimizerStage::new(), &input).await
    }

    /// Prompt the generator for one stage and validate what comes back
    pub async fn run_stage<S: Stage>(&self, stage: &S, input: &S::Input) -> Result<S::Output, PipelineError> {
        let kind = stage.kind();
        let prompt = build_prompt(stage, input)?;

        tracing::info!(stage = %kind, "{}", kind.description());
        let started = Instant::now();

        let raw = self
            .generator
            .complete(&prompt)
            .await
            .map_err(|source| PipelineError::Generator { stage: kind, source })?;

        tracing::debug!(
            stage = %kind,
            elapsed_ms = started.elapsed().as_millis() as u64,
            bytes = raw.len(),
            "generator responded"
        );

        let response: S::Response = match parse_json_object(&raw) {
            Ok(response) => response,
            Err(e) => return Err(PipelineError::schema(kind, raw, e)),
        };

        match stage.finalize(input, response) {
            Ok(output) => Ok(output),
            Err(e) => Err(PipelineError::schema(kind, raw, e)),
        }
    }
}

fn build_prompt<S: Stage>(stage: &S, input: &S::Input) -> Result<StagePrompt, PipelineError> {
    let kind = stage.kind();
    let payload = stage
        .payload(input)
        .map_err(|source| PipelineError::Payload { stage: kind, source })?;

    let system = format!(
        "{}\n\nOUTPUT REQUIREMENTS:\nRespond with a JSON object in this exact format:\n{}\n\nRespond ONLY with valid JSON, no other text.",
        stage.instructions(),
        stage.output_schema(),
    );

    Ok(StagePrompt {
        stage: kind,
        system,
        user: payload,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] InputError),

    #[error("Failed to set up generator: {0}")]
    Setup(#[source] GeneratorError),

    #[error("{stage} stage call failed: {source}")]
    Generator {
        stage: StageKind,
        #[source]
        source: GeneratorError,
    },

    #[error("{stage} stage returned invalid output: {reason}")]
    SchemaViolation {
        stage: StageKind,
        /// Offending generator text, verbatim
        raw: String,
        reason: String,
    },

    #[error("Requirements store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to serialize {stage} input: {source}")]
    Payload {
        stage: StageKind,
        #[source]
        source: serde_json::Error,
    },
}

impl PipelineError {
    fn schema(stage: StageKind, raw: String, reason: impl ToString) -> Self {
        tracing::warn!(%stage, "stage output rejected");
        PipelineError::SchemaViolation {
            stage,
            raw,
            reason: reason.to_string(),
        }
    }

    /// Stage the failure belongs to, if any
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            PipelineError::Generator { stage, .. }
            | PipelineError::SchemaViolation { stage, .. }
            | PipelineError::Payload { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
