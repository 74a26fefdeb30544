// Requirements stage - drafts the business requirements artifact

use super::{Stage, StageError, clean_lines, to_payload};
use crate::orchestration::types::{AnalysisResult, BusinessRequirements, StageKind};
use chrono::Utc;
use serde::Deserialize;

const INSTRUCTIONS: &str = r#"You capture business requirements for a carbon reduction programme.

From the analysis you are given, take the most critical challenges, opportunities and quick wins and draft a concise requirements document:
- objectives: what the business wants to achieve
- success_criteria: measurable criteria, each tied to a product or material from the analysis
- stakeholders: teams or roles that must be involved
- constraints: operational, cost or supply limits the plan must respect

Focus on high and medium impact products. Do not invent emission figures; refer only to numbers present in the analysis."#;

const OUTPUT_SCHEMA: &str = r#"{
  "objectives": ["string"],
  "success_criteria": ["string"],
  "stakeholders": ["string"],
  "constraints": ["string"]
}"#;

pub struct RequirementsStage;

impl RequirementsStage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RequirementsStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for RequirementsStage {
    type Input = AnalysisResult;
    type Response = RequirementsDraft;
    type Output = BusinessRequirements;

    fn kind(&self) -> StageKind {
        StageKind::Requirements
    }

    fn instructions(&self) -> &str {
        INSTRUCTIONS
    }

    fn output_schema(&self) -> &str {
        OUTPUT_SCHEMA
    }

    fn payload(&self, analysis: &AnalysisResult) -> Result<String, serde_json::Error> {
        to_payload(analysis)
    }

    fn finalize(&self, _analysis: &AnalysisResult, draft: RequirementsDraft) -> Result<BusinessRequirements, StageError> {
        let objectives = clean_lines(draft.objectives);
        if objectives.is_empty() {
            return Err(StageError::MissingField("objectives"));
        }

        let success_criteria = clean_lines(draft.success_criteria);
        if success_criteria.is_empty() {
            return Err(StageError::MissingField("success_criteria"));
        }

        Ok(BusinessRequirements {
            objectives,
            success_criteria,
            stakeholders: clean_lines(draft.stakeholders),
            constraints: clean_lines(draft.constraints),
            generated_at: Some(Utc::now()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RequirementsDraft {
    #[serde(default)]
    objectives: Vec<String>,
    #[serde(default)]
    success_criteria: Vec<String>,
    #[serde(default)]
    stakeholders: Vec<String>,
    #[serde(default)]
    constraints: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::types::{AnalysisSummary, ImpactCategories, OptimizationPriorities};

    fn empty_analysis() -> AnalysisResult {
        AnalysisResult {
            impact_categories: ImpactCategories::default(),
            material_insights: Vec::new(),
            top_emitters_ranking: Vec::new(),
            optimization_priorities: OptimizationPriorities::default(),
            key_patterns: vec!["x".to_string()],
            analysis_summary: AnalysisSummary::default(),
        }
    }

    #[test]
    fn test_draft_is_cleaned_and_stamped() {
        let draft: RequirementsDraft = serde_json::from_str(
            r#"{
                "objectives": ["Cut steel frame emissions", " "],
                "success_criteria": ["Steel Frame below 60% of total by Q4"],
                "stakeholders": ["Procurement", "Engineering"]
            }"#,
        )
        .unwrap();

        let artifact = RequirementsStage::new().finalize(&empty_analysis(), draft).unwrap();
        assert_eq!(artifact.objectives, vec!["Cut steel frame emissions".to_string()]);
        assert_eq!(artifact.stakeholders.len(), 2);
        assert!(artifact.constraints.is_empty());
        assert!(artifact.generated_at.is_some());
    }

    #[test]
    fn test_requires_objectives_and_criteria() {
        let stage = RequirementsStage::new();

        let draft: RequirementsDraft = serde_json::from_str(r#"{"success_criteria": ["x"]}"#).unwrap();
        assert!(matches!(
            stage.finalize(&empty_analysis(), draft),
            Err(StageError::MissingField("objectives"))
        ));

        let draft: RequirementsDraft = serde_json::from_str(r#"{"objectives": ["x"]}"#).unwrap();
        assert!(matches!(
            stage.finalize(&empty_analysis(), draft),
            Err(StageError::MissingField("success_criteria"))
        ));
    }
}
