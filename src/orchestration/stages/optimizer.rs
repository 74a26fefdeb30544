// Optimizer stage - reduction strategies for high and medium impact products

use super::{Stage, StageError, clean_lines, to_payload};
use crate::orchestration::types::{
    AnalysisResult, BusinessRequirements, ClassifiedItem, OptimizationPlan, OptimizationPriorities,
    OptimizationStrategies, PrimaryIssue, ProductRecommendation, ProposedStrategy, StageKind,
    StrategicSummary, StrategyType,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stands in for the requirements artifact when none has been saved
pub const NO_REQUIREMENTS_NOTE: &str =
    "No business requirements are on record. Optimize for emissions reduction alone.";

const INSTRUCTIONS: &str = r#"You are the Optimizer, an expert in environmental engineering and sustainable supply chains.

You receive only high and medium impact products; low impact products are out of scope and must not be mentioned. Align every recommendation with the business requirements provided, if any.

For each product, consider:
1. Material Substitution: lower-carbon alternatives such as recycled content, bio-based or sustainably sourced materials. Name the alternative and say why it is better.
2. Supplier Engagement: working with suppliers on lower-carbon material, sourcing from suppliers using renewable energy.
3. Product Redesign: using less material (lightweighting), designing for disassembly and recycling.
4. Process Improvement: manufacturing changes that cut waste or energy use for this material.

Rules:
- Give exactly one entry per product, in the bucket it was given.
- Every strategy needs at least one specific, actionable step. Avoid vague advice like "be more green".
- Ground recommendations in the data (e.g. "since Plastic has a high emission factor...").
- Address the quick wins and strategic targets from the analysis.
- Do not introduce numbers that are not in the input.
- strategy_type must be one of "Material Substitution", "Supplier Engagement", "Product Redesign", "Process Improvement".
- primary_issue must be one of "High Emission Factor", "High Volume", "Both"."#;

const OUTPUT_SCHEMA: &str = r#"{
  "optimization_strategies": {
    "high_impact_recommendations": [
      {
        "product_name": "string (from input)",
        "current_material": "string (from input)",
        "primary_issue": "High Emission Factor | High Volume | Both",
        "proposed_strategies": [
          {
            "strategy_type": "Material Substitution | Supplier Engagement | Product Redesign | Process Improvement",
            "specific_actions": ["Actionable step 1.", "Actionable step 2."],
            "expected_outcome": "expected positive environmental impact"
          }
        ]
      }
    ],
    "medium_impact_recommendations": [...same structure...]
  },
  "strategic_summary": {
    "overall_recommendation": "the most critical action to take",
    "synergy_opportunities": "strategies that can be combined across products"
  }
}"#;

/// Business requirements as presented to the optimizer
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RequirementsContext {
    Documented(BusinessRequirements),
    Absent { note: String },
}

impl From<Option<BusinessRequirements>> for RequirementsContext {
    fn from(requirements: Option<BusinessRequirements>) -> Self {
        match requirements {
            Some(artifact) => RequirementsContext::Documented(artifact),
            None => RequirementsContext::Absent {
                note: NO_REQUIREMENTS_NOTE.to_string(),
            },
        }
    }
}

/// Optimizer input. Low impact products never enter the payload.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizerInput {
    pub high_impact: Vec<ClassifiedItem>,
    pub medium_impact: Vec<ClassifiedItem>,
    pub optimization_priorities: OptimizationPriorities,
    pub key_patterns: Vec<String>,
    pub business_requirements: RequirementsContext,
    #[serde(skip)]
    excluded: Vec<String>,
}

impl OptimizerInput {
    pub fn new(analysis: &AnalysisResult, requirements: Option<BusinessRequirements>) -> Self {
        let categories = &analysis.impact_categories;
        let high_impact = categories.high_impact.clone();
        let medium_impact = categories.medium_impact.clone();
        let excluded: Vec<String> = categories
            .low_impact
            .iter()
            .map(|c| c.item.product_name.clone())
            .collect();

        let in_scope = |name: &str| !excluded.iter().any(|e| e == name);
        let priorities = &analysis.optimization_priorities;
        let optimization_priorities = OptimizationPriorities {
            quick_wins: priorities
                .quick_wins
                .iter()
                .filter(|p| in_scope(&p.product))
                .cloned()
                .collect(),
            strategic_targets: priorities
                .strategic_targets
                .iter()
                .filter(|p| in_scope(&p.product))
                .cloned()
                .collect(),
            low_priority: Vec::new(),
        };

        Self {
            high_impact,
            medium_impact,
            optimization_priorities,
            key_patterns: analysis.key_patterns.clone(),
            business_requirements: requirements.into(),
            excluded,
        }
    }

    /// Low impact product names left out of the payload
    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    pub fn is_empty(&self) -> bool {
        self.high_impact.is_empty() && self.medium_impact.is_empty()
    }

    fn find(&self, product_name: &str) -> Option<&ClassifiedItem> {
        self.high_impact
            .iter()
            .chain(&self.medium_impact)
            .find(|c| c.item.product_name == product_name)
    }
}

pub struct OptimizerStage;

impl OptimizerStage {
    pub fn new() -> Self {
        Self
    }

    /// Plan for an input with nothing to optimize
    pub fn empty_plan() -> OptimizationPlan {
        OptimizationPlan {
            optimization_strategies: OptimizationStrategies::default(),
            strategic_summary: StrategicSummary {
                overall_recommendation: "No high or medium impact products to optimize.".to_string(),
                synergy_opportunities: String::new(),
            },
        }
    }
}

impl Default for OptimizerStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for OptimizerStage {
    type Input = OptimizerInput;
    type Response = OptimizerResponse;
    type Output = OptimizationPlan;

    fn kind(&self) -> StageKind {
        StageKind::Optimizer
    }

    fn instructions(&self) -> &str {
        INSTRUCTIONS
    }

    fn output_schema(&self) -> &str {
        OUTPUT_SCHEMA
    }

    fn payload(&self, input: &OptimizerInput) -> Result<String, serde_json::Error> {
        to_payload(input)
    }

    fn finalize(&self, input: &OptimizerInput, response: OptimizerResponse) -> Result<OptimizationPlan, StageError> {
        let mut found: HashMap<String, ProductRecommendation> = HashMap::new();
        let raw = response.optimization_strategies;

        for rec in raw
            .high_impact_recommendations
            .into_iter()
            .chain(raw.medium_impact_recommendations)
        {
            let name = rec.product_name.trim();
            if input.excluded.iter().any(|e| e == name) {
                tracing::warn!(product = name, "dropping recommendation for low impact product");
                continue;
            }

            let classified = input
                .find(name)
                .ok_or_else(|| StageError::UnknownProduct(name.to_string()))?;
            if found.contains_key(name) {
                return Err(StageError::DuplicateRecommendation(name.to_string()));
            }

            let proposed_strategies: Vec<ProposedStrategy> = rec
                .proposed_strategies
                .into_iter()
                .filter_map(|s| {
                    let specific_actions = clean_lines(s.specific_actions);
                    (!specific_actions.is_empty()).then(|| ProposedStrategy {
                        strategy_type: s.strategy_type,
                        specific_actions,
                        expected_outcome: s.expected_outcome.trim().to_string(),
                    })
                })
                .collect();
            if proposed_strategies.is_empty() {
                return Err(StageError::EmptyStrategies(name.to_string()));
            }

            let material = &classified.item.material_type;
            if !rec.current_material.trim().is_empty() && !rec.current_material.trim().eq_ignore_ascii_case(material) {
                tracing::debug!(product = name, stated = %rec.current_material, %material, "using input material");
            }

            found.insert(
                name.to_string(),
                ProductRecommendation {
                    product_name: classified.item.product_name.clone(),
                    current_material: material.clone(),
                    primary_issue: rec.primary_issue,
                    proposed_strategies,
                },
            );
        }

        let high_impact_recommendations = take_in_order(&mut found, &input.high_impact)?;
        let medium_impact_recommendations = take_in_order(&mut found, &input.medium_impact)?;

        let summary = response.strategic_summary;
        Ok(OptimizationPlan {
            optimization_strategies: OptimizationStrategies {
                high_impact_recommendations,
                medium_impact_recommendations,
            },
            strategic_summary: StrategicSummary {
                overall_recommendation: summary.overall_recommendation.trim().to_string(),
                synergy_opportunities: summary.synergy_opportunities.trim().to_string(),
            },
        })
    }
}

// One recommendation per item, in input order; also re-homes groups the
// generator filed under the wrong bucket
fn take_in_order(
    found: &mut HashMap<String, ProductRecommendation>,
    items: &[ClassifiedItem],
) -> Result<Vec<ProductRecommendation>, StageError> {
    items
        .iter()
        .map(|c| {
            found
                .remove(&c.item.product_name)
                .ok_or_else(|| StageError::MissingRecommendation(c.item.product_name.clone()))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct OptimizerResponse {
    optimization_strategies: RawStrategies,
    #[serde(default)]
    strategic_summary: StrategicSummary,
}

#[derive(Debug, Deserialize)]
struct RawStrategies {
    #[serde(default)]
    high_impact_recommendations: Vec<RawRecommendation>,
    #[serde(default)]
    medium_impact_recommendations: Vec<RawRecommendation>,
}

#[derive(Debug, Deserialize)]
struct RawRecommendation {
    product_name: String,
    #[serde(default)]
    current_material: String,
    primary_issue: PrimaryIssue,
    #[serde(default)]
    proposed_strategies: Vec<RawStrategy>,
}

#[derive(Debug, Deserialize)]
struct RawStrategy {
    strategy_type: StrategyType,
    #[serde(default)]
    specific_actions: Vec<String>,
    #[serde(default)]
    expected_outcome: String,
}
