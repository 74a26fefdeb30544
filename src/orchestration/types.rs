// Core types for the carbon pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Share of total emissions above which a product is High impact.
pub const HIGH_IMPACT_THRESHOLD: f64 = 40.0;

/// Share of total emissions below which a product is Low impact.
pub const LOW_IMPACT_THRESHOLD: f64 = 15.0;

/// Impact classification of a product by its share of total emissions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ImpactBucket {
    High,
    Medium,
    Low,
}

impl ImpactBucket {
    pub const ALL: [ImpactBucket; 3] = [ImpactBucket::High, ImpactBucket::Medium, ImpactBucket::Low];

    /// Classify a percentage of total emissions.
    ///
    /// `> 40` is High, `15..=40` is Medium and `< 15` is Low, so both
    /// boundary values land in Medium.
    pub fn classify(percentage_of_total: f64) -> Self {
        if percentage_of_total > HIGH_IMPACT_THRESHOLD {
            ImpactBucket::High
        } else if percentage_of_total >= LOW_IMPACT_THRESHOLD {
            ImpactBucket::Medium
        } else {
            ImpactBucket::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactBucket::High => "High Impact",
            ImpactBucket::Medium => "Medium Impact",
            ImpactBucket::Low => "Low Impact",
        }
    }

    pub fn rule(&self) -> &'static str {
        match self {
            ImpactBucket::High => "contributes more than 40% of total emissions",
            ImpactBucket::Medium => "contributes between 15% and 40% of total emissions",
            ImpactBucket::Low => "contributes less than 15% of total emissions",
        }
    }

    /// Whether optimization recommendations are produced for this bucket
    pub fn is_optimized(&self) -> bool {
        !matches!(self, ImpactBucket::Low)
    }
}

impl fmt::Display for ImpactBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One product's pre-computed footprint. Never recomputed by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub product_name: String,
    pub material_type: String,
    pub weight_kg: f64,
    pub emission_factor: f64,
    pub total_emissions: f64,
    pub percentage_of_total: f64,
}

impl LineItem {
    pub fn bucket(&self) -> ImpactBucket {
        ImpactBucket::classify(self.percentage_of_total)
    }
}

/// A line item placed in a bucket, with the reason for the placement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifiedItem {
    #[serde(flatten)]
    pub item: LineItem,
    pub category_reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImpactCategories {
    pub high_impact: Vec<ClassifiedItem>,
    pub medium_impact: Vec<ClassifiedItem>,
    pub low_impact: Vec<ClassifiedItem>,
}

impl ImpactCategories {
    pub fn bucket(&self, bucket: ImpactBucket) -> &[ClassifiedItem] {
        match bucket {
            ImpactBucket::High => &self.high_impact,
            ImpactBucket::Medium => &self.medium_impact,
            ImpactBucket::Low => &self.low_impact,
        }
    }

    pub fn bucket_mut(&mut self, bucket: ImpactBucket) -> &mut Vec<ClassifiedItem> {
        match bucket {
            ImpactBucket::High => &mut self.high_impact,
            ImpactBucket::Medium => &mut self.medium_impact,
            ImpactBucket::Low => &mut self.low_impact,
        }
    }

    /// All classified items, High first, each paired with its bucket
    pub fn iter(&self) -> impl Iterator<Item = (ImpactBucket, &ClassifiedItem)> {
        ImpactBucket::ALL
            .into_iter()
            .flat_map(move |bucket| self.bucket(bucket).iter().map(move |item| (bucket, item)))
    }

    pub fn find(&self, product_name: &str) -> Option<(ImpactBucket, &ClassifiedItem)> {
        self.iter().find(|(_, c)| c.item.product_name == product_name)
    }

    pub fn len(&self) -> usize {
        self.high_impact.len() + self.medium_impact.len() + self.low_impact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Products sharing a material type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialInsight {
    pub material_type: String,
    /// Emission factor of the first product using this material
    pub emission_factor: f64,
    pub products: Vec<String>,
    #[serde(default)]
    pub environmental_profile: String,
    #[serde(default)]
    pub key_observation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedEmitter {
    pub rank: usize,
    pub product_name: String,
    pub emissions: f64,
    pub percentage: f64,
    #[serde(default)]
    pub why_this_matters: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriorityItem {
    pub product: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OptimizationPriorities {
    #[serde(default)]
    pub quick_wins: Vec<PriorityItem>,
    #[serde(default)]
    pub strategic_targets: Vec<PriorityItem>,
    #[serde(default)]
    pub low_priority: Vec<String>,
}

impl OptimizationPriorities {
    /// Every product name referenced by the priorities
    pub fn product_names(&self) -> impl Iterator<Item = &str> {
        self.quick_wins
            .iter()
            .chain(&self.strategic_targets)
            .map(|p| p.product.as_str())
            .chain(self.low_priority.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisSummary {
    #[serde(default)]
    pub dominant_emitter: String,
    #[serde(default)]
    pub primary_concern: String,
    #[serde(default)]
    pub recommended_focus: String,
}

/// Output of the analyzer stage; a read-only snapshot per run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub impact_categories: ImpactCategories,
    pub material_insights: Vec<MaterialInsight>,
    pub top_emitters_ranking: Vec<RankedEmitter>,
    pub optimization_priorities: OptimizationPriorities,
    /// Opaque narrative, only checked for presence
    pub key_patterns: Vec<String>,
    pub analysis_summary: AnalysisSummary,
}

/// Persisted business requirements, overwritten on every run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusinessRequirements {
    pub objectives: Vec<String>,
    pub success_criteria: Vec<String>,
    #[serde(default)]
    pub stakeholders: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

/// Fixed taxonomy of optimization strategies
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StrategyType {
    #[serde(rename = "Material Substitution", alias = "MaterialSubstitution")]
    MaterialSubstitution,
    #[serde(
        rename = "Supplier Engagement",
        alias = "SupplierEngagement",
        alias = "Supplier Engagement & Sourcing"
    )]
    SupplierEngagement,
    #[serde(rename = "Product Redesign", alias = "ProductRedesign")]
    ProductRedesign,
    #[serde(rename = "Process Improvement", alias = "ProcessImprovement")]
    ProcessImprovement,
}

impl StrategyType {
    pub const ALL: [StrategyType; 4] = [
        StrategyType::MaterialSubstitution,
        StrategyType::SupplierEngagement,
        StrategyType::ProductRedesign,
        StrategyType::ProcessImprovement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::MaterialSubstitution => "Material Substitution",
            StrategyType::SupplierEngagement => "Supplier Engagement",
            StrategyType::ProductRedesign => "Product Redesign",
            StrategyType::ProcessImprovement => "Process Improvement",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PrimaryIssue {
    #[serde(rename = "High Emission Factor", alias = "HighEmissionFactor")]
    HighEmissionFactor,
    #[serde(rename = "High Volume", alias = "HighVolume")]
    HighVolume,
    #[serde(rename = "Both")]
    Both,
}

impl PrimaryIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimaryIssue::HighEmissionFactor => "High Emission Factor",
            PrimaryIssue::HighVolume => "High Volume",
            PrimaryIssue::Both => "Both",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposedStrategy {
    pub strategy_type: StrategyType,
    pub specific_actions: Vec<String>,
    #[serde(default)]
    pub expected_outcome: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRecommendation {
    pub product_name: String,
    pub current_material: String,
    pub primary_issue: PrimaryIssue,
    pub proposed_strategies: Vec<ProposedStrategy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OptimizationStrategies {
    pub high_impact_recommendations: Vec<ProductRecommendation>,
    pub medium_impact_recommendations: Vec<ProductRecommendation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StrategicSummary {
    #[serde(default)]
    pub overall_recommendation: String,
    #[serde(default)]
    pub synergy_opportunities: String,
}

/// Final output of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizationPlan {
    pub optimization_strategies: OptimizationStrategies,
    pub strategic_summary: StrategicSummary,
}

impl OptimizationPlan {
    pub fn recommendations(&self) -> impl Iterator<Item = &ProductRecommendation> {
        self.optimization_strategies
            .high_impact_recommendations
            .iter()
            .chain(&self.optimization_strategies.medium_impact_recommendations)
    }

    pub fn find(&self, product_name: &str) -> Option<&ProductRecommendation> {
        self.recommendations().find(|r| r.product_name == product_name)
    }
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StageKind {
    Analyzer,
    Requirements,
    Optimizer,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Analyzer => "Analyzer",
            StageKind::Requirements => "Requirements",
            StageKind::Optimizer => "Optimizer",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StageKind::Analyzer => "Categorizes products by emissions impact and narrates patterns",
            StageKind::Requirements => "Drafts the business requirements artifact from the analysis",
            StageKind::Optimizer => "Recommends reduction strategies for high and medium impact products",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a successful run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub analysis: AnalysisResult,
    /// Requirements the optimizer saw; `None` when the placeholder was used
    pub requirements: Option<BusinessRequirements>,
    pub plan: OptimizationPlan,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_thresholds() {
        assert_eq!(ImpactBucket::classify(68.44), ImpactBucket::High);
        assert_eq!(ImpactBucket::classify(18.50), ImpactBucket::Medium);
        assert_eq!(ImpactBucket::classify(13.07), ImpactBucket::Low);
    }

    #[test]
    fn test_bucket_boundaries_are_medium() {
        assert_eq!(ImpactBucket::classify(40.0), ImpactBucket::Medium);
        assert_eq!(ImpactBucket::classify(40.01), ImpactBucket::High);
        assert_eq!(ImpactBucket::classify(15.0), ImpactBucket::Medium);
        assert_eq!(ImpactBucket::classify(14.99), ImpactBucket::Low);
    }

    #[test]
    fn test_strategy_type_wire_names() {
        let parsed: StrategyType = serde_json::from_str("\"Material Substitution\"").unwrap();
        assert_eq!(parsed, StrategyType::MaterialSubstitution);

        let alias: StrategyType = serde_json::from_str("\"Supplier Engagement & Sourcing\"").unwrap();
        assert_eq!(alias, StrategyType::SupplierEngagement);

        assert!(serde_json::from_str::<StrategyType>("\"Be More Green\"").is_err());
        assert_eq!(
            serde_json::to_string(&StrategyType::ProductRedesign).unwrap(),
            "\"Product Redesign\""
        );
    }

    #[test]
    fn test_classified_item_flattens_line_item() {
        let item = ClassifiedItem {
            item: LineItem {
                product_name: "Steel Frame".to_string(),
                material_type: "Steel".to_string(),
                weight_kg: 3000.0,
                emission_factor: 1.85,
                total_emissions: 5550.0,
                percentage_of_total: 68.44,
            },
            category_reason: "dominant".to_string(),
        };

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["product_name"], "Steel Frame");
        assert_eq!(value["category_reason"], "dominant");

        let back: ClassifiedItem = serde_json::from_value(value).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_stage_descriptions() {
        let analyzer = StageKind::Analyzer;
        assert_eq!(analyzer.as_str(), "Analyzer");
        assert!(!analyzer.description().is_empty());
    }
}
