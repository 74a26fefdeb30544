// Analyzer stage - partitions products by impact and merges generated narrative

use super::{Stage, StageError, clean_lines, to_payload};
use crate::orchestration::types::{
    AnalysisResult, AnalysisSummary, ClassifiedItem, HIGH_IMPACT_THRESHOLD, ImpactBucket,
    ImpactCategories, LOW_IMPACT_THRESHOLD, LineItem, MaterialInsight, OptimizationPriorities,
    PriorityItem, RankedEmitter, StageKind,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

const INSTRUCTIONS: &str = r#"You are the Analyzer, a data analysis specialist for carbon emissions.

All calculations are already done. Do not calculate, round or alter any number; your job is to interpret and narrate the data you are given.

Each product arrives with its impact bucket already assigned by fixed thresholds:
- high: more than 40% of total emissions
- medium: 15% to 40% of total emissions
- low: less than 15% of total emissions
Keep every product in the bucket it was given.

Provide:
1. A specific reason for each product's bucket.
2. For each material type, its carbon intensity profile ("High", "Medium" or "Low carbon intensity") and one key observation, e.g. whether its emissions come from the emission factor or from volume.
3. Why each product's position in the emissions ranking matters.
4. Optimization priorities: quick wins (medium emitters with easy alternatives), strategic targets (high emitters that need complex changes) and low priority products.
5. Key patterns in the data: which products dominate, factor versus volume, outliers.
6. A short summary naming the dominant emitter, the primary concern and where to start.

Use product and material names exactly as given. Your output guides the Optimizer's recommendations."#;

const OUTPUT_SCHEMA: &str = r#"{
  "impact_categories": {
    "high_impact": [{"product_name": "string", "category_reason": "why this bucket, be specific"}],
    "medium_impact": [...same structure...],
    "low_impact": [...same structure...]
  },
  "material_insights": {
    "<material_type>": {
      "environmental_profile": "High/Medium/Low carbon intensity",
      "key_observation": "specific insight about this material"
    }
  },
  "top_emitters_ranking": [{"product_name": "string", "why_this_matters": "brief explanation"}],
  "optimization_priorities": {
    "quick_wins": [{"product": "product name", "reason": "why this is a quick win"}],
    "strategic_targets": [{"product": "product name", "reason": "why this needs strategic focus"}],
    "low_priority": ["product names"]
  },
  "key_patterns": ["observation from the data", "..."],
  "analysis_summary": {
    "dominant_emitter": "product name and percentage",
    "primary_concern": "material type, volume or both",
    "recommended_focus": "where to start optimization"
  }
}"#;

/// Classifies line items and asks the generator to narrate the result
pub struct AnalyzerStage;

impl AnalyzerStage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AnalyzerStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for AnalyzerStage {
    type Input = Vec<LineItem>;
    type Response = AnalyzerResponse;
    type Output = AnalysisResult;

    fn kind(&self) -> StageKind {
        StageKind::Analyzer
    }

    fn instructions(&self) -> &str {
        INSTRUCTIONS
    }

    fn output_schema(&self) -> &str {
        OUTPUT_SCHEMA
    }

    fn payload(&self, items: &Vec<LineItem>) -> Result<String, serde_json::Error> {
        let products: Vec<_> = items
            .iter()
            .map(|item| BucketedItem {
                item,
                impact_bucket: item.bucket(),
            })
            .collect();

        to_payload(&AnalyzerPayload {
            products,
            thresholds: Thresholds {
                high_above: HIGH_IMPACT_THRESHOLD,
                low_below: LOW_IMPACT_THRESHOLD,
            },
        })
    }

    fn finalize(&self, items: &Vec<LineItem>, response: AnalyzerResponse) -> Result<AnalysisResult, StageError> {
        let by_name: HashMap<&str, &LineItem> =
            items.iter().map(|i| (i.product_name.as_str(), i)).collect();
        let lookup = |name: &str| {
            by_name
                .get(name.trim())
                .copied()
                .ok_or_else(|| StageError::UnknownProduct(name.to_string()))
        };

        // Narrated reasons, kept only where the narrative agrees with the thresholds
        let mut reasons: HashMap<&str, String> = HashMap::new();
        let narrated = response.impact_categories;
        for (bucket, entries) in [
            (ImpactBucket::High, narrated.high_impact),
            (ImpactBucket::Medium, narrated.medium_impact),
            (ImpactBucket::Low, narrated.low_impact),
        ] {
            for entry in entries {
                let item = lookup(&entry.product_name)?;
                if item.bucket() != bucket {
                    tracing::warn!(
                        product = %item.product_name,
                        narrated = %bucket,
                        assigned = %item.bucket(),
                        "narrative bucket disagrees with thresholds, keeping threshold bucket"
                    );
                    continue;
                }
                let reason = entry.category_reason.trim();
                if !reason.is_empty() {
                    reasons.insert(item.product_name.as_str(), reason.to_string());
                }
            }
        }

        let mut impact_categories = ImpactCategories::default();
        for item in items {
            let bucket = item.bucket();
            let category_reason = reasons
                .remove(item.product_name.as_str())
                .unwrap_or_else(|| default_reason(item, bucket));
            impact_categories.bucket_mut(bucket).push(ClassifiedItem {
                item: item.clone(),
                category_reason,
            });
        }

        let mut why: HashMap<&str, String> = HashMap::new();
        for entry in response.top_emitters_ranking {
            let item = lookup(&entry.product_name)?;
            why.insert(item.product_name.as_str(), entry.why_this_matters.trim().to_string());
        }

        let top_emitters_ranking = rank_by_emissions(items)
            .into_iter()
            .enumerate()
            .map(|(index, item)| RankedEmitter {
                rank: index + 1,
                product_name: item.product_name.clone(),
                emissions: item.total_emissions,
                percentage: item.percentage_of_total,
                why_this_matters: why.remove(item.product_name.as_str()).unwrap_or_default(),
            })
            .collect();

        let material_insights = merge_material_narrative(items, response.material_insights);

        let priorities = normalize_priorities(response.optimization_priorities);
        for name in priorities.product_names() {
            lookup(name)?;
        }

        let key_patterns = clean_lines(response.key_patterns);
        if key_patterns.is_empty() {
            return Err(StageError::MissingField("key_patterns"));
        }

        Ok(AnalysisResult {
            impact_categories,
            material_insights,
            top_emitters_ranking,
            optimization_priorities: priorities,
            key_patterns,
            analysis_summary: response.analysis_summary,
        })
    }
}

/// Products ordered by total emissions, highest first. Ties keep input order.
pub fn rank_by_emissions(items: &[LineItem]) -> Vec<&LineItem> {
    let mut ranked: Vec<&LineItem> = items.iter().collect();
    // partial_cmp treats -0.0 and 0.0 as equal, unlike total_cmp
    ranked.sort_by(|a, b| {
        b.total_emissions
            .partial_cmp(&a.total_emissions)
            .unwrap_or(Ordering::Equal)
    });
    ranked
}

/// Items grouped by material type, in order of first appearance
pub fn group_by_material(items: &[LineItem]) -> Vec<(&str, Vec<&LineItem>)> {
    let mut groups: Vec<(&str, Vec<&LineItem>)> = Vec::new();
    for item in items {
        match groups.iter_mut().find(|(material, _)| *material == item.material_type) {
            Some((_, members)) => members.push(item),
            None => groups.push((item.material_type.as_str(), vec![item])),
        }
    }
    groups
}

fn default_reason(item: &LineItem, bucket: ImpactBucket) -> String {
    format!(
        "{} {} ({:.2}%)",
        item.product_name,
        bucket.rule(),
        item.percentage_of_total
    )
}

fn merge_material_narrative(
    items: &[LineItem],
    mut narrative: HashMap<String, MaterialNarrative>,
) -> Vec<MaterialInsight> {
    let groups = group_by_material(items);

    let insights: Vec<MaterialInsight> = groups
        .iter()
        .map(|(material, members)| {
            let key = narrative
                .keys()
                .find(|k| k.trim().eq_ignore_ascii_case(material))
                .cloned();
            let notes = key.and_then(|k| narrative.remove(&k)).unwrap_or_default();

            MaterialInsight {
                material_type: material.to_string(),
                emission_factor: members[0].emission_factor,
                products: members.iter().map(|m| m.product_name.clone()).collect(),
                environmental_profile: notes.environmental_profile.trim().to_string(),
                key_observation: notes.key_observation.trim().to_string(),
            }
        })
        .collect();

    for material in narrative.keys() {
        tracing::warn!(%material, "ignoring narrative for a material not in the input");
    }

    insights
}

fn normalize_priorities(priorities: OptimizationPriorities) -> OptimizationPriorities {
    let trim_items = |items: Vec<PriorityItem>| {
        items
            .into_iter()
            .map(|mut p| {
                p.product = p.product.trim().to_string();
                p.reason = p.reason.trim().to_string();
                p
            })
            .collect::<Vec<_>>()
    };

    let mut seen = HashSet::new();
    let low_priority = clean_lines(priorities.low_priority)
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect();

    OptimizationPriorities {
        quick_wins: trim_items(priorities.quick_wins),
        strategic_targets: trim_items(priorities.strategic_targets),
        low_priority,
    }
}

#[derive(Serialize)]
struct AnalyzerPayload<'a> {
    products: Vec<BucketedItem<'a>>,
    thresholds: Thresholds,
}

#[derive(Serialize)]
struct BucketedItem<'a> {
    #[serde(flatten)]
    item: &'a LineItem,
    impact_bucket: ImpactBucket,
}

#[derive(Serialize)]
struct Thresholds {
    high_above: f64,
    low_below: f64,
}

/// Generator answer for the analyzer. Numbers in the answer are ignored.
#[derive(Debug, Deserialize)]
pub struct AnalyzerResponse {
    #[serde(default)]
    impact_categories: NarratedCategories,
    #[serde(default)]
    material_insights: HashMap<String, MaterialNarrative>,
    #[serde(default)]
    top_emitters_ranking: Vec<RankNarrative>,
    #[serde(default)]
    optimization_priorities: OptimizationPriorities,
    key_patterns: Vec<String>,
    #[serde(default)]
    analysis_summary: AnalysisSummary,
}

#[derive(Debug, Default, Deserialize)]
struct NarratedCategories {
    #[serde(default)]
    high_impact: Vec<CategoryNarrative>,
    #[serde(default)]
    medium_impact: Vec<CategoryNarrative>,
    #[serde(default)]
    low_impact: Vec<CategoryNarrative>,
}

#[derive(Debug, Deserialize)]
struct CategoryNarrative {
    product_name: String,
    #[serde(default)]
    category_reason: String,
}

#[derive(Debug, Default, Deserialize)]
struct MaterialNarrative {
    #[serde(default)]
    environmental_profile: String,
    #[serde(default)]
    key_observation: String,
}

#[derive(Debug, Deserialize)]
struct RankNarrative {
    product_name: String,
    #[serde(default)]
    why_this_matters: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, material: &str, total: f64, percentage: f64) -> LineItem {
        LineItem {
            product_name: name.to_string(),
            material_type: material.to_string(),
            weight_kg: 1.0,
            emission_factor: 2.0,
            total_emissions: total,
            percentage_of_total: percentage,
        }
    }

    fn sample_items() -> Vec<LineItem> {
        vec![
            item("Cotton T-Shirt", "Cotton", 1060.0, 13.07),
            item("Steel Frame", "Steel", 5550.0, 68.44),
            item("Plastic Case", "Plastic", 1500.0, 18.50),
        ]
    }

    fn response(json: &str) -> AnalyzerResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_partition_and_ranking() {
        let stage = AnalyzerStage::new();
        let items = sample_items();
        let result = stage
            .finalize(&items, response(r#"{"key_patterns": ["Steel dominates"]}"#))
            .unwrap();

        let cats = &result.impact_categories;
        assert_eq!(cats.len(), items.len());
        assert_eq!(cats.high_impact[0].item.product_name, "Steel Frame");
        assert_eq!(cats.medium_impact[0].item.product_name, "Plastic Case");
        assert_eq!(cats.low_impact[0].item.product_name, "Cotton T-Shirt");

        let ranking: Vec<_> = result
            .top_emitters_ranking
            .iter()
            .map(|r| (r.rank, r.product_name.as_str()))
            .collect();
        assert_eq!(
            ranking,
            vec![(1, "Steel Frame"), (2, "Plastic Case"), (3, "Cotton T-Shirt")]
        );
    }

    #[test]
    fn test_ranking_ties_keep_input_order() {
        let items = vec![
            item("A", "Steel", 100.0, 25.0),
            item("B", "Steel", 300.0, 50.0),
            item("C", "Wood", 100.0, 25.0),
        ];

        let names: Vec<_> = rank_by_emissions(&items)
            .iter()
            .map(|i| i.product_name.as_str())
            .collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_signed_zero_totals_tie() {
        let items = vec![
            item("Zero", "Steel", 0.0, 0.0),
            item("Negative Zero", "Wood", -0.0, 0.0),
            item("Top", "Steel", 10.0, 100.0),
            item("Also Zero", "Cotton", 0.0, 0.0),
        ];

        let names: Vec<_> = rank_by_emissions(&items)
            .iter()
            .map(|i| i.product_name.as_str())
            .collect();
        assert_eq!(names, vec!["Top", "Zero", "Negative Zero", "Also Zero"]);
    }

    #[test]
    fn test_group_by_material_first_appearance() {
        let items = vec![
            item("A", "Steel", 1.0, 10.0),
            item("B", "Wood", 1.0, 10.0),
            item("C", "Steel", 1.0, 10.0),
        ];

        let groups = group_by_material(&items);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "Steel");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "Wood");
    }

    #[test]
    fn test_narrative_is_merged_but_numbers_are_not() {
        let stage = AnalyzerStage::new();
        let items = sample_items();
        let result = stage
            .finalize(
                &items,
                response(
                    r#"{
                    "impact_categories": {
                        "high_impact": [{"product_name": "Steel Frame", "total_emissions": 1,
                                         "category_reason": "Over two thirds of the total"}]
                    },
                    "material_insights": {
                        "steel": {"emission_factor": 99, "environmental_profile": "Low carbon intensity",
                                  "key_observation": "Volume, not factor"},
                        "Unobtainium": {"environmental_profile": "High carbon intensity"}
                    },
                    "top_emitters_ranking": [{"product_name": "Steel Frame", "emissions": 1,
                                              "why_this_matters": "Dominates"}],
                    "key_patterns": ["  ", "Steel volume drives the total"],
                    "analysis_summary": {"dominant_emitter": "Steel Frame at 68.44%"}
                }"#,
                ),
            )
            .unwrap();

        let steel = &result.impact_categories.high_impact[0];
        assert_eq!(steel.category_reason, "Over two thirds of the total");
        assert_eq!(steel.item.total_emissions, 5550.0);

        let insight = result
            .material_insights
            .iter()
            .find(|m| m.material_type == "Steel")
            .unwrap();
        assert_eq!(insight.emission_factor, 2.0);
        assert_eq!(insight.environmental_profile, "Low carbon intensity");
        assert_eq!(result.material_insights.len(), 3);

        assert_eq!(result.top_emitters_ranking[0].emissions, 5550.0);
        assert_eq!(result.top_emitters_ranking[0].why_this_matters, "Dominates");
        assert_eq!(result.key_patterns, vec!["Steel volume drives the total".to_string()]);
    }

    #[test]
    fn test_narrative_cannot_move_buckets() {
        let stage = AnalyzerStage::new();
        let items = sample_items();
        let result = stage
            .finalize(
                &items,
                response(
                    r#"{
                    "impact_categories": {
                        "high_impact": [{"product_name": "Cotton T-Shirt", "category_reason": "wrong"}]
                    },
                    "key_patterns": ["x"]
                }"#,
                ),
            )
            .unwrap();

        let cotton = &result.impact_categories.low_impact[0];
        assert_eq!(cotton.item.product_name, "Cotton T-Shirt");
        assert_ne!(cotton.category_reason, "wrong");
        assert!(result.impact_categories.high_impact.iter().all(|c| c.item.product_name != "Cotton T-Shirt"));
    }

    #[test]
    fn test_rejects_unknown_products() {
        let stage = AnalyzerStage::new();
        let err = stage
            .finalize(
                &sample_items(),
                response(
                    r#"{
                    "optimization_priorities": {"quick_wins": [{"product": "Glass Jar", "reason": "?"}]},
                    "key_patterns": ["x"]
                }"#,
                ),
            )
            .unwrap_err();

        assert!(matches!(err, StageError::UnknownProduct(name) if name == "Glass Jar"));
    }

    #[test]
    fn test_requires_key_patterns() {
        let stage = AnalyzerStage::new();
        let err = stage
            .finalize(&sample_items(), response(r#"{"key_patterns": []}"#))
            .unwrap_err();
        assert!(matches!(err, StageError::MissingField("key_patterns")));

        assert!(serde_json::from_str::<AnalyzerResponse>("{}").is_err());
    }

    #[test]
    fn test_payload_carries_assigned_buckets() {
        let stage = AnalyzerStage::new();
        let payload = stage.payload(&sample_items()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(value["products"][1]["product_name"], "Steel Frame");
        assert_eq!(value["products"][1]["impact_bucket"], "high");
        assert_eq!(value["products"][0]["impact_bucket"], "low");
        assert_eq!(value["thresholds"]["high_above"], 40.0);
    }
}
