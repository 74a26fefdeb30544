// Charts - Plotly figure specs built from pipeline output

use crate::orchestration::types::{AnalysisResult, ImpactBucket, OptimizationPlan, StrategyType};
use serde::Serialize;
use serde_json::{Value, json};

const HIGH_COLOR: &str = "#ef4444";
const MEDIUM_COLOR: &str = "#f59e0b";
const LOW_COLOR: &str = "#22c55e";
const NEUTRAL_COLOR: &str = "#94a3b8";

const STRATEGY_COLORS: [&str; 4] = ["#3b82f6", "#8b5cf6", "#ec4899", "#14b8a6"];

/// A Plotly figure: traces plus layout, handed to `Plotly.newPlot` as is
#[derive(Debug, Clone, Serialize)]
pub struct Figure {
    pub data: Vec<Value>,
    pub layout: Value,
}

pub fn bucket_color(bucket: ImpactBucket) -> &'static str {
    match bucket {
        ImpactBucket::High => HIGH_COLOR,
        ImpactBucket::Medium => MEDIUM_COLOR,
        ImpactBucket::Low => LOW_COLOR,
    }
}

/// Colour for a free-text environmental profile such as "High Impact"
pub fn profile_color(profile: &str) -> &'static str {
    let profile = profile.to_ascii_lowercase();
    if profile.contains("low") {
        LOW_COLOR
    } else if profile.contains("medium") {
        MEDIUM_COLOR
    } else if profile.contains("high") {
        HIGH_COLOR
    } else {
        NEUTRAL_COLOR
    }
}

fn emissions_trace(analysis: &AnalysisResult, xaxis: &str, yaxis: &str) -> Value {
    let categories = &analysis.impact_categories;
    let names: Vec<&str> = categories.iter().map(|(_, c)| c.item.product_name.as_str()).collect();
    let emissions: Vec<f64> = categories.iter().map(|(_, c)| c.item.total_emissions).collect();
    let colors: Vec<&str> = categories.iter().map(|(b, _)| bucket_color(b)).collect();
    let labels: Vec<String> = emissions.iter().map(|e| format!("{e:.0} kg CO2e")).collect();

    json!({
        "type": "bar",
        "x": names,
        "y": emissions,
        "marker": {"color": colors},
        "text": labels,
        "textposition": "outside",
        "name": "Emissions",
        "xaxis": xaxis,
        "yaxis": yaxis,
    })
}

fn bucket_pie(analysis: &AnalysisResult, domain: Value) -> Value {
    let labels: Vec<&str> = ImpactBucket::ALL.iter().map(|b| b.as_str()).collect();
    let counts: Vec<usize> = ImpactBucket::ALL
        .iter()
        .map(|b| analysis.impact_categories.bucket(*b).len())
        .collect();
    let colors: Vec<&str> = ImpactBucket::ALL.iter().map(|b| bucket_color(*b)).collect();

    json!({
        "type": "pie",
        "labels": labels,
        "values": counts,
        "marker": {"colors": colors},
        "hole": 0.4,
        "textinfo": "label+value",
        "domain": domain,
    })
}

fn material_trace(analysis: &AnalysisResult, xaxis: &str, yaxis: &str) -> Value {
    let insights = &analysis.material_insights;
    let materials: Vec<&str> = insights.iter().map(|m| m.material_type.as_str()).collect();
    let factors: Vec<f64> = insights.iter().map(|m| m.emission_factor).collect();
    let colors: Vec<&str> = insights.iter().map(|m| profile_color(&m.environmental_profile)).collect();
    let labels: Vec<String> = factors.iter().map(|f| format!("{f:.2}")).collect();

    json!({
        "type": "bar",
        "x": materials,
        "y": factors,
        "marker": {"color": colors},
        "text": labels,
        "textposition": "outside",
        "name": "Emission Factor",
        "xaxis": xaxis,
        "yaxis": yaxis,
    })
}

fn ranking_trace(analysis: &AnalysisResult, xaxis: &str, yaxis: &str) -> Value {
    let ranking = &analysis.top_emitters_ranking;
    let names: Vec<&str> = ranking.iter().map(|r| r.product_name.as_str()).collect();
    let percentages: Vec<f64> = ranking.iter().map(|r| r.percentage).collect();
    let colors: Vec<&str> = ranking
        .iter()
        .map(|r| bucket_color(ImpactBucket::classify(r.percentage)))
        .collect();
    let labels: Vec<String> = percentages.iter().map(|p| format!("{p:.1}%")).collect();

    json!({
        "type": "bar",
        "x": names,
        "y": percentages,
        "marker": {"color": colors},
        "text": labels,
        "textposition": "outside",
        "name": "% of Total",
        "xaxis": xaxis,
        "yaxis": yaxis,
    })
}

fn subplot_title(text: &str, x: f64, y: f64) -> Value {
    json!({
        "text": text,
        "x": x,
        "y": y,
        "xref": "paper",
        "yref": "paper",
        "xanchor": "center",
        "yanchor": "bottom",
        "showarrow": false,
        "font": {"size": 16},
    })
}

/// 2x2 overview: emissions by product, bucket split, material factors, ranking
pub fn dashboard(analysis: &AnalysisResult) -> Figure {
    let data = vec![
        emissions_trace(analysis, "x", "y"),
        bucket_pie(analysis, json!({"x": [0.55, 1.0], "y": [0.58, 1.0]})),
        material_trace(analysis, "x2", "y2"),
        ranking_trace(analysis, "x3", "y3"),
    ];

    let layout = json!({
        "title": {"text": "🌱 Carbon Pilot - Analysis Dashboard", "font": {"size": 24}},
        "showlegend": false,
        "height": 800,
        "template": "plotly_white",
        "xaxis": {"domain": [0.0, 0.45], "anchor": "y", "title": {"text": "Products"}},
        "yaxis": {"domain": [0.58, 1.0], "anchor": "x", "title": {"text": "Emissions (kg CO2e)"}},
        "xaxis2": {"domain": [0.0, 0.45], "anchor": "y2", "title": {"text": "Materials"}},
        "yaxis2": {"domain": [0.0, 0.42], "anchor": "x2", "title": {"text": "Emission Factor (kg CO2e/kg)"}},
        "xaxis3": {"domain": [0.55, 1.0], "anchor": "y3", "title": {"text": "Products"}},
        "yaxis3": {"domain": [0.0, 0.42], "anchor": "x3", "title": {"text": "% of Total Emissions"}},
        "annotations": [
            subplot_title("Carbon Emissions by Product", 0.225, 1.0),
            subplot_title("Impact Category Distribution", 0.775, 1.0),
            subplot_title("Material Emission Factors", 0.225, 0.42),
            subplot_title("Top Emitters Ranking", 0.775, 0.42),
        ],
    });

    Figure { data, layout }
}

/// Emissions per product, one trace per bucket so the legend reads by category
pub fn emissions_by_bucket(analysis: &AnalysisResult) -> Figure {
    let data = ImpactBucket::ALL
        .iter()
        .map(|bucket| {
            let items = analysis.impact_categories.bucket(*bucket);
            let names: Vec<&str> = items.iter().map(|c| c.item.product_name.as_str()).collect();
            let emissions: Vec<f64> = items.iter().map(|c| c.item.total_emissions).collect();
            json!({
                "type": "bar",
                "name": bucket.as_str(),
                "x": names,
                "y": emissions,
                "marker": {"color": bucket_color(*bucket)},
                "texttemplate": "%{y:,.0f}",
                "textposition": "outside",
            })
        })
        .collect();

    Figure {
        data,
        layout: json!({
            "title": {"text": "Carbon Emissions by Product and Impact Category"},
            "yaxis": {"title": {"text": "Emissions (kg CO2e)"}},
            "height": 500,
        }),
    }
}

/// Share of total emissions per product
pub fn percentage_pie(analysis: &AnalysisResult) -> Figure {
    let categories = &analysis.impact_categories;
    let names: Vec<&str> = categories.iter().map(|(_, c)| c.item.product_name.as_str()).collect();
    let shares: Vec<f64> = categories.iter().map(|(_, c)| c.item.percentage_of_total).collect();
    let colors: Vec<&str> = categories.iter().map(|(b, _)| bucket_color(b)).collect();

    Figure {
        data: vec![json!({
            "type": "pie",
            "labels": names,
            "values": shares,
            "marker": {"colors": colors},
            "hole": 0.3,
        })],
        layout: json!({
            "title": {"text": "Percentage Contribution to Total Emissions"},
            "height": 500,
        }),
    }
}

pub fn material_factors(analysis: &AnalysisResult) -> Figure {
    Figure {
        data: vec![material_trace(analysis, "x", "y")],
        layout: json!({
            "title": {"text": "Material Emission Factors Comparison"},
            "xaxis": {"title": {"text": "Material Type"}},
            "yaxis": {"title": {"text": "Emission Factor (kg CO2e/kg)"}},
            "height": 500,
        }),
    }
}

/// How often each strategy type is proposed across the plan
pub fn strategy_distribution(plan: &OptimizationPlan) -> Figure {
    let counts: Vec<usize> = StrategyType::ALL
        .iter()
        .map(|kind| {
            plan.recommendations()
                .flat_map(|r| &r.proposed_strategies)
                .filter(|s| s.strategy_type == *kind)
                .count()
        })
        .collect();
    let labels: Vec<&str> = StrategyType::ALL.iter().map(|k| k.as_str()).collect();

    Figure {
        data: vec![json!({
            "type": "bar",
            "x": labels,
            "y": counts,
            "marker": {"color": STRATEGY_COLORS},
            "textposition": "outside",
            "texttemplate": "%{y}",
        })],
        layout: json!({
            "title": {"text": "Proposed Strategies by Type"},
            "yaxis": {"title": {"text": "Strategies"}, "dtick": 1},
            "height": 450,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::types::{
        AnalysisSummary, ClassifiedItem, ImpactCategories, LineItem, MaterialInsight,
        OptimizationPriorities, RankedEmitter,
    };

    fn classified(name: &str, material: &str, total: f64, pct: f64) -> ClassifiedItem {
        ClassifiedItem {
            item: LineItem {
                product_name: name.to_string(),
                material_type: material.to_string(),
                weight_kg: 1.0,
                emission_factor: 2.0,
                total_emissions: total,
                percentage_of_total: pct,
            },
            category_reason: String::new(),
        }
    }

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            impact_categories: ImpactCategories {
                high_impact: vec![classified("Steel Frame", "Steel", 5550.0, 68.44)],
                medium_impact: vec![classified("Plastic Case", "Plastic", 1500.0, 18.50)],
                low_impact: vec![classified("Cotton T-Shirt", "Cotton", 1060.0, 13.07)],
            },
            material_insights: vec![MaterialInsight {
                material_type: "Steel".to_string(),
                emission_factor: 1.85,
                products: vec!["Steel Frame".to_string()],
                environmental_profile: "High Impact".to_string(),
                key_observation: String::new(),
            }],
            top_emitters_ranking: vec![RankedEmitter {
                rank: 1,
                product_name: "Steel Frame".to_string(),
                emissions: 5550.0,
                percentage: 68.44,
                why_this_matters: String::new(),
            }],
            optimization_priorities: OptimizationPriorities::default(),
            key_patterns: vec!["Steel dominates".to_string()],
            analysis_summary: AnalysisSummary::default(),
        }
    }

    #[test]
    fn test_profile_colors() {
        assert_eq!(profile_color("Low Impact"), LOW_COLOR);
        assert_eq!(profile_color("medium"), MEDIUM_COLOR);
        assert_eq!(profile_color("High Impact"), HIGH_COLOR);
        assert_eq!(profile_color(""), NEUTRAL_COLOR);
    }

    #[test]
    fn test_dashboard_colors_follow_buckets() {
        let figure = dashboard(&analysis());
        assert_eq!(figure.data.len(), 4);

        let colors = &figure.data[0]["marker"]["color"];
        assert_eq!(colors[0], HIGH_COLOR);
        assert_eq!(colors[1], MEDIUM_COLOR);
        assert_eq!(colors[2], LOW_COLOR);

        assert_eq!(figure.data[1]["values"], json!([1, 1, 1]));
        assert_eq!(figure.data[3]["xaxis"], "x3");
    }

    #[test]
    fn test_emissions_by_bucket_has_trace_per_bucket() {
        let figure = emissions_by_bucket(&analysis());
        let names: Vec<&str> = figure.data.iter().filter_map(|t| t["name"].as_str()).collect();
        assert_eq!(names, vec!["High Impact", "Medium Impact", "Low Impact"]);
    }
}
