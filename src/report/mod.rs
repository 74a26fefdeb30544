// Report - HTML dashboard and reports for analysis and plan

pub mod charts;
mod html;

pub use html::escape;

use crate::orchestration::types::{
    AnalysisResult, ImpactBucket, OptimizationPlan, PipelineRun, PriorityItem, ProductRecommendation,
};
use std::fmt::Write;
use std::path::{Path, PathBuf};

pub const DASHBOARD_FILE: &str = "analyzer_dashboard.html";
pub const ANALYSIS_REPORT_FILE: &str = "analyzer_report.html";
pub const PLAN_REPORT_FILE: &str = "optimization_plan.html";

/// Single-page 2x2 chart overview of an analysis
pub fn render_dashboard(analysis: &AnalysisResult) -> Result<String, ReportError> {
    let figure = charts::dashboard(analysis);
    let body = r#"<div id="dashboard"></div>"#;
    Ok(html::page("Carbon Pilot - Analysis Dashboard", body, &[("dashboard", &figure)])?)
}

/// Styled analysis report with summary, charts, patterns and priorities
pub fn render_analysis_report(analysis: &AnalysisResult) -> Result<String, ReportError> {
    let mut body = String::new();

    body.push_str("<h1>🌱 Carbon Pilot - Analysis Report</h1>\n");
    body.push_str("<p class=\"subtitle\">AI-Powered Carbon Footprint Analysis</p>\n");

    // Figures come from the input, never from the narrative
    let (dominant, share) = match analysis.top_emitters_ranking.first() {
        Some(top) => (top.product_name.as_str(), format!("{:.1}%", top.percentage)),
        None => ("-", "-".to_string()),
    };
    let _ = write!(
        body,
        r#"<div class="summary-box">
<h2 style="margin-top:0;">Analysis Summary</h2>
<div class="summary-grid">
<div class="summary-item"><div class="summary-number">{}</div><div class="summary-label">Dominant Emitter</div></div>
<div class="summary-item"><div class="summary-number">{}</div><div class="summary-label">Contribution</div></div>
<div class="summary-item"><div class="summary-number">{}</div><div class="summary-label">Products Analyzed</div></div>
</div>
"#,
        escape(dominant),
        escape(&share),
        analysis.impact_categories.len(),
    );
    let summary = &analysis.analysis_summary;
    for (label, text) in [
        ("Primary concern", &summary.primary_concern),
        ("Recommended focus", &summary.recommended_focus),
    ] {
        if !text.is_empty() {
            let _ = writeln!(body, "<p><strong>{}:</strong> {}</p>", label, escape(text));
        }
    }
    body.push_str("</div>\n");

    body.push_str("<div id=\"emissions\"></div>\n<div id=\"shares\"></div>\n<div id=\"materials\"></div>\n");

    body.push_str("<div class=\"insights-box\">\n<h2>🏷️ Impact Categories</h2>\n");
    for bucket in ImpactBucket::ALL {
        let items = analysis.impact_categories.bucket(bucket);
        let _ = writeln!(
            body,
            "<h3 style=\"color:{}\">{} ({})</h3>",
            charts::bucket_color(bucket),
            bucket.as_str(),
            items.len()
        );
        for classified in items {
            let item = &classified.item;
            let _ = writeln!(
                body,
                "<div class=\"insight-item\"><strong>{}</strong> ({}): {:.0} kg CO2e, {:.2}%. {}</div>",
                escape(&item.product_name),
                escape(&item.material_type),
                item.total_emissions,
                item.percentage_of_total,
                escape(&classified.category_reason),
            );
        }
    }
    body.push_str("</div>\n");

    if !analysis.material_insights.is_empty() {
        body.push_str("<div class=\"insights-box\">\n<h2>🧱 Material Insights</h2>\n");
        for insight in &analysis.material_insights {
            let _ = writeln!(
                body,
                "<div class=\"insight-item\"><strong>{}</strong> (factor {:.2}, {}): {}</div>",
                escape(&insight.material_type),
                insight.emission_factor,
                escape(&insight.products.join(", ")),
                escape(&insight.key_observation),
            );
        }
        body.push_str("</div>\n");
    }

    body.push_str("<div class=\"insights-box\">\n<h2>🔍 Key Patterns Identified</h2>\n");
    for pattern in &analysis.key_patterns {
        let _ = writeln!(body, "<div class=\"insight-item\">• {}</div>", escape(pattern));
    }
    body.push_str("</div>\n");

    let priorities = &analysis.optimization_priorities;
    body.push_str("<div class=\"insights-box\">\n<h2>🎯 Optimization Priorities</h2>\n");
    push_priorities(&mut body, "Quick Wins", &priorities.quick_wins);
    push_priorities(&mut body, "Strategic Targets", &priorities.strategic_targets);
    if !priorities.low_priority.is_empty() {
        let _ = writeln!(
            body,
            "<h3>Low Priority:</h3>\n<div class=\"insight-item\">{}</div>",
            escape(&priorities.low_priority.join(", "))
        );
    }
    body.push_str("</div>\n");

    let emissions = charts::emissions_by_bucket(analysis);
    let shares = charts::percentage_pie(analysis);
    let materials = charts::material_factors(analysis);

    Ok(html::page(
        "Carbon Pilot - Analysis Report",
        &body,
        &[("emissions", &emissions), ("shares", &shares), ("materials", &materials)],
    )?)
}

fn push_priorities(body: &mut String, heading: &str, items: &[PriorityItem]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(body, "<h3>{heading}:</h3>");
    for item in items {
        let _ = writeln!(
            body,
            "<div class=\"insight-item\"><strong>{}</strong>: {}</div>",
            escape(&item.product),
            escape(&item.reason)
        );
    }
}

/// Recommendation cards per bucket plus the strategic summary
pub fn render_plan_report(plan: &OptimizationPlan) -> Result<String, ReportError> {
    let mut body = String::new();

    body.push_str("<h1>🛠️ Carbon Pilot - Optimization Plan</h1>\n");
    body.push_str("<p class=\"subtitle\">Reduction strategies for high and medium impact products</p>\n");

    let summary = &plan.strategic_summary;
    body.push_str("<div class=\"summary-box\">\n<h2 style=\"margin-top:0;\">Strategic Summary</h2>\n");
    if !summary.overall_recommendation.is_empty() {
        let _ = writeln!(body, "<p>{}</p>", escape(&summary.overall_recommendation));
    }
    if !summary.synergy_opportunities.is_empty() {
        let _ = writeln!(
            body,
            "<p><strong>Synergies:</strong> {}</p>",
            escape(&summary.synergy_opportunities)
        );
    }
    body.push_str("</div>\n<div id=\"strategies\"></div>\n");

    let strategies = &plan.optimization_strategies;
    for (bucket, recommendations) in [
        (ImpactBucket::High, &strategies.high_impact_recommendations),
        (ImpactBucket::Medium, &strategies.medium_impact_recommendations),
    ] {
        if recommendations.is_empty() {
            continue;
        }
        let _ = writeln!(
            body,
            "<div class=\"insights-box\">\n<h2>{} Recommendations</h2>",
            bucket.as_str()
        );
        for recommendation in recommendations {
            push_card(&mut body, bucket, recommendation);
        }
        body.push_str("</div>\n");
    }

    let chart = charts::strategy_distribution(plan);
    Ok(html::page("Carbon Pilot - Optimization Plan", &body, &[("strategies", &chart)])?)
}

fn push_card(body: &mut String, bucket: ImpactBucket, recommendation: &ProductRecommendation) {
    let color = charts::bucket_color(bucket);
    let _ = writeln!(
        body,
        "<div class=\"card\" style=\"border-left-color:{color}\">\n<h3>{} <span class=\"badge\" style=\"background:{color}\">{}</span></h3>\n<p>Current material: {}</p>",
        escape(&recommendation.product_name),
        recommendation.primary_issue.as_str(),
        escape(&recommendation.current_material),
    );

    for strategy in &recommendation.proposed_strategies {
        let _ = writeln!(
            body,
            "<div class=\"strategy\"><strong>{}</strong>\n<ul>",
            strategy.strategy_type.as_str()
        );
        for action in &strategy.specific_actions {
            let _ = writeln!(body, "<li>{}</li>", escape(action));
        }
        body.push_str("</ul>\n");
        if !strategy.expected_outcome.is_empty() {
            let _ = writeln!(
                body,
                "<p class=\"outcome\">Expected outcome: {}</p>",
                escape(&strategy.expected_outcome)
            );
        }
        body.push_str("</div>\n");
    }
    body.push_str("</div>\n");
}

/// Write the dashboard and analysis report into `dir`
pub async fn write_analysis_reports(analysis: &AnalysisResult, dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
    create_dir(dir).await?;
    Ok(vec![
        write_file(dir, DASHBOARD_FILE, render_dashboard(analysis)?).await?,
        write_file(dir, ANALYSIS_REPORT_FILE, render_analysis_report(analysis)?).await?,
    ])
}

/// Write every report for a finished run into `dir`
pub async fn write_reports(run: &PipelineRun, dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
    let mut written = write_analysis_reports(&run.analysis, dir).await?;
    written.push(write_file(dir, PLAN_REPORT_FILE, render_plan_report(&run.plan)?).await?);
    Ok(written)
}

async fn create_dir(dir: &Path) -> Result<(), ReportError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ReportError::Io {
            path: dir.to_path_buf(),
            source,
        })
}

async fn write_file(dir: &Path, name: &str, contents: String) -> Result<PathBuf, ReportError> {
    let path = dir.join(name);
    tokio::fs::write(&path, contents)
        .await
        .map_err(|source| ReportError::Io {
            path: path.clone(),
            source,
        })?;
    tracing::debug!(path = %path.display(), "wrote report");
    Ok(path)
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode chart: {0}")]
    Chart(#[from] serde_json::Error),
}
