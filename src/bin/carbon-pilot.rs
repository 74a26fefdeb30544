// Carbon Pilot - analyze a product footprint and plan reductions with a local LLM

use anyhow::{Context, Result};
use carbon_pilot::config::PipelineConfig;
use carbon_pilot::orchestration::{
    AnalysisResult, CarbonData, ImpactBucket, OptimizationPlan, Orchestrator, PipelineError,
};
use carbon_pilot::report;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use termimad::{MadSkin, crossterm::style::Color};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const ANALYSIS_FILE: &str = "analysis.json";
const PLAN_FILE: &str = "optimization_plan.json";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (TOML); defaults to .carbon-pilot.toml in cwd or home
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for reports and JSON output (overrides config)
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Open the generated reports in a browser
    #[arg(long, global = true)]
    open: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline over a footprint JSON document
    Run {
        /// Footprint data produced by the carbon calculator
        data: PathBuf,

        /// Ollama model (overrides config and OLLAMA_MODEL)
        #[arg(long)]
        model: Option<String>,

        /// Ollama endpoint (overrides config and OLLAMA_HOST)
        #[arg(long)]
        endpoint: Option<String>,

        /// Business requirements file (overrides config)
        #[arg(long)]
        requirements: Option<PathBuf>,

        /// Reuse the saved requirements instead of drafting new ones
        #[arg(long)]
        skip_requirements: bool,
    },

    /// Render reports from a saved analysis, and optionally a saved plan
    Render {
        analysis: PathBuf,

        #[arg(long)]
        plan: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reqwest=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = PipelineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.apply_env();
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }

    let written = match cli.command {
        Command::Run {
            data,
            model,
            endpoint,
            requirements,
            skip_requirements,
        } => {
            if let Some(model) = model {
                config.model = model;
            }
            if let Some(endpoint) = endpoint {
                config.ollama_endpoint = endpoint;
            }
            if let Some(path) = requirements {
                config.requirements_path = path;
            }
            if skip_requirements {
                config.draft_requirements = false;
            }
            run(config, &data).await?
        }
        Command::Render { analysis, plan } => render(&config, &analysis, plan.as_deref()).await?,
    };

    println!("\n📦 Reports:");
    for path in &written {
        println!("  - {}", path.display());
    }

    if cli.open {
        for path in &written {
            if let Err(e) = open::that(path) {
                eprintln!("Could not open {}: {}", path.display(), e);
            }
        }
    }

    Ok(())
}

async fn run(config: PipelineConfig, data_path: &Path) -> Result<Vec<PathBuf>> {
    println!("🌱 Carbon Pilot");
    println!("================================\n");
    println!("📡 Using model: {} at {}", config.model, config.ollama_endpoint);
    println!("📄 Requirements file: {}\n", config.requirements_path.display());

    let data = CarbonData::from_file(data_path)
        .await
        .with_context(|| format!("Failed to read {}", data_path.display()))?;

    let output_dir = config.output_dir.clone();
    let orchestrator = Orchestrator::from_config(config)?;

    let run = match orchestrator.run(&data).await {
        Ok(run) => run,
        Err(PipelineError::SchemaViolation { stage, raw, reason }) => {
            eprintln!("❌ {stage} stage returned output that does not fit its schema: {reason}");
            eprintln!("\n--- raw output ---\n{raw}\n------------------");
            anyhow::bail!("{stage} stage failed");
        }
        Err(e) => return Err(e.into()),
    };

    print_analysis(&run.analysis);
    match &run.requirements {
        Some(requirements) => {
            println!("📋 Business requirements: {} objective(s)", requirements.objectives.len())
        }
        None => println!("📋 No business requirements on record"),
    }
    print_plan(&run.plan);

    save_json(&output_dir, ANALYSIS_FILE, &run.analysis).await?;
    save_json(&output_dir, PLAN_FILE, &run.plan).await?;

    Ok(report::write_reports(&run, &output_dir).await?)
}

async fn render(config: &PipelineConfig, analysis_path: &Path, plan_path: Option<&Path>) -> Result<Vec<PathBuf>> {
    let analysis: AnalysisResult = read_json(analysis_path).await?;
    print_analysis(&analysis);

    let mut written = report::write_analysis_reports(&analysis, &config.output_dir).await?;

    if let Some(plan_path) = plan_path {
        let plan: OptimizationPlan = read_json(plan_path).await?;
        let html = report::render_plan_report(&plan)?;
        let path = config.output_dir.join(report::PLAN_REPORT_FILE);
        tokio::fs::write(&path, html)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    Ok(written)
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse {}", path.display()))
}

async fn save_json<T: serde::Serialize>(dir: &Path, name: &str, value: &T) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(name);
    tokio::fs::write(&path, serde_json::to_vec_pretty(value)?)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn print_analysis(analysis: &AnalysisResult) {
    println!("\n📊 Impact categories:");
    for bucket in ImpactBucket::ALL {
        let names: Vec<&str> = analysis
            .impact_categories
            .bucket(bucket)
            .iter()
            .map(|c| c.item.product_name.as_str())
            .collect();
        println!("  {}: {}", bucket.as_str(), if names.is_empty() { "-".to_string() } else { names.join(", ") });
    }

    println!("\n🏆 Top emitters:");
    for entry in &analysis.top_emitters_ranking {
        println!(
            "  {}. {} ({:.0} kg CO2e, {:.2}%)",
            entry.rank, entry.product_name, entry.emissions, entry.percentage
        );
    }
    println!();
}

fn print_plan(plan: &OptimizationPlan) {
    let mut markdown = String::from("# Optimization Plan\n\n");

    for recommendation in plan.recommendations() {
        markdown.push_str(&format!(
            "## {} ({})\n*{}*\n\n",
            recommendation.product_name,
            recommendation.current_material,
            recommendation.primary_issue.as_str()
        ));
        for strategy in &recommendation.proposed_strategies {
            markdown.push_str(&format!("**{}**\n", strategy.strategy_type.as_str()));
            for action in &strategy.specific_actions {
                markdown.push_str(&format!("- {}\n", action));
            }
            markdown.push('\n');
        }
    }

    if !plan.strategic_summary.overall_recommendation.is_empty() {
        markdown.push_str(&format!(
            "### Overall\n{}\n",
            plan.strategic_summary.overall_recommendation
        ));
    }

    create_markdown_skin().print_text(&markdown);
}

fn create_markdown_skin() -> MadSkin {
    let mut skin = MadSkin::default();
    skin.headers[0].set_fg(Color::Green);
    skin.headers[1].set_fg(Color::Cyan);
    skin.headers[2].set_fg(Color::Blue);
    skin.bold.set_fg(Color::Yellow);
    skin.italic.set_fg(Color::Magenta);
    skin
}
