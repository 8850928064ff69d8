//! ENEM Scores - school-type score comparison from exam microdata
//!
//! One subcommand per analysis: combination export, plain means, student
//! counts and normalized means.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use enem_scores::charts::PngChartRenderer;
use enem_scores::config::Settings;
use enem_scores::data::{load_table, TextEncoding};
use enem_scores::pipeline::{run_counts, run_export, run_means, run_normalized};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "enem_scores")]
#[command(about = "Compare ENEM scores by school type for one municipality", long_about = None)]
struct Cli {
    /// JSON settings file; missing fields use defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Municipality to analyze (exact, case-sensitive match)
    #[arg(short, long, global = true)]
    municipality: Option<String>,

    /// Text encoding of the input file
    #[arg(short, long, global = true, value_enum)]
    encoding: Option<TextEncoding>,

    /// Directory charts are written to
    #[arg(long, global = true)]
    chart_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count distinct (municipality, school type, scores) rows of the raw file
    Export {
        /// Raw semicolon-delimited microdata file
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// CSV file to write the combinations to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Mean score per knowledge area and school type
    Means {
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,
    },
    /// Number of participants per school type
    Counts {
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,
    },
    /// Means divided by the size of each school-type group
    Normalized {
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    if let Some(municipality) = cli.municipality {
        settings.municipality = municipality;
    }
    if let Some(encoding) = cli.encoding {
        settings.encoding = encoding;
    }
    if let Some(chart_dir) = cli.chart_dir {
        settings.chart_dir = chart_dir;
    }

    let mut renderer = PngChartRenderer::new(&settings.chart_dir)
        .with_size(settings.chart_width, settings.chart_height);

    match cli.command {
        Commands::Export { input, output } => {
            if let Some(input) = input {
                settings.raw_path = input;
            }
            if let Some(output) = output {
                settings.combinations_path = output;
            }
            let df = load_table(&settings.raw_source()?).context("loading raw microdata")?;
            let written = run_export(&df, &settings.combinations_path)?;
            info!(
                combinations = written,
                path = %settings.combinations_path.display(),
                "Export finished"
            );
        }
        Commands::Means { input } => {
            let df = load_intermediate(&mut settings, input)?;
            let report = run_means(&df, &settings.municipality, &mut renderer)?;
            info!(rows = report.rows, groups = report.summaries.len(), "Means computed");
            println!("Mean Scores by School Type");
            println!("{}", report.table);
        }
        Commands::Counts { input } => {
            let df = load_intermediate(&mut settings, input)?;
            let counts = run_counts(&df, &settings.municipality, &mut renderer)?;
            println!("{}", serde_json::to_string_pretty(&counts)?);
        }
        Commands::Normalized { input } => {
            let df = load_intermediate(&mut settings, input)?;
            let report = run_normalized(&df, &settings.municipality, &mut renderer)?;
            println!("{}", serde_json::to_string_pretty(&report.summaries)?);
        }
    }

    info!(charts = renderer.written().len(), "Done");
    Ok(())
}

fn load_intermediate(
    settings: &mut Settings,
    input: Option<PathBuf>,
) -> Result<polars::prelude::DataFrame> {
    if let Some(input) = input {
        settings.intermediate_path = input;
    }
    load_table(&settings.intermediate_source()?).context("loading filtered microdata")
}
