use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ta_marking::config::{DelayConfig, MarkingConfig, MIN_MARKERS};
use ta_marking::pool::{MarkingPool, RunReport};
use ta_marking::rubric::{FileSink, RubricSink, RubricStore};
use ta_marking::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "ta-marking")]
#[command(version)]
#[command(about = "Concurrent exam marking with a shared, correctable rubric")]
struct Args {
    /// Number of markers working concurrently (minimum 2)
    #[arg(long, short = 'm', default_value = "2")]
    markers: usize,

    /// Questions per exam
    #[arg(long, default_value = "5")]
    questions: usize,

    /// Submission id at which marking stops
    #[arg(long, default_value = "9999")]
    terminal: u32,

    /// Chance, in percent, that a marker corrects a rubric line it reads
    #[arg(long, default_value = "20")]
    correction_percent: u8,

    /// File the rubric is written to after every correction
    #[arg(long, default_value = "rubric.txt")]
    rubric: PathBuf,

    /// Load the initial rubric from this file instead of the built-in one
    #[arg(long)]
    rubric_input: Option<PathBuf>,

    /// Multiply every simulated delay by this factor (e.g. 0.01 for a quick run)
    #[arg(long, default_value = "1.0")]
    time_scale: f64,

    /// Seed for reproducible marker decisions
    #[arg(long)]
    seed: Option<u64>,

    /// Output format for the final report
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn build_config(args: &Args) -> MarkingConfig {
    let markers = if args.markers < MIN_MARKERS {
        tracing::warn!(
            requested = args.markers,
            using = MIN_MARKERS,
            "Too few markers requested"
        );
        MIN_MARKERS
    } else {
        args.markers
    };

    MarkingConfig {
        marker_count: markers,
        question_count: args.questions,
        terminal_submission: args.terminal,
        correction_probability: f64::from(args.correction_percent) / 100.0,
        rubric_path: args.rubric.clone(),
        delays: DelayConfig::default().scaled(args.time_scale),
        seed: args.seed,
    }
}

fn print_table(report: &RunReport) {
    println!(
        "Marked {} exam(s), final submission {}{}",
        report.exams_completed,
        report.final_submission,
        if report.reached_terminal {
            ""
        } else {
            " (stopped early)"
        }
    );
    println!();
    println!(
        "{:<8} {:<8} {:<8} {:<12} {:<14} {:<10}",
        "MARKER", "PASSES", "CLAIMS", "CORRECTIONS", "PERSIST FAILS", "ADVANCES"
    );
    println!("{}", "-".repeat(66));
    for m in &report.markers {
        println!(
            "{:<8} {:<8} {:<8} {:<12} {:<14} {:<10}",
            m.marker_id, m.passes, m.claims, m.corrections, m.persist_failures, m.advancements
        );
    }
    println!();
    println!("Final rubric:");
    for line in &report.rubric {
        println!("  {}", line);
    }
    println!(
        "\nDuration: {} ms",
        (report.finished_at - report.started_at).num_milliseconds()
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = build_config(&args);

    let pool = match &args.rubric_input {
        Some(input) => {
            let sink: Arc<dyn RubricSink> = Arc::new(FileSink::new(config.rubric_path.clone()));
            let rubric = RubricStore::load(input, config.question_count, sink).await?;
            MarkingPool::with_rubric(config, rubric)?
        }
        None => MarkingPool::new(config)?,
    };

    let shutdown = install_shutdown_handler();
    let report = pool.run(shutdown).await?;

    match args.output {
        OutputFormat::Table => print_table(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}
