//! mtlseg - multi-field MTL registration & segmentation pipeline
//! Composition root: configuration, logging, dependency wiring

mod logging;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tabled::{Table, Tabled};
use tracing::{info, warn};

use mtlseg_core::application::{
    shutdown_channel, BatchRequest, BatchRunner, BatchSummary, DatasetPreparer, PipelineConfig,
    SegmenterConfig, SubjectPipeline, SubjectRange,
};
use mtlseg_core::constants::{
    DEFAULT_C3D_PROGRAM, DEFAULT_GREEDY_PROGRAM, DEFAULT_ORIENTATION,
    DEFAULT_SEGMENTER_CONFIGURATION, DEFAULT_SEGMENTER_DATASET, DEFAULT_SEGMENTER_PROGRAM,
    DEFAULT_SEGMENTER_TRAINER, DEFAULT_TRIM_NECK_PROGRAM,
};
use mtlseg_core::port::id_provider::UuidProvider;
use mtlseg_core::port::time_provider::SystemTimeProvider;
use mtlseg_infra_nifti::NoisePlaceholderWriter;
use mtlseg_infra_system::{LocalFs, SubprocessToolRunner, ToolPaths};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit code when Ctrl+C stopped the batch early
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "mtlseg")]
#[command(about = "Multi-field MTL registration & segmentation pipeline", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Also write logs to <DIR>/mtlseg.log
    #[arg(long, env = "MTLSEG_LOG_DIR", global = true)]
    log_dir: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Link the BNU 3T/7T release into per-subject folders
    PrepareBnu {
        /// Root of the downloaded BNU release
        #[arg(long, env = "MTLSEG_BNU_INPUT")]
        input: String,

        /// Dataset directory receiving subNN folders
        #[arg(long, env = "MTLSEG_BNU_OUTPUT")]
        output: String,

        /// Subject ids, e.g. "7" or "1-20"
        #[arg(long, default_value = "1-20")]
        subjects: SubjectRange,
    },

    /// Run the pipeline on every (or the selected) subject
    Run {
        #[command(flatten)]
        dataset: DatasetArgs,

        #[command(flatten)]
        tools: ToolArgs,

        /// Skip tool calls whose outputs already exist
        #[arg(long, env = "MTLSEG_RESUME")]
        resume: bool,

        /// Terminate a tool running longer than this
        #[arg(long, env = "MTLSEG_TOOL_TIMEOUT_SECS")]
        tool_timeout_secs: Option<u64>,
    },

    /// Print each subject's plan without running anything
    Plan {
        #[command(flatten)]
        dataset: DatasetArgs,

        #[command(flatten)]
        tools: ToolArgs,
    },
}

#[derive(Args)]
struct DatasetArgs {
    /// Directory holding one folder per subject
    #[arg(long, env = "MTLSEG_DATASET_PATH")]
    dataset_path: String,

    /// Directory holding template.nii.gz and the template ROI masks
    #[arg(long, env = "MTLSEG_TEMPLATE_PATH")]
    template_path: String,

    /// Only process this subject folder (repeatable)
    #[arg(long = "subject")]
    subjects: Vec<String>,
}

impl DatasetArgs {
    fn request(&self) -> BatchRequest {
        BatchRequest {
            dataset_root: expand(&self.dataset_path),
            template_dir: expand(&self.template_path),
            subjects: self.subjects.clone(),
        }
    }
}

#[derive(Args)]
struct ToolArgs {
    /// Convert3D program
    #[arg(long, env = "MTLSEG_C3D", default_value = DEFAULT_C3D_PROGRAM)]
    c3d: String,

    /// Greedy program
    #[arg(long, env = "MTLSEG_GREEDY", default_value = DEFAULT_GREEDY_PROGRAM)]
    greedy: String,

    /// Neck trimming program; a path is made executable before use
    #[arg(long, env = "MTLSEG_TRIM_NECK", default_value = DEFAULT_TRIM_NECK_PROGRAM)]
    trim_neck: String,

    /// nnU-Net prediction program
    #[arg(long, env = "MTLSEG_NNUNET", default_value = DEFAULT_SEGMENTER_PROGRAM)]
    nnunet: String,

    #[arg(long, env = "MTLSEG_NNUNET_DATASET", default_value_t = DEFAULT_SEGMENTER_DATASET)]
    nnunet_dataset: u32,

    #[arg(long, env = "MTLSEG_NNUNET_CONFIGURATION", default_value = DEFAULT_SEGMENTER_CONFIGURATION)]
    nnunet_configuration: String,

    #[arg(long, env = "MTLSEG_NNUNET_TRAINER", default_value = DEFAULT_SEGMENTER_TRAINER)]
    nnunet_trainer: String,

    /// Axis code every input is swapped to
    #[arg(long, env = "MTLSEG_ORIENTATION", default_value = DEFAULT_ORIENTATION)]
    orientation: String,

    /// Seed for placeholder channels (random when omitted)
    #[arg(long, env = "MTLSEG_NOISE_SEED")]
    noise_seed: Option<u64>,

    /// Only pass these environment variables to tools (comma separated)
    #[arg(long, env = "MTLSEG_ENV_ALLOWLIST", value_delimiter = ',')]
    env_allowlist: Option<Vec<String>>,
}

impl ToolArgs {
    fn tool_paths(&self) -> ToolPaths {
        ToolPaths {
            c3d: expand(&self.c3d),
            greedy: expand(&self.greedy),
            trim_neck: expand(&self.trim_neck),
            segmenter: expand(&self.nnunet),
        }
    }

    /// A bare name is looked up in PATH, anything with a separator is a script on disk
    fn trim_neck_script(&self) -> Option<PathBuf> {
        self.trim_neck
            .contains(std::path::is_separator)
            .then(|| expand(&self.trim_neck))
    }

    fn pipeline_config(&self, resume: bool) -> PipelineConfig {
        PipelineConfig {
            orientation: self.orientation.clone(),
            trim_neck_script: self.trim_neck_script(),
            segmenter: SegmenterConfig {
                dataset: self.nnunet_dataset,
                configuration: self.nnunet_configuration.clone(),
                trainer: self.nnunet_trainer.clone(),
            },
            noise_seed: self.noise_seed,
            resume,
        }
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// DI wiring
fn build_runner(tools: &ToolArgs, resume: bool, timeout: Option<Duration>) -> BatchRunner {
    let time_provider = Arc::new(SystemTimeProvider);
    let fs = Arc::new(LocalFs::new());

    let mut tool_runner = SubprocessToolRunner::new(tools.tool_paths(), time_provider.clone());
    if let Some(allowlist) = &tools.env_allowlist {
        tool_runner = tool_runner.with_env_allowlist(allowlist.clone());
    }
    if let Some(limit) = timeout {
        tool_runner = tool_runner.with_timeout(limit);
    }

    let pipeline = Arc::new(SubjectPipeline::new(
        Arc::new(tool_runner),
        fs.clone(),
        Arc::new(NoisePlaceholderWriter::new()),
        time_provider,
        tools.pipeline_config(resume),
    ));

    BatchRunner::new(pipeline, fs, Arc::new(UuidProvider))
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Subject")]
    subject: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Error")]
    error: String,
}

#[derive(Tabled)]
struct PreparedRow {
    #[tabled(rename = "Subject")]
    subject: String,
    #[tabled(rename = "Directory")]
    directory: String,
    #[tabled(rename = "Linked")]
    linked: usize,
    #[tabled(rename = "Missing")]
    missing: usize,
}

fn print_summary(summary: &BatchSummary) {
    let rows: Vec<OutcomeRow> = summary
        .outcomes
        .iter()
        .map(|o| OutcomeRow {
            subject: o.subject.clone(),
            status: o.status.to_string(),
            duration: o
                .duration_ms
                .map(|ms| format!("{:.1}s", ms as f64 / 1000.0))
                .unwrap_or_else(|| "-".to_string()),
            error: o.error.clone().unwrap_or_default(),
        })
        .collect();

    println!();
    println!("{}", Table::new(rows));
    println!();
    println!("  {} {}", "Run ID:".bold(), summary.run_id);
    println!(
        "  {} {}",
        "Completed:".bold(),
        summary.completed_count().to_string().green()
    );
    println!(
        "  {} {}",
        "Failed:".bold(),
        summary.failed_count().to_string().red()
    );
    if summary.interrupted {
        println!("  {}", "Interrupted before all subjects ran".yellow());
    }
}

fn prepare_bnu(input: &str, output: &str, subjects: SubjectRange) -> Result<ExitCode> {
    let input = expand(input);
    let output = expand(output);
    if !input.is_dir() {
        anyhow::bail!("BNU release directory {} does not exist", input.display());
    }

    let prepared = DatasetPreparer::new(Arc::new(LocalFs::new()))
        .prepare_bnu(&input, &output, subjects)
        .context("Failed to prepare BNU dataset")?;

    let incomplete = prepared.iter().filter(|p| !p.missing.is_empty()).count();
    let rows: Vec<PreparedRow> = prepared
        .into_iter()
        .map(|p| PreparedRow {
            subject: p.subject,
            directory: p.directory.display().to_string(),
            linked: p.linked.len(),
            missing: p.missing.len(),
        })
        .collect();

    println!("{}", "✓ Dataset prepared".green().bold());
    println!();
    println!("{}", Table::new(rows));
    if incomplete > 0 {
        println!();
        println!(
            "  {} {} subject(s) with missing raw files",
            "!".yellow().bold(),
            incomplete
        );
    }

    Ok(ExitCode::SUCCESS)
}

async fn run(
    dataset: &DatasetArgs,
    tools: &ToolArgs,
    resume: bool,
    tool_timeout_secs: Option<u64>,
) -> Result<ExitCode> {
    let runner = build_runner(tools, resume, tool_timeout_secs.map(Duration::from_secs));
    let request = dataset.request();

    let (shutdown_tx, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl+C received, stopping after the current subject");
            shutdown_tx.shutdown();
        }
    });

    let summary = runner
        .run(&request, &shutdown)
        .await
        .context("Batch run failed")?;

    print_summary(&summary);

    if summary.interrupted {
        Ok(ExitCode::from(EXIT_INTERRUPTED))
    } else if summary.failed_count() > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn plan(dataset: &DatasetArgs, tools: &ToolArgs) -> Result<ExitCode> {
    let runner = build_runner(tools, false, None);
    let plans = runner
        .plan(&dataset.request())
        .context("Failed to select subjects")?;

    let mut failed = 0;
    for (subject, plan) in plans {
        println!("{}", subject.cyan().bold());
        match plan {
            Ok(plan) => {
                for step in &plan.steps {
                    println!("  {} {}", "•".bold(), step.step.to_string().bold());
                    for action in &step.actions {
                        println!("      {}", action);
                    }
                }
            }
            Err(e) => {
                failed += 1;
                println!("  {} {}", "✗".red(), e);
            }
        }
        println!();
    }

    Ok(if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn log_dir(cli: &Cli) -> Option<PathBuf> {
    cli.log_dir.as_deref().map(expand)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_dir = log_dir(&cli);
    let _log_guard = logging::init(log_dir.as_deref())?;

    info!("mtlseg v{} starting...", VERSION);

    match &cli.command {
        Commands::PrepareBnu {
            input,
            output,
            subjects,
        } => prepare_bnu(input, output, *subjects),

        Commands::Run {
            dataset,
            tools,
            resume,
            tool_timeout_secs,
        } => run(dataset, tools, *resume, *tool_timeout_secs).await,

        Commands::Plan { dataset, tools } => plan(dataset, tools),
    }
}
