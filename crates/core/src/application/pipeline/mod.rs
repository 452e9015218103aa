// Subject Pipeline - plan and execute the registration/segmentation sequence
//
// Planning is split per step (one planner per file) and only reads the
// filesystem; execution walks the plan and talks to the ports.

mod cropping;
mod global_registration;
mod local_registration;
mod orientation;
pub mod report;
mod roi;
mod segmentation;

pub use report::{StepReport, SubjectReport, SubjectStatus};

use crate::constants::*;
use crate::domain::{
    Action, InputFile, InputInventory, Modality, PipelinePlan, Step, StepPlan, SubjectLayout,
    Tool, ToolInvocation,
};
use crate::port::{
    ExecutionError, FsError, PlaceholderError, PlaceholderWriter, SubjectFs, TimeProvider,
    ToolRunner,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Segmentation model selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmenterConfig {
    pub dataset: u32,
    pub configuration: String,
    pub trainer: String,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            dataset: DEFAULT_SEGMENTER_DATASET,
            configuration: DEFAULT_SEGMENTER_CONFIGURATION.to_string(),
            trainer: DEFAULT_SEGMENTER_TRAINER.to_string(),
        }
    }
}

/// Pipeline behaviour knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Target axis code for `c3d -swapdim`
    pub orientation: String,
    /// Neck trimming script on disk; made executable before use
    pub trim_neck_script: Option<PathBuf>,
    pub segmenter: SegmenterConfig,
    /// Base seed for placeholder volumes, None for entropy
    pub noise_seed: Option<u64>,
    /// Skip tool calls whose declared outputs already exist
    pub resume: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            orientation: DEFAULT_ORIENTATION.to_string(),
            trim_neck_script: None,
            segmenter: SegmenterConfig::default(),
            noise_seed: None,
            resume: false,
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Reference image {0} does not exist")]
    MissingReference(PathBuf),

    #[error("Template file {0} does not exist")]
    MissingTemplate(PathBuf),

    #[error("No 3T-T1 to derive the ROI from and {0} does not exist")]
    MissingRoi(PathBuf),

    #[error("{tool} failed during {step} (exit code {exit_code:?}): {stderr}")]
    ToolFailed {
        step: Step,
        tool: Tool,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("{step} did not produce {path}")]
    MissingOutput { step: Step, path: PathBuf },

    #[error("{step}: {source}")]
    Execution {
        step: Step,
        #[source]
        source: ExecutionError,
    },

    #[error("Filesystem error: {0}")]
    Fs(#[from] FsError),

    #[error("Placeholder error: {0}")]
    Placeholder(#[from] PlaceholderError),
}

/// `greedy -rf <fixed> -rm <moving> <output> -r <transforms...>`
pub(crate) fn reslice(
    fixed: &Path,
    moving: &Path,
    output: &Path,
    transforms: &[PathBuf],
) -> ToolInvocation {
    let mut inv = ToolInvocation::greedy()
        .arg("-rf")
        .path(fixed)
        .arg("-rm")
        .path(moving)
        .output(output)
        .arg("-r");
    for t in transforms {
        inv = inv.path(t);
    }
    inv
}

/// Record which inputs exist. Missing ones are reported, not fatal.
pub fn scan_inputs(layout: &SubjectLayout, fs: &dyn SubjectFs) -> Result<InputInventory, FsError> {
    let mut inventory = InputInventory::new();

    for modality in Modality::ALL {
        let path = layout.input(modality);
        if !fs.exists(&path) {
            warn!(subject = %layout.subject(), path = %path.display(), "{} does not exist", path.display());
            continue;
        }

        let file = match fs.read_link_target(&path)? {
            Some(target) => InputFile::linked(path, target),
            None => InputFile::regular(path),
        };
        inventory.insert(modality, file);
    }

    Ok(inventory)
}

/// Build the full action list of one subject
pub fn plan_subject(
    layout: &SubjectLayout,
    inventory: &InputInventory,
    fs: &dyn SubjectFs,
    config: &PipelineConfig,
) -> Result<PipelinePlan, PipelineError> {
    if !inventory.has_reference() {
        return Err(PipelineError::MissingReference(
            layout.input(Modality::T2w7T),
        ));
    }

    let steps = vec![
        orientation::plan(layout, inventory, config),
        global_registration::plan(layout, inventory),
        roi::plan(layout, inventory, fs, config)?,
        cropping::plan(layout, inventory),
        local_registration::plan(layout, inventory),
        segmentation::plan(layout, inventory, config),
    ];

    Ok(PipelinePlan {
        subject: layout.subject().to_string(),
        steps,
    })
}

/// Keep the end of a (possibly long) stderr, on a char boundary
fn stderr_tail(stderr: Option<String>) -> String {
    let stderr = stderr.unwrap_or_default();
    let mut start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    while !stderr.is_char_boundary(start) {
        start += 1;
    }
    stderr[start..].trim().to_string()
}

/// Runs the pipeline of one subject against the ports
pub struct SubjectPipeline {
    tool_runner: Arc<dyn ToolRunner>,
    fs: Arc<dyn SubjectFs>,
    placeholder: Arc<dyn PlaceholderWriter>,
    time_provider: Arc<dyn TimeProvider>,
    config: PipelineConfig,
}

impl SubjectPipeline {
    pub fn new(
        tool_runner: Arc<dyn ToolRunner>,
        fs: Arc<dyn SubjectFs>,
        placeholder: Arc<dyn PlaceholderWriter>,
        time_provider: Arc<dyn TimeProvider>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            tool_runner,
            fs,
            placeholder,
            time_provider,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Inventory + plan, without touching anything
    pub fn plan(&self, layout: &SubjectLayout) -> Result<PipelinePlan, PipelineError> {
        let inventory = scan_inputs(layout, self.fs.as_ref())?;
        plan_subject(layout, &inventory, self.fs.as_ref(), &self.config)
    }

    /// Run every step; failures end up in the report
    pub async fn run(&self, layout: &SubjectLayout, run_id: Option<String>) -> SubjectReport {
        let mut report = SubjectReport::start(layout.subject(), run_id, self.time_provider.now_millis());

        match self.execute(layout, &mut report).await {
            Ok(()) => {
                report.finish(self.time_provider.now_millis(), None);
                info!(subject = %layout.subject(), "Subject completed");
            }
            Err(e) => {
                error!(subject = %layout.subject(), error = %e, "Subject failed");
                report.finish(self.time_provider.now_millis(), Some(e.to_string()));
            }
        }

        report
    }

    /// Run every step, recording progress into `report`
    pub async fn execute(
        &self,
        layout: &SubjectLayout,
        report: &mut SubjectReport,
    ) -> Result<(), PipelineError> {
        let inventory = scan_inputs(layout, self.fs.as_ref())?;
        report.record_inventory(&inventory);

        let plan = plan_subject(layout, &inventory, self.fs.as_ref(), &self.config)?;

        info!(
            subject = %layout.subject(),
            present = ?inventory.present().map(|(m, _)| m.label()).collect::<Vec<_>>(),
            actions = plan.action_count(),
            "Pipeline planned"
        );

        for step in &plan.steps {
            let step_report = self.execute_step(layout.subject(), step).await?;
            report.steps.push(step_report);
        }

        Ok(())
    }

    async fn execute_step(
        &self,
        subject: &str,
        plan: &StepPlan,
    ) -> Result<StepReport, PipelineError> {
        let start = self.time_provider.now_millis();
        let mut step_report = StepReport::new(plan.step, plan.actions.len());

        info!(subject = %subject, step = %plan.step, actions = plan.actions.len(), "Starting step");

        for action in &plan.actions {
            match action {
                Action::Run(invocation) => {
                    if self.run_invocation(plan.step, invocation).await? {
                        step_report.invocations_run += 1;
                    } else {
                        step_report.invocations_skipped += 1;
                    }
                }
                Action::Link { source, target } => {
                    if !self.fs.exists(source) {
                        return Err(PipelineError::MissingOutput {
                            step: plan.step,
                            path: source.clone(),
                        });
                    }
                    self.fs.create_link(source, target)?;
                }
                Action::Placeholder {
                    reference,
                    output,
                    seed,
                } => {
                    // Never write through a link left by an earlier run
                    self.fs.remove_link(output)?;
                    self.placeholder
                        .write_noise_like(reference, output, *seed)
                        .await?;
                    info!(subject = %subject, output = %output.display(), "Wrote placeholder channel");
                }
                Action::CreateDir(path) => self.fs.create_dir_all(path)?,
                Action::Rename { from, to } => self.fs.rename(from, to)?,
                Action::EnsureExecutable(path) => self.fs.ensure_executable(path)?,
            }
        }

        step_report.duration_ms = self.time_provider.now_millis() - start;

        info!(
            subject = %subject,
            step = %plan.step,
            run = step_report.invocations_run,
            skipped = step_report.invocations_skipped,
            duration_ms = step_report.duration_ms,
            "Finished step"
        );

        Ok(step_report)
    }

    /// Returns false when the call was skipped on resume
    async fn run_invocation(
        &self,
        step: Step,
        invocation: &ToolInvocation,
    ) -> Result<bool, PipelineError> {
        if self.config.resume
            && !invocation.outputs.is_empty()
            && invocation.outputs.iter().all(|p| self.fs.exists(p))
        {
            debug!(step = %step, command = %invocation, "Outputs present, skipping");
            return Ok(false);
        }

        let result = self
            .tool_runner
            .run(invocation)
            .await
            .map_err(|source| PipelineError::Execution { step, source })?;

        if !result.is_success() {
            return Err(PipelineError::ToolFailed {
                step,
                tool: invocation.tool,
                exit_code: result.exit_code,
                stderr: stderr_tail(result.stderr),
            });
        }

        if let Some(missing) = invocation.outputs.iter().find(|p| !self.fs.exists(p)) {
            return Err(PipelineError::MissingOutput {
                step,
                path: missing.clone(),
            });
        }

        Ok(true)
    }
}
