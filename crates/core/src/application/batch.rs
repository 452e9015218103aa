// Batch Runner - every subject of a dataset, one after the other

use crate::application::pipeline::{PipelineError, SubjectPipeline, SubjectStatus};
use crate::application::shutdown::ShutdownToken;
use crate::domain::{PipelinePlan, SubjectLayout, TemplateLayout};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, SubjectFs};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// What to process
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub dataset_root: PathBuf,
    pub template_dir: PathBuf,
    /// Subject directory names; empty means all
    pub subjects: Vec<String>,
}

/// Outcome of one subject
#[derive(Debug, Clone)]
pub struct SubjectOutcome {
    pub subject: String,
    pub status: SubjectStatus,
    pub error: Option<String>,
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub run_id: String,
    pub outcomes: Vec<SubjectOutcome>,
    /// Stopped early on a shutdown request
    pub interrupted: bool,
}

impl BatchSummary {
    pub fn completed_count(&self) -> usize {
        self.count(SubjectStatus::Completed)
    }

    pub fn failed_count(&self) -> usize {
        self.count(SubjectStatus::Failed)
    }

    fn count(&self, status: SubjectStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

pub struct BatchRunner {
    pipeline: Arc<SubjectPipeline>,
    fs: Arc<dyn SubjectFs>,
    id_provider: Arc<dyn IdProvider>,
}

impl BatchRunner {
    pub fn new(
        pipeline: Arc<SubjectPipeline>,
        fs: Arc<dyn SubjectFs>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            pipeline,
            fs,
            id_provider,
        }
    }

    /// Subject layouts selected by the request, in dataset order
    pub fn select_subjects(&self, request: &BatchRequest) -> Result<Vec<SubjectLayout>> {
        if !self.fs.is_dir(&request.template_dir) {
            return Err(AppError::NotFound(format!(
                "template directory {}",
                request.template_dir.display()
            )));
        }

        let dirs = self.fs.list_dirs(&request.dataset_root)?;

        for wanted in &request.subjects {
            if !dirs.iter().any(|d| d.file_name().is_some_and(|n| n == wanted.as_str())) {
                return Err(AppError::NotFound(format!(
                    "subject {} in {}",
                    wanted,
                    request.dataset_root.display()
                )));
            }
        }

        let template = TemplateLayout::new(&request.template_dir);
        Ok(dirs
            .into_iter()
            .map(|dir| SubjectLayout::new(dir, template.clone()))
            .filter(|layout| {
                request.subjects.is_empty()
                    || request.subjects.iter().any(|s| s == layout.subject())
            })
            .collect())
    }

    /// Plans of every selected subject, without running anything
    pub fn plan(
        &self,
        request: &BatchRequest,
    ) -> Result<Vec<(String, std::result::Result<PipelinePlan, PipelineError>)>> {
        Ok(self
            .select_subjects(request)?
            .iter()
            .map(|layout| (layout.subject().to_string(), self.pipeline.plan(layout)))
            .collect())
    }

    /// Run every selected subject; a failing subject does not stop the batch
    pub async fn run(
        &self,
        request: &BatchRequest,
        shutdown: &ShutdownToken,
    ) -> Result<BatchSummary> {
        let layouts = self.select_subjects(request)?;
        let run_id = self.id_provider.generate_id();

        info!(
            run_id = %run_id,
            dataset = %request.dataset_root.display(),
            subjects = layouts.len(),
            "Starting batch"
        );

        let mut summary = BatchSummary {
            run_id: run_id.clone(),
            outcomes: Vec::with_capacity(layouts.len()),
            interrupted: false,
        };

        for layout in &layouts {
            if shutdown.is_shutdown() {
                warn!(subject = %layout.subject(), "Shutdown requested, stopping before subject");
                summary.interrupted = true;
                break;
            }

            info!(subject = %layout.subject(), "process {}", layout.subject());
            let report = self.pipeline.run(layout, Some(run_id.clone())).await;

            match serde_json::to_string_pretty(&report) {
                Ok(json) => {
                    if let Err(e) = self.fs.write_string(&layout.report(), &json) {
                        warn!(subject = %layout.subject(), error = %e, "Failed to write report");
                    }
                }
                Err(e) => warn!(subject = %layout.subject(), error = %e, "Failed to serialize report"),
            }

            summary.outcomes.push(SubjectOutcome {
                subject: report.subject.clone(),
                status: report.status,
                error: report.error.clone(),
                duration_ms: report.duration_ms(),
            });
        }

        info!(
            run_id = %run_id,
            completed = summary.completed_count(),
            failed = summary.failed_count(),
            interrupted = summary.interrupted,
            "Batch finished"
        );

        Ok(summary)
    }
}
