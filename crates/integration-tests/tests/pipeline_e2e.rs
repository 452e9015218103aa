//! End-to-end pipeline tests
//!
//! Runs the real adapters (LocalFs, SubprocessToolRunner, NoisePlaceholderWriter)
//! over a temporary dataset. c3d, greedy, trim_neck and nnU-Net are replaced by
//! shell scripts that materialise the files a real tool would write.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array3;
use nifti::writer::WriterOptions;
use nifti::{NiftiObject, ReaderOptions};
use tempfile::TempDir;

use mtlseg_core::application::pipeline::SubjectStatus;
use mtlseg_core::application::{
    shutdown_channel, BatchRequest, BatchRunner, PipelineConfig, SubjectPipeline,
};
use mtlseg_core::domain::{Modality, Side, SubjectLayout, TemplateLayout};
use mtlseg_core::port::id_provider::UuidProvider;
use mtlseg_core::port::time_provider::SystemTimeProvider;
use mtlseg_infra_nifti::NoisePlaceholderWriter;
use mtlseg_infra_system::{LocalFs, SubprocessToolRunner, ToolPaths};

const SHAPE: (usize, usize, usize) = (6, 7, 8);

/// Stand-in for c3d/greedy/trim_neck: every missing image argument becomes a
/// copy of the last existing image before it, every missing matrix is written
const FAKE_TOOL: &str = r#"#!/bin/sh
last=""
for arg in "$@"; do
  case "$arg" in
    *.nii.gz)
      if [ -e "$arg" ]; then
        last="$arg"
      elif [ -n "$last" ]; then
        cp "$last" "$arg"
      else
        : > "$arg"
      fi
      ;;
    *.mat)
      [ -e "$arg" ] || echo "1 0 0 0" > "$arg"
      ;;
  esac
done
echo "tool $*" >> "@CALL_LOG@"
"#;

/// Stand-in for nnUNetv2_predict: one prediction per case, copied from channel 0
const FAKE_SEGMENTER: &str = r#"#!/bin/sh
while [ $# -gt 0 ]; do
  case "$1" in
    -i) input="$2"; shift ;;
    -o) output="$2"; shift ;;
  esac
  shift
done
for case in 001 002; do
  cp "$input/MTL_${case}_0000.nii.gz" "$output/MTL_${case}.nii.gz" || exit 1
done
echo "segmenter" >> "@CALL_LOG@"
"#;

/// c3d that cannot read its input
const FAILING_TOOL: &str = r#"#!/bin/sh
echo "cannot read $1" >&2
exit 1
"#;

struct Workspace {
    _root: TempDir,
    dataset: PathBuf,
    template: PathBuf,
    raw: PathBuf,
    tools: PathBuf,
    call_log: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let dataset = root.path().join("dataset");
        let template = root.path().join("template");
        let raw = root.path().join("raw");
        let tools = root.path().join("tools");
        for dir in [&dataset, &template, &raw, &tools] {
            fs::create_dir_all(dir).unwrap();
        }
        let call_log = root.path().join("calls.log");

        let layout = TemplateLayout::new(&template);
        write_volume(&layout.image());
        for side in Side::ALL {
            write_volume(&layout.roi(side));
        }

        let ws = Self {
            _root: root,
            dataset,
            template,
            raw,
            tools,
            call_log,
        };
        ws.write_script("fake_tool.sh", FAKE_TOOL, 0o755);
        ws.write_script("fake_segmenter.sh", FAKE_SEGMENTER, 0o755);
        ws.write_script("failing_tool.sh", FAILING_TOOL, 0o755);
        // Left non-executable; the pipeline fixes the mode before trimming
        ws.write_script("fake_trim.sh", FAKE_TOOL, 0o644);
        ws
    }

    fn write_script(&self, name: &str, body: &str, mode: u32) {
        let path = self.tools.join(name);
        let body = body.replace("@CALL_LOG@", &self.call_log.display().to_string());
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
    }

    /// Subject folder whose inputs are symlinks into the raw directory
    fn add_subject(&self, subject: &str, modalities: &[Modality]) -> SubjectLayout {
        let dir = self.dataset.join(subject);
        fs::create_dir_all(&dir).unwrap();
        let layout = SubjectLayout::new(&dir, TemplateLayout::new(&self.template));

        for modality in modalities {
            let raw = self
                .raw
                .join(format!("{}_{}", subject, modality.input_file_name()));
            write_volume(&raw);
            std::os::unix::fs::symlink(&raw, layout.input(*modality)).unwrap();
        }
        layout
    }

    fn calls(&self) -> usize {
        fs::read_to_string(&self.call_log)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    fn runner(&self, config: PipelineConfig) -> BatchRunner {
        self.runner_with_c3d(config, "fake_tool.sh")
    }

    fn runner_with_c3d(&self, config: PipelineConfig, c3d: &str) -> BatchRunner {
        let tool = self.tools.join("fake_tool.sh");
        let trim = self.tools.join("fake_trim.sh");
        let paths = ToolPaths {
            c3d: self.tools.join(c3d),
            greedy: tool,
            trim_neck: trim.clone(),
            segmenter: self.tools.join("fake_segmenter.sh"),
        };
        let config = PipelineConfig {
            trim_neck_script: Some(trim),
            ..config
        };

        let time_provider = Arc::new(SystemTimeProvider);
        let fs = Arc::new(LocalFs::new());
        let pipeline = Arc::new(SubjectPipeline::new(
            Arc::new(SubprocessToolRunner::new(paths, time_provider.clone())),
            fs.clone(),
            Arc::new(NoisePlaceholderWriter::new()),
            time_provider,
            config,
        ));
        BatchRunner::new(pipeline, fs, Arc::new(UuidProvider))
    }

    fn request(&self, subjects: &[&str]) -> BatchRequest {
        BatchRequest {
            dataset_root: self.dataset.clone(),
            template_dir: self.template.clone(),
            subjects: subjects.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn write_volume(path: &Path) {
    let data = Array3::<f32>::from_elem(SHAPE, 1.0);
    WriterOptions::new(path).write_nifti(&data).unwrap();
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// Every modality present: all steps run, raw data untouched, report written
#[tokio::test]
async fn test_full_subject_end_to_end() {
    let ws = Workspace::new();
    let layout = ws.add_subject("sub01", &Modality::ALL);
    let raw_before = fs::read(ws.raw.join("sub01_image_7tt2.nii.gz")).unwrap();

    let (_tx, shutdown) = shutdown_channel();
    let summary = ws
        .runner(PipelineConfig::default())
        .run(&ws.request(&[]), &shutdown)
        .await
        .unwrap();

    assert_eq!(summary.completed_count(), 1, "{:?}", summary.outcomes);
    assert_eq!(summary.failed_count(), 0);
    assert_eq!(ws.calls(), 44);

    // Linked inputs were replaced by reoriented copies
    for modality in Modality::ALL {
        let input = layout.input(modality);
        assert!(input.exists());
        assert!(!is_symlink(&input), "{} still a link", input.display());
    }
    assert_eq!(
        fs::read(ws.raw.join("sub01_image_7tt2.nii.gz")).unwrap(),
        raw_before
    );

    // Trim script was made executable
    let mode = fs::metadata(ws.tools.join("fake_trim.sh"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o755);

    for side in Side::ALL {
        let segmentation = layout.segmentation(side);
        assert!(is_symlink(&segmentation));
        assert_eq!(
            fs::read_link(&segmentation).unwrap(),
            layout.segmenter_prediction(side)
        );
        for channel in 0..=4 {
            assert!(is_symlink(&layout.segmenter_channel(side, channel)));
        }
    }

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(layout.report()).unwrap()).unwrap();
    assert_eq!(report["status"], "COMPLETED");
    assert_eq!(report["run_id"], summary.run_id.as_str());
    assert_eq!(report["steps"].as_array().unwrap().len(), 6);

    println!("✅ Full subject processed with {} tool calls", ws.calls());
}

/// A failed reorientation leaves the linked inputs in place for the next run
#[tokio::test]
async fn test_failed_orientation_keeps_inputs() {
    let ws = Workspace::new();
    let layout = ws.add_subject("sub01", &Modality::ALL);
    let (_tx, shutdown) = shutdown_channel();

    let summary = ws
        .runner_with_c3d(PipelineConfig::default(), "failing_tool.sh")
        .run(&ws.request(&[]), &shutdown)
        .await
        .unwrap();

    assert_eq!(summary.outcomes[0].status, SubjectStatus::Failed);
    assert!(summary.outcomes[0]
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("c3d failed during orientation"));
    for modality in Modality::ALL {
        let input = layout.input(modality);
        assert!(is_symlink(&input), "{} lost", input.display());
        assert!(input.exists());
        assert!(!layout.oriented_input(modality).exists());
    }

    let summary = ws
        .runner(PipelineConfig::default())
        .run(&ws.request(&[]), &shutdown)
        .await
        .unwrap();

    assert_eq!(summary.completed_count(), 1, "{:?}", summary.outcomes);
    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(layout.report()).unwrap()).unwrap();
    assert!(report["missing"].as_array().unwrap().is_empty());
}

/// A resumed run only repeats calls without declared outputs
#[tokio::test]
async fn test_resume_skips_finished_calls() {
    let ws = Workspace::new();
    ws.add_subject("sub01", &Modality::ALL);
    let (_tx, shutdown) = shutdown_channel();

    ws.runner(PipelineConfig::default())
        .run(&ws.request(&[]), &shutdown)
        .await
        .unwrap();
    let first = ws.calls();

    let resumed = PipelineConfig {
        resume: true,
        ..PipelineConfig::default()
    };
    let summary = ws
        .runner(resumed)
        .run(&ws.request(&[]), &shutdown)
        .await
        .unwrap();

    assert_eq!(summary.completed_count(), 1);
    // Reoriented copies are renamed away, so reorientation runs again
    assert_eq!(ws.calls() - first, 5);
}

/// Missing 7T-T1: both cases get noise volumes shaped like the 7T-T2 patch
#[tokio::test]
async fn test_missing_modality_gets_noise_placeholder() {
    let ws = Workspace::new();
    let layout = ws.add_subject(
        "sub01",
        &[Modality::T2w7T, Modality::T1w3T, Modality::T2w3T],
    );
    let config = PipelineConfig {
        noise_seed: Some(5),
        ..PipelineConfig::default()
    };

    let (_tx, shutdown) = shutdown_channel();
    let summary = ws
        .runner(config)
        .run(&ws.request(&[]), &shutdown)
        .await
        .unwrap();

    assert_eq!(summary.completed_count(), 1, "{:?}", summary.outcomes);

    for side in Side::ALL {
        for channel in [1, 2] {
            let placeholder = layout.segmenter_channel(side, channel);
            assert!(!is_symlink(&placeholder));

            let obj = ReaderOptions::new().read_file(&placeholder).unwrap();
            let dim = obj.header().dim;
            assert_eq!(
                (dim[1] as usize, dim[2] as usize, dim[3] as usize),
                SHAPE
            );
        }
        for channel in [3, 4] {
            assert!(is_symlink(&layout.segmenter_channel(side, channel)));
        }
    }

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(layout.report()).unwrap()).unwrap();
    assert_eq!(report["missing"], serde_json::json!(["7tt1_inv1", "7tt1_inv2"]));
    assert_eq!(report["present"], serde_json::json!(["3tt1", "3tt2", "7tt2"]));
}

/// One broken subject does not stop the others
#[tokio::test]
async fn test_batch_continues_after_failed_subject() {
    let ws = Workspace::new();
    ws.add_subject("sub01", &[Modality::T1w3T, Modality::T2w3T]);
    let good = ws.add_subject("sub02", &Modality::ALL);

    let (_tx, shutdown) = shutdown_channel();
    let summary = ws
        .runner(PipelineConfig::default())
        .run(&ws.request(&[]), &shutdown)
        .await
        .unwrap();

    assert_eq!(summary.outcomes.len(), 2);
    assert_eq!(summary.outcomes[0].subject, "sub01");
    assert_eq!(summary.outcomes[0].status, SubjectStatus::Failed);
    assert!(summary.outcomes[0]
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("image_7tt2.nii.gz"));
    assert_eq!(summary.outcomes[1].status, SubjectStatus::Completed);
    assert!(good.segmentation(Side::Left).exists());
}

/// Shutdown before the batch starts processes nothing
#[tokio::test]
async fn test_shutdown_stops_batch() {
    let ws = Workspace::new();
    ws.add_subject("sub01", &Modality::ALL);

    let (tx, shutdown) = shutdown_channel();
    tx.shutdown();

    let summary = ws
        .runner(PipelineConfig::default())
        .run(&ws.request(&["sub01"]), &shutdown)
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert!(summary.outcomes.is_empty());
    assert_eq!(ws.calls(), 0);
}
