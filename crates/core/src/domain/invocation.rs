// Invocation & Plan Domain Model
//
// A plan is a list of steps; a step is a list of actions; an action is
// either a call to an external tool or a small filesystem operation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// External collaborator a command is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    /// Image conversion / resampling (c3d)
    Convert3D,
    /// Rigid, affine and deformable registration (greedy)
    Greedy,
    /// Neck trimming script
    TrimNeck,
    /// Trained segmentation model inference
    Segmenter,
}

impl Tool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::Convert3D => "c3d",
            Tool::Greedy => "greedy",
            Tool::TrimNeck => "trim_neck",
            Tool::Segmenter => "segmenter",
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One opaque command line for an external tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool: Tool,
    pub args: Vec<String>,
    /// Files the call must produce
    pub outputs: Vec<PathBuf>,
}

impl ToolInvocation {
    pub fn new(tool: Tool) -> Self {
        Self {
            tool,
            args: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Greedy call in 3-D mode
    pub fn greedy() -> Self {
        Self::new(Tool::Greedy).arg("-d").arg("3")
    }

    pub fn c3d() -> Self {
        Self::new(Tool::Convert3D)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a whitespace separated option string (`"-a -dof 6"`)
    pub fn args_str(mut self, args: &str) -> Self {
        self.args.extend(args.split_whitespace().map(|s| s.to_string()));
        self
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.args.push(path.as_ref().display().to_string());
        self
    }

    /// Append a path argument that the call writes
    pub fn output(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.args.push(path.display().to_string());
        self.outputs.push(path.to_path_buf());
        self
    }

    /// Declare an output that does not appear literally in the arguments
    pub fn produces(mut self, path: impl Into<PathBuf>) -> Self {
        self.outputs.push(path.into());
        self
    }
}

impl std::fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tool)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// One unit of pipeline work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Run(ToolInvocation),
    /// Symlink `target` -> `source` (replacing whatever is at `target`)
    Link { source: PathBuf, target: PathBuf },
    /// Noise volume with the geometry of `reference`
    Placeholder {
        reference: PathBuf,
        output: PathBuf,
        seed: Option<u64>,
    },
    CreateDir(PathBuf),
    /// Move `from` over `to`; a link at `to` is replaced, never followed
    Rename { from: PathBuf, to: PathBuf },
    EnsureExecutable(PathBuf),
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Run(inv) => write!(f, "{}", inv),
            Action::Link { source, target } => {
                write!(f, "link {} -> {}", target.display(), source.display())
            }
            Action::Placeholder {
                reference, output, ..
            } => write!(
                f,
                "placeholder {} (like {})",
                output.display(),
                reference.display()
            ),
            Action::CreateDir(p) => write!(f, "mkdir -p {}", p.display()),
            Action::Rename { from, to } => write!(f, "mv {} {}", from.display(), to.display()),
            Action::EnsureExecutable(p) => write!(f, "chmod 755 {}", p.display()),
        }
    }
}

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Orientation,
    GlobalRegistration,
    RoiDerivation,
    PatchCropping,
    LocalRegistration,
    Segmentation,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Step::Orientation => "orientation",
            Step::GlobalRegistration => "global_registration",
            Step::RoiDerivation => "roi_derivation",
            Step::PatchCropping => "patch_cropping",
            Step::LocalRegistration => "local_registration",
            Step::Segmentation => "segmentation",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepPlan {
    pub step: Step,
    pub actions: Vec<Action>,
}

impl StepPlan {
    pub fn new(step: Step) -> Self {
        Self {
            step,
            actions: Vec::new(),
        }
    }

    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn run(&mut self, invocation: ToolInvocation) {
        self.actions.push(Action::Run(invocation));
    }

    pub fn invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.actions.iter().filter_map(|a| match a {
            Action::Run(inv) => Some(inv),
            _ => None,
        })
    }
}

/// Full ordered work list of one subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelinePlan {
    pub subject: String,
    pub steps: Vec<StepPlan>,
}

impl PipelinePlan {
    pub fn step(&self, step: Step) -> Option<&StepPlan> {
        self.steps.iter().find(|s| s.step == step)
    }

    pub fn action_count(&self) -> usize {
        self.steps.iter().map(|s| s.actions.len()).sum()
    }
}
