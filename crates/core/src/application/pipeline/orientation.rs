// Step 0: bring every input to the same voxel axis ordering

use super::PipelineConfig;
use crate::domain::{Action, InputInventory, Step, StepPlan, SubjectLayout, ToolInvocation};
use tracing::debug;

/// `c3d <in> -swapdim <code> -o <in>.orient` for each present input, then the
/// reoriented copy is renamed over the input.
///
/// c3d follows a linked input to its raw file; the rename replaces the link
/// itself, so raw data is never rewritten and a failed call leaves the input
/// as it was.
pub(super) fn plan(
    layout: &SubjectLayout,
    inventory: &InputInventory,
    config: &PipelineConfig,
) -> StepPlan {
    let mut step = StepPlan::new(Step::Orientation);

    for (modality, file) in inventory.present() {
        let oriented = layout.oriented_input(modality);
        if let Some(target) = &file.link_target {
            debug!(
                input = %file.path.display(),
                target = %target.display(),
                "Linked input will be replaced by a reoriented copy"
            );
        }

        step.run(
            ToolInvocation::c3d()
                .path(&file.path)
                .arg("-swapdim")
                .arg(config.orientation.as_str())
                .arg("-o")
                .output(&oriented),
        );
        step.push(Action::Rename {
            from: oriented,
            to: file.path.clone(),
        });
    }

    step
}
