// Step 2: derive left/right ROI masks in 7T-T2 space from the template

use super::{reslice, PipelineConfig, PipelineError};
use crate::domain::{
    Action, InputInventory, Modality, Side, Step, StepPlan, SubjectLayout, Tool, ToolInvocation,
};
use crate::port::SubjectFs;

const TEMPLATE_AFFINE: &str = "-a -m NCC 2x2x2 -ia-image-centers -n 100x50x10";
const TEMPLATE_DEFORMABLE: &str = "-m NCC 2x2x2 -ia-image-centers -n 100x50x10";

/// Neck trimming, then template -> trimmed 3T-T1 (affine + deformable), then
/// template and ROI masks pushed through `3T rigid ∘ warp ∘ affine`.
///
/// Without a 3T-T1 the masks must already be in the subject directory.
pub(super) fn plan(
    layout: &SubjectLayout,
    inventory: &InputInventory,
    fs: &dyn SubjectFs,
    config: &PipelineConfig,
) -> Result<StepPlan, PipelineError> {
    let mut step = StepPlan::new(Step::RoiDerivation);

    if !inventory.has_3t_t1() {
        for side in Side::ALL {
            let roi = layout.global_roi(side);
            if !fs.exists(&roi) {
                return Err(PipelineError::MissingRoi(roi));
            }
        }
        return Ok(step);
    }

    let template = layout.template();
    let mut template_files = vec![template.image()];
    template_files.extend(Side::ALL.iter().map(|s| template.roi(*s)));
    if let Some(missing) = template_files.into_iter().find(|p| !fs.exists(p)) {
        return Err(PipelineError::MissingTemplate(missing));
    }

    let trimmed = layout.trimmed_3t_t1();
    let affine = layout.template_affine_matrix();
    let warp = layout.template_warp();
    let reference = layout.input(Modality::T2w7T);

    if let Some(script) = &config.trim_neck_script {
        step.push(Action::EnsureExecutable(script.clone()));
    }
    step.run(
        ToolInvocation::new(Tool::TrimNeck)
            .path(layout.input(Modality::T1w3T))
            .output(&trimmed),
    );

    step.run(
        ToolInvocation::greedy()
            .args_str(TEMPLATE_AFFINE)
            .arg("-i")
            .path(&trimmed)
            .path(template.image())
            .arg("-o")
            .output(&affine),
    );

    step.run(
        ToolInvocation::greedy()
            .args_str(TEMPLATE_DEFORMABLE)
            .arg("-i")
            .path(&trimmed)
            .path(template.image())
            .arg("-it")
            .path(&affine)
            .arg("-o")
            .output(&warp)
            .arg("-oinv")
            .output(layout.template_inverse_warp()),
    );

    let chain = [layout.global_3t_t1_matrix(), warp.clone(), affine.clone()];

    step.run(reslice(
        &reference,
        &template.image(),
        &layout.template_in_reference(),
        &chain,
    ));
    for side in Side::ALL {
        step.run(reslice(
            &reference,
            &template.roi(side),
            &layout.global_roi(side),
            &chain,
        ));
    }

    Ok(step)
}
