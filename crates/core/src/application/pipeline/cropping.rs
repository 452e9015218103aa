// Step 3: crop every registered image to the ROI bounding box

use crate::domain::{InputInventory, Modality, Side, Step, StepPlan, SubjectLayout, ToolInvocation};

/// Cropping order of the non-reference modalities
const CROPPED: [Modality; 4] = [
    Modality::T1wInv1_7T,
    Modality::T1wInv2_7T,
    Modality::T1w3T,
    Modality::T2w3T,
];

pub(super) fn plan(layout: &SubjectLayout, inventory: &InputInventory) -> StepPlan {
    let mut step = StepPlan::new(Step::PatchCropping);

    for side in Side::ALL {
        let patch_roi = layout.patch_roi(side);

        step.run(
            ToolInvocation::c3d()
                .path(layout.global_roi(side))
                .arg("-trim")
                .arg("0vox")
                .arg("-o")
                .output(&patch_roi),
        );

        step.run(crop(
            &patch_roi,
            &layout.input(Modality::T2w7T),
            &layout.patch(side, Modality::T2w7T),
        ));

        for modality in CROPPED {
            if !inventory.registers_globally(modality) {
                continue;
            }
            if let Some(source) = layout.globally_registered(modality) {
                step.run(crop(&patch_roi, &source, &layout.patch(side, modality)));
            }
        }
    }

    step
}

/// `c3d <roi> <image> -reslice-identity -o <patch>`
fn crop(
    roi: &std::path::Path,
    image: &std::path::Path,
    patch: &std::path::Path,
) -> ToolInvocation {
    ToolInvocation::c3d()
        .path(roi)
        .path(image)
        .arg("-reslice-identity")
        .arg("-o")
        .output(patch)
}
