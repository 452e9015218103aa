// Step 4: per-patch rigid refinement onto the 7T-T2 patch

use super::reslice;
use crate::domain::{InputInventory, Modality, Side, Step, StepPlan, SubjectLayout, ToolInvocation};

const LOCAL_7T_T1: &str = "-a -dof 6 -m NCC 2x2x2 -ia-identity -n 100x50";
const LOCAL_3T_T2: &str = "-a -dof 6 -m WNCC 2x2x2 -gm-trim 5x5x5 -ia-identity -n 100x50";
const LOCAL_3T_T1: &str = "-a -dof 6 -m NMI -ia-identity -n 100x50";

pub(super) fn plan(layout: &SubjectLayout, inventory: &InputInventory) -> StepPlan {
    let mut step = StepPlan::new(Step::LocalRegistration);

    for side in Side::ALL {
        let fixed = layout.patch(side, Modality::T2w7T);

        if inventory.has_7t_t1() {
            let matrix = layout.local_7t_t1_matrix(side);

            step.run(
                ToolInvocation::greedy()
                    .args_str(LOCAL_7T_T1)
                    .arg("-i")
                    .path(&fixed)
                    .path(layout.patch(side, Modality::T1wInv1_7T))
                    .arg("-o")
                    .output(&matrix),
            );

            for modality in [Modality::T1wInv1_7T, Modality::T1wInv2_7T] {
                if let Some(output) = layout.aligned_patch(side, modality) {
                    step.run(reslice(
                        &fixed,
                        &layout.patch(side, modality),
                        &output,
                        &[matrix.clone()],
                    ));
                }
            }
        }

        if inventory.has_3t_pair() {
            let t2_patch = layout.patch(side, Modality::T2w3T);
            let t2_matrix = layout.local_3t_t2_matrix(side);
            let t1_matrix = layout.local_3t_t1_to_3t_t2_matrix(side);

            step.run(
                ToolInvocation::greedy()
                    .args_str(LOCAL_3T_T2)
                    .arg("-i")
                    .path(&fixed)
                    .path(&t2_patch)
                    .arg("-o")
                    .output(&t2_matrix),
            );
            if let Some(output) = layout.aligned_patch(side, Modality::T2w3T) {
                step.run(reslice(&fixed, &t2_patch, &output, &[t2_matrix.clone()]));
            }

            // 3T-T1 goes through 3T-T2: T1 -> T2 -> 7T
            step.run(
                ToolInvocation::greedy()
                    .args_str(LOCAL_3T_T1)
                    .arg("-i")
                    .path(&t2_patch)
                    .path(layout.patch(side, Modality::T1w3T))
                    .arg("-o")
                    .output(&t1_matrix),
            );
            if let Some(output) = layout.aligned_patch(side, Modality::T1w3T) {
                step.run(reslice(
                    &fixed,
                    &layout.patch(side, Modality::T1w3T),
                    &output,
                    &[t2_matrix.clone(), t1_matrix.clone()],
                ));
            }
        }
    }

    step
}
