// Step 1: rigid registration of every modality to 7T-T2

use super::reslice;
use crate::domain::{InputInventory, Modality, Step, StepPlan, SubjectLayout, ToolInvocation};

const GLOBAL_RIGID: &str = "-a -dof 6 -ia-image-centers -n 100x50x10 -m NMI";

pub(super) fn plan(layout: &SubjectLayout, inventory: &InputInventory) -> StepPlan {
    let mut step = StepPlan::new(Step::GlobalRegistration);
    let reference = layout.input(Modality::T2w7T);

    if inventory.has_7t_t1() {
        // Both inversions share one rigid transform
        let matrix = layout.global_7t_t1_matrix();
        let inv1 = layout.input(Modality::T1wInv1_7T);
        let inv2 = layout.input(Modality::T1wInv2_7T);

        step.run(
            ToolInvocation::greedy()
                .args_str(GLOBAL_RIGID)
                .arg("-i")
                .path(&reference)
                .path(&inv1)
                .arg("-i")
                .path(&reference)
                .path(&inv2)
                .arg("-o")
                .output(&matrix),
        );

        for modality in [Modality::T1wInv1_7T, Modality::T1wInv2_7T] {
            if let Some(output) = layout.globally_registered(modality) {
                step.run(reslice(
                    &reference,
                    &layout.input(modality),
                    &output,
                    &[matrix.clone()],
                ));
            }
        }
    }

    if inventory.has_3t_t1() {
        let matrix = layout.global_3t_t1_matrix();

        step.run(
            ToolInvocation::greedy()
                .args_str(GLOBAL_RIGID)
                .arg("-i")
                .path(&reference)
                .path(layout.input(Modality::T1w3T))
                .arg("-o")
                .output(&matrix),
        );

        // 3T-T2 follows the 3T-T1 transform
        for modality in [Modality::T1w3T, Modality::T2w3T] {
            if !inventory.registers_globally(modality) {
                continue;
            }
            if let Some(output) = layout.globally_registered(modality) {
                step.run(reslice(
                    &reference,
                    &layout.input(modality),
                    &output,
                    &[matrix.clone()],
                ));
            }
        }
    }

    step
}
