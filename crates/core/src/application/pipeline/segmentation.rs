// Step 5: stage model inputs, run inference, link the results

use super::PipelineConfig;
use crate::domain::{
    Action, InputInventory, Modality, Side, Step, StepPlan, SubjectLayout, Tool, ToolInvocation,
};

/// Model input channels after channel 0 (the 7T-T2 patch)
const CHANNELS: [(u32, Modality); 4] = [
    (1, Modality::T1wInv1_7T),
    (2, Modality::T1wInv2_7T),
    (3, Modality::T2w3T),
    (4, Modality::T1w3T),
];

pub(super) fn plan(
    layout: &SubjectLayout,
    inventory: &InputInventory,
    config: &PipelineConfig,
) -> StepPlan {
    let mut step = StepPlan::new(Step::Segmentation);
    let input_dir = layout.segmenter_input_dir();
    let output_dir = layout.segmenter_output_dir();

    step.push(Action::CreateDir(input_dir.clone()));
    step.push(Action::CreateDir(output_dir.clone()));

    for side in Side::ALL {
        let reference = layout.patch(side, Modality::T2w7T);

        step.push(Action::Link {
            source: reference.clone(),
            target: layout.segmenter_channel(side, 0),
        });

        for (channel, modality) in CHANNELS {
            let target = layout.segmenter_channel(side, channel);
            let aligned = layout
                .aligned_patch(side, modality)
                .filter(|_| inventory.registers_locally(modality));

            match aligned {
                Some(source) => step.push(Action::Link { source, target }),
                None => step.push(Action::Placeholder {
                    reference: reference.clone(),
                    output: target,
                    seed: config
                        .noise_seed
                        .map(|s| s.wrapping_add(u64::from(side.case_id() * 10 + channel))),
                }),
            }
        }
    }

    let mut predict = ToolInvocation::new(Tool::Segmenter)
        .arg("-i")
        .path(&input_dir)
        .arg("-o")
        .path(&output_dir)
        .arg("-d")
        .arg(config.segmenter.dataset.to_string())
        .arg("-c")
        .arg(config.segmenter.configuration.as_str())
        .arg("-tr")
        .arg(config.segmenter.trainer.as_str());
    for side in Side::ALL {
        predict = predict.produces(layout.segmenter_prediction(side));
    }
    step.run(predict);

    for side in Side::ALL {
        step.push(Action::Link {
            source: layout.segmenter_prediction(side),
            target: layout.segmentation(side),
        });
    }

    step
}
