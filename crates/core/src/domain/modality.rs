// Modality & Side - the fixed vocabulary of the pipeline

use serde::{Deserialize, Serialize};

/// One of the five expected acquisitions of a subject
/// Serialized with the same label as its file names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Modality {
    /// 3T T1-weighted MPRAGE
    #[serde(rename = "3tt1")]
    T1w3T,
    /// 3T T2-weighted TSE
    #[serde(rename = "3tt2")]
    T2w3T,
    /// 7T T2-weighted; the reference space of every other image
    #[serde(rename = "7tt2")]
    T2w7T,
    /// 7T T1-weighted MP2RAGE, first inversion
    #[serde(rename = "7tt1_inv1")]
    T1wInv1_7T,
    /// 7T T1-weighted MP2RAGE, second inversion
    #[serde(rename = "7tt1_inv2")]
    T1wInv2_7T,
}

impl Modality {
    pub const ALL: [Modality; 5] = [
        Modality::T1w3T,
        Modality::T2w3T,
        Modality::T2w7T,
        Modality::T1wInv1_7T,
        Modality::T1wInv2_7T,
    ];

    /// Short label used in derived file names (`patch_left_<label>.nii.gz`)
    pub fn label(&self) -> &'static str {
        match self {
            Modality::T1w3T => "3tt1",
            Modality::T2w3T => "3tt2",
            Modality::T2w7T => "7tt2",
            Modality::T1wInv1_7T => "7tt1_inv1",
            Modality::T1wInv2_7T => "7tt1_inv2",
        }
    }

    /// Input file name inside a subject directory
    pub fn input_file_name(&self) -> String {
        format!("image_{}.nii.gz", self.label())
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Modality::T2w7T)
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Hemisphere of a region of interest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Left, Side::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    /// Case number of this side in the segmentation input folder
    pub fn case_id(&self) -> u32 {
        match self {
            Side::Left => 1,
            Side::Right => 2,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_file_names() {
        assert_eq!(Modality::T1w3T.input_file_name(), "image_3tt1.nii.gz");
        assert_eq!(Modality::T2w3T.input_file_name(), "image_3tt2.nii.gz");
        assert_eq!(Modality::T2w7T.input_file_name(), "image_7tt2.nii.gz");
        assert_eq!(
            Modality::T1wInv1_7T.input_file_name(),
            "image_7tt1_inv1.nii.gz"
        );
        assert_eq!(
            Modality::T1wInv2_7T.input_file_name(),
            "image_7tt1_inv2.nii.gz"
        );
    }

    #[test]
    fn test_only_7t_t2_is_reference() {
        let references: Vec<_> = Modality::ALL.iter().filter(|m| m.is_reference()).collect();
        assert_eq!(references, vec![&Modality::T2w7T]);
    }

    #[test]
    fn test_serialized_name_is_label() {
        for modality in Modality::ALL {
            let json = serde_json::to_string(&modality).unwrap();
            assert_eq!(json, format!("\"{}\"", modality.label()));
            let back: Modality = serde_json::from_str(&json).unwrap();
            assert_eq!(back, modality);
        }
    }

    #[test]
    fn test_side_case_ids() {
        assert_eq!(Side::Left.case_id(), 1);
        assert_eq!(Side::Right.case_id(), 2);
        assert_eq!(Side::Right.to_string(), "right");
    }
}
