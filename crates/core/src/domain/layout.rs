// Subject Layout - path bookkeeping for one subject
//
// Every file the pipeline reads or writes is named here, nowhere else.

use super::modality::{Modality, Side};
use crate::constants::{REPORT_FILE_NAME, SEGMENTER_CASE_PREFIX};
use std::path::{Path, PathBuf};

/// Files of the region-of-interest template
#[derive(Debug, Clone)]
pub struct TemplateLayout {
    root: PathBuf,
}

impl TemplateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 3T-T1w template image
    pub fn image(&self) -> PathBuf {
        self.root.join("template.nii.gz")
    }

    /// Round ROI mask in template space
    pub fn roi(&self, side: Side) -> PathBuf {
        self.root.join(format!("{}_round_in_global_space.nii.gz", side))
    }
}

/// All paths of one subject directory
#[derive(Debug, Clone)]
pub struct SubjectLayout {
    subject: String,
    data_dir: PathBuf,
    template: TemplateLayout,
}

impl SubjectLayout {
    pub fn new(data_dir: impl Into<PathBuf>, template: TemplateLayout) -> Self {
        let data_dir = data_dir.into();
        let subject = data_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| data_dir.display().to_string());

        Self {
            subject,
            data_dir,
            template,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn template(&self) -> &TemplateLayout {
        &self.template
    }

    fn file(&self, name: impl AsRef<Path>) -> PathBuf {
        self.data_dir.join(name)
    }

    // ---- inputs ----

    pub fn input(&self, modality: Modality) -> PathBuf {
        self.file(modality.input_file_name())
    }

    /// Reoriented copy, renamed over the input once c3d succeeds
    pub fn oriented_input(&self, modality: Modality) -> PathBuf {
        self.file(format!("image_{}.orient.nii.gz", modality.label()))
    }

    // ---- step 1: global registration ----

    /// Modality resliced into 7T-T2 space by the global rigid transform.
    /// The reference itself has no registered counterpart.
    pub fn globally_registered(&self, modality: Modality) -> Option<PathBuf> {
        let name = match modality {
            Modality::T1w3T => "img_3t_t1_to_7t_t2.nii.gz",
            Modality::T2w3T => "img_3t_t2_to_7t_t2.nii.gz",
            Modality::T1wInv1_7T => "img_7t_t1_inv1_to_7t_t2.nii.gz",
            Modality::T1wInv2_7T => "img_7t_t1_inv2_to_7t_t2.nii.gz",
            Modality::T2w7T => return None,
        };
        Some(self.file(name))
    }

    pub fn global_7t_t1_matrix(&self) -> PathBuf {
        self.file("zmatrix_7t_t1_to_7t_t2.mat")
    }

    pub fn global_3t_t1_matrix(&self) -> PathBuf {
        self.file("zmatrix_3t_t1_to_7t_t2_only_nmi.mat")
    }

    // ---- step 2: ROI derivation ----

    pub fn trimmed_3t_t1(&self) -> PathBuf {
        self.file("image_3tt1_trim_neck.nii.gz")
    }

    pub fn template_affine_matrix(&self) -> PathBuf {
        self.file("zmatrix_template_to_registered_original_3tt1_trimed_ncc.mat")
    }

    pub fn template_warp(&self) -> PathBuf {
        self.file("zdeform_template_to_registered_original_3tt1_trimed_ncc.nii.gz")
    }

    pub fn template_inverse_warp(&self) -> PathBuf {
        self.file("zdeform_inverse_warp.nii.gz")
    }

    pub fn template_in_reference(&self) -> PathBuf {
        self.file("template_to_7tt2.nii.gz")
    }

    /// ROI mask warped into 7T-T2 space
    pub fn global_roi(&self, side: Side) -> PathBuf {
        self.file(format!("{}_template_round_to_7tt2.nii.gz", side))
    }

    // ---- step 3: patch cropping ----

    pub fn patch_roi(&self, side: Side) -> PathBuf {
        self.file(format!("patch_{}_roi.nii.gz", side))
    }

    pub fn patch(&self, side: Side, modality: Modality) -> PathBuf {
        self.file(format!("patch_{}_{}.nii.gz", side, modality.label()))
    }

    // ---- step 4: local registration ----

    pub fn local_7t_t1_matrix(&self, side: Side) -> PathBuf {
        self.file(format!("{}_zwmatrix_7t_t1_to_7t_t2.mat", side))
    }

    pub fn local_3t_t2_matrix(&self, side: Side) -> PathBuf {
        self.file(format!("{}_zwmatrix_3t_t2_to_7t_t2.mat", side))
    }

    pub fn local_3t_t1_to_3t_t2_matrix(&self, side: Side) -> PathBuf {
        self.file(format!("{}_zwmatrix_3t_t1_to_3t_t2.mat", side))
    }

    /// Patch re-registered onto the 7T-T2 patch. The reference patch is
    /// already in place and has no aligned counterpart.
    pub fn aligned_patch(&self, side: Side, modality: Modality) -> Option<PathBuf> {
        let stem = match modality {
            Modality::T1w3T => "3t_t1",
            Modality::T2w3T => "3t_t2",
            Modality::T1wInv1_7T => "7t_t1_inv1",
            Modality::T1wInv2_7T => "7t_t1_inv2",
            Modality::T2w7T => return None,
        };
        Some(self.file(format!("patch_{}_{}_to_7t_t2.nii.gz", side, stem)))
    }

    // ---- step 5: segmentation ----

    pub fn segmenter_dir(&self) -> PathBuf {
        self.file("nnunet")
    }

    pub fn segmenter_input_dir(&self) -> PathBuf {
        self.segmenter_dir().join("input")
    }

    pub fn segmenter_output_dir(&self) -> PathBuf {
        self.segmenter_dir().join("output")
    }

    pub fn segmenter_channel(&self, side: Side, channel: u32) -> PathBuf {
        self.segmenter_input_dir().join(format!(
            "{}_{:03}_{:04}.nii.gz",
            SEGMENTER_CASE_PREFIX,
            side.case_id(),
            channel
        ))
    }

    pub fn segmenter_prediction(&self, side: Side) -> PathBuf {
        self.segmenter_output_dir().join(format!(
            "{}_{:03}.nii.gz",
            SEGMENTER_CASE_PREFIX,
            side.case_id()
        ))
    }

    pub fn segmentation(&self, side: Side) -> PathBuf {
        self.file(format!("seg_{}.nii.gz", side))
    }

    pub fn report(&self) -> PathBuf {
        self.file(REPORT_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> SubjectLayout {
        SubjectLayout::new("/data/sub01", TemplateLayout::new("/tpl"))
    }

    #[test]
    fn test_subject_name_from_directory() {
        assert_eq!(layout().subject(), "sub01");
    }

    #[test]
    fn test_oriented_input_sits_next_to_input() {
        let l = layout();
        assert_eq!(
            l.oriented_input(Modality::T1wInv1_7T),
            PathBuf::from("/data/sub01/image_7tt1_inv1.orient.nii.gz")
        );
        assert_ne!(l.oriented_input(Modality::T2w7T), l.input(Modality::T2w7T));
    }

    #[test]
    fn test_template_paths() {
        let tpl = TemplateLayout::new("/tpl");
        assert_eq!(tpl.image(), PathBuf::from("/tpl/template.nii.gz"));
        assert_eq!(
            tpl.roi(Side::Right),
            PathBuf::from("/tpl/right_round_in_global_space.nii.gz")
        );
    }

    #[test]
    fn test_reference_has_no_registered_counterpart() {
        let l = layout();
        assert!(l.globally_registered(Modality::T2w7T).is_none());
        assert!(l.aligned_patch(Side::Left, Modality::T2w7T).is_none());
        assert_eq!(
            l.globally_registered(Modality::T1wInv2_7T).unwrap(),
            PathBuf::from("/data/sub01/img_7t_t1_inv2_to_7t_t2.nii.gz")
        );
    }

    #[test]
    fn test_patch_names() {
        let l = layout();
        assert_eq!(
            l.patch(Side::Left, Modality::T2w3T),
            PathBuf::from("/data/sub01/patch_left_3tt2.nii.gz")
        );
        assert_eq!(
            l.aligned_patch(Side::Right, Modality::T1w3T).unwrap(),
            PathBuf::from("/data/sub01/patch_right_3t_t1_to_7t_t2.nii.gz")
        );
        assert_eq!(
            l.local_3t_t1_to_3t_t2_matrix(Side::Left),
            PathBuf::from("/data/sub01/left_zwmatrix_3t_t1_to_3t_t2.mat")
        );
    }

    #[test]
    fn test_segmenter_names_are_zero_padded() {
        let l = layout();
        assert_eq!(
            l.segmenter_channel(Side::Left, 0),
            PathBuf::from("/data/sub01/nnunet/input/MTL_001_0000.nii.gz")
        );
        assert_eq!(
            l.segmenter_channel(Side::Right, 4),
            PathBuf::from("/data/sub01/nnunet/input/MTL_002_0004.nii.gz")
        );
        assert_eq!(
            l.segmenter_prediction(Side::Right),
            PathBuf::from("/data/sub01/nnunet/output/MTL_002.nii.gz")
        );
        assert_eq!(
            l.segmentation(Side::Left),
            PathBuf::from("/data/sub01/seg_left.nii.gz")
        );
    }
}
