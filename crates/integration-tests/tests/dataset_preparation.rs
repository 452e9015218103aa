//! BNU dataset preparation against the local filesystem
#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mtlseg_core::application::{DatasetPreparer, SubjectRange};
use mtlseg_core::domain::{Modality, SubjectLayout, TemplateLayout};
use mtlseg_infra_system::LocalFs;

fn anat(root: &Path, field: &str, id: u32) -> PathBuf {
    let release = format!("rawdata_BIDS_{}", field);
    root.join(&release)
        .join(&release)
        .join(format!("sub-{:02}", id))
        .join("anat")
}

fn touch(path: PathBuf) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"nii").unwrap();
}

/// Raw release for one subject; sub-07 carries the run-1 7T-T1 name
fn write_raw_subject(root: &Path, id: u32, with_3t_t2: bool) {
    let sub = format!("sub-{:02}", id);
    let t1_7t = if id == 7 {
        format!("{}_acq-t1wmprage070isoND_run-1_T1w.nii.gz", sub)
    } else {
        format!("{}_acq-t1wmprage070isoND_T1w.nii.gz", sub)
    };

    touch(anat(root, "3T", id).join(format!("{}_acq-t1mpragesag10isoTI1000_T1w.nii.gz", sub)));
    if with_3t_t2 {
        touch(anat(root, "3T", id).join(format!("{}_acq-t2tseCOR_echo-1_T2w.nii.gz", sub)));
    }
    touch(anat(root, "7T", id).join(t1_7t));
    touch(anat(root, "7T", id).join(format!("{}_acq-t2wspace04x04x10ND_T2w.nii.gz", sub)));
}

/// Subjects are linked into subNN folders, missing raw files are skipped
#[test]
fn test_prepare_bnu_links_release() {
    let root = tempfile::tempdir().unwrap();
    let raw = root.path().join("raw");
    let dataset = root.path().join("dataset");
    write_raw_subject(&raw, 1, true);
    write_raw_subject(&raw, 2, false);

    let prepared = DatasetPreparer::new(Arc::new(LocalFs::new()))
        .prepare_bnu(&raw, &dataset, SubjectRange::new(1, 2).unwrap())
        .unwrap();

    assert_eq!(prepared.len(), 2);
    assert_eq!(prepared[0].subject, "sub01");
    assert_eq!(prepared[0].linked.len(), 4);
    assert!(prepared[0].missing.is_empty());
    assert_eq!(prepared[1].linked.len(), 3);
    assert_eq!(prepared[1].missing.len(), 1);

    let layout = SubjectLayout::new(dataset.join("sub01"), TemplateLayout::new("/unused"));
    for modality in [Modality::T1w3T, Modality::T2w3T, Modality::T2w7T] {
        let link = layout.input(modality);
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read(&link).unwrap(), b"nii");
    }
    assert!(dataset.join("sub01").join("image_7tt1.nii.gz").exists());
    assert!(!dataset.join("sub02").join("image_3tt2.nii.gz").exists());

    println!("✅ BNU release linked into {}", dataset.display());
}

/// Subject 7 uses the run-1 acquisition; re-running replaces existing links
#[test]
fn test_prepare_bnu_subject_seven_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    let raw = root.path().join("raw");
    let dataset = root.path().join("dataset");
    write_raw_subject(&raw, 7, true);

    let preparer = DatasetPreparer::new(Arc::new(LocalFs::new()));
    let range = SubjectRange::parse("7").unwrap();
    preparer.prepare_bnu(&raw, &dataset, range).unwrap();
    let prepared = preparer.prepare_bnu(&raw, &dataset, range).unwrap();

    assert_eq!(prepared[0].subject, "sub07");
    assert_eq!(prepared[0].linked.len(), 4);

    let target = fs::read_link(dataset.join("sub07").join("image_7tt1.nii.gz")).unwrap();
    assert!(target.to_string_lossy().ends_with("_run-1_T1w.nii.gz"));
}
