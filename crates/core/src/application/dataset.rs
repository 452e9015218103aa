// Dataset Preparer - per-subject symlink folders from a raw BIDS release

use crate::constants::{BNU_FIRST_SUBJECT, BNU_LAST_SUBJECT};
use crate::domain::error::{DomainError, Result as DomainResult};
use crate::error::Result;
use crate::port::SubjectFs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Inclusive range of numeric subject ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubjectRange {
    first: u32,
    last: u32,
}

impl SubjectRange {
    pub fn new(first: u32, last: u32) -> DomainResult<Self> {
        if first == 0 || first > last {
            return Err(DomainError::InvalidSubjectRange(format!("{}-{}", first, last)));
        }
        Ok(Self { first, last })
    }

    /// `"7"` or `"1-20"`
    pub fn parse(s: &str) -> DomainResult<Self> {
        let invalid = || DomainError::InvalidSubjectRange(s.to_string());
        let number = |p: &str| p.trim().parse::<u32>().map_err(|_| invalid());

        match s.split_once('-') {
            Some((first, last)) => Self::new(number(first)?, number(last)?),
            None => {
                let id = number(s)?;
                Self::new(id, id)
            }
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> {
        self.first..=self.last
    }
}

impl Default for SubjectRange {
    fn default() -> Self {
        Self {
            first: BNU_FIRST_SUBJECT,
            last: BNU_LAST_SUBJECT,
        }
    }
}

impl std::str::FromStr for SubjectRange {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        Self::parse(s)
    }
}

/// Result of preparing one subject folder
#[derive(Debug, Clone)]
pub struct PreparedSubject {
    pub subject: String,
    pub directory: PathBuf,
    pub linked: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
}

/// Raw file -> pipeline input name for one BNU subject
fn bnu_sources(source: &Path, id: u32) -> Vec<(PathBuf, &'static str)> {
    let sub = format!("sub-{:02}", id);
    let anat_3t = source
        .join("rawdata_BIDS_3T")
        .join("rawdata_BIDS_3T")
        .join(&sub)
        .join("anat");
    let anat_7t = source
        .join("rawdata_BIDS_7T")
        .join("rawdata_BIDS_7T")
        .join(&sub)
        .join("anat");

    // Subject 7 has a repeated 7T-T1 acquisition
    let t1_7t = if id == 7 {
        format!("{}_acq-t1wmprage070isoND_run-1_T1w.nii.gz", sub)
    } else {
        format!("{}_acq-t1wmprage070isoND_T1w.nii.gz", sub)
    };

    vec![
        (
            anat_3t.join(format!("{}_acq-t1mpragesag10isoTI1000_T1w.nii.gz", sub)),
            "image_3tt1.nii.gz",
        ),
        (
            anat_3t.join(format!("{}_acq-t2tseCOR_echo-1_T2w.nii.gz", sub)),
            "image_3tt2.nii.gz",
        ),
        (anat_7t.join(t1_7t), "image_7tt1.nii.gz"),
        (
            anat_7t.join(format!("{}_acq-t2wspace04x04x10ND_T2w.nii.gz", sub)),
            "image_7tt2.nii.gz",
        ),
    ]
}

pub struct DatasetPreparer {
    fs: Arc<dyn SubjectFs>,
}

impl DatasetPreparer {
    pub fn new(fs: Arc<dyn SubjectFs>) -> Self {
        Self { fs }
    }

    /// Link the BNU 3T/7T release into `target/subNN` folders
    pub fn prepare_bnu(
        &self,
        source: &Path,
        target: &Path,
        range: SubjectRange,
    ) -> Result<Vec<PreparedSubject>> {
        let mut prepared = Vec::new();

        for id in range.ids() {
            let subject = format!("sub{:02}", id);
            let directory = target.join(&subject);
            self.fs.create_dir_all(&directory)?;

            let mut entry = PreparedSubject {
                subject: subject.clone(),
                directory: directory.clone(),
                linked: Vec::new(),
                missing: Vec::new(),
            };

            for (raw, name) in bnu_sources(source, id) {
                if !self.fs.exists(&raw) {
                    warn!(subject = %subject, path = %raw.display(), "Raw file missing, not linked");
                    entry.missing.push(raw);
                    continue;
                }
                let link = directory.join(name);
                self.fs.create_link(&raw, &link)?;
                entry.linked.push(link);
            }

            info!(
                subject = %subject,
                linked = entry.linked.len(),
                missing = entry.missing.len(),
                "Prepared subject"
            );
            prepared.push(entry);
        }

        Ok(prepared)
    }
}
