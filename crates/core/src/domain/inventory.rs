// Input Inventory - which acquisitions a subject actually has

use super::modality::Modality;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A present input file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    pub path: PathBuf,
    /// Resolved target when `path` is a symlink
    pub link_target: Option<PathBuf>,
}

impl InputFile {
    pub fn regular(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            link_target: None,
        }
    }

    pub fn linked(path: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            link_target: Some(target.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputInventory {
    files: BTreeMap<Modality, InputFile>,
}

impl InputInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, modality: Modality, file: InputFile) {
        self.files.insert(modality, file);
    }

    pub fn with(mut self, modality: Modality, file: InputFile) -> Self {
        self.insert(modality, file);
        self
    }

    pub fn get(&self, modality: Modality) -> Option<&InputFile> {
        self.files.get(&modality)
    }

    pub fn has(&self, modality: Modality) -> bool {
        self.files.contains_key(&modality)
    }

    /// Present inputs in canonical modality order
    pub fn present(&self) -> impl Iterator<Item = (Modality, &InputFile)> {
        self.files.iter().map(|(m, f)| (*m, f))
    }

    pub fn missing(&self) -> Vec<Modality> {
        Modality::ALL
            .iter()
            .copied()
            .filter(|m| !self.has(*m))
            .collect()
    }

    pub fn has_reference(&self) -> bool {
        self.has(Modality::T2w7T)
    }

    /// Both MP2RAGE inversions; they are only ever registered jointly
    pub fn has_7t_t1(&self) -> bool {
        self.has(Modality::T1wInv1_7T) && self.has(Modality::T1wInv2_7T)
    }

    pub fn has_3t_t1(&self) -> bool {
        self.has(Modality::T1w3T)
    }

    /// 3T-T2 only reaches 7T space through the 3T-T1 transforms
    pub fn has_3t_pair(&self) -> bool {
        self.has(Modality::T1w3T) && self.has(Modality::T2w3T)
    }

    /// Whether `modality` gets a globally registered image in 7T-T2 space
    pub fn registers_globally(&self, modality: Modality) -> bool {
        match modality {
            Modality::T2w7T => false,
            Modality::T1wInv1_7T | Modality::T1wInv2_7T => self.has_7t_t1(),
            Modality::T1w3T => self.has_3t_t1(),
            Modality::T2w3T => self.has_3t_pair(),
        }
    }

    /// Whether `modality` gets a locally re-registered patch
    pub fn registers_locally(&self, modality: Modality) -> bool {
        match modality {
            Modality::T2w7T => false,
            Modality::T1wInv1_7T | Modality::T1wInv2_7T => self.has_7t_t1(),
            Modality::T1w3T | Modality::T2w3T => self.has_3t_pair(),
        }
    }
}
