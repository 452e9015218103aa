// Placeholder Volume Port
// Stand-in images for segmentation channels whose modality is unavailable

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaceholderError {
    #[error("Cannot read reference {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Cannot write placeholder {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("Unsupported reference {path}: {message}")]
    Unsupported { path: PathBuf, message: String },
}

#[async_trait]
pub trait PlaceholderWriter: Send + Sync {
    /// Write a standard-normal noise volume with the geometry of `reference`
    ///
    /// # Arguments
    /// * `seed` - fixed seed for reproducible output, None for entropy
    async fn write_noise_like(
        &self,
        reference: &Path,
        output: &Path,
        seed: Option<u64>,
    ) -> Result<(), PlaceholderError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::port::filesystem::mocks::InMemoryFs;
    use crate::port::filesystem::SubjectFs;
    use std::sync::{Arc, Mutex};

    /// Records placeholder requests and creates the output in an InMemoryFs
    pub struct RecordingPlaceholderWriter {
        fs: Arc<InMemoryFs>,
        written: Mutex<Vec<(PathBuf, PathBuf, Option<u64>)>>,
    }

    impl RecordingPlaceholderWriter {
        pub fn new(fs: Arc<InMemoryFs>) -> Self {
            Self {
                fs,
                written: Mutex::new(Vec::new()),
            }
        }

        /// (reference, output, seed) triples in call order
        pub fn written(&self) -> Vec<(PathBuf, PathBuf, Option<u64>)> {
            self.written.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PlaceholderWriter for RecordingPlaceholderWriter {
        async fn write_noise_like(
            &self,
            reference: &Path,
            output: &Path,
            seed: Option<u64>,
        ) -> Result<(), PlaceholderError> {
            if !self.fs.exists(reference) {
                return Err(PlaceholderError::Read {
                    path: reference.to_path_buf(),
                    message: "No such file".to_string(),
                });
            }
            self.fs.add_file(output);
            self.written.lock().unwrap().push((
                reference.to_path_buf(),
                output.to_path_buf(),
                seed,
            ));
            Ok(())
        }
    }
}
