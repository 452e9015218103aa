// Noise placeholder volumes (nifti + ndarray)
// reason: spawn_blocking, image I/O is synchronous and CPU bound

use async_trait::async_trait;
use ndarray::Array3;
use nifti::writer::WriterOptions;
use nifti::NiftiHeader;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use mtlseg_core::port::{PlaceholderError, PlaceholderWriter};

/// Writes float32 standard-normal volumes that share the reference header
#[derive(Debug, Default, Clone, Copy)]
pub struct NoisePlaceholderWriter;

impl NoisePlaceholderWriter {
    pub fn new() -> Self {
        Self
    }
}

/// Spatial shape (x, y, z) of a reference header
fn spatial_shape(
    path: &Path,
    header: &NiftiHeader,
) -> Result<(usize, usize, usize), PlaceholderError> {
    let ndim = header.dim[0] as usize;
    if ndim < 3 {
        return Err(PlaceholderError::Unsupported {
            path: path.to_path_buf(),
            message: format!("expected a 3D volume, header has {} dimension(s)", ndim),
        });
    }

    let shape = (
        header.dim[1] as usize,
        header.dim[2] as usize,
        header.dim[3] as usize,
    );
    if shape.0 == 0 || shape.1 == 0 || shape.2 == 0 {
        return Err(PlaceholderError::Unsupported {
            path: path.to_path_buf(),
            message: format!("empty volume {:?}", shape),
        });
    }

    Ok(shape)
}

fn write_noise_blocking(
    reference: &Path,
    output: &Path,
    seed: Option<u64>,
) -> Result<(), PlaceholderError> {
    let header = NiftiHeader::from_file(reference).map_err(|e| PlaceholderError::Read {
        path: reference.to_path_buf(),
        message: e.to_string(),
    })?;
    let shape = spatial_shape(reference, &header)?;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let volume: Array3<f32> = Array3::from_shape_simple_fn(shape, || rng.sample(StandardNormal));

    debug!(
        reference = %reference.display(),
        shape = ?shape,
        "Writing noise volume"
    );

    WriterOptions::new(output)
        .reference_header(&header)
        .write_nifti(&volume)
        .map_err(|e| PlaceholderError::Write {
            path: output.to_path_buf(),
            message: e.to_string(),
        })
}

#[async_trait]
impl PlaceholderWriter for NoisePlaceholderWriter {
    async fn write_noise_like(
        &self,
        reference: &Path,
        output: &Path,
        seed: Option<u64>,
    ) -> Result<(), PlaceholderError> {
        let reference_path: PathBuf = reference.to_path_buf();
        let output_path: PathBuf = output.to_path_buf();

        tokio::task::spawn_blocking(move || {
            write_noise_blocking(&reference_path, &output_path, seed)
        })
        .await
        .map_err(|e| PlaceholderError::Write {
            path: output.to_path_buf(),
            message: format!("writer task failed: {}", e),
        })??;

        info!(
            reference = %reference.display(),
            output = %output.display(),
            seeded = seed.is_some(),
            "Placeholder written"
        );
        Ok(())
    }
}
