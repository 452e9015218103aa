// Pipeline constants (no magic values)
use std::time::Duration;

/// Voxel axis ordering every input is normalised to
pub const DEFAULT_ORIENTATION: &str = "RSA";

/// Default program names, resolved through PATH
pub const DEFAULT_C3D_PROGRAM: &str = "c3d";
pub const DEFAULT_GREEDY_PROGRAM: &str = "greedy";
pub const DEFAULT_TRIM_NECK_PROGRAM: &str = "trim_neck.sh";
pub const DEFAULT_SEGMENTER_PROGRAM: &str = "nnUNetv2_predict";

/// Trained segmentation model selection
pub const DEFAULT_SEGMENTER_DATASET: u32 = 600;
pub const DEFAULT_SEGMENTER_CONFIGURATION: &str = "3d_fullres";
pub const DEFAULT_SEGMENTER_TRAINER: &str = "ModAugAllFourUNetTrainer";

/// Case prefix used for segmentation input/output files
pub const SEGMENTER_CASE_PREFIX: &str = "MTL";

/// Per-subject report file
pub const REPORT_FILE_NAME: &str = "mtlseg_report.json";

/// Number of trailing stderr bytes kept in a tool failure
pub const STDERR_TAIL_BYTES: usize = 2048;

/// Grace period between SIGTERM and SIGKILL for a timed out tool (5 seconds)
pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// BNU dataset: subjects shipped in the public release
pub const BNU_FIRST_SUBJECT: u32 = 1;
pub const BNU_LAST_SUBJECT: u32 = 20;
