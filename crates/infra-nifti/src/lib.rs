// mtlseg Infrastructure - NIfTI Adapters
// Implements: PlaceholderWriter

pub mod noise_writer;

pub use noise_writer::NoisePlaceholderWriter;
