mod event_handler;
mod model;
mod orchestrator;
mod pipeline;
mod state;

pub use orchestrator::Orchestrator;
pub use pipeline::{vorbis_args, INPUT_NAME, OUTPUT_NAME};
pub use state::{
    ConversionState, InputFile, InputSummary, OutputArtifact, QualityLevel, Snapshot,
    OUTPUT_MEDIA_TYPE,
};
