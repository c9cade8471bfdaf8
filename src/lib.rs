//! Local audio-to-OGG/Vorbis conversion.
//!
//! An [`EngineHandle`] bootstraps a transcoding engine once from three
//! fetched assets; an [`Orchestrator`] drives it through
//! stage → execute → retrieve → cleanup and republishes state, progress,
//! result and error as a [`Snapshot`] for whatever presents them.

pub mod app;
pub mod assets;
pub mod config;
pub mod engine;
pub mod error;
pub mod resource;

pub use app::{ConversionState, InputFile, Orchestrator, OutputArtifact, QualityLevel, Snapshot};
pub use assets::{AssetLoader, EngineAssets};
pub use config::Config;
pub use engine::{ffmpeg_engine_handle, Engine, EngineHandle, EngineStatus, FfmpegEngine};
pub use error::{AssetFetchError, ConverterError, EngineError, InitError};
pub use resource::{ResourceRegistry, ResourceUrl};
