use std::fmt;

use thiserror::Error;

use crate::app::ConversionState;

/// One of the three engine assets could not be fetched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to fetch {asset}: {status}")]
pub struct AssetFetchError {
    /// Human-readable asset label, e.g. "worker script".
    pub asset: &'static str,
    /// Transport status text ("404 Not Found") or transport error text.
    pub status: String,
}

impl AssetFetchError {
    pub fn new(asset: &'static str, status: impl Into<String>) -> Self {
        Self {
            asset,
            status: status.into(),
        }
    }
}

/// Opaque failure reported by the transcoding engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        Self(e.to_string())
    }
}

/// The single outcome of a failed engine bootstrap.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    #[error(transparent)]
    Asset(#[from] AssetFetchError),

    #[error("Engine rejected load: {0}")]
    Load(EngineError),
}

/// Which transcode step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeStage {
    StageInput,
    Execute,
    RetrieveOutput,
    Task,
}

impl fmt::Display for TranscodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StageInput => "staging input",
            Self::Execute => "encoding",
            Self::RetrieveOutput => "reading output",
            Self::Task => "running the transcode task",
        })
    }
}

/// Intents the presentation layer can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    SelectFile,
    SetQuality,
    Convert,
    Reset,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SelectFile => "File selection",
            Self::SetQuality => "Quality change",
            Self::Convert => "Conversion",
            Self::Reset => "Reset",
        })
    }
}

/// Main error type for the converter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConverterError {
    #[error("Engine initialization failed: {0}")]
    EngineInit(#[from] InitError),

    #[error("Not an audio file: {name} ({media_type})")]
    InvalidInput { name: String, media_type: String },

    #[error("Transcode failed while {stage}: {source}")]
    Transcode {
        stage: TranscodeStage,
        source: EngineError,
    },

    #[error("Cleanup of {name} failed: {source}")]
    Cleanup { name: String, source: EngineError },

    #[error("{intent} is not accepted while {state:?}")]
    NotAccepted {
        intent: Intent,
        state: ConversionState,
    },
}

impl ConverterError {
    pub(crate) fn transcode(stage: TranscodeStage) -> impl FnOnce(EngineError) -> Self {
        move |source| Self::Transcode { stage, source }
    }
}
