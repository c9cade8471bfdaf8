use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::engine::{Engine, EngineHandle, EngineStatus};
use crate::error::{ConverterError, InitError};
use crate::resource::{ResourceRegistry, ResourceUrl};

pub const OUTPUT_MEDIA_TYPE: &str = "audio/ogg";

/// Events sent from background tasks to the orchestrator.
#[derive(Debug)]
pub enum BackendEvent<E> {
    EngineReady(Arc<E>),
    EngineFailed(InitError),
    ConversionComplete(Vec<u8>),
    ConversionFailed(ConverterError),
}

/// Conversion lifecycle. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionState {
    LoadingEngine,
    Idle,
    FileLoaded,
    Converting,
    Done,
    Error,
}

/// A user-selected file held in memory.
#[derive(Debug, Clone)]
pub struct InputFile {
    name: String,
    media_type: String,
    data: Arc<[u8]>,
}

impl InputFile {
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_audio(&self) -> bool {
        self.media_type.starts_with("audio/")
    }

    /// Suggested name for the converted file: everything before the first dot, plus `.ogg`.
    pub fn download_name(&self) -> String {
        let stem = self.name.split('.').next().unwrap_or_default();
        let stem = if stem.is_empty() { "audio" } else { stem };
        format!("{stem}.ogg")
    }
}

/// Vorbis quality, lower is smaller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualityLevel(u8);

impl QualityLevel {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 10;

    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    pub fn clamped(value: u8) -> Self {
        Self(value.min(Self::MAX))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for QualityLevel {
    fn default() -> Self {
        Self(4)
    }
}

/// The converted file, addressable for playback or download while `Done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub url: ResourceUrl,
    pub media_type: &'static str,
    pub size: u64,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSummary {
    pub name: String,
    pub size: u64,
}

/// Read-only view for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub state: ConversionState,
    pub engine: EngineStatus,
    pub progress: u8,
    pub quality: QualityLevel,
    pub input: Option<InputSummary>,
    pub output: Option<OutputArtifact>,
    pub error_message: Option<String>,
    /// Last rejected selection; does not change `state`.
    pub rejection: Option<String>,
}

/// Central orchestrator state.
pub struct AppState<E: Engine> {
    pub status: ConversionState,
    pub engine_handle: Arc<EngineHandle<E>>,
    pub engine: Option<Arc<E>>,
    pub resources: ResourceRegistry,
    pub input: Option<InputFile>,
    pub output: Option<OutputArtifact>,
    pub progress: u8,
    pub quality: QualityLevel,
    pub error_message: Option<String>,
    pub rejection: Option<String>,
    pub in_flight: Arc<AtomicBool>,
    pub backend_sender: async_channel::Sender<BackendEvent<E>>,
}

impl<E: Engine> AppState<E> {
    pub fn new(
        engine_handle: Arc<EngineHandle<E>>,
        resources: ResourceRegistry,
        quality: QualityLevel,
        sender: async_channel::Sender<BackendEvent<E>>,
    ) -> Self {
        Self {
            status: ConversionState::LoadingEngine,
            engine_handle,
            engine: None,
            resources,
            input: None,
            output: None,
            progress: 0,
            quality,
            error_message: None,
            rejection: None,
            in_flight: Arc::new(AtomicBool::new(false)),
            backend_sender: sender,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.status,
            engine: self.engine_handle.status(),
            progress: self.progress,
            quality: self.quality,
            input: self.input.as_ref().map(|f| InputSummary {
                name: f.name().to_string(),
                size: f.size(),
            }),
            output: self.output.clone(),
            error_message: self.error_message.clone(),
            rejection: self.rejection.clone(),
        }
    }
}

/// Helper to move to a new state.
pub fn update_status<E: Engine>(state: &mut AppState<E>, status: ConversionState) {
    if state.status != status {
        log::debug!("{:?} -> {status:?}", state.status);
    }
    state.status = status;
}

/// Drop the current artifact and release its backing memory.
pub fn clear_output<E: Engine>(state: &mut AppState<E>) {
    if let Some(output) = state.output.take() {
        state.resources.revoke(&output.url);
    }
}
