use std::sync::Arc;

use super::event_handler::{apply_progress, handle_backend_event};
use super::model::ensure_engine;
use super::pipeline::dispatch_conversion;
use super::state::{
    clear_output, update_status, AppState, BackendEvent, ConversionState, InputFile, QualityLevel,
    Snapshot,
};
use crate::engine::{Engine, EngineHandle};
use crate::error::{ConverterError, Intent};
use crate::resource::ResourceRegistry;

/// Owns the conversion state and turns intents and backend events into transitions.
///
/// Intents are applied synchronously. Background results are folded in by
/// [`next_event`](Self::next_event), so the owner decides when state moves.
pub struct Orchestrator<E: Engine> {
    state: AppState<E>,
    backend_rx: async_channel::Receiver<BackendEvent<E>>,
    progress_rx: async_channel::Receiver<u8>,
}

impl<E: Engine> Orchestrator<E> {
    /// Create the orchestrator in `LoadingEngine` and start acquiring the engine.
    /// Must be called from within a tokio runtime.
    pub fn start(
        engine_handle: Arc<EngineHandle<E>>,
        resources: ResourceRegistry,
        quality: QualityLevel,
    ) -> Self {
        let (backend_tx, backend_rx) = async_channel::unbounded();
        let progress_rx = engine_handle.progress();
        let state = AppState::new(engine_handle, resources, quality, backend_tx);
        ensure_engine(&state);
        Self {
            state,
            backend_rx,
            progress_rx,
        }
    }

    pub fn state(&self) -> ConversionState {
        self.state.status
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    /// Stage a file for conversion, replacing any previous one.
    pub fn select_file(&mut self, file: InputFile) -> Result<(), ConverterError> {
        self.accept(
            Intent::SelectFile,
            &[ConversionState::Idle, ConversionState::FileLoaded],
        )?;

        if !file.is_audio() {
            let err = ConverterError::InvalidInput {
                name: file.name().to_string(),
                media_type: file.media_type().to_string(),
            };
            log::warn!("Rejected selection: {err}");
            self.state.rejection = Some(err.to_string());
            return Err(err);
        }

        log::info!("Selected {} ({} bytes)", file.name(), file.size());
        clear_output(&mut self.state);
        self.state.input = Some(file);
        self.state.rejection = None;
        self.state.error_message = None;
        update_status(&mut self.state, ConversionState::FileLoaded);
        Ok(())
    }

    /// Change the quality used by the next conversion.
    pub fn set_quality(&mut self, quality: QualityLevel) -> Result<(), ConverterError> {
        if self.state.status == ConversionState::Converting {
            return Err(self.not_accepted(Intent::SetQuality));
        }
        self.state.quality = quality;
        Ok(())
    }

    /// Start converting the staged file. A no-op error while a conversion is running.
    pub fn request_convert(&mut self) -> Result<(), ConverterError> {
        self.accept(Intent::Convert, &[ConversionState::FileLoaded])?;
        let (Some(engine), Some(input)) = (self.state.engine.clone(), self.state.input.clone())
        else {
            return Err(self.not_accepted(Intent::Convert));
        };

        // Drop anything left over from a previous run.
        while self.progress_rx.try_recv().is_ok() {}

        dispatch_conversion(&self.state, engine, input)?;
        self.state.progress = 0;
        update_status(&mut self.state, ConversionState::Converting);
        Ok(())
    }

    /// Return to `Idle`, discarding input, output, progress and error.
    pub fn reset(&mut self) -> Result<(), ConverterError> {
        self.accept(
            Intent::Reset,
            &[
                ConversionState::Idle,
                ConversionState::FileLoaded,
                ConversionState::Done,
                ConversionState::Error,
            ],
        )?;

        clear_output(&mut self.state);
        self.state.input = None;
        self.state.progress = 0;
        self.state.error_message = None;
        self.state.rejection = None;
        update_status(&mut self.state, ConversionState::Idle);
        Ok(())
    }

    /// Wait for and apply the next background event. Progress is consumed
    /// before completion so every signal emitted during a run is folded in.
    /// Returns `None` once no further events can arrive.
    pub async fn next_event(&mut self) -> Option<ConversionState> {
        tokio::select! {
            biased;
            Ok(percent) = self.progress_rx.recv() => {
                apply_progress(&mut self.state, percent);
            }
            event = self.backend_rx.recv() => match event {
                Ok(event) => handle_backend_event(&mut self.state, event),
                Err(_) => return None,
            },
        }
        Some(self.state.status)
    }

    /// Drive events until the machine leaves `LoadingEngine` and `Converting`.
    pub async fn settle(&mut self) -> ConversionState {
        while matches!(
            self.state.status,
            ConversionState::LoadingEngine | ConversionState::Converting
        ) {
            if self.next_event().await.is_none() {
                break;
            }
        }
        self.state.status
    }

    fn accept(&self, intent: Intent, allowed: &[ConversionState]) -> Result<(), ConverterError> {
        if allowed.contains(&self.state.status) {
            Ok(())
        } else {
            log::info!("Ignoring {intent} while status={:?}", self.state.status);
            Err(self.not_accepted(intent))
        }
    }

    fn not_accepted(&self, intent: Intent) -> ConverterError {
        ConverterError::NotAccepted {
            intent,
            state: self.state.status,
        }
    }
}
