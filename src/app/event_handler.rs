use super::state::{
    clear_output, update_status, AppState, BackendEvent, ConversionState, OutputArtifact,
    OUTPUT_MEDIA_TYPE,
};
use crate::engine::Engine;
use crate::error::ConverterError;

const INIT_FAILED_MESSAGE: &str = "Restart the session to try again.";
const CONVERSION_FAILED_MESSAGE: &str = "An error occurred during conversion. Please try again.";

/// Handle a backend event. This is the core state machine.
pub fn handle_backend_event<E: Engine>(state: &mut AppState<E>, event: BackendEvent<E>) {
    match event {
        BackendEvent::EngineReady(engine) => {
            if state.status != ConversionState::LoadingEngine {
                log::info!("Ignoring engine ready while status={:?}", state.status);
                return;
            }
            state.engine = Some(engine);
            update_status(state, ConversionState::Idle);
        }
        BackendEvent::EngineFailed(err) => {
            let err = ConverterError::EngineInit(err);
            log::error!("{err}");
            state.error_message = Some(format!("{err}. {INIT_FAILED_MESSAGE}"));
            update_status(state, ConversionState::Error);
        }
        BackendEvent::ConversionComplete(data) => {
            if state.status != ConversionState::Converting {
                log::warn!("Dropping conversion result while status={:?}", state.status);
                return;
            }
            on_output_ready(state, data);
        }
        BackendEvent::ConversionFailed(err) => {
            // The detail stays in the log; the user sees a generic message.
            log::error!("Conversion failed: {err}");
            state.error_message = Some(CONVERSION_FAILED_MESSAGE.to_string());
            update_status(state, ConversionState::Error);
        }
    }
}

/// Fold one progress percentage into the current conversion.
pub fn apply_progress<E: Engine>(state: &mut AppState<E>, percent: u8) {
    if state.status != ConversionState::Converting {
        return;
    }
    // Regressions are dropped.
    if percent > state.progress {
        state.progress = percent.min(100);
    }
}

fn on_output_ready<E: Engine>(state: &mut AppState<E>, data: Vec<u8>) {
    let size = data.len() as u64;
    let file_name = state
        .input
        .as_ref()
        .map(|f| f.download_name())
        .unwrap_or_else(|| "audio.ogg".to_string());

    clear_output(state);
    let url = state.resources.create(data, OUTPUT_MEDIA_TYPE);
    log::info!("Conversion complete: {file_name} ({size} bytes) at {url}");

    state.output = Some(OutputArtifact {
        url,
        media_type: OUTPUT_MEDIA_TYPE,
        size,
        file_name,
    });
    state.progress = 100;
    update_status(state, ConversionState::Done);
}
