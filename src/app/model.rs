use super::state::{AppState, BackendEvent};
use crate::engine::Engine;
use crate::error::{EngineError, InitError};

/// Acquire the engine in the background and report the outcome.
pub fn ensure_engine<E: Engine>(state: &AppState<E>) {
    log::info!("Acquiring transcoding engine");
    let handle = state.engine_handle.clone();
    let sender = state.backend_sender.clone();

    tokio::spawn(async move {
        let result = tokio::spawn(async move { handle.acquire().await }).await;
        let event = match result {
            Ok(Ok(engine)) => BackendEvent::EngineReady(engine),
            Ok(Err(e)) => BackendEvent::EngineFailed(e),
            Err(e) => BackendEvent::EngineFailed(InitError::Load(EngineError::new(format!(
                "engine load task panicked: {e}"
            )))),
        };
        let _ = sender.send(event).await;
    });
}
