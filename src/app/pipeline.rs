use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::state::{AppState, BackendEvent, InputFile, QualityLevel};
use crate::engine::Engine;
use crate::error::{ConverterError, EngineError, Intent, TranscodeStage};

/// Staged input name in the engine's private storage.
pub const INPUT_NAME: &str = "input_audio";
/// Staged output name in the engine's private storage.
pub const OUTPUT_NAME: &str = "output.ogg";

/// Argument list for a Vorbis encode of the staged input.
pub fn vorbis_args(quality: QualityLevel) -> Vec<String> {
    vec![
        "-i".into(),
        INPUT_NAME.into(),
        "-c:a".into(),
        "libvorbis".into(),
        "-q:a".into(),
        quality.value().to_string(),
        OUTPUT_NAME.into(),
    ]
}

/// Dispatch one transcode on the tokio runtime.
///
/// The engine's storage names are shared, so only one transcode may hold
/// them; a second dispatch while one is in flight is refused.
pub fn dispatch_conversion<E: Engine>(
    state: &AppState<E>,
    engine: Arc<E>,
    input: InputFile,
) -> Result<(), ConverterError> {
    if state
        .in_flight
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Err(ConverterError::NotAccepted {
            intent: Intent::Convert,
            state: state.status,
        });
    }

    let quality = state.quality;
    let in_flight = state.in_flight.clone();
    let sender = state.backend_sender.clone();

    log::info!(
        "Converting {} ({} bytes) at quality {}",
        input.name(),
        input.size(),
        quality.value()
    );

    tokio::spawn(async move {
        let task_engine = engine.clone();
        let result = tokio::spawn(async move {
            transcode(task_engine.as_ref(), &input, quality).await
        })
        .await
        .unwrap_or_else(|e| {
            Err(ConverterError::Transcode {
                stage: TranscodeStage::Task,
                source: EngineError::new(format!("transcode task panicked: {e}")),
            })
        });

        if let Err(e) = tokio::spawn(async move { cleanup(engine.as_ref()).await }).await {
            log::warn!("Cleanup task panicked: {e}");
        }
        in_flight.store(false, Ordering::Release);

        let event = match result {
            Ok(data) => BackendEvent::ConversionComplete(data),
            Err(e) => BackendEvent::ConversionFailed(e),
        };
        let _ = sender.send(event).await;
    });

    Ok(())
}

/// Stage, execute and retrieve. Each step starts only after the previous one resolves.
pub async fn transcode<E: Engine>(
    engine: &E,
    input: &InputFile,
    quality: QualityLevel,
) -> Result<Vec<u8>, ConverterError> {
    engine
        .write_file(INPUT_NAME, input.bytes())
        .await
        .map_err(ConverterError::transcode(TranscodeStage::StageInput))?;

    engine
        .exec(&vorbis_args(quality))
        .await
        .map_err(ConverterError::transcode(TranscodeStage::Execute))?;

    engine
        .read_file(OUTPUT_NAME)
        .await
        .map_err(ConverterError::transcode(TranscodeStage::RetrieveOutput))
}

/// Remove both staged entries. Failures are logged and never escalated.
pub async fn cleanup<E: Engine>(engine: &E) {
    for name in [INPUT_NAME, OUTPUT_NAME] {
        if let Err(source) = engine.delete_file(name).await {
            let warning = ConverterError::Cleanup {
                name: name.to_string(),
                source,
            };
            log::warn!("{warning}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vorbis_args() {
        let quality = QualityLevel::new(7).unwrap();
        assert_eq!(
            vorbis_args(quality),
            ["-i", "input_audio", "-c:a", "libvorbis", "-q:a", "7", "output.ogg"]
        );
    }
}
