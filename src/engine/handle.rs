use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::FutureExt;
use tokio::sync::OnceCell;

use super::Engine;
use crate::assets::AssetLoader;
use crate::error::{EngineError, InitError};

/// Engine lifecycle as seen from outside the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Unloaded,
    Loading,
    Ready,
    LoadFailed,
}

/// Acquire-once wrapper around an engine instance.
///
/// The first [`acquire`](Self::acquire) fetches the assets and loads the
/// engine; every later call (including concurrent ones) waits for and
/// returns that single outcome. A failed load is never retried.
pub struct EngineHandle<E: Engine> {
    engine: Arc<E>,
    loader: AssetLoader,
    status: Mutex<EngineStatus>,
    outcome: OnceCell<Result<(), InitError>>,
    progress_tx: async_channel::Sender<u8>,
    progress_rx: async_channel::Receiver<u8>,
}

impl<E: Engine> EngineHandle<E> {
    pub fn new(engine: E, loader: AssetLoader) -> Self {
        let (progress_tx, progress_rx) = async_channel::unbounded();
        Self {
            engine: Arc::new(engine),
            loader,
            status: Mutex::new(EngineStatus::Unloaded),
            outcome: OnceCell::new(),
            progress_tx,
            progress_rx,
        }
    }

    pub fn status(&self) -> EngineStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Integer percentages republished from the engine's progress signal.
    pub fn progress(&self) -> async_channel::Receiver<u8> {
        self.progress_rx.clone()
    }

    pub async fn acquire(&self) -> Result<Arc<E>, InitError> {
        self.outcome
            .get_or_init(|| self.initialize())
            .await
            .clone()
            .map(|()| self.engine.clone())
    }

    async fn initialize(&self) -> Result<(), InitError> {
        log::info!("Loading transcoding engine");
        self.set_status(EngineStatus::Loading);

        match self.bootstrap().await {
            Ok(()) => {
                self.subscribe();
                self.set_status(EngineStatus::Ready);
                log::info!("Transcoding engine ready");
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to load transcoding engine: {e}");
                self.set_status(EngineStatus::LoadFailed);
                Err(e)
            }
        }
    }

    async fn bootstrap(&self) -> Result<(), InitError> {
        let assets = self.loader.load_all().await?;
        match AssertUnwindSafe(self.engine.load(&assets))
            .catch_unwind()
            .await
        {
            Ok(result) => result.map_err(InitError::Load),
            Err(_) => Err(InitError::Load(EngineError::new("engine panicked while loading"))),
        }
    }

    fn subscribe(&self) {
        self.engine
            .on_log(Arc::new(|message: &str| log::trace!(target: "engine", "{message}")));

        let tx = self.progress_tx.clone();
        self.engine.on_progress(Arc::new(move |fraction: f64| {
            if let Some(percent) = progress_percent(fraction) {
                let _ = tx.try_send(percent);
            }
        }));
    }

    fn set_status(&self, status: EngineStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }
}

/// Map a completion fraction to a whole percentage. Non-finite input is dropped.
pub fn progress_percent(fraction: f64) -> Option<u8> {
    if !fraction.is_finite() {
        return None;
    }
    Some((fraction.clamp(0.0, 1.0) * 100.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent_rounds_and_clamps() {
        assert_eq!(progress_percent(0.0), Some(0));
        assert_eq!(progress_percent(0.426), Some(43));
        assert_eq!(progress_percent(0.999), Some(100));
        assert_eq!(progress_percent(1.7), Some(100));
        assert_eq!(progress_percent(-0.2), Some(0));
        assert_eq!(progress_percent(f64::NAN), None);
    }
}
