//! The transcoding engine boundary.
//!
//! An [`Engine`] is an opaque capability with a private file namespace: the
//! caller stages input under a name, runs an argument list against it, and
//! reads the result back by name. Progress and log output arrive through
//! sinks registered once after a successful load.

mod ffmpeg;
mod handle;

use std::future::Future;
use std::sync::Arc;

pub use ffmpeg::FfmpegEngine;
pub use handle::{progress_percent, EngineHandle, EngineStatus};

use crate::assets::{AssetLoader, EngineAssets};
use crate::config::Config;
use crate::error::EngineError;
use crate::resource::ResourceRegistry;

/// Receives each line of engine log output.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Receives completion fractions in [0, 1] while `exec` runs.
pub type ProgressSink = Arc<dyn Fn(f64) + Send + Sync>;

pub trait Engine: Send + Sync + 'static {
    /// One-time initialization from locally-addressable assets.
    fn load(&self, assets: &EngineAssets) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn write_file(
        &self,
        name: &str,
        data: &[u8],
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn exec(&self, args: &[String]) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn read_file(&self, name: &str) -> impl Future<Output = Result<Vec<u8>, EngineError>> + Send;

    fn delete_file(&self, name: &str) -> impl Future<Output = Result<(), EngineError>> + Send;

    fn on_log(&self, sink: LogSink);

    fn on_progress(&self, sink: ProgressSink);
}

/// Build the process-wide handle around the native engine.
pub fn ffmpeg_engine_handle(
    config: &Config,
    registry: &ResourceRegistry,
) -> std::io::Result<Arc<EngineHandle<FfmpegEngine>>> {
    let engine = FfmpegEngine::new(&config.ffmpeg_path, registry.clone())?;
    let loader = AssetLoader::new(config.asset_base_url.clone(), registry.clone());
    Ok(Arc::new(EngineHandle::new(engine, loader)))
}
