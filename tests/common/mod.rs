#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use ogg_compressor::engine::{LogSink, ProgressSink};
use ogg_compressor::{
    AssetLoader, Engine, EngineAssets, EngineError, EngineHandle, InputFile, Orchestrator,
    QualityLevel, ResourceRegistry,
};

pub const MB: usize = 1024 * 1024;
pub const OGG_BYTES: &[u8] = b"OggS\x00\x02fake vorbis stream";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// In-memory engine that records every call and follows a script.
#[derive(Default)]
pub struct ScriptedEngine {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub fail_load: bool,
    pub fail_write: bool,
    pub fail_exec: bool,
    pub fail_read: bool,
    pub fail_delete: bool,
    pub panic_load: bool,
    pub panic_exec: bool,
    /// Fractions emitted through the progress sink during `exec`.
    pub progress: Vec<f64>,
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub log_sink: Mutex<Option<LogSink>>,
    pub progress_sink: Mutex<Option<ProgressSink>>,
}

impl std::fmt::Debug for ScriptedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedEngine").finish_non_exhaustive()
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    /// Push a fraction through the registered progress sink.
    pub fn emit_progress(&self, fraction: f64) {
        let sink = self.progress_sink.lock().unwrap().clone();
        if let Some(sink) = sink {
            sink(fraction);
        }
    }

    pub fn has_sinks(&self) -> bool {
        self.log_sink.lock().unwrap().is_some() && self.progress_sink.lock().unwrap().is_some()
    }

    pub fn stored_files(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }
}

impl Engine for ScriptedEngine {
    async fn load(&self, _assets: &EngineAssets) -> Result<(), EngineError> {
        self.record("load".into());
        if self.panic_load {
            panic!("engine crashed while loading");
        }
        if self.fail_load {
            return Err(EngineError::new("load rejected"));
        }
        Ok(())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        self.record(format!("write {name}"));
        if self.fail_write {
            return Err(EngineError::new("write rejected"));
        }
        self.files.lock().unwrap().insert(name.into(), data.to_vec());
        Ok(())
    }

    async fn exec(&self, args: &[String]) -> Result<(), EngineError> {
        self.record(format!("exec {}", args.join(" ")));
        for &fraction in &self.progress {
            self.emit_progress(fraction);
        }
        if let Some(sink) = self.log_sink.lock().unwrap().clone() {
            sink("size=N/A time=00:00:01.00");
        }
        if self.panic_exec {
            panic!("engine crashed while encoding");
        }
        if self.fail_exec {
            return Err(EngineError::new("Conversion failed: invalid data found"));
        }
        let output = args.last().cloned().unwrap_or_default();
        self.files.lock().unwrap().insert(output, OGG_BYTES.to_vec());
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        self.record(format!("read {name}"));
        if self.fail_read {
            return Err(EngineError::new("read rejected"));
        }
        self.files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::new(format!("{name}: no such file")))
    }

    async fn delete_file(&self, name: &str) -> Result<(), EngineError> {
        self.record(format!("delete {name}"));
        if self.fail_delete {
            return Err(EngineError::new("delete rejected"));
        }
        self.files
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::new(format!("{name}: no such file")))
    }

    fn on_log(&self, sink: LogSink) {
        *self.log_sink.lock().unwrap() = Some(sink);
    }

    fn on_progress(&self, sink: ProgressSink) {
        *self.progress_sink.lock().unwrap() = Some(sink);
    }
}

#[derive(Clone)]
struct ServerState {
    hits: Arc<AtomicUsize>,
    missing: Option<&'static str>,
}

async fn serve_asset(State(state): State<ServerState>, Path(name): Path<String>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if state.missing == Some(name.as_str()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    if name.ends_with(".wasm") {
        return (StatusCode::OK, b"\0asm\x01\x00\x00\x00".to_vec()).into_response();
    }
    (StatusCode::OK, format!("// {name}")).into_response()
}

pub struct AssetServer {
    pub base_url: String,
    pub hits: Arc<AtomicUsize>,
}

/// Serve the three engine assets on an ephemeral port; `missing` answers 404.
pub async fn start_asset_server(missing: Option<&'static str>) -> AssetServer {
    let hits = Arc::new(AtomicUsize::new(0));
    let state = ServerState {
        hits: hits.clone(),
        missing,
    };
    let app = Router::new()
        .route("/dist/{name}", get(serve_asset))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    AssetServer {
        base_url: format!("http://{addr}/dist"),
        hits,
    }
}

pub struct Harness {
    pub orchestrator: Orchestrator<ScriptedEngine>,
    pub handle: Arc<EngineHandle<ScriptedEngine>>,
    pub calls: Arc<Mutex<Vec<String>>>,
    pub resources: ResourceRegistry,
    pub server: AssetServer,
}

impl Harness {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }
}

/// Start an orchestrator around `engine` and let engine acquisition settle.
pub async fn start(engine: ScriptedEngine, missing: Option<&'static str>) -> Harness {
    init_logging();
    let server = start_asset_server(missing).await;
    let resources = ResourceRegistry::new();
    let calls = engine.calls.clone();
    let loader = AssetLoader::new(server.base_url.clone(), resources.clone());
    let handle = Arc::new(EngineHandle::new(engine, loader));
    let mut orchestrator =
        Orchestrator::start(handle.clone(), resources.clone(), QualityLevel::default());
    orchestrator.settle().await;
    Harness {
        orchestrator,
        handle,
        calls,
        resources,
        server,
    }
}

pub fn audio_file(name: &str, size: usize) -> InputFile {
    InputFile::new(name, "audio/mpeg", vec![0x5au8; size])
}
