use futures_util::future::try_join3;

use crate::error::AssetFetchError;
use crate::resource::{ResourceRegistry, ResourceUrl};

pub const CORE_SCRIPT: &str = "ffmpeg-core.js";
pub const WASM_MODULE: &str = "ffmpeg-core.wasm";
pub const WORKER_SCRIPT: &str = "ffmpeg-core.worker.js";

const SCRIPT_MEDIA_TYPE: &str = "text/javascript";
const WASM_MEDIA_TYPE: &str = "application/wasm";

/// Locally-addressable handles for the engine's one-time load call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineAssets {
    pub core: ResourceUrl,
    pub wasm: ResourceUrl,
    pub worker: ResourceUrl,
}

#[derive(Debug, Clone, Copy)]
enum AssetKind {
    CoreScript,
    WasmModule,
    WorkerScript,
}

impl AssetKind {
    fn label(self) -> &'static str {
        match self {
            Self::CoreScript => "core script",
            Self::WasmModule => "wasm module",
            Self::WorkerScript => "worker script",
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            Self::CoreScript => CORE_SCRIPT,
            Self::WasmModule => WASM_MODULE,
            Self::WorkerScript => WORKER_SCRIPT,
        }
    }
}

/// Fetches the engine's assets and re-materializes them as local resources.
#[derive(Debug, Clone)]
pub struct AssetLoader {
    client: reqwest::Client,
    base_url: String,
    registry: ResourceRegistry,
}

impl AssetLoader {
    pub fn new(base_url: impl Into<String>, registry: ResourceRegistry) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            registry,
        }
    }

    fn url_for(&self, kind: AssetKind) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            kind.file_name()
        )
    }

    /// Fetch all three assets concurrently. The first failure wins.
    pub async fn load_all(&self) -> Result<EngineAssets, AssetFetchError> {
        let (core, wasm, worker) = try_join3(
            self.fetch(AssetKind::CoreScript),
            self.fetch(AssetKind::WasmModule),
            self.fetch(AssetKind::WorkerScript),
        )
        .await?;
        Ok(EngineAssets { core, wasm, worker })
    }

    async fn fetch(&self, kind: AssetKind) -> Result<ResourceUrl, AssetFetchError> {
        let url = self.url_for(kind);
        log::debug!("Fetching {} from {url}", kind.label());

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AssetFetchError::new(kind.label(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetFetchError::new(kind.label(), status.to_string()));
        }

        // Scripts are re-materialized as text, the codec module as raw bytes.
        let handle = match kind {
            AssetKind::WasmModule => {
                let data = download_bytes(response, kind).await?;
                self.registry.create(data, WASM_MEDIA_TYPE)
            }
            AssetKind::CoreScript | AssetKind::WorkerScript => {
                let text = response
                    .text()
                    .await
                    .map_err(|e| AssetFetchError::new(kind.label(), e.to_string()))?;
                self.registry.create_text(text, SCRIPT_MEDIA_TYPE)
            }
        };
        log::info!("Fetched {} as {handle}", kind.label());
        Ok(handle)
    }
}

/// Stream a response body, logging progress when the length is known.
async fn download_bytes(
    response: reqwest::Response,
    kind: AssetKind,
) -> Result<Vec<u8>, AssetFetchError> {
    use futures_util::StreamExt;

    let total = response.content_length().unwrap_or(0);
    let mut data = Vec::new();
    let mut stream = response.bytes_stream();
    let mut last_logged = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| AssetFetchError::new(kind.label(), e.to_string()))?;
        data.extend_from_slice(&chunk);

        let downloaded = data.len() as u64;
        if total > 0 && downloaded * 10 / total > last_logged {
            last_logged = downloaded * 10 / total;
            let mb_done = downloaded as f64 / 1_048_576.0;
            let mb_total = total as f64 / 1_048_576.0;
            log::debug!(
                "Downloading {}: {mb_done:.1} / {mb_total:.1} MB",
                kind.label()
            );
        }
    }

    Ok(data)
}
