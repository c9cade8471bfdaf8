//! Process-local addressable resources.
//!
//! A [`ResourceUrl`] names an in-memory payload the same way an object URL
//! names a blob: it is cheap to hand around, resolves only inside this
//! process, and keeps its backing memory alive until it is revoked.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const SCHEME: &str = "blob:ogg-compressor/";

/// Handle to a payload held by a [`ResourceRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceUrl(String);

impl ResourceUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved payload and its media type.
#[derive(Debug, Clone)]
pub struct Resource {
    pub data: Arc<[u8]>,
    pub media_type: String,
}

impl Resource {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Default)]
struct Inner {
    next_id: AtomicU64,
    entries: Mutex<HashMap<ResourceUrl, Resource>>,
}

/// Shared table of live resources. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    inner: Arc<Inner>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a payload and return the handle that addresses it.
    pub fn create(&self, data: impl Into<Arc<[u8]>>, media_type: &str) -> ResourceUrl {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let url = ResourceUrl(format!("{SCHEME}{id}"));
        let resource = Resource {
            data: data.into(),
            media_type: media_type.to_string(),
        };
        log::debug!("Created {url} ({} bytes, {media_type})", resource.len());
        self.entries().insert(url.clone(), resource);
        url
    }

    /// Register a text payload.
    pub fn create_text(&self, text: String, media_type: &str) -> ResourceUrl {
        self.create(text.into_bytes(), media_type)
    }

    pub fn resolve(&self, url: &ResourceUrl) -> Option<Resource> {
        self.entries().get(url).cloned()
    }

    /// Release the payload behind `url`. Returns false if it was already gone.
    pub fn revoke(&self, url: &ResourceUrl) -> bool {
        let removed = self.entries().remove(url).is_some();
        if removed {
            log::debug!("Revoked {url}");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ResourceUrl, Resource>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
