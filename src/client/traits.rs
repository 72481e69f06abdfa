// Video server client trait definitions

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::errors::ClientError;
use super::models::{DownloadProgress, VideoQuery, VideoRecord};

/// Looks up recorded clips matching a filter
#[async_trait]
pub trait VideoQueryClient: Send + Sync {
    /// Records in backend order; never re-sorted
    async fn query_videos(&self, query: &VideoQuery) -> Result<Vec<VideoRecord>, ClientError>;
}

/// Fetches a clip to local storage
#[async_trait]
pub trait VideoDownloadClient: Send + Sync {
    /// Download `http_url` and return the local path of the finished file
    async fn download_video(
        &self,
        http_url: &str,
        progress: ProgressEmitter,
    ) -> Result<PathBuf, ClientError>;
}

/// Progress emitter helper
#[derive(Clone)]
pub struct ProgressEmitter {
    sink: Arc<dyn Fn(DownloadProgress) + Send + Sync>,
}

impl ProgressEmitter {
    pub fn new(sink: impl Fn(DownloadProgress) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Emitter that drops every update
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn emit(&self, progress: DownloadProgress) {
        (self.sink)(progress);
    }

    pub fn status(&self, percent: f32, status: impl Into<String>) {
        self.emit(DownloadProgress {
            percent,
            status: status.into(),
        });
    }
}

impl std::fmt::Debug for ProgressEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressEmitter").finish_non_exhaustive()
    }
}
