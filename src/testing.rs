// Test doubles for the media engine and the video server clients

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::client::{
    ClientError, ProgressEmitter, VideoDownloadClient, VideoQuery, VideoQueryClient, VideoRecord,
};
use crate::player::engine::{MediaEngine, MediaError, MediaInfo};

/// Shared record of the calls a `RecordingEngine` received
#[derive(Debug, Clone, Default)]
pub struct EngineLog(Arc<Mutex<Vec<String>>>);

impl EngineLog {
    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, call: String) {
        self.0.lock().unwrap().push(call);
    }
}

pub struct RecordingEngine {
    duration: u64,
    fail_with: Option<MediaError>,
    log: EngineLog,
}

impl RecordingEngine {
    pub fn with_duration(duration: u64) -> (Self, EngineLog) {
        let log = EngineLog::default();
        let engine = Self {
            duration,
            fail_with: None,
            log: log.clone(),
        };
        (engine, log)
    }

    pub fn failing(error: MediaError) -> (Self, EngineLog) {
        let (mut engine, log) = Self::with_duration(0);
        engine.fail_with = Some(error);
        (engine, log)
    }
}

impl MediaEngine for RecordingEngine {
    fn load(&mut self, path: &Path) -> Result<MediaInfo, MediaError> {
        self.log.push(format!("load {}", path.display()));
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(MediaInfo {
                duration_millis: Some(self.duration),
            }),
        }
    }

    fn play(&mut self) {
        self.log.push("play".to_string());
    }

    fn pause(&mut self) {
        self.log.push("pause".to_string());
    }

    fn set_position(&mut self, millis: u64) {
        self.log.push(format!("seek {}", millis));
    }

    fn release(&mut self) {
        self.log.push("release".to_string());
    }
}

pub fn record(id: &str) -> VideoRecord {
    VideoRecord {
        video_id: id.to_string(),
        device_id: "feeder_01".to_string(),
        error_log_id: format!("E-{}", id),
        http_url: format!("http://server/videos/{}.mp4", id),
        file_path: format!("/data/{}.mp4", id),
        file_size_bytes: 2048,
        duration_millis: 60_000,
    }
}

type QueryReply = Result<Vec<VideoRecord>, ClientError>;

/// Query client whose replies are released by the test, in any order
#[derive(Default)]
pub struct ScriptedQueryClient {
    calls: AtomicUsize,
    queries: Mutex<Vec<VideoQuery>>,
    pending: Mutex<VecDeque<oneshot::Receiver<QueryReply>>>,
}

impl ScriptedQueryClient {
    /// Queue a reply slot for the next call; send on the returned sender to complete it
    pub fn expect_call(&self) -> oneshot::Sender<QueryReply> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push_back(rx);
        tx
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<VideoQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoQueryClient for ScriptedQueryClient {
    async fn query_videos(&self, query: &VideoQuery) -> Result<Vec<VideoRecord>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());

        let reply = self.pending.lock().unwrap().pop_front();
        match reply {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(ClientError::Unknown("reply dropped".to_string()))),
            None => Err(ClientError::Unknown("unexpected query".to_string())),
        }
    }
}

type DownloadReply = Result<PathBuf, ClientError>;

/// Download client that reports 50% and then waits for the test's reply
#[derive(Default)]
pub struct ScriptedDownloadClient {
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
    pending: Mutex<VecDeque<oneshot::Receiver<DownloadReply>>>,
}

impl ScriptedDownloadClient {
    pub fn expect_call(&self) -> oneshot::Sender<DownloadReply> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push_back(rx);
        tx
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoDownloadClient for ScriptedDownloadClient {
    async fn download_video(
        &self,
        http_url: &str,
        progress: ProgressEmitter,
    ) -> Result<PathBuf, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(http_url.to_string());

        let reply = self.pending.lock().unwrap().pop_front();
        progress.status(50.0, "Downloading 50%");
        match reply {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(ClientError::Unknown("reply dropped".to_string()))),
            None => Err(ClientError::Unknown("unexpected download".to_string())),
        }
    }
}
