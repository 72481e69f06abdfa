// Video browser controller - single coordination point between the video
// server clients, the result list and the open playback sessions.
//
// Network work runs in spawned tokio tasks; their outcomes come back as
// `BrowserEvent`s on a channel and are folded into state by `apply` on the
// owner's task. Every request carries a `RequestId`; completions for
// requests that are no longer current are discarded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::errors::BrowserError;
use super::models::{DownloadState, FilterCriteria, QueryState, RequestId, SelectionState, Topology};
use super::registry::OpenSessionRegistry;
use crate::client::{
    ClientError, DownloadProgress, HttpVideoClient, ProgressEmitter, VideoDownloadClient,
    VideoQueryClient, VideoRecord,
};
use crate::player::{ControlOverlay, HeadlessEngine, MediaEngine, PlaybackSession, SessionId};

/// Finished downloads whose outcome stays queryable through `download_state`
const FINISHED_DOWNLOADS_KEPT: usize = 16;

/// Builds the media engine for a clip about to be played
pub type EngineFactory = Box<dyn Fn(&VideoRecord) -> Box<dyn MediaEngine> + Send + Sync>;

/// Engines without video output, primed with each clip's recorded duration
pub fn headless_engines() -> EngineFactory {
    Box::new(|record: &VideoRecord| -> Box<dyn MediaEngine> {
        Box::new(HeadlessEngine::with_duration_hint(record.duration_millis))
    })
}

/// Completion or progress posted back by a background task
#[derive(Debug)]
pub enum BrowserEvent {
    QueryFinished {
        request: RequestId,
        result: Result<Vec<VideoRecord>, ClientError>,
    },
    DownloadProgress {
        request: RequestId,
        progress: DownloadProgress,
    },
    DownloadFinished {
        request: RequestId,
        result: Result<PathBuf, ClientError>,
    },
}

/// What changed after applying an event, for presentation to redraw
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    ResultsReady { request: RequestId, count: usize },
    QueryFailed { request: RequestId, reason: String },
    DownloadProgress { request: RequestId, percent: f32, status: String },
    SessionOpened { request: RequestId, session: SessionId },
    DownloadFailed { request: RequestId, reason: String },
    /// Download finished but the player could not open the file
    SessionFailed { request: RequestId, reason: String },
    /// Event for a superseded or already finished request
    Discarded(RequestId),
}

#[derive(Debug)]
struct PendingDownload {
    record: VideoRecord,
    state: DownloadState,
}

pub struct VideoBrowserController {
    query_client: Arc<dyn VideoQueryClient>,
    download_client: Arc<dyn VideoDownloadClient>,
    engines: EngineFactory,
    topology: Topology,

    query_state: QueryState,
    /// Last successfully received list; survives failed refreshes
    results: Vec<VideoRecord>,
    selection: SelectionState,
    status: String,

    next_request: u64,
    current_query: Option<RequestId>,
    downloads: BTreeMap<RequestId, PendingDownload>,
    sessions: OpenSessionRegistry,
    overlay: Option<ControlOverlay>,

    events_tx: mpsc::UnboundedSender<BrowserEvent>,
    events_rx: mpsc::UnboundedReceiver<BrowserEvent>,
}

impl VideoBrowserController {
    pub fn new(
        query_client: Arc<dyn VideoQueryClient>,
        download_client: Arc<dyn VideoDownloadClient>,
        engines: EngineFactory,
        topology: Topology,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let overlay = match topology {
            Topology::Inline => Some(ControlOverlay::new()),
            Topology::MultiWindow => None,
        };

        Self {
            query_client,
            download_client,
            engines,
            topology,
            query_state: QueryState::Idle,
            results: Vec::new(),
            selection: SelectionState::default(),
            status: "Ready".to_string(),
            next_request: 0,
            current_query: None,
            downloads: BTreeMap::new(),
            sessions: OpenSessionRegistry::new(),
            overlay,
            events_tx,
            events_rx,
        }
    }

    /// Controller backed by one HTTP client for both queries and downloads
    pub fn with_http(client: Arc<HttpVideoClient>, topology: Topology) -> Self {
        let query_client: Arc<dyn VideoQueryClient> = client.clone();
        let download_client: Arc<dyn VideoDownloadClient> = client;
        Self::new(query_client, download_client, headless_engines(), topology)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Start a query for `criteria`.
    ///
    /// Invalid criteria fail synchronously and leave every piece of state
    /// untouched. A refresh issued while another is running supersedes it.
    /// Must be called from within a tokio runtime.
    pub fn refresh(&mut self, criteria: &FilterCriteria) -> Result<RequestId, BrowserError> {
        criteria.validate()?;

        let query = criteria.to_query();
        let request = self.next_request_id();
        if let Some(previous) = self.current_query.replace(request) {
            tracing::debug!("[Browser] Query {} superseded by {}", previous, request);
        }

        self.query_state = QueryState::Querying;
        self.status = "Querying videos...".to_string();
        tracing::info!(
            "[Browser] Query {}: device={:?} error_id={:?} limit={}",
            request,
            query.device_id,
            query.error_log_id,
            query.max_results
        );

        let client = Arc::clone(&self.query_client);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = client.query_videos(&query).await;
            let _ = events.send(BrowserEvent::QueryFinished { request, result });
        });

        Ok(request)
    }

    /// Select a row of the current result list; out-of-range clears the selection
    pub fn select_video(&mut self, index: usize) -> SelectionState {
        self.selection = if index < self.results.len() {
            SelectionState {
                index: Some(index),
                can_play: true,
            }
        } else {
            SelectionState::default()
        };
        self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection = SelectionState::default();
    }

    // =========================================================================
    // Downloads and sessions
    // =========================================================================

    /// Download `record` and open it in a player once the file is local.
    ///
    /// Records without a download URL are rejected before any network call.
    /// In the inline topology a newer call supersedes downloads still running.
    pub fn open_video(&mut self, record: &VideoRecord) -> Result<RequestId, BrowserError> {
        if !record.is_playable() {
            tracing::warn!("[Browser] Video {} has no download URL", record.video_id);
            return Err(BrowserError::InvalidVideoReference(record.video_id.clone()));
        }

        if self.topology == Topology::Inline {
            self.supersede_downloads();
        }

        let request = self.next_request_id();
        let mut state = DownloadState::Pending;
        state.advance(0.0);
        self.downloads.insert(
            request,
            PendingDownload {
                record: record.clone(),
                state,
            },
        );
        self.status = "Downloading video...".to_string();
        tracing::info!("[Browser] Download {}: {}", request, record.http_url);

        let client = Arc::clone(&self.download_client);
        let events = self.events_tx.clone();
        let progress_events = self.events_tx.clone();
        let progress = ProgressEmitter::new(move |progress| {
            let _ = progress_events.send(BrowserEvent::DownloadProgress { request, progress });
        });
        let http_url = record.http_url.clone();

        tokio::spawn(async move {
            let result = client.download_video(&http_url, progress).await;
            let _ = events.send(BrowserEvent::DownloadFinished { request, result });
        });

        Ok(request)
    }

    /// Open the selected row ("Play Selected" / double-click)
    pub fn open_selected(&mut self) -> Result<RequestId, BrowserError> {
        let record = self.selected_record().cloned().ok_or(BrowserError::NoSelection)?;
        self.open_video(&record)
    }

    /// Release a player's media resource and forget the session.
    ///
    /// Presentation calls this when the player window or view closes.
    pub fn close_session(&mut self, id: SessionId) -> Result<(), BrowserError> {
        let mut session = self
            .sessions
            .remove(id)
            .ok_or(BrowserError::UnknownSession(id))?;
        session.close();

        if self.sessions.is_empty() {
            if let Some(overlay) = self.overlay.as_mut() {
                overlay.hide();
            }
        }

        self.status = format!("Video player closed ({} players active)", self.sessions.len());
        tracing::info!("[Browser] {} closed, {} active", id, self.sessions.len());
        Ok(())
    }

    /// Close every open player
    pub fn close_all_sessions(&mut self) {
        let closed = self.sessions.len();
        self.sessions.close_all();
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.hide();
        }

        self.status = "Video player closed (0 players active)".to_string();
        tracing::info!("[Browser] Closed {} players", closed);
    }

    // =========================================================================
    // Event pump
    // =========================================================================

    /// Wait for the next event from a background task.
    ///
    /// Pending forever when nothing is in flight; check `has_pending_work` first.
    pub async fn next_event(&mut self) -> Option<BrowserEvent> {
        self.events_rx.recv().await
    }

    /// Wait for one event and apply it
    pub async fn pump(&mut self) -> Option<Update> {
        let event = self.next_event().await?;
        Some(self.apply(event))
    }

    /// Fold a background task's outcome into controller state
    pub fn apply(&mut self, event: BrowserEvent) -> Update {
        match event {
            BrowserEvent::QueryFinished { request, result } => self.finish_query(request, result),
            BrowserEvent::DownloadProgress { request, progress } => {
                self.record_progress(request, progress)
            }
            BrowserEvent::DownloadFinished { request, result } => {
                self.finish_download(request, result)
            }
        }
    }

    /// A query or download is still running
    pub fn has_pending_work(&self) -> bool {
        self.current_query.is_some() || self.downloads_in_flight() > 0
    }

    // =========================================================================
    // Snapshots for presentation
    // =========================================================================

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn query_state(&self) -> &QueryState {
        &self.query_state
    }

    /// Rows to display: the latest successful result list
    pub fn results(&self) -> &[VideoRecord] {
        &self.results
    }

    pub fn selection(&self) -> SelectionState {
        self.selection
    }

    pub fn selected_record(&self) -> Option<&VideoRecord> {
        self.selection.index.and_then(|i| self.results.get(i))
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn download_state(&self, request: RequestId) -> Option<&DownloadState> {
        self.downloads.get(&request).map(|d| &d.state)
    }

    pub fn downloads_in_flight(&self) -> usize {
        self.downloads
            .values()
            .filter(|d| !d.state.is_terminal())
            .count()
    }

    /// Percent of the most recently started download still running,
    /// `None` when the progress bar should be hidden
    pub fn download_progress(&self) -> Option<f32> {
        self.downloads.values().rev().find_map(|d| match d.state {
            DownloadState::InProgress(percent) => Some(percent),
            _ => None,
        })
    }

    pub fn session(&self, id: SessionId) -> Option<&PlaybackSession> {
        self.sessions.get(id)
    }

    pub fn session_mut(&mut self, id: SessionId) -> Option<&mut PlaybackSession> {
        self.sessions.get_mut(id)
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.ids()
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Auto-hide overlay of the inline player; `None` in the multi-window topology
    pub fn overlay(&self) -> Option<&ControlOverlay> {
        self.overlay.as_ref()
    }

    pub fn overlay_mut(&mut self) -> Option<&mut ControlOverlay> {
        self.overlay.as_mut()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn next_request_id(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    fn finish_query(
        &mut self,
        request: RequestId,
        result: Result<Vec<VideoRecord>, ClientError>,
    ) -> Update {
        if self.current_query != Some(request) {
            tracing::debug!("[Browser] Discarding stale query result {}", request);
            return Update::Discarded(request);
        }
        self.current_query = None;

        match result {
            Ok(videos) => {
                let count = videos.len();
                self.results = videos.clone();
                self.query_state = QueryState::Ready(videos);
                self.selection = SelectionState::default();
                self.status = format!("Found {} videos", count);
                tracing::info!("[Browser] ✓ Query {} found {} videos", request, count);
                Update::ResultsReady { request, count }
            }
            Err(e) => {
                let reason = BrowserError::QueryTransport(e).to_string();
                tracing::warn!("[Browser] ✗ Query {}: {}", request, reason);
                self.query_state = QueryState::Failed(reason.clone());
                self.status = format!("Query failed: {}", reason);
                Update::QueryFailed { request, reason }
            }
        }
    }

    fn record_progress(&mut self, request: RequestId, progress: DownloadProgress) -> Update {
        let Some(pending) = self.downloads.get_mut(&request) else {
            return Update::Discarded(request);
        };
        if !pending.state.advance(progress.percent) {
            return Update::Discarded(request);
        }

        self.status = progress.status.clone();
        Update::DownloadProgress {
            request,
            percent: progress.percent,
            status: progress.status,
        }
    }

    fn finish_download(
        &mut self,
        request: RequestId,
        result: Result<PathBuf, ClientError>,
    ) -> Update {
        let Some(pending) = self.downloads.get_mut(&request) else {
            tracing::debug!("[Browser] Discarding superseded download {}", request);
            return Update::Discarded(request);
        };
        if pending.state.is_terminal() {
            return Update::Discarded(request);
        }

        let result = match result {
            Ok(path) if path.as_os_str().is_empty() => Err(ClientError::Unknown(
                "download produced no local file".to_string(),
            )),
            other => other,
        };

        let update = match result {
            Ok(local_path) => {
                pending
                    .state
                    .finish(DownloadState::Succeeded(local_path.clone()));
                let record = pending.record.clone();
                self.start_session(request, &record, &local_path)
            }
            Err(e) => {
                let reason = BrowserError::DownloadTransport(e).to_string();
                pending.state.finish(DownloadState::Failed(reason.clone()));
                self.status = "Download failed".to_string();
                tracing::warn!("[Browser] ✗ Download {}: {}", request, reason);
                Update::DownloadFailed { request, reason }
            }
        };

        self.prune_finished_downloads();
        update
    }

    fn start_session(&mut self, request: RequestId, record: &VideoRecord, local_path: &Path) -> Update {
        match self.open_session(record, local_path) {
            Ok(session) => {
                self.status = match self.topology {
                    Topology::MultiWindow => format!(
                        "Video opened in new window ({} players active)",
                        self.sessions.len()
                    ),
                    Topology::Inline => "Playing video".to_string(),
                };
                tracing::info!("[Browser] ✓ {} playing {}", session, local_path.display());
                Update::SessionOpened { request, session }
            }
            Err(e) => {
                let reason = e.to_string();
                self.status = format!("Failed to open video: {}", reason);
                tracing::warn!("[Browser] ✗ Could not open {}: {}", local_path.display(), reason);
                Update::SessionFailed { request, reason }
            }
        }
    }

    /// Forget the oldest finished downloads beyond `FINISHED_DOWNLOADS_KEPT`
    fn prune_finished_downloads(&mut self) {
        let finished: Vec<RequestId> = self
            .downloads
            .iter()
            .filter(|(_, d)| d.state.is_terminal())
            .map(|(request, _)| *request)
            .collect();

        let excess = finished.len().saturating_sub(FINISHED_DOWNLOADS_KEPT);
        for request in &finished[..excess] {
            self.downloads.remove(request);
        }
    }

    fn open_session(&mut self, record: &VideoRecord, path: &Path) -> Result<SessionId, BrowserError> {
        if self.topology == Topology::Inline && !self.sessions.is_empty() {
            // single player: previous clip is released before the new one loads
            self.sessions.close_all();
        }

        let id = self.sessions.allocate_id();
        let mut session = PlaybackSession::new(id, (self.engines)(record));
        if let Err(e) = session.load(path).and_then(|_| session.play()) {
            if self.sessions.is_empty() {
                if let Some(overlay) = self.overlay.as_mut() {
                    overlay.hide();
                }
            }
            return Err(e.into());
        }
        self.sessions.insert(session);

        if let Some(overlay) = self.overlay.as_mut() {
            overlay.playback_started(Instant::now());
        }
        Ok(id)
    }

    fn supersede_downloads(&mut self) {
        self.downloads.retain(|request, pending| {
            let running = !pending.state.is_terminal();
            if running {
                tracing::info!("[Browser] Download {} superseded", request);
            }
            !running
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{MediaError, PlaybackStatus};
    use crate::testing::{record, EngineLog, RecordingEngine, ScriptedDownloadClient, ScriptedQueryClient};
    use assert_matches::assert_matches;
    use std::sync::Mutex;
    use time::macros::datetime;
    use time::Duration;

    struct Harness {
        browser: VideoBrowserController,
        queries: Arc<ScriptedQueryClient>,
        downloads: Arc<ScriptedDownloadClient>,
        engines: Arc<Mutex<Vec<EngineLog>>>,
    }

    fn harness(topology: Topology) -> Harness {
        harness_with(topology, None)
    }

    fn harness_with(topology: Topology, load_error: Option<MediaError>) -> Harness {
        harness_failing(topology, move |_: &VideoRecord| load_error.clone())
    }

    /// Engines fail to load whenever `fail` returns an error for the record
    fn harness_failing(
        topology: Topology,
        fail: impl Fn(&VideoRecord) -> Option<MediaError> + Send + Sync + 'static,
    ) -> Harness {
        let queries = Arc::new(ScriptedQueryClient::default());
        let downloads = Arc::new(ScriptedDownloadClient::default());
        let engines: Arc<Mutex<Vec<EngineLog>>> = Arc::default();

        let logs = Arc::clone(&engines);
        let factory: EngineFactory = Box::new(move |record: &VideoRecord| -> Box<dyn MediaEngine> {
            let (engine, log) = match fail(record) {
                Some(err) => RecordingEngine::failing(err),
                None => RecordingEngine::with_duration(record.duration_millis),
            };
            logs.lock().unwrap().push(log);
            Box::new(engine)
        });

        let query_client: Arc<dyn VideoQueryClient> = queries.clone();
        let download_client: Arc<dyn VideoDownloadClient> = downloads.clone();
        Harness {
            browser: VideoBrowserController::new(query_client, download_client, factory, topology),
            queries,
            downloads,
            engines,
        }
    }

    fn criteria() -> FilterCriteria {
        let t0 = datetime!(2024-05-01 00:00);
        FilterCriteria::new(t0, t0 + Duration::days(1))
    }

    async fn until(mut done: impl FnMut() -> bool) {
        while !done() {
            tokio::task::yield_now().await;
        }
    }

    impl Harness {
        async fn load_results(&mut self, ids: &[&str]) {
            let reply = self.queries.expect_call();
            self.browser.refresh(&criteria()).unwrap();
            reply.send(Ok(ids.iter().map(|id| record(id)).collect())).unwrap();
            assert_matches!(self.browser.pump().await, Some(Update::ResultsReady { .. }));
        }
    }

    #[tokio::test]
    async fn invalid_time_range_makes_no_call() {
        let mut h = harness(Topology::MultiWindow);
        let t = datetime!(2024-05-01 08:00);

        for (start, end) in [(t, t), (t + Duration::hours(1), t)] {
            let err = h.browser.refresh(&FilterCriteria::new(start, end)).unwrap_err();
            assert_matches!(err, BrowserError::InvalidTimeRange { .. });
        }

        tokio::task::yield_now().await;
        assert_eq!(h.queries.calls(), 0);
        assert_eq!(h.browser.query_state(), &QueryState::Idle);
        assert_eq!(h.browser.status(), "Ready");
        assert!(!h.browser.has_pending_work());
    }

    #[tokio::test]
    async fn invalid_time_range_keeps_previous_results() {
        let mut h = harness(Topology::MultiWindow);
        h.load_results(&["a", "b"]).await;

        let t = datetime!(2024-05-01 08:00);
        assert!(h.browser.refresh(&FilterCriteria::new(t, t)).is_err());

        assert_eq!(h.browser.results().len(), 2);
        assert_eq!(h.browser.status(), "Found 2 videos");
    }

    #[tokio::test]
    async fn refresh_reports_found_videos() {
        let mut h = harness(Topology::MultiWindow);
        let reply = h.queries.expect_call();

        let request = h.browser.refresh(&criteria().with_device("All Devices").with_error_log_id(" E-1 ")).unwrap();
        assert_eq!(h.browser.query_state(), &QueryState::Querying);
        assert_eq!(h.browser.status(), "Querying videos...");
        assert!(h.browser.has_pending_work());

        let videos = vec![record("r1"), record("r2"), record("r3")];
        reply.send(Ok(videos.clone())).unwrap();

        assert_eq!(
            h.browser.pump().await,
            Some(Update::ResultsReady { request, count: 3 })
        );
        assert_eq!(h.browser.query_state(), &QueryState::Ready(videos));
        assert_eq!(h.browser.status(), "Found 3 videos");
        assert!(!h.browser.has_pending_work());

        let sent = h.queries.queries();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].device_id, "");
        assert_eq!(sent[0].error_log_id, "E-1");
        assert_eq!(sent[0].max_results, 100);
    }

    #[tokio::test]
    async fn empty_result_is_ready() {
        let mut h = harness(Topology::MultiWindow);
        h.load_results(&[]).await;
        assert_eq!(h.browser.query_state(), &QueryState::Ready(vec![]));
        assert_eq!(h.browser.status(), "Found 0 videos");
    }

    #[tokio::test]
    async fn failed_query_keeps_previous_list() {
        let mut h = harness(Topology::MultiWindow);
        h.load_results(&["a", "b"]).await;

        let reply = h.queries.expect_call();
        h.browser.refresh(&criteria()).unwrap();
        reply.send(Err(ClientError::Timeout)).unwrap();

        assert_matches!(h.browser.pump().await, Some(Update::QueryFailed { .. }));
        assert_matches!(h.browser.query_state(), QueryState::Failed(reason) if reason.contains("timeout"));
        assert_eq!(h.browser.results().len(), 2);
        assert!(h.browser.status().starts_with("Query failed:"));
    }

    #[tokio::test]
    async fn only_latest_query_is_authoritative() {
        let mut h = harness(Topology::MultiWindow);

        let first_reply = h.queries.expect_call();
        let first = h.browser.refresh(&criteria()).unwrap();
        let queries = Arc::clone(&h.queries);
        until(|| queries.calls() == 1).await;

        let second_reply = h.queries.expect_call();
        let second = h.browser.refresh(&criteria().with_device("feeder_01")).unwrap();
        until(|| queries.calls() == 2).await;

        second_reply.send(Ok(vec![record("new")])).unwrap();
        assert_eq!(
            h.browser.pump().await,
            Some(Update::ResultsReady { request: second, count: 1 })
        );

        first_reply.send(Ok(vec![record("old1"), record("old2")])).unwrap();
        assert_eq!(h.browser.pump().await, Some(Update::Discarded(first)));

        assert_eq!(h.browser.results(), &[record("new")]);
        assert_eq!(h.browser.status(), "Found 1 videos");
    }

    #[tokio::test]
    async fn selection_enables_play() {
        let mut h = harness(Topology::MultiWindow);
        h.load_results(&["a", "b"]).await;

        assert_eq!(
            h.browser.select_video(1),
            SelectionState { index: Some(1), can_play: true }
        );
        assert_eq!(h.browser.selected_record(), Some(&record("b")));

        assert_eq!(h.browser.select_video(5), SelectionState::default());
        assert_eq!(h.browser.open_selected(), Err(BrowserError::NoSelection));
        assert_eq!(h.downloads.calls(), 0);
    }

    #[tokio::test]
    async fn new_results_clear_selection() {
        let mut h = harness(Topology::MultiWindow);
        h.load_results(&["a"]).await;
        h.browser.select_video(0);

        h.load_results(&["b", "c"]).await;
        assert_eq!(h.browser.selection(), SelectionState::default());
    }

    #[tokio::test]
    async fn empty_url_is_rejected_before_download() {
        let mut h = harness(Topology::MultiWindow);
        let mut bad = record("x");
        bad.http_url = String::new();

        assert_eq!(
            h.browser.open_video(&bad),
            Err(BrowserError::InvalidVideoReference("x".to_string()))
        );
        tokio::task::yield_now().await;
        assert_eq!(h.downloads.calls(), 0);
        assert_eq!(h.browser.downloads_in_flight(), 0);
    }

    #[tokio::test]
    async fn failed_download_leaves_query_state_alone() {
        let mut h = harness(Topology::MultiWindow);
        h.load_results(&["a", "b"]).await;
        h.browser.select_video(0);
        let before = h.browser.query_state().clone();

        let reply = h.downloads.expect_call();
        let request = h.browser.open_selected().unwrap();
        assert_eq!(h.browser.download_state(request), Some(&DownloadState::InProgress(0.0)));
        assert_eq!(h.browser.status(), "Downloading video...");

        assert_matches!(
            h.browser.pump().await,
            Some(Update::DownloadProgress { percent, .. }) if percent == 50.0
        );
        assert_eq!(h.browser.download_progress(), Some(50.0));

        reply.send(Err(ClientError::Status { status: 404, url: "u".into() })).unwrap();
        assert_matches!(h.browser.pump().await, Some(Update::DownloadFailed { .. }));

        assert_matches!(h.browser.download_state(request), Some(DownloadState::Failed(_)));
        assert_eq!(h.browser.active_sessions(), 0);
        assert_eq!(h.browser.query_state(), &before);
        assert_eq!(h.browser.selection().index, Some(0));
        assert_eq!(h.browser.status(), "Download failed");
        assert_eq!(h.browser.download_progress(), None);
        assert_eq!(h.downloads.urls(), vec!["http://server/videos/a.mp4"]);
    }

    #[tokio::test]
    async fn download_without_local_path_fails() {
        let mut h = harness(Topology::MultiWindow);
        let reply = h.downloads.expect_call();
        let request = h.browser.open_video(&record("a")).unwrap();

        reply.send(Ok(PathBuf::new())).unwrap();
        h.browser.pump().await; // progress
        assert_matches!(h.browser.pump().await, Some(Update::DownloadFailed { .. }));
        assert_matches!(h.browser.download_state(request), Some(DownloadState::Failed(_)));
        assert_eq!(h.browser.active_sessions(), 0);
    }

    #[tokio::test]
    async fn multi_window_opens_a_session_per_download() {
        let mut h = harness(Topology::MultiWindow);
        let downloads = Arc::clone(&h.downloads);

        let reply_a = h.downloads.expect_call();
        let a = h.browser.open_video(&record("a")).unwrap();
        until(|| downloads.calls() == 1).await;
        let reply_b = h.downloads.expect_call();
        let b = h.browser.open_video(&record("b")).unwrap();
        until(|| downloads.calls() == 2).await;
        assert_eq!(h.browser.downloads_in_flight(), 2);

        reply_a.send(Ok(PathBuf::from("/tmp/a.mp4"))).unwrap();
        reply_b.send(Ok(PathBuf::from("/tmp/b.mp4"))).unwrap();

        let mut opened = Vec::new();
        while h.browser.has_pending_work() {
            if let Some(Update::SessionOpened { request, session }) = h.browser.pump().await {
                opened.push((request, session));
            }
        }
        opened.sort();
        assert_eq!(opened.iter().map(|(r, _)| *r).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(h.browser.active_sessions(), 2);
        assert_eq!(h.browser.status(), "Video opened in new window (2 players active)");
        assert_eq!(
            h.browser.download_state(a),
            Some(&DownloadState::Succeeded(PathBuf::from("/tmp/a.mp4")))
        );

        let (_, first) = opened[0];
        let session = h.browser.session(first).unwrap();
        assert_eq!(session.status(), Some(PlaybackStatus::Playing));
        assert_eq!(session.duration_millis(), 60_000);

        h.browser.close_session(first).unwrap();
        assert_eq!(h.browser.active_sessions(), 1);
        assert_eq!(h.browser.status(), "Video player closed (1 players active)");
        let released = h
            .engines
            .lock()
            .unwrap()
            .iter()
            .filter(|log| log.calls().contains(&"release".to_string()))
            .count();
        assert_eq!(released, 1);

        assert_eq!(
            h.browser.close_session(first),
            Err(BrowserError::UnknownSession(first))
        );
    }

    #[tokio::test]
    async fn transport_goes_through_registered_session() {
        let mut h = harness(Topology::MultiWindow);
        let reply = h.downloads.expect_call();
        h.browser.open_video(&record("a")).unwrap();
        reply.send(Ok(PathBuf::from("/tmp/a.mp4"))).unwrap();

        h.browser.pump().await;
        let Some(Update::SessionOpened { session, .. }) = h.browser.pump().await else {
            panic!("session not opened");
        };

        let player = h.browser.session_mut(session).unwrap();
        assert_eq!(player.play_pause().unwrap(), PlaybackStatus::Paused);
        player.on_position_changed(2_000);
        assert_eq!(player.skip_backward().unwrap(), 0);
        assert_eq!(player.snapshot().time_label, "00:00 / 01:00");
    }

    #[tokio::test]
    async fn unplayable_file_reports_session_failure() {
        let mut h = harness_with(
            Topology::MultiWindow,
            Some(MediaError::NotFound(PathBuf::from("/tmp/a.mp4"))),
        );
        let reply = h.downloads.expect_call();
        let request = h.browser.open_video(&record("a")).unwrap();
        reply.send(Ok(PathBuf::from("/tmp/a.mp4"))).unwrap();

        h.browser.pump().await;
        assert_matches!(h.browser.pump().await, Some(Update::SessionFailed { .. }));
        assert_eq!(h.browser.active_sessions(), 0);
        assert_matches!(h.browser.download_state(request), Some(DownloadState::Succeeded(_)));
        assert!(h.browser.status().starts_with("Failed to open video:"));
    }

    #[tokio::test]
    async fn inline_newer_open_supersedes_running_download() {
        let mut h = harness(Topology::Inline);
        let downloads = Arc::clone(&h.downloads);

        let reply_a = h.downloads.expect_call();
        let a = h.browser.open_video(&record("a")).unwrap();
        until(|| downloads.calls() == 1).await;
        let reply_b = h.downloads.expect_call();
        let b = h.browser.open_video(&record("b")).unwrap();
        until(|| downloads.calls() == 2).await;

        assert_eq!(h.browser.download_state(a), None);
        assert_eq!(h.browser.downloads_in_flight(), 1);

        reply_b.send(Ok(PathBuf::from("/tmp/b.mp4"))).unwrap();
        reply_a.send(Ok(PathBuf::from("/tmp/a.mp4"))).unwrap();

        let mut updates = Vec::new();
        for _ in 0..4 {
            updates.push(h.browser.pump().await.unwrap());
        }
        assert!(updates.contains(&Update::Discarded(a)));
        assert!(updates
            .iter()
            .any(|u| matches!(u, Update::SessionOpened { request, .. } if *request == b)));

        assert_eq!(h.browser.active_sessions(), 1);
        assert_eq!(h.browser.status(), "Playing video");
        let session = h.browser.session_ids()[0];
        assert_eq!(
            h.browser.session(session).unwrap().local_path(),
            Some(Path::new("/tmp/b.mp4"))
        );
    }

    #[tokio::test]
    async fn inline_replaces_previous_clip_after_releasing_it() {
        let mut h = harness(Topology::Inline);

        let reply = h.downloads.expect_call();
        h.browser.open_video(&record("a")).unwrap();
        reply.send(Ok(PathBuf::from("/tmp/a.mp4"))).unwrap();
        h.browser.pump().await;
        h.browser.pump().await;
        assert!(h.browser.overlay().unwrap().is_visible());

        let reply = h.downloads.expect_call();
        h.browser.open_video(&record("b")).unwrap();
        reply.send(Ok(PathBuf::from("/tmp/b.mp4"))).unwrap();
        h.browser.pump().await;
        h.browser.pump().await;

        assert_eq!(h.browser.active_sessions(), 1);
        let engines = h.engines.lock().unwrap();
        assert_eq!(engines.len(), 2);
        assert_eq!(engines[0].calls().last().map(String::as_str), Some("release"));
        assert_eq!(engines[1].calls()[0], "load /tmp/b.mp4");
    }

    #[tokio::test]
    async fn closing_last_inline_session_hides_overlay() {
        let mut h = harness(Topology::Inline);
        let reply = h.downloads.expect_call();
        h.browser.open_video(&record("a")).unwrap();
        reply.send(Ok(PathBuf::from("/tmp/a.mp4"))).unwrap();
        h.browser.pump().await;
        h.browser.pump().await;

        let id = h.browser.session_ids()[0];
        h.browser.close_session(id).unwrap();
        assert!(!h.browser.overlay().unwrap().is_visible());
        assert_eq!(h.browser.status(), "Video player closed (0 players active)");
    }

    #[tokio::test]
    async fn close_all_sessions_releases_every_player() {
        let mut h = harness(Topology::MultiWindow);
        for id in ["a", "b"] {
            let reply = h.downloads.expect_call();
            h.browser.open_video(&record(id)).unwrap();
            reply.send(Ok(PathBuf::from(format!("/tmp/{}.mp4", id)))).unwrap();
        }
        while h.browser.has_pending_work() {
            h.browser.pump().await;
        }
        assert_eq!(h.browser.status(), "Video opened in new window (2 players active)");

        h.browser.close_all_sessions();

        assert_eq!(h.browser.active_sessions(), 0);
        assert!(h.browser.session_ids().is_empty());
        assert_eq!(h.browser.status(), "Video player closed (0 players active)");
        let engines = h.engines.lock().unwrap();
        assert_eq!(engines.len(), 2);
        assert!(engines
            .iter()
            .all(|log| log.calls().last().map(String::as_str) == Some("release")));
    }

    #[tokio::test]
    async fn inline_failed_replacement_hides_overlay() {
        let mut h = harness_failing(Topology::Inline, |record: &VideoRecord| {
            (record.video_id == "broken")
                .then(|| MediaError::Unsupported("broken.bin".to_string()))
        });

        let reply = h.downloads.expect_call();
        h.browser.open_video(&record("a")).unwrap();
        reply.send(Ok(PathBuf::from("/tmp/a.mp4"))).unwrap();
        h.browser.pump().await;
        h.browser.pump().await;
        assert!(h.browser.overlay().unwrap().is_visible());

        let reply = h.downloads.expect_call();
        h.browser.open_video(&record("broken")).unwrap();
        reply.send(Ok(PathBuf::from("/tmp/broken.bin"))).unwrap();
        h.browser.pump().await;
        assert_matches!(h.browser.pump().await, Some(Update::SessionFailed { .. }));

        assert_eq!(h.browser.active_sessions(), 0);
        assert!(!h.browser.overlay().unwrap().is_visible());
    }

    #[tokio::test]
    async fn finished_downloads_are_pruned() {
        let mut h = harness(Topology::MultiWindow);
        let total = FINISHED_DOWNLOADS_KEPT + 4;

        let mut requests = Vec::new();
        for i in 0..total {
            let reply = h.downloads.expect_call();
            requests.push(h.browser.open_video(&record(&format!("v{}", i))).unwrap());
            reply.send(Err(ClientError::Timeout)).unwrap();
        }
        while h.browser.has_pending_work() {
            h.browser.pump().await;
        }

        assert_eq!(h.browser.downloads.len(), FINISHED_DOWNLOADS_KEPT);
        assert_eq!(h.browser.download_state(requests[0]), None);
        assert_matches!(
            h.browser.download_state(requests[total - 1]),
            Some(DownloadState::Failed(_))
        );
    }

    #[tokio::test]
    async fn multi_window_has_no_overlay() {
        let h = harness(Topology::MultiWindow);
        assert!(h.browser.overlay().is_none());
    }
}
