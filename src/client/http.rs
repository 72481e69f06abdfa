// HTTP implementation of the query and download clients

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use super::errors::ClientError;
use super::models::{VideoQuery, VideoRecord};
use super::traits::{ProgressEmitter, VideoDownloadClient, VideoQueryClient};
use super::utils::{build_http_client, local_file_name, part_path, percent_of};
use crate::config::ClientConfig;
use crate::format::format_file_size;

const VIDEOS_ENDPOINT: &str = "/api/videos";

/// The server answers either with a bare list or with `{ "videos": [...] }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QueryResponse {
    List(Vec<VideoRecord>),
    Envelope { videos: Vec<VideoRecord> },
}

impl QueryResponse {
    fn into_records(self) -> Vec<VideoRecord> {
        match self {
            Self::List(videos) | Self::Envelope { videos } => videos,
        }
    }
}

pub struct HttpVideoClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpVideoClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = build_http_client(&config)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn query_params(query: &VideoQuery) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();

        if !query.device_id.is_empty() {
            params.push(("device_id", query.device_id.clone()));
        }
        if !query.error_log_id.is_empty() {
            params.push(("error_log_id", query.error_log_id.clone()));
        }
        params.push(("start_time", query.start_time_millis.to_string()));
        params.push(("end_time", query.end_time_millis.to_string()));
        params.push(("limit", query.max_results.to_string()));

        params
    }

    async fn stream_to_file(
        &self,
        mut response: reqwest::Response,
        part_path: &Path,
        progress: &ProgressEmitter,
    ) -> Result<u64, ClientError> {
        let total = response.content_length();
        let mut file = tokio::fs::File::create(part_path).await?;
        let mut written: u64 = 0;
        let mut last_percent: Option<u32> = None;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;

            if let Some(percent) = percent_of(written, total) {
                // One update per whole percent
                let whole = percent as u32;
                if last_percent != Some(whole) {
                    last_percent = Some(whole);
                    progress.status(
                        percent,
                        format!(
                            "Downloading {:.0}% of {}",
                            percent,
                            format_file_size(total.unwrap_or(written))
                        ),
                    );
                }
            }
        }

        file.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl VideoQueryClient for HttpVideoClient {
    async fn query_videos(&self, query: &VideoQuery) -> Result<Vec<VideoRecord>, ClientError> {
        let url = self.config.api_url(VIDEOS_ENDPOINT);
        tracing::debug!("[HttpClient] GET {} {:?}", url, query);

        let body = self
            .http
            .get(&url)
            .query(&Self::query_params(query))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let videos = serde_json::from_str::<QueryResponse>(&body)?.into_records();
        tracing::info!("[HttpClient] ✓ {} videos from {}", videos.len(), url);
        Ok(videos)
    }
}

#[async_trait]
impl VideoDownloadClient for HttpVideoClient {
    async fn download_video(
        &self,
        http_url: &str,
        progress: ProgressEmitter,
    ) -> Result<PathBuf, ClientError> {
        let url = reqwest::Url::parse(http_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", http_url, e)))?;

        tokio::fs::create_dir_all(&self.config.download_dir).await?;
        let target = self.config.download_dir.join(local_file_name(http_url));
        let partial = part_path(&target);

        progress.status(0.0, "Downloading video...");
        tracing::info!("[HttpClient] Downloading {} -> {}", url, target.display());

        let response = self.http.get(url).send().await?.error_for_status()?;

        match self.stream_to_file(response, &partial, &progress).await {
            Ok(bytes) => {
                tokio::fs::rename(&partial, &target).await?;
                progress.status(100.0, format!("Downloaded {}", format_file_size(bytes)));
                tracing::info!("[HttpClient] ✓ Saved {} ({} bytes)", target.display(), bytes);
                Ok(target)
            }
            Err(e) => {
                tracing::warn!("[HttpClient] ✗ Download of {} failed: {}", http_url, e);
                let _ = tokio::fs::remove_file(&partial).await;
                Err(e)
            }
        }
    }
}
