//! HTTP/JSON implementation of the ingestion backend

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use tracing::debug;

use etl_wizard_core::backend::{Backend, FileUpload};
use etl_wizard_core::domain::{
    ConnectionConfig, FileInfo, FileParseConfig, JobStatusReport, PreviewRow, SourceKind,
};
use etl_wizard_core::payload::{IngestionRequest, PreviewRequest};
use etl_wizard_core::{CoreError, Result};

use crate::config::ClientConfig;
use crate::error::{decode, transport};
use crate::wire::{
    ColumnsRequest, ColumnsResponse, ConnectResponse, PreviewResponse, StartIngestionResponse,
    UploadResponse,
};

/// Backend reached over HTTP at a fixed base URL
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| CoreError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Status URL with the opaque job id as one encoded path segment
    pub(crate) fn job_status_url(&self, job_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.url("/job-status"))
            .map_err(|e| CoreError::Transport(format!("Invalid backend URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| {
                CoreError::Transport(format!(
                    "Backend URL {} cannot carry a path",
                    self.config.base_url
                ))
            })?
            .push(job_id);
        Ok(url)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: serde::Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let url = self.config.url(path);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn connect(&self, connection: &ConnectionConfig) -> Result<Vec<String>> {
        let path = format!("/connect/{}", SourceKind::Database.as_str());
        let response: ConnectResponse = self.post_json(&path, connection).await?;
        Ok(response.tables)
    }

    async fn upload_file(&self, upload: FileUpload, config: &FileParseConfig) -> Result<FileInfo> {
        let url = self.config.url("/upload-file");
        debug!("POST {} ({} bytes)", url, upload.bytes.len());

        let form = Form::new()
            .part("file", Part::bytes(upload.bytes).file_name(upload.file_name))
            .text("delimiter", config.delimiter.as_str())
            .text("has_header", config.has_header.to_string());

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        let body: UploadResponse = decode(response).await?;

        Ok(FileInfo {
            filename: body.filename,
            path: body.temp_path,
            columns: body.columns,
        })
    }

    async fn list_columns(
        &self,
        connection: &ConnectionConfig,
        table: &str,
    ) -> Result<Vec<String>> {
        let request = ColumnsRequest {
            connection,
            table_name: table,
        };
        let response: ColumnsResponse = self.post_json("/get-columns", &request).await?;
        Ok(response.columns.into_iter().map(|c| c.name).collect())
    }

    async fn preview(&self, request: &PreviewRequest) -> Result<Vec<PreviewRow>> {
        let response: PreviewResponse = self.post_json("/preview-data", request).await?;
        Ok(response.preview)
    }

    async fn start_ingestion(&self, request: &IngestionRequest) -> Result<String> {
        let response: StartIngestionResponse =
            self.post_json("/start-ingestion", request).await?;
        Ok(response.job_id())
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusReport> {
        let url = self.job_status_url(job_id)?;
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(transport)?;
        decode(response).await
    }
}
