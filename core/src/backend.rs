//! Ingestion backend abstraction
//!
//! Connectivity, parsing, SQL and job execution all happen on the remote
//! service. The wizard only sees this request/response contract.

use async_trait::async_trait;

use crate::domain::{ConnectionConfig, FileInfo, FileParseConfig, JobStatusReport, PreviewRow};
use crate::error::Result;
use crate::payload::{IngestionRequest, PreviewRequest};

/// A file handed over for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Remote ingestion service
///
/// Failures are `CoreError::Backend` when the service answered with a
/// `detail`, and `CoreError::Transport` otherwise.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Connect to the database and list its tables
    async fn connect(&self, connection: &ConnectionConfig) -> Result<Vec<String>>;

    /// Upload a flat file and discover its columns
    async fn upload_file(&self, upload: FileUpload, config: &FileParseConfig) -> Result<FileInfo>;

    /// Ordered column names of one table
    async fn list_columns(&self, connection: &ConnectionConfig, table: &str)
        -> Result<Vec<String>>;

    async fn preview(&self, request: &PreviewRequest) -> Result<Vec<PreviewRow>>;

    /// Submit an ingestion job and return its identifier
    async fn start_ingestion(&self, request: &IngestionRequest) -> Result<String>;

    async fn job_status(&self, job_id: &str) -> Result<JobStatusReport>;
}

/// Something that can supply the bytes of a file to upload
#[async_trait]
pub trait BlobSource: Send + Sync {
    fn file_name(&self) -> String;

    async fn read(&self) -> Result<Vec<u8>>;
}

/// Blob already held in memory
#[derive(Debug, Clone)]
pub struct InMemoryBlob {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl InMemoryBlob {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

#[async_trait]
impl BlobSource for InMemoryBlob {
    fn file_name(&self) -> String {
        self.file_name.clone()
    }

    async fn read(&self) -> Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockBackend;
    use super::*;
    use crate::error::CoreError;

    #[tokio::test]
    async fn test_mock_backend() {
        let mut mock = MockBackend::new();
        mock.expect_list_columns()
            .withf(|_, table| table == "orders")
            .returning(|_, _| Ok(vec!["id".to_string()]));

        let columns = mock
            .list_columns(&ConnectionConfig::default(), "orders")
            .await
            .unwrap();
        assert_eq!(columns, vec!["id"]);
    }

    #[tokio::test]
    async fn test_mock_backend_error() {
        let mut mock = MockBackend::new();
        mock.expect_job_status().returning(|_| {
            Err(CoreError::Backend {
                status: 404,
                detail: "Job not found".to_string(),
            })
        });

        let err = mock.job_status("missing").await.unwrap_err();
        assert!(err.is_backend());
    }

    #[tokio::test]
    async fn test_in_memory_blob() {
        let blob = InMemoryBlob::new("data.csv", "a,b\n1,2\n");
        assert_eq!(blob.file_name(), "data.csv");
        assert_eq!(blob.read().await.unwrap(), b"a,b\n1,2\n".to_vec());
    }
}
