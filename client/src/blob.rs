//! Files on disk as upload sources

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use etl_wizard_core::{BlobSource, Result};

/// A local file read at upload time
#[derive(Debug, Clone)]
pub struct PathBlob {
    path: PathBuf,
}

impl PathBlob {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BlobSource for PathBlob {
    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string())
    }

    async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_wizard_core::CoreError;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"id,total\n1,9.5\n").unwrap();

        let blob = PathBlob::new(&path);
        assert_eq!(blob.file_name(), "orders.csv");
        assert_eq!(blob.read().await.unwrap(), b"id,total\n1,9.5\n".to_vec());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let blob = PathBlob::new("/definitely/not/here.csv");
        assert!(matches!(blob.read().await, Err(CoreError::Io(_))));
    }
}
