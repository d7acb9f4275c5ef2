use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::ResultSink;
use crate::models::CycleResult;
use crate::utils::error::{AppError, Result};

/// Append-only CSV record of every cycle result.
///
/// The header (`Date/Time,Product,Price,<codes...>`) is written only when the
/// file is missing or empty. Each row is encoded in memory and appended with a
/// single write, so a failure never leaves a partial row behind earlier ones.
pub struct CsvLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persistence_error(&self, message: impl std::fmt::Display) -> AppError {
        AppError::Persistence {
            path: self.path.display().to_string(),
            message: message.to_string(),
        }
    }

    fn encode(result: &CycleResult, with_header: bool) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        if with_header {
            let mut header = vec!["Date/Time", "Product", "Price"];
            header.extend(result.per_code.keys().map(|code| code.as_str()));
            writer.write_record(&header)?;
        }

        let timestamp = result.formatted_timestamp();
        let mut row = vec![timestamp.as_str(), result.product.name.as_str(), result.product.price.as_str()];
        row.extend(result.per_code.values().map(|status| status.label()));
        writer.write_record(&row)?;

        writer
            .into_inner()
            .map_err(|e| AppError::Internal(format!("Failed to finish CSV row: {}", e)))
    }

    async fn needs_header(&self) -> Result<bool> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.len() == 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(self.persistence_error(e)),
        }
    }
}

#[async_trait]
impl ResultSink for CsvLog {
    fn name(&self) -> &str {
        "csv"
    }

    fn is_persistent(&self) -> bool {
        true
    }

    async fn record(&self, result: &CycleResult) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let bytes = Self::encode(result, self.needs_header().await?)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.persistence_error(e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.persistence_error(e))?;
        file.write_all(&bytes).await.map_err(|e| self.persistence_error(e))?;
        file.flush().await.map_err(|e| self.persistence_error(e))?;

        tracing::debug!(path = %self.path.display(), product = %result.product.name, "Result row appended");
        Ok(())
    }
}
