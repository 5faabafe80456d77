use crate::domain::{FileView, NewFile};
use crate::error::{AppError, Result};
use crate::storage::Storage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct FileUseCase {
    storage: Arc<dyn Storage>,
    uploads_dir: PathBuf,
    public_url: String,
}

/// Random stored name that keeps the original extension
fn stored_name(original: &str) -> String {
    let extension = Path::new(original)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("{}{}", Uuid::new_v4().simple(), extension)
}

impl FileUseCase {
    pub fn new(storage: Arc<dyn Storage>, uploads_dir: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            storage,
            uploads_dir: uploads_dir.into(),
            public_url: public_url.into(),
        }
    }

    pub async fn store(&self, original_name: &str, bytes: &[u8]) -> Result<FileView> {
        if original_name.trim().is_empty() || bytes.is_empty() {
            return Err(AppError::validation());
        }

        let path = stored_name(original_name);
        tokio::fs::create_dir_all(&self.uploads_dir).await?;
        tokio::fs::write(self.uploads_dir.join(&path), bytes).await?;

        let file = self
            .storage
            .create_file(NewFile {
                name: original_name.to_string(),
                path,
            })
            .await?;

        info!("Stored upload {} as {}", file.name, file.path);
        Ok(FileView::new(&file, &self.public_url))
    }
}
