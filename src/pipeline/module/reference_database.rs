use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use log::warn;
use ndarray::Array1;
use tokio::fs;
use tokio::sync::RwLock;

use crate::pipeline::model_config::config::is_allowed_extension;
use crate::pipeline::verify_pipeline::verify_pipeline::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub path: PathBuf,
    pub name: String,
    pub fingerprint: Fingerprint,
}

/// Cheap change detector for a reference file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub modified: Option<SystemTime>,
    pub len: u64,
}

#[derive(Debug, Clone)]
struct CachedEmbedding {
    fingerprint: Fingerprint,
    embedding: Arc<Array1<f32>>,
}

/// Read-only view over the reference image directory plus an in-memory cache
/// of reference embeddings.
#[derive(Debug)]
pub struct ReferenceDatabase {
    database_dir: PathBuf,
    cache: RwLock<HashMap<PathBuf, CachedEmbedding>>,
}

impl ReferenceDatabase {
    pub fn new(database_dir: impl Into<PathBuf>) -> Self {
        ReferenceDatabase {
            database_dir: database_dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn database_dir(&self) -> &Path {
        &self.database_dir
    }

    pub async fn is_available(&self) -> bool {
        fs::metadata(&self.database_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Lists reference images sorted by filename.
    pub async fn list_images(&self) -> Result<Vec<ReferenceImage>, PipelineError> {
        let mut entries = match fs::read_dir(&self.database_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PipelineError::DatabaseUnavailable(format!(
                    "Database directory {} does not exist",
                    self.database_dir.display()
                )))
            }
            Err(e) => {
                return Err(PipelineError::DatabaseUnavailable(format!(
                    "Database directory {} is not readable: {e}",
                    self.database_dir.display()
                )))
            }
        };

        let mut images = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("failed to read entry in {}: {e}", self.database_dir.display());
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_allowed_extension(&name) {
                continue;
            }

            let path = entry.path();
            // metadata() follows symlinks, entry.metadata() would not.
            let metadata = match fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("failed to stat reference image {}: {e}", path.display());
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            images.push(ReferenceImage {
                path,
                name,
                fingerprint: Fingerprint {
                    modified: metadata.modified().ok(),
                    len: metadata.len(),
                },
            });
        }

        images.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(images)
    }

    pub async fn cached_embedding(&self, image: &ReferenceImage) -> Option<Arc<Array1<f32>>> {
        let cache = self.cache.read().await;
        cache
            .get(&image.path)
            .filter(|cached| cached.fingerprint == image.fingerprint)
            .map(|cached| Arc::clone(&cached.embedding))
    }

    pub async fn store_embedding(&self, image: &ReferenceImage, embedding: Arc<Array1<f32>>) {
        let mut cache = self.cache.write().await;
        cache.insert(
            image.path.clone(),
            CachedEmbedding {
                fingerprint: image.fingerprint,
                embedding,
            },
        );
    }

    /// Drops cache entries for files that are no longer in the reference set.
    pub async fn retain(&self, images: &[ReferenceImage]) {
        let mut cache = self.cache.write().await;
        cache.retain(|path, _| images.iter().any(|image| &image.path == path));
    }

    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.len()
    }
}
