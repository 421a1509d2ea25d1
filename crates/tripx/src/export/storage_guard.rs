use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// ⚖️ The verdict on a flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageDecision {
    Allowed { used_bytes: u64 },
    Refused { used_bytes: u64, max_bytes: u64 },
}

/// 🚧 Counts the bytes under the save directory and says yes or no to a flush.
///
/// Nothing is cached: every `authorize` walks the whole tree. That happens once per flush,
/// which is at most once per `max_batch_size` finished trips plus once at shutdown.
#[derive(Debug, Clone)]
pub struct StorageGuard {
    root: PathBuf,
    max_storage_bytes: u64,
}

impl StorageGuard {
    pub fn new(root: &Path, max_storage_bytes: u64) -> Self {
        Self {
            root: root.to_path_buf(),
            max_storage_bytes,
        }
    }

    pub fn max_storage_bytes(&self) -> u64 {
        self.max_storage_bytes
    }

    /// 📏 Total size of regular files under the root. Symlinks are neither followed nor
    /// counted. A root that does not exist yet holds zero bytes.
    pub async fn used_bytes(&self) -> Result<u64> {
        let mut total = 0u64;
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => {
                    return Err(err).context(format!(
                        "💀 Couldn't list '{}' while measuring the save directory",
                        dir.display()
                    ));
                }
            };
            while let Some(entry) = entries.next_entry().await? {
                let metadata = tokio::fs::symlink_metadata(entry.path()).await?;
                if metadata.is_dir() {
                    pending.push(entry.path());
                } else if metadata.is_file() {
                    total += metadata.len();
                }
            }
        }
        Ok(total)
    }

    /// ⚖️ Allowed while strictly under the quota; at or over it, refused.
    pub async fn authorize(&self) -> Result<StorageDecision> {
        let used_bytes = self.used_bytes().await?;
        debug!(
            "🚧 save directory holds {used_bytes} of {} bytes",
            self.max_storage_bytes
        );
        Ok(if used_bytes >= self.max_storage_bytes {
            StorageDecision::Refused {
                used_bytes,
                max_bytes: self.max_storage_bytes,
            }
        } else {
            StorageDecision::Allowed { used_bytes }
        })
    }
}
