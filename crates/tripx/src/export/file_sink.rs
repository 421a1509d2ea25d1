use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::{
    fs::File,
    io::{self, AsyncWriteExt},
};
use tracing::trace;

use super::BatchSink;

/// 🚰 FileSink -- one file per batch, all in one directory.
///
/// `File::create` truncates. Batch names carry a timestamp and a run-local counter so that
/// never comes up, but if you point two runs at the same directory in the same millisecond,
/// well. Don't.
#[derive(Debug)]
pub struct FileSink {
    directory: PathBuf,
}

impl FileSink {
    /// 🚀 Make sure the directory exists. That's the whole setup.
    pub async fn new(directory: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(directory).await.context(format!(
            "💀 The save directory '{}' could not be conjured into existence. \
             We stared at the path. The path stared back.",
            directory.display()
        ))?;
        Ok(Self {
            directory: directory.to_path_buf(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[async_trait]
impl BatchSink for FileSink {
    async fn write_batch(&mut self, name: &str, payload: &str) -> Result<()> {
        let path = self.directory.join(name);
        trace!("📬 {} bytes walked into {}", payload.len(), path.display());
        let file = File::create(&path)
            .await
            .context(format!("💀 Couldn't create batch file '{}'", path.display()))?;
        // -- 📦 BufWriter, then an explicit flush: async Drop is not a thing yet
        let mut file_buf = io::BufWriter::new(file);
        file_buf.write_all(payload.as_bytes()).await?;
        file_buf.flush().await.context(format!(
            "💀 The batch for '{}' made it into the buffer and no further. The disk remains \
             unwritten. The trips weep.",
            path.display()
        ))?;
        Ok(())
    }
}
