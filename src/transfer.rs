use std::fs;
use std::io;
use std::process::Command;

use camino::Utf8Path;

use crate::error::SeqvaultError;

/// External copy boundary: either completes a byte-identical destination file
/// or returns an error. The checksum verification in the transfer phase is the
/// safety net for tools that leave a partial file behind.
pub trait FileTransfer {
    fn copy(&self, source: &Utf8Path, destination: &Utf8Path) -> Result<(), SeqvaultError>;
}

/// Shells out to `rsync` with a configured option set. Retries and timeouts
/// are governed by those options, not by this process.
pub struct RsyncTransfer {
    options: Vec<String>,
}

impl RsyncTransfer {
    pub fn new(options: &[String]) -> Self {
        Self {
            options: options.to_vec(),
        }
    }
}

impl FileTransfer for RsyncTransfer {
    fn copy(&self, source: &Utf8Path, destination: &Utf8Path) -> Result<(), SeqvaultError> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| SeqvaultError::Filesystem(format!("create {parent}: {err}")))?;
        }

        let output = Command::new("rsync")
            .args(&self.options)
            .arg(source.as_str())
            .arg(destination.as_str())
            .output()
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => SeqvaultError::MissingTool("rsync".to_string()),
                _ => SeqvaultError::Transfer(err.to_string()),
            })?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("rsync exited with {}", output.status)
        } else {
            stderr
        };
        Err(SeqvaultError::Transfer(message))
    }
}
