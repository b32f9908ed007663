//! Artifact synchronization to object storage

use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

use crate::error::{NetsecError, Result};

/// Mirrors a local directory to a remote location
pub trait ArtifactSync: Send + Sync {
    fn sync_folder(&self, local_dir: &Path, remote_url: &str) -> Result<()>;
}

/// Shells out to `aws s3 sync`
#[derive(Debug, Clone)]
pub struct S3CliSync {
    program: String,
}

impl Default for S3CliSync {
    fn default() -> Self {
        Self::new()
    }
}

impl S3CliSync {
    pub fn new() -> Self {
        Self {
            program: "aws".to_string(),
        }
    }

    /// Use a different executable in place of `aws`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// `s3://<bucket>/<prefix>/<timestamp>`
    pub fn remote_url(bucket: &str, prefix: &str, timestamp: &str) -> String {
        format!("s3://{}/{}/{}", bucket, prefix, timestamp)
    }
}

impl ArtifactSync for S3CliSync {
    fn sync_folder(&self, local_dir: &Path, remote_url: &str) -> Result<()> {
        debug!(program = %self.program, local = %local_dir.display(), remote = remote_url, "Running sync");
        let status = Command::new(&self.program)
            .arg("s3")
            .arg("sync")
            .arg(local_dir)
            .arg(remote_url)
            .status()
            .map_err(|e| NetsecError::SyncError(format!("cannot run {}: {}", self.program, e)))?;

        if !status.success() {
            return Err(NetsecError::SyncError(format!(
                "{} s3 sync to {} exited with {:?}",
                self.program,
                remote_url,
                status.code()
            )));
        }
        info!(local = %local_dir.display(), remote = remote_url, "Synced folder");
        Ok(())
    }
}

/// Sync that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSync;

impl ArtifactSync for NoopSync {
    fn sync_folder(&self, local_dir: &Path, remote_url: &str) -> Result<()> {
        debug!(local = %local_dir.display(), remote = remote_url, "Sync disabled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_url() {
        assert_eq!(
            S3CliSync::remote_url("netsec", "artifact", "03_07_2024_09_05_01"),
            "s3://netsec/artifact/03_07_2024_09_05_01"
        );
    }

    #[test]
    fn test_missing_program_is_a_sync_error() {
        let sync = S3CliSync::new().with_program("netsec-no-such-binary");
        let err = sync.sync_folder(Path::new("."), "s3://bucket/x").unwrap_err();
        assert!(matches!(err, NetsecError::SyncError(_)));
    }

    #[test]
    fn test_noop() {
        assert!(NoopSync.sync_folder(Path::new("."), "s3://bucket/x").is_ok());
    }
}
