//! File enumeration after a completed download.

use lodestone_torrent_core::{FileEntry, TorrentHandle, TorrentMetadata};
use tracing::{info, warn};

use crate::error::{LifecycleError, LifecycleResult};

/// Lists the files of a torrent once the engine reports it complete.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompletionReporter;

impl CompletionReporter {
    /// Enumerate the payload in torrent order.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::EngineQueryFailed`] when the engine cannot list the files.
    /// The completed download is left untouched.
    pub async fn collect<H: TorrentHandle>(
        &self,
        handle: &H,
        metadata: &TorrentMetadata,
    ) -> LifecycleResult<Vec<FileEntry>> {
        let files = handle
            .files()
            .await
            .map_err(|source| LifecycleError::EngineQueryFailed { source })?;

        if files.len() != metadata.file_count {
            warn!(
                info_hash = %metadata.info_hash,
                expected = metadata.file_count,
                listed = files.len(),
                "engine listed a different number of files than the metadata announced"
            );
        }
        info!(
            info_hash = %metadata.info_hash,
            files = files.len(),
            bytes = files.iter().map(|file| file.size).sum::<u64>(),
            "download files collected"
        );
        Ok(files)
    }
}
