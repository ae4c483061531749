//! Scripted behaviour for the simulated engine.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use lodestone_torrent_core::{FileEntry, MagnetLink};

/// Callback invoked with the 1-based index of every status call, before the sample is built.
pub type StatusHook = Arc<dyn Fn(u32) + Send + Sync>;

const MIB: u64 = 1024 * 1024;

/// Script describing how a simulated torrent behaves over successive status polls.
///
/// Status calls are counted from 1 across the life of the torrent. "Download cycles" count
/// only the status calls made after metadata was fetched.
#[derive(Clone)]
pub struct Scenario {
    pub(crate) name: String,
    pub(crate) files: Vec<FileEntry>,
    pub(crate) metadata_after: Option<u32>,
    pub(crate) seed_after: Option<u32>,
    pub(crate) progress_steps: Vec<f64>,
    pub(crate) peers: Vec<u32>,
    pub(crate) seeds: u32,
    pub(crate) download_rate: u64,
    pub(crate) upload_rate: u64,
    pub(crate) fail_status_at: Option<u32>,
    pub(crate) fault_status_at: Option<(u32, String)>,
    pub(crate) fail_files: bool,
    pub(crate) fail_add: bool,
    pub(crate) materialize: bool,
    pub(crate) status_hook: Option<StatusHook>,
}

impl fmt::Debug for Scenario {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Scenario")
            .field("name", &self.name)
            .field("files", &self.files)
            .field("metadata_after", &self.metadata_after)
            .field("seed_after", &self.seed_after)
            .field("peers", &self.peers)
            .field("fail_status_at", &self.fail_status_at)
            .field("fault_status_at", &self.fault_status_at)
            .field("fail_files", &self.fail_files)
            .field("fail_add", &self.fail_add)
            .finish_non_exhaustive()
    }
}

impl Scenario {
    /// Torrent named `name` with no files, immediate metadata, and no completion.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: Vec::new(),
            metadata_after: Some(0),
            seed_after: None,
            progress_steps: Vec::new(),
            peers: Vec::new(),
            seeds: 0,
            download_rate: MIB,
            upload_rate: 0,
            fail_status_at: None,
            fault_status_at: None,
            fail_files: false,
            fail_add: false,
            materialize: true,
            status_hook: None,
        }
    }

    /// Two-file torrent used by the command-line demo.
    #[must_use]
    pub fn demo(link: &MagnetLink) -> Self {
        let name = link
            .display_name
            .as_deref()
            .map(|name| name.replace(['/', '\\'], "_"))
            .filter(|name| !name.trim_matches('.').is_empty())
            .unwrap_or_else(|| {
                let hash = link.info_hash.to_string();
                format!("demo-{}", &hash[..8])
            });
        Self::new(name.clone())
            .with_file(format!("{name}/part-1.bin"), 6 * MIB)
            .with_file(format!("{name}/part-2.bin"), 4 * MIB)
            .metadata_after_polls(2)
            .with_peers(vec![0, 3, 5, 8])
            .with_seeds(2)
            .with_rates(MIB, 64 * 1024)
            .seed_after_cycles(10)
    }

    /// Append a file to the payload.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>, size: u64) -> Self {
        self.files.push(FileEntry {
            path: path.into(),
            size,
        });
        self
    }

    /// The first `polls` status calls report no metadata.
    #[must_use]
    pub const fn metadata_after_polls(mut self, polls: u32) -> Self {
        self.metadata_after = Some(polls);
        self
    }

    /// Metadata never becomes available.
    #[must_use]
    pub const fn metadata_never(mut self) -> Self {
        self.metadata_after = None;
        self
    }

    /// Report seed-complete on the download cycle after `cycles` incomplete ones.
    #[must_use]
    pub const fn seed_after_cycles(mut self, cycles: u32) -> Self {
        self.seed_after = Some(cycles);
        self
    }

    /// Explicit progress fractions for successive download cycles; the last one repeats.
    #[must_use]
    pub fn with_progress_steps(mut self, steps: Vec<f64>) -> Self {
        self.progress_steps = steps;
        self
    }

    /// Peer counts for successive status calls; the last one repeats.
    #[must_use]
    pub fn with_peers(mut self, peers: Vec<u32>) -> Self {
        self.peers = peers;
        self
    }

    /// Seed count reported once metadata is available.
    #[must_use]
    pub const fn with_seeds(mut self, seeds: u32) -> Self {
        self.seeds = seeds;
        self
    }

    /// Transfer rates reported while downloading.
    #[must_use]
    pub const fn with_rates(mut self, download: u64, upload: u64) -> Self {
        self.download_rate = download;
        self.upload_rate = upload;
        self
    }

    /// The status call with this index returns an error.
    #[must_use]
    pub const fn fail_status_at(mut self, call: u32) -> Self {
        self.fail_status_at = Some(call);
        self
    }

    /// The status call with this index succeeds but carries an engine fault.
    #[must_use]
    pub fn fault_status_at(mut self, call: u32, message: impl Into<String>) -> Self {
        self.fault_status_at = Some((call, message.into()));
        self
    }

    /// File enumeration fails.
    #[must_use]
    pub const fn fail_files(mut self) -> Self {
        self.fail_files = true;
        self
    }

    /// Admission of the magnet fails.
    #[must_use]
    pub const fn fail_add(mut self) -> Self {
        self.fail_add = true;
        self
    }

    /// Do not write files under the save path on completion.
    #[must_use]
    pub const fn without_materialization(mut self) -> Self {
        self.materialize = false;
        self
    }

    /// Observe status calls, for example to cancel at a precise poll.
    #[must_use]
    pub fn with_status_hook(mut self, hook: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.status_hook = Some(Arc::new(hook));
        self
    }

    /// Sum of all file sizes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|file| file.size).sum()
    }

    pub(crate) fn peers_at(&self, call: u32) -> u32 {
        pick(&self.peers, call).unwrap_or(0)
    }

    pub(crate) fn metadata_ready(&self, call: u32) -> bool {
        self.metadata_after.is_some_and(|after| call > after)
    }

    pub(crate) fn is_seed_at(&self, cycle: u32) -> bool {
        self.seed_after.is_some_and(|after| cycle > after)
    }

    /// Fraction reported on download cycle `cycle` (1-based) while not yet seeding.
    pub(crate) fn progress_at(&self, cycle: u32) -> f64 {
        if let Some(step) = pick(&self.progress_steps, cycle) {
            return step;
        }
        match self.seed_after {
            Some(after) => f64::from(cycle) / f64::from(after + 1),
            None => 0.0,
        }
    }
}

fn pick<T: Copy>(values: &[T], index: u32) -> Option<T> {
    let last = values.len().checked_sub(1)?;
    let position = usize::try_from(index.saturating_sub(1)).map_or(last, |pos| pos.min(last));
    values.get(position).copied()
}
