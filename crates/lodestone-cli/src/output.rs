//! Renderers for lifecycle events and probe reports.

use std::io::{self, Write};

use lodestone_app::ProbeReport;
use lodestone_events::{DownloadEvent, EventEnvelope, EventStream};
use lodestone_torrent_core::{
    DownloadResult, FileEntry, LifecycleState, ProgressSnapshot, TorrentMetadata, format_bytes,
    format_rate,
};

use crate::cli::OutputFormat;

/// Writes events to a terminal (table) or as JSON lines.
pub(crate) struct EventRenderer<W: Write> {
    out: W,
    format: OutputFormat,
    progress_open: bool,
}

impl<W: Write> EventRenderer<W> {
    pub(crate) const fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            progress_open: false,
        }
    }

    pub(crate) fn render(&mut self, envelope: &EventEnvelope) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                let line = serde_json::to_string(envelope).map_err(io::Error::other)?;
                writeln!(self.out, "{line}")?;
            }
            OutputFormat::Table => self.render_table(&envelope.event)?,
        }
        self.out.flush()
    }

    /// Terminate an open progress line.
    pub(crate) fn finish(&mut self) -> io::Result<()> {
        self.close_progress()?;
        self.out.flush()
    }

    fn render_table(&mut self, event: &DownloadEvent) -> io::Result<()> {
        match event {
            DownloadEvent::PhaseChanged {
                to: LifecycleState::ResolvingMetadata,
                ..
            } => {
                writeln!(self.out, "⏳ Fetching torrent metadata...")?;
                writeln!(self.out, "   (connecting to peers via DHT and trackers)")?;
            }
            DownloadEvent::PhaseChanged {
                to: LifecycleState::Downloading,
                ..
            } => writeln!(self.out, "Downloading...")?,
            DownloadEvent::PhaseChanged { .. } | DownloadEvent::Failed { .. } => {}
            DownloadEvent::PeersConnected { peers } => {
                writeln!(self.out, "   ✓ Connected to {peers} peer(s)...")?;
            }
            DownloadEvent::MetadataResolved { metadata } => self.write_metadata(metadata)?,
            DownloadEvent::Progress { snapshot } => self.write_progress(snapshot)?,
            DownloadEvent::Completed { result } => {
                self.close_progress()?;
                self.write_completion(result)?;
            }
            DownloadEvent::Cancelled => {
                self.close_progress()?;
                writeln!(self.out, "\n⚠ Download cancelled; session shut down")?;
            }
        }
        Ok(())
    }

    fn write_metadata(&mut self, metadata: &TorrentMetadata) -> io::Result<()> {
        writeln!(self.out, "\n✓ Torrent found: {}", metadata.name)?;
        writeln!(self.out, "   Files: {}", metadata.file_count)?;
        writeln!(self.out, "   Size: {}\n", format_bytes(metadata.total_size))
    }

    fn write_progress(&mut self, snapshot: &ProgressSnapshot) -> io::Result<()> {
        write!(self.out, "\r{}", progress_line(snapshot))?;
        self.progress_open = true;
        if snapshot.is_complete() {
            self.close_progress()?;
        }
        Ok(())
    }

    fn write_completion(&mut self, result: &DownloadResult) -> io::Result<()> {
        writeln!(self.out, "\n✓ Download complete!")?;
        writeln!(self.out, "Files saved to: {}", result.save_path.display())?;
        writeln!(self.out, "\nDownloaded files:")?;
        write_files(&mut self.out, &result.files)?;
        writeln!(self.out, "   total: {}", format_bytes(result.total_size()))
    }

    fn close_progress(&mut self) -> io::Result<()> {
        if self.progress_open {
            self.progress_open = false;
            writeln!(self.out)?;
        }
        Ok(())
    }
}

/// Drain `stream` into stdout until every sender is gone.
pub(crate) async fn render_stream(mut stream: EventStream, format: OutputFormat) -> io::Result<()> {
    let mut renderer = EventRenderer::new(io::stdout(), format);
    while let Some(envelope) = stream.next().await {
        renderer.render(&envelope)?;
    }
    renderer.finish()
}

pub(crate) fn render_probe_report(
    out: &mut impl Write,
    report: &ProbeReport,
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => {
            let text = serde_json::to_string_pretty(report).map_err(io::Error::other)?;
            writeln!(out, "{text}")
        }
        OutputFormat::Table => {
            writeln!(out, "info hash: {}", report.metadata.info_hash)?;
            writeln!(out, "files:")?;
            write_files(out, &report.files)
        }
    }
}

fn write_files(out: &mut impl Write, files: &[FileEntry]) -> io::Result<()> {
    for file in files {
        writeln!(out, "   • {file}")?;
    }
    Ok(())
}

fn progress_line(snapshot: &ProgressSnapshot) -> String {
    format!(
        "{:>6.2}% | ↓ {} | ↑ {} | Peers: {} | Seeds: {} | ETA: {}",
        snapshot.percent(),
        format_rate(snapshot.download_rate),
        format_rate(snapshot.upload_rate),
        snapshot.peers,
        snapshot.seeds,
        snapshot.eta_label()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lodestone_torrent_core::{EngineState, InfoHash};
    use std::path::PathBuf;
    use std::time::Duration;
    use uuid::Uuid;

    fn envelope(id: u64, event: DownloadEvent) -> EventEnvelope {
        EventEnvelope {
            id,
            session_id: Uuid::nil(),
            timestamp: Utc::now(),
            event,
        }
    }

    fn snapshot(fraction: f64) -> ProgressSnapshot {
        ProgressSnapshot {
            fraction,
            download_rate: 2_048,
            upload_rate: 0,
            peers: 7,
            seeds: 3,
            bytes_done: 0,
            bytes_wanted: 0,
            state: EngineState::Downloading,
            eta: Some(Duration::from_secs(75)),
            elapsed: Duration::from_secs(1),
        }
    }

    fn metadata() -> TorrentMetadata {
        TorrentMetadata {
            name: "sample".into(),
            file_count: 1,
            total_size: 1_536,
            info_hash: InfoHash::new([0xaa; 20]),
        }
    }

    fn rendered(format: OutputFormat, events: Vec<DownloadEvent>) -> anyhow::Result<String> {
        let mut renderer = EventRenderer::new(Vec::new(), format);
        for (index, event) in events.into_iter().enumerate() {
            renderer.render(&envelope(u64::try_from(index)? + 1, event))?;
        }
        renderer.finish()?;
        Ok(String::from_utf8(renderer.out)?)
    }

    #[test]
    fn progress_line_shows_rates_and_eta() {
        assert_eq!(
            progress_line(&snapshot(0.5)),
            " 50.00% | ↓ 2.00 KB/s | ↑ 0.00 B/s | Peers: 7 | Seeds: 3 | ETA: 1m 15s"
        );
    }

    #[test]
    fn table_output_walks_through_a_download() -> anyhow::Result<()> {
        let text = rendered(
            OutputFormat::Table,
            vec![
                DownloadEvent::PeersConnected { peers: 2 },
                DownloadEvent::MetadataResolved {
                    metadata: metadata(),
                },
                DownloadEvent::Progress {
                    snapshot: snapshot(0.5),
                },
                DownloadEvent::Completed {
                    result: DownloadResult {
                        metadata: metadata(),
                        files: vec![FileEntry {
                            path: PathBuf::from("sample/a.bin"),
                            size: 1_536,
                        }],
                        save_path: PathBuf::from("/srv/downloads"),
                    },
                },
            ],
        )?;

        assert!(text.contains("✓ Connected to 2 peer(s)"));
        assert!(text.contains("Torrent found: sample"));
        assert!(text.contains("Size: 1.50 KB"));
        assert!(text.contains("\r 50.00%"));
        assert!(text.contains("Files saved to: /srv/downloads"));
        assert!(text.contains("• sample/a.bin (1.50 KB)"));
        Ok(())
    }

    #[test]
    fn cancellation_closes_the_progress_line() -> anyhow::Result<()> {
        let text = rendered(
            OutputFormat::Table,
            vec![
                DownloadEvent::Progress {
                    snapshot: snapshot(0.1),
                },
                DownloadEvent::Cancelled,
            ],
        )?;
        assert!(text.contains("ETA: 1m 15s\n\n⚠ Download cancelled"));
        Ok(())
    }

    #[test]
    fn json_output_emits_one_envelope_per_line() -> anyhow::Result<()> {
        let text = rendered(
            OutputFormat::Json,
            vec![
                DownloadEvent::PeersConnected { peers: 1 },
                DownloadEvent::Cancelled,
            ],
        )?;
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"]["type"], "peers_connected");
        assert_eq!(lines[1]["id"], 2);
        Ok(())
    }

    #[test]
    fn probe_report_renders_file_list() -> anyhow::Result<()> {
        let report = ProbeReport {
            metadata: metadata(),
            files: vec![FileEntry {
                path: PathBuf::from("sample/a.bin"),
                size: 10,
            }],
        };
        let mut out = Vec::new();
        render_probe_report(&mut out, &report, OutputFormat::Table)?;
        let text = String::from_utf8(out)?;
        assert!(text.starts_with(&format!("info hash: {}", "aa".repeat(20))));
        assert!(text.contains("• sample/a.bin (10.00 B)"));
        Ok(())
    }
}
