use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use sheet_sync_core::{ProgressEvent, ProgressReporter, SyncPhase};
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

/// Spinner per sync stage when attached to a terminal, structured log lines otherwise
pub struct SyncUI {
    multi: MultiProgress,
    interactive: bool,
}

impl SyncUI {
    pub fn new(enabled: bool) -> Self {
        let interactive = enabled && is_interactive();
        if !interactive {
            tracing::info!(
                operation = "ui_init",
                mode = "non_interactive",
                "Progress bars disabled, reporting progress through logs"
            );
        }

        Self {
            multi: MultiProgress::new(),
            interactive,
        }
    }

    pub fn stage(&self, name: &str) -> StageProgress {
        let bar = if self.interactive {
            let bar = self.multi.add(ProgressBar::new_spinner());
            bar.set_style(spinner_style());
            bar.set_prefix(name.to_string());
            bar.enable_steady_tick(Duration::from_millis(120));
            Some(bar)
        } else {
            None
        };

        StageProgress {
            name: name.to_string(),
            bar,
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {prefix:.bold.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
}

/// Progress display for one service
pub struct StageProgress {
    name: String,
    bar: Option<ProgressBar>,
}

impl StageProgress {
    /// Reporter handed to an orchestrator; events update this stage's spinner
    pub fn reporter(&self) -> ProgressReporter {
        let stage = self.name.clone();
        let bar = self.bar.clone();
        ProgressReporter::new(Arc::new(move |event: &ProgressEvent| {
            let Some(message) = describe(event) else {
                return;
            };
            match &bar {
                Some(bar) => bar.set_message(message),
                None => tracing::info!(operation = "progress", stage = %stage, "{}", message),
            }
        }))
    }

    pub fn finish(&self, message: impl Into<String>) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message.into());
        }
    }

    /// Drops the spinner line so error output is not interleaved with it
    pub fn abandon(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

fn describe_phase(phase: SyncPhase) -> &'static str {
    match phase {
        SyncPhase::DeterminingFetchStart => "Determining where to resume",
        SyncPhase::Fetching => "Fetching",
        SyncPhase::FetchComplete => "Fetch complete",
        SyncPhase::Diffing => "Comparing with saved snapshots",
        SyncPhase::Writing => "Writing to spreadsheet",
        SyncPhase::Done => "Done",
    }
}

fn describe(event: &ProgressEvent) -> Option<String> {
    let message = match event {
        ProgressEvent::Phase(phase) => describe_phase(*phase).to_string(),
        ProgressEvent::ScrobblePage {
            page,
            total_fetched,
            elapsed,
        } => format!(
            "Page {}: {} scrobbles fetched ({:.1}s)",
            page,
            total_fetched,
            elapsed.as_secs_f64()
        ),
        ProgressEvent::PlaylistsListed { count } => format!("Found {} playlists", count),
        ProgressEvent::VideoIdsFetched {
            index,
            total,
            title,
            count,
        } => format!("[{}/{}] {}: {} videos", index, total, title, count),
        ProgressEvent::VideoDetails { title, fetched, total } if *total > 0 => {
            format!("{}: video details {}/{}", title, fetched, total)
        }
        ProgressEvent::VideoDetails { .. } => return None,
        ProgressEvent::PlaylistWritten { title, rows } => format!("{}: {} rows written", title, rows),
    };
    Some(message)
}

pub fn is_interactive() -> bool {
    std::io::stdout().is_terminal() && std::io::stderr().is_terminal()
}
