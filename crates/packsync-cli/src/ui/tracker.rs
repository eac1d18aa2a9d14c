use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use once_cell::sync::Lazy;
use packsync::{ProgressSink, ProgressState, SyncState, Terminal};

const PB_STYLE: &str = concat!(
    "{spinner:.blue} {prefix:>12.cyan.bold} [{elapsed_precise}] {wide_bar:.cyan/blue} ",
    "{bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}",
);

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const PB_CHARS: &str = "█▓▒░  ";

static PB_TEMPLATE: Lazy<Option<ProgressStyle>> = Lazy::new(|| {
    let pb_style = match ProgressStyle::with_template(PB_STYLE) {
        Ok(pb_style) => pb_style.tick_chars(TICK).progress_chars(PB_CHARS),
        Err(_) => return None,
    };

    Some(pb_style)
});

/// Renders sync progress as a single bar on stdout; logs go to stderr.
pub struct BarSink {
    pb: ProgressBar,
}

impl BarSink {
    pub fn new() -> Self {
        let pb = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stdout());
        let pb = match PB_TEMPLATE.as_ref() {
            Some(style) => pb.with_style(style.clone()),
            None => pb,
        };
        pb.set_prefix(SyncState::Idle.to_string());
        Self { pb }
    }
}

impl ProgressSink for BarSink {
    fn on_progress(&self, progress: &ProgressState) {
        self.pb.set_length(progress.total_bytes);
        self.pb.set_position(progress.bytes_done);
        self.pb
            .set_message(format!("{}/{} files", progress.files_done, progress.total_files));
    }

    fn on_state_change(&self, progress: &ProgressState) {
        self.pb.set_prefix(progress.state.to_string());
        self.on_progress(progress);
        match progress.terminal {
            Some(Terminal::Succeeded) => self.pb.finish(),
            Some(Terminal::Failed | Terminal::Cancelled) => self.pb.abandon(),
            None => {}
        }
    }
}
