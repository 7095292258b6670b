use std::{
    io::{
        self,
        Write,
    },
};

use indicatif::{
    ProgressBar,
    ProgressStyle,
};

use tracing::{
    warn,
};

use crate::{
    ProgressListener,
    UploadState,
};

const BAR_LENGTH: u64 = 1000;
const BAR_TEMPLATE: &str = "{spinner} [{elapsed_precise}] [{bar:40}] {percent:>3}% {msg}";

/// Prints one fixed line per upload state.
pub struct ConsoleProgress<W> {
    out: W,
}

impl<W> ConsoleProgress<W>
    where
        W: Write,
{
    pub fn new(out: W) -> Self {
        ConsoleProgress { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn print(&mut self, state: UploadState) -> io::Result<()> {
        match state {
            UploadState::NotStarted => writeln!(self.out, "Upload Not Started!"),
            UploadState::InitiationStarted => writeln!(self.out, "Initiation Started"),
            UploadState::InitiationComplete => writeln!(self.out, "Initiation Completed"),
            UploadState::MediaInProgress { progress } => {
                writeln!(self.out, "Upload in progress")?;
                writeln!(self.out, "Upload percentage: {:?}", progress)
            },
            UploadState::MediaComplete => writeln!(self.out, "Upload Completed!"),
        }
    }
}

impl<W> ProgressListener for ConsoleProgress<W>
    where
        W: Write,
{
    fn progress_changed(&mut self, state: UploadState) {
        if let Err(err) = self.print(state) {
            warn!(error = %err, "couldn't print upload progress");
        };
    }
}

pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        Self::with_bar(ProgressBar::new(BAR_LENGTH).with_style(style))
    }

    pub fn with_bar(bar: ProgressBar) -> Self {
        bar.set_length(BAR_LENGTH);
        BarProgress { bar }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressListener for BarProgress {
    fn progress_changed(&mut self, state: UploadState) {
        match state {
            UploadState::NotStarted => self.bar.set_message("not started"),
            UploadState::InitiationStarted => self.bar.set_message("initiating"),
            UploadState::InitiationComplete => self.bar.set_message("uploading"),
            UploadState::MediaInProgress { progress } => {
                self.bar.set_message("uploading");
                self.bar.set_position((progress.clamp(0.0, 1.0) * BAR_LENGTH as f64) as u64);
            },
            UploadState::MediaComplete => {
                self.bar.set_position(BAR_LENGTH);
                self.bar.finish_with_message("done");
            },
        }
    }
}
