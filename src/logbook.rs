use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{info, warn};

/// Plain-text campaign log: a header followed by one `HH:MM:SS - message`
/// line per significant event. Threaded explicitly through the components
/// that report progress; every line is echoed to the tracing output.
pub struct Logbook {
    path: PathBuf,
    file: Mutex<File>,
}

impl Logbook {
    pub fn create(path: &Path) -> Result<Logbook> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create log directory {}", parent.display())
            })?;
        }
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        writeln!(file, "Browser Power Test - {}", Local::now())?;
        writeln!(file, "{}", "=".repeat(50))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event line. Logging failures are reported but never abort
    /// a run.
    pub fn record(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!("{message}");
        let line = format!("{} - {message}", Local::now().format("%H:%M:%S"));
        match self.file.lock() {
            Ok(mut file) => {
                if let Err(err) = writeln!(file, "{line}") {
                    warn!(error = %err, "failed to append to campaign log");
                }
            }
            Err(_) => warn!("campaign log mutex poisoned; dropping line"),
        }
    }
}
