use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::error::Result;
use crate::hardware::Notifier;

/// Appends alerts to a file, one `<unix seconds> <message>` line each. Also
/// logs them.
pub struct FileNotifier {
    path: PathBuf,
}

impl FileNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Notifier for FileNotifier {
    fn send(&mut self, message: &str) -> Result<()> {
        warn!(alert = message, "Operator alert");
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let mut file = File::options().create(true).append(true).open(&self.path)?;
        writeln!(file, "{stamp} {message}")?;
        Ok(())
    }
}
