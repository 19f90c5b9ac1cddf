// SPDX-License-Identifier: MIT

//! File handler backed by `tracing-appender`'s non-blocking writer, the
//! same mechanism the teacher's daemon uses for its rolling log file
//! (rotation itself happens externally — the runner only ever appends).

use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};

use crate::handler::Handler;
use crate::record::LogRecord;
use crate::stderr::format_line;

#[derive(Debug, thiserror::Error)]
#[error("failed to open log file under '{}': {source}", self.dir.display())]
pub struct FileHandlerError {
    dir: PathBuf,
    #[source]
    source: std::io::Error,
}

pub struct FileHandler {
    writer: Mutex<NonBlocking>,
    _guard: WorkerGuard,
}

impl FileHandler {
    pub fn open(path: &Path) -> Result<Self, FileHandlerError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let file_name = path.file_name().map(|n| n.to_owned()).unwrap_or_default();
        std::fs::create_dir_all(dir).map_err(|source| FileHandlerError {
            dir: dir.to_path_buf(),
            source,
        })?;

        let appender = tracing_appender::rolling::never(dir, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        Ok(FileHandler {
            writer: Mutex::new(writer),
            _guard: guard,
        })
    }
}

impl Handler for FileHandler {
    fn handle(&self, record: &LogRecord) {
        let line = format_line(record);
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordKind;

    #[test]
    fn appends_one_formatted_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runner.log");

        {
            let handler = FileHandler::open(&path).unwrap();
            handler.handle(&LogRecord {
                level: tracing::Level::INFO,
                target: "scr_cli".to_string(),
                kind: RecordKind::Generic,
                message: Some("runner starting".to_string()),
                fields: Vec::new(),
                deferred: Vec::new(),
                slack_requested: false,
            });
            // Dropping the handler here drops its `WorkerGuard`, which
            // blocks until the non-blocking writer has flushed.
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("runner starting"));
    }
}
