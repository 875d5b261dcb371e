//! Append-mode log file that can be reopened or retargeted while in use.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

struct Current {
    path: PathBuf,
    file: Arc<File>,
}

/// A log file shared between the subscriber and whoever rotates it.
///
/// Clones share the same underlying handle. Every event takes its own
/// reference to the open file, so an event being written when the file
/// is swapped finishes on the old file, which closes once the last such
/// writer drops.
#[derive(Clone)]
pub struct LogFile {
    current: Arc<Mutex<Current>>,
}

impl LogFile {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = Arc::new(open_append(&path)?);
        Ok(Self {
            current: Arc::new(Mutex::new(Current { path, file })),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.current.lock().expect("log file lock").path.clone()
    }

    /// Reopen the current path, picking up a file moved aside by rotation.
    pub fn reopen(&self) -> io::Result<()> {
        let path = self.path();
        self.swap(path)
    }

    /// Start writing to `path` instead.
    ///
    /// On error the previous file stays in use.
    pub fn swap(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref().to_path_buf();
        let file = Arc::new(open_append(&path)?);
        let mut current = self.current.lock().expect("log file lock");
        *current = Current { path, file };
        Ok(())
    }

    fn file(&self) -> Arc<File> {
        self.current.lock().expect("log file lock").file.clone()
    }
}

impl std::fmt::Debug for LogFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogFile").field("path", &self.path()).finish()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Writer for one event, pinned to the file open when it was made.
pub struct LogWriter(Arc<File>);

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self.0).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self.0).flush()
    }
}

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter(self.file())
    }
}
