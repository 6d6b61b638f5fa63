//! Failure Dumps
//!
//! When the compile backend rejects a generated source, the source and the
//! diagnostic go to a plain-text file with an incrementing suffix so repeated
//! failures never overwrite each other. Write-only; nothing in the system
//! reads these back.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::uid::ShaderStage;

/// Dump-file writer for one cache's failures.
pub struct DumpSink {
    dir: PathBuf,
    stage: ShaderStage,
    next_index: AtomicUsize,
}

impl DumpSink {
    pub fn new(dir: PathBuf, stage: ShaderStage) -> io::Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            stage,
            next_index: AtomicUsize::new(0),
        })
    }

    /// Writes `bad_<stage>_NNNN.txt` containing the failing source followed by
    /// the compiler diagnostic. Returns the path written.
    pub fn write_failure(&self, source: &str, diagnostic: &str) -> io::Result<PathBuf> {
        let index = self.next_index.fetch_add(1, Ordering::Relaxed);
        let path = self
            .dir
            .join(format!("bad_{}_{index:04}.txt", self.stage.tag()));
        let mut file = File::create(&path)?;
        file.write_all(source.as_bytes())?;
        file.write_all(b"\n\n")?;
        file.write_all(diagnostic.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(path)
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
