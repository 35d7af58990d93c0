//! Optional persistence of captured output, one file per task.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use crate::domain::LogOwner;

/// Appends captured output under a directory: `task-N.log` per task, worker
/// diagnostics in `pool.log`.
///
/// The sink is bookkeeping only. Callers report a failed append and move on;
/// nothing here may disturb scheduling.
pub struct LogSink {
    dir: PathBuf,
    files: HashMap<String, File>,
}

impl LogSink {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            files: HashMap::new(),
        }
    }

    pub fn append(&mut self, owner: &LogOwner, chunk: &str) -> io::Result<()> {
        let name = match owner {
            LogOwner::Task(id) => format!("{id}.log"),
            LogOwner::Worker(_) => "pool.log".to_string(),
        };

        let file = match self.files.entry(name) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                fs::create_dir_all(&self.dir)?;
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(self.dir.join(entry.key()))?;
                writeln!(file, "# {owner} opened {}", chrono::Local::now().to_rfc3339())?;
                entry.insert(file)
            }
        };

        file.write_all(chunk.as_bytes())
    }
}
