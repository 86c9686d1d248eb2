use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use glob::glob;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::error::Category;
use tracing::debug;
use crate::engine::{Identified, RecordIter, RecordSource};
use crate::error::{AuditError, Result};
use super::kind::ResourceKind;
use super::records::{ClusterToken, DeployKey, DeployToken, GroupVariable, ProjectVariable, RunnerToken};

/// Export directory holding one set of JSON Lines shards per resource kind.
#[derive(Debug, Clone)]
pub struct Inventory {
    dir: PathBuf,
}

impl Inventory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn source<R>(&self, kind: ResourceKind) -> Arc<JsonlSource<R>> {
        Arc::new(JsonlSource::new(&self.dir, kind.stem()))
    }

    pub fn project_variables(&self) -> Arc<JsonlSource<ProjectVariable>> {
        self.source(ResourceKind::ProjectVariables)
    }

    pub fn group_variables(&self) -> Arc<JsonlSource<GroupVariable>> {
        self.source(ResourceKind::GroupVariables)
    }

    pub fn runner_tokens(&self) -> Arc<JsonlSource<RunnerToken>> {
        self.source(ResourceKind::RunnerTokens)
    }

    pub fn cluster_tokens(&self) -> Arc<JsonlSource<ClusterToken>> {
        self.source(ResourceKind::ClusterTokens)
    }

    pub fn deploy_tokens(&self) -> Arc<JsonlSource<DeployToken>> {
        self.source(ResourceKind::DeployTokens)
    }

    pub fn deploy_keys(&self) -> Arc<JsonlSource<DeployKey>> {
        self.source(ResourceKind::DeployKeys)
    }
}

/// Streams records from `<dir>/<stem>*.jsonl`, one shard after another.
/// Nothing is buffered beyond the reader of the current shard.
///
/// Each non-blank line is one record. A line that does not decode is
/// yielded as `AuditError::MalformedRecord` and reading carries on with
/// the next line; only I/O and enumeration problems end the stream.
pub struct JsonlSource<R> {
    dir: PathBuf,
    stem: String,
    index: OnceLock<HashMap<i64, Position>>,
    _marker: PhantomData<fn() -> R>,
}

/// Where a record starts, so `find` can seek straight to it.
#[derive(Debug, Clone)]
struct Position {
    shard: PathBuf,
    offset: u64,
    number: usize,
}

#[derive(Deserialize)]
struct IdOnly {
    id: i64,
}

impl<R> JsonlSource<R> {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
            index: OnceLock::new(),
            _marker: PhantomData,
        }
    }

    pub fn shards(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Err(AuditError::Source(format!(
                "inventory directory {} is not readable",
                self.dir.display()
            )));
        }

        let pattern = self.dir.join(format!("{}*.jsonl", self.stem));
        let mut shards = glob(&pattern.to_string_lossy())
            .map_err(|e| AuditError::Source(e.to_string()))?
            .collect::<std::result::Result<Vec<PathBuf>, _>>()
            .map_err(|e| AuditError::Source(e.to_string()))?;
        shards.sort();

        debug!(stem = %self.stem, shards = shards.len(), "resolved inventory shards");
        Ok(shards)
    }

    /// Id to line position over all shards, built on the first lookup and
    /// kept for the life of the source. Shards are assumed not to change
    /// during a run.
    fn index(&self) -> Result<&HashMap<i64, Position>> {
        if let Some(index) = self.index.get() {
            return Ok(index);
        }

        let mut index = HashMap::new();
        for shard in self.shards()? {
            for raw in ShardLines::open(&shard)? {
                let raw = raw?;
                // Undecodable lines are reported by `records`; lookups skip them.
                if let Ok(IdOnly { id }) = serde_json::from_slice(&raw.bytes) {
                    index.entry(id).or_insert_with(|| Position {
                        shard: shard.clone(),
                        offset: raw.offset,
                        number: raw.number,
                    });
                }
            }
        }

        debug!(stem = %self.stem, entries = index.len(), "built lookup index");
        Ok(self.index.get_or_init(|| index))
    }
}

impl<R> RecordSource for JsonlSource<R>
where
    R: DeserializeOwned + Identified + 'static,
{
    type Record = R;

    fn records(&self) -> Result<RecordIter<'_, R>> {
        let shards = self.shards()?;
        Ok(Box::new(shards.into_iter().flat_map(read_shard::<R>)))
    }

    /// Seeks to the indexed line and decodes it afresh.
    fn find(&self, id: i64) -> Result<Option<R>> {
        let Some(position) = self.index()?.get(&id) else {
            return Ok(None);
        };

        let mut lines = ShardLines::open_at(&position.shard, position.offset, position.number)?;
        let Some(raw) = lines.next() else {
            return Ok(None);
        };
        let record: R = raw?.decode(&shard_name(&position.shard))?;
        Ok((record.id() == id).then_some(record))
    }
}

fn read_shard<R: DeserializeOwned + 'static>(path: PathBuf) -> RecordIter<'static, R> {
    let lines = match ShardLines::open(&path) {
        Ok(lines) => lines,
        Err(e) => return Box::new(std::iter::once(Err(e))),
    };

    let name = shard_name(&path);
    Box::new(lines.map(move |raw| raw.and_then(|raw| raw.decode(&name))))
}

fn shard_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// One non-blank line of a shard with its 1-based number and byte offset.
struct RawLine {
    number: usize,
    offset: u64,
    bytes: Vec<u8>,
}

impl RawLine {
    fn decode<R: DeserializeOwned>(&self, shard: &str) -> Result<R> {
        serde_json::from_slice(&self.bytes).map_err(|e| self.malformed(shard, redacted_reason(&e)))
    }

    fn malformed(&self, shard: &str, reason: String) -> AuditError {
        AuditError::MalformedRecord {
            location: format!("{shard} line {}", self.number),
            reason,
        }
    }
}

// serde_json messages can quote the offending value, which may be a secret.
fn redacted_reason(e: &serde_json::Error) -> String {
    let what = match e.classify() {
        Category::Io => "read failure",
        Category::Syntax => "invalid JSON",
        Category::Data => "field missing or of the wrong type",
        Category::Eof => "record ends early",
    };
    format!("{what} at column {}", e.column())
}

struct ShardLines {
    reader: BufReader<File>,
    path: PathBuf,
    number: usize,
    offset: u64,
    done: bool,
}

impl ShardLines {
    fn open(path: &Path) -> Result<Self> {
        Self::open_at(path, 0, 1)
    }

    fn open_at(path: &Path, offset: u64, number: usize) -> Result<Self> {
        let unreadable = |e: std::io::Error| AuditError::Source(format!("{}: {e}", path.display()));
        let mut file = File::open(path).map_err(unreadable)?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).map_err(unreadable)?;
        }

        Ok(Self {
            reader: BufReader::new(file),
            path: path.to_path_buf(),
            number: number.saturating_sub(1),
            offset,
            done: false,
        })
    }
}

impl Iterator for ShardLines {
    type Item = Result<RawLine>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let mut bytes = Vec::new();
            let offset = self.offset;
            match self.reader.read_until(b'\n', &mut bytes) {
                Ok(0) => self.done = true,
                Ok(n) => {
                    self.offset += n as u64;
                    self.number += 1;
                    if bytes.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Some(Ok(RawLine { number: self.number, offset, bytes }));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(AuditError::Source(format!("{}: {e}", self.path.display()))));
                }
            }
        }
        None
    }
}
