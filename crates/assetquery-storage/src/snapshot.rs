use assetquery_core::{Document, QueryError, Result, Value};
use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Cursor, Read, Write},
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    JsonLines,
    JsonLinesZstd,
    Cbor,
}

impl SnapshotFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("zst") => SnapshotFormat::JsonLinesZstd,
            Some("cbor") => SnapshotFormat::Cbor,
            _ => SnapshotFormat::JsonLines,
        }
    }
}

/// Loads every document from a snapshot file, picking the format from the extension.
pub fn read_snapshot(path: &Path) -> Result<Vec<Document>> {
    let fh = File::open(path)?;
    let docs = match SnapshotFormat::from_path(path) {
        SnapshotFormat::JsonLines => read_json_lines(BufReader::new(fh))?,
        SnapshotFormat::JsonLinesZstd => read_json_lines(BufReader::new(zstd::Decoder::new(fh)?))?,
        SnapshotFormat::Cbor => {
            let mut bytes = Vec::new();
            BufReader::new(fh).read_to_end(&mut bytes)?;
            read_cbor_sequence(bytes)?
        }
    };
    tracing::info!(path = %path.display(), documents = docs.len(), "snapshot loaded");
    Ok(docs)
}

fn read_json_lines<R: BufRead>(reader: R) -> Result<Vec<Document>> {
    let mut out = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)
            .map_err(|e| QueryError::Snapshot(format!("line {}: {e}", n + 1)))?;
        out.push(into_document(value, n + 1)?);
    }
    Ok(out)
}

fn read_cbor_sequence(bytes: Vec<u8>) -> Result<Vec<Document>> {
    let len = bytes.len() as u64;
    let mut cursor = Cursor::new(bytes);
    let mut out = Vec::new();
    while cursor.position() < len {
        let value: Value = ciborium::from_reader(&mut cursor)
            .map_err(|e| QueryError::Snapshot(format!("record {}: {e}", out.len() + 1)))?;
        let n = out.len() + 1;
        out.push(into_document(value, n)?);
    }
    Ok(out)
}

fn into_document(value: Value, n: usize) -> Result<Document> {
    match value {
        Value::Map(m) => Ok(m),
        _ => Err(QueryError::Snapshot(format!(
            "record {n}: expected an object"
        ))),
    }
}

enum Sink {
    Plain(BufWriter<File>),
    Zstd(zstd::Encoder<'static, BufWriter<File>>),
}

impl Sink {
    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Sink::Plain(w) => w,
            Sink::Zstd(w) => w,
        }
    }
}

/// Streams documents into a snapshot file; zstd-compressed when the path ends in `.zst`.
/// Nothing is guaranteed on disk until [`SnapshotWriter::finish`] returns `Ok`.
pub struct SnapshotWriter {
    out: Sink,
    pub path: PathBuf,
    pub written: usize,
}

impl SnapshotWriter {
    pub fn create(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let out = match SnapshotFormat::from_path(&path) {
            SnapshotFormat::JsonLinesZstd => {
                Sink::Zstd(zstd::Encoder::new(BufWriter::new(File::create(&path)?), 3)?)
            }
            SnapshotFormat::JsonLines => Sink::Plain(BufWriter::new(File::create(&path)?)),
            SnapshotFormat::Cbor => {
                return Err(QueryError::Snapshot(
                    "writing CBOR snapshots is not supported; use .jsonl or .jsonl.zst".into(),
                ))
            }
        };
        Ok(Self {
            out,
            path,
            written: 0,
        })
    }

    pub fn write_document(&mut self, doc: &Document) -> Result<()> {
        let line = serde_json::to_string(doc)
            .map_err(|e| QueryError::Snapshot(format!("encode: {e}")))?;
        let w = self.out.writer();
        w.write_all(line.as_bytes())?;
        w.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Ends the zstd frame and flushes through to the file.
    pub fn finish(self) -> Result<usize> {
        let mut file = match self.out {
            Sink::Plain(w) => w,
            Sink::Zstd(encoder) => encoder.finish()?,
        };
        file.flush()?;
        file.into_inner()
            .map_err(|e| QueryError::Io(e.into_error()))?
            .sync_all()?;
        Ok(self.written)
    }
}
