//! Persistent Disk Cache
//!
//! Append-only keyed store, one binary file per (backend kind, content id,
//! stage). The layout is a fixed header followed by a flat record stream:
//!
//! ```text
//! magic "KILN" | format version u32 | key size u32
//! [ key bytes (key size) | value length u32 | value bytes ] *
//! ```
//!
//! All integers little-endian. Records are written once and never rewritten,
//! which makes the file crash tolerant by construction: a truncated or
//! corrupted tail loses only the records past the damage. On open, replay
//! stops at the first bad record and the file is cut back to the last intact
//! boundary, so subsequent appends continue from valid data.
//!
//! Key-format changes are **not** handled here — the generation version
//! embedded in every UID changes the keys themselves, so stale records simply
//! stop matching lookups. The header only guards the container layout.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::BackendKind;
use crate::uid::ShaderStage;

const MAGIC: [u8; 4] = *b"KILN";
const FORMAT_VERSION: u32 = 2;
const HEADER_LEN: u64 = 12;

/// Upper bound on a single bytecode blob; anything larger is corruption.
const MAX_VALUE_LEN: u32 = 64 * 1024 * 1024;

/// File name for one cache, keyed by backend namespace, content and stage.
#[must_use]
pub fn cache_file_path(
    dir: &Path,
    backend: BackendKind,
    content_id: &str,
    stage: ShaderStage,
) -> PathBuf {
    dir.join(format!(
        "{}-{}-{}.cache",
        backend.cache_prefix(),
        content_id,
        stage.tag()
    ))
}

enum ReadBlock {
    /// Buffer filled completely.
    Full,
    /// Stream ended mid-buffer: a damaged record.
    Partial,
    /// Stream ended exactly on a record boundary.
    Eof,
}

fn read_block(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<ReadBlock> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Ok(if filled == 0 {
                    ReadBlock::Eof
                } else {
                    ReadBlock::Partial
                });
            }
            Ok(read) => filled += read,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(ReadBlock::Full)
}

fn read_u32_block(reader: &mut impl Read) -> io::Result<Option<u32>> {
    let mut bytes = [0u8; 4];
    match read_block(reader, &mut bytes)? {
        ReadBlock::Full => Ok(Some(u32::from_le_bytes(bytes))),
        ReadBlock::Partial | ReadBlock::Eof => Ok(None),
    }
}

/// Append-only `(key, bytecode)` store.
pub struct DiskCache {
    writer: BufWriter<File>,
    path: PathBuf,
    key_size: usize,
    records: u64,
}

impl DiskCache {
    /// Opens (or creates) the cache file and replays every intact record
    /// through `reader`, leaving the file positioned for appends.
    ///
    /// A header mismatch starts the file fresh; a damaged tail is truncated
    /// away. Neither is an error.
    pub fn open(
        path: &Path,
        key_size: usize,
        mut reader: impl FnMut(&[u8], &[u8]),
    ) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let file_len = file.metadata()?.len();

        let mut fresh = file_len < HEADER_LEN;
        let mut good_offset = HEADER_LEN;
        let mut records = 0u64;

        if !fresh {
            let mut buffered = BufReader::new(&file);

            let mut magic = [0u8; 4];
            buffered.read_exact(&mut magic)?;
            let version = read_u32_block(&mut buffered)?;
            let stored_key_size = read_u32_block(&mut buffered)?;
            if magic != MAGIC
                || version != Some(FORMAT_VERSION)
                || stored_key_size != Some(key_size as u32)
            {
                log::info!(
                    "shader disk cache {} has an unknown layout, starting fresh",
                    path.display()
                );
                fresh = true;
            } else {
                let mut key = vec![0u8; key_size];
                loop {
                    match read_block(&mut buffered, &mut key)? {
                        ReadBlock::Eof => break,
                        ReadBlock::Partial => break,
                        ReadBlock::Full => {}
                    }
                    let Some(value_len) = read_u32_block(&mut buffered)? else {
                        break;
                    };
                    if value_len > MAX_VALUE_LEN {
                        break;
                    }
                    let mut value = vec![0u8; value_len as usize];
                    match read_block(&mut buffered, &mut value)? {
                        ReadBlock::Full => {}
                        ReadBlock::Partial | ReadBlock::Eof => break,
                    }

                    reader(&key, &value);
                    records += 1;
                    good_offset += (key_size + 4 + value_len as usize) as u64;
                }
            }
        }

        if fresh {
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&MAGIC)?;
            writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
            writer.write_all(&(key_size as u32).to_le_bytes())?;
            writer.flush()?;
            return Ok(Self {
                writer,
                path: path.to_owned(),
                key_size,
                records: 0,
            });
        }

        if good_offset < file_len {
            log::warn!(
                "shader disk cache {}: damaged tail, truncating {} bytes ({} records kept)",
                path.display(),
                file_len - good_offset,
                records
            );
            file.set_len(good_offset)?;
        }
        file.seek(SeekFrom::Start(good_offset))?;

        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_owned(),
            key_size,
            records,
        })
    }

    /// Appends one record. Buffered; call [`sync`](Self::sync) to push it to
    /// stable storage.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> io::Result<()> {
        debug_assert_eq!(key.len(), self.key_size);
        self.writer.write_all(key)?;
        self.writer.write_all(&(value.len() as u32).to_le_bytes())?;
        self.writer.write_all(value)?;
        self.records += 1;
        Ok(())
    }

    /// Flushes buffered records through to the file system.
    pub fn sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()
    }

    /// Records currently in the file (replayed + appended).
    #[must_use]
    pub fn records(&self) -> u64 {
        self.records
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
