//! Chain snapshots.
//!
//! Each backup is one self-contained file: a magic tag followed by a
//! zstd-compressed bincode `Snapshot` (format version, block count, token and
//! every block genesis-first). Restore takes the newest file that decodes.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::SystemTime,
};
use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};
use crate::{
    block::{Block, Token},
    chain::Blockchain,
    error::{LedgerError, Result},
};

const MAGIC: &[u8; 6] = b"LTSNAP";
pub const SNAPSHOT_VERSION: u32 = 1;
const ZSTD_LEVEL: i32 = 3;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    block_count: u64,
    token: Token,
    blocks: Vec<Block>,
}

pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        SnapshotStore { dir: dir.as_ref().to_path_buf() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes a snapshot of `chain` and returns its path.
    pub fn backup(&self, chain: &Blockchain) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let name = format!(
            "backup_{}_{:06}.dat",
            chrono::Local::now().format("%Y%m%d_%H%M%S_%3f"),
            chain.block_count()
        );
        let path = self.dir.join(name);

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            block_count: chain.block_count() as u64,
            token: chain.token().clone(),
            blocks: chain.blocks().to_vec(),
        };
        let raw = bincode::serialize(&snapshot)?;
        let packed = zstd::encode_all(&raw[..], ZSTD_LEVEL)?;

        let tmp = path.with_extension("tmp");
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(MAGIC)?;
            f.write_all(&packed)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        info!(path = %path.display(), blocks = chain.block_count(), "chain snapshot written");
        Ok(path)
    }

    /// Snapshot files, newest modification time first.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with("backup_") && name.ends_with(".dat")) {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            found.push((modified, entry.path()));
        }
        // names embed the write time, so they break mtime ties
        found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        Ok(found.into_iter().map(|(_, p)| p).collect())
    }

    /// Rebuilds the chain from the newest readable snapshot. Unreadable
    /// snapshots are skipped with a warning, never deleted.
    ///
    /// # Errors
    /// * `NoRestoreAvailable` if the directory is missing, unreadable or
    ///   holds no snapshot.
    /// * The error of the oldest snapshot if none of them can be decoded.
    pub fn restore(&self) -> Result<Blockchain> {
        let found = self.list().map_err(|_| LedgerError::NoRestoreAvailable)?;
        let mut last_err = LedgerError::NoRestoreAvailable;
        for path in found {
            match Self::load(&path) {
                Ok(chain) => {
                    info!(path = %path.display(), blocks = chain.block_count(), "chain restored");
                    return Ok(chain);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable snapshot");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    /// Decodes one snapshot file.
    pub fn load(path: &Path) -> Result<Blockchain> {
        let bytes = fs::read(path)?;
        let body = bytes
            .strip_prefix(&MAGIC[..])
            .ok_or_else(|| invalid(format!("{} is not a chain snapshot", path.display())))?;
        let raw = zstd::decode_all(body)?;
        let mut snapshot: Snapshot = bincode::deserialize(&raw)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(LedgerError::SnapshotVersion(snapshot.version));
        }
        let count = usize::try_from(snapshot.block_count)
            .map_err(|_| invalid("block count overflows".into()))?;
        if snapshot.blocks.len() < count {
            return Err(invalid(format!(
                "snapshot declares {count} blocks but holds {}",
                snapshot.blocks.len()
            )));
        }
        snapshot.blocks.truncate(count);
        debug!(path = %path.display(), count, "snapshot decoded");
        Blockchain::from_blocks(snapshot.token, snapshot.blocks)
            .ok_or_else(|| invalid("snapshot holds no blocks".into()))
    }
}

fn invalid(msg: String) -> LedgerError {
    LedgerError::Io(io::Error::new(io::ErrorKind::InvalidData, msg))
}
