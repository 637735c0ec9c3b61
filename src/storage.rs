use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;
use crate::error::Result;

// Record files are a plain concatenation of bincode-encoded values. Appends
// go straight to the end of the file; every whole-file rewrite goes through a
// temp file and a rename so a crash leaves either the old or the new file.

pub const WALLETS_FILE: &str = "wallets.dat";
pub const LEDGER_FILE: &str = "transactions.dat";
pub const POOL_FILE: &str = "txpool.dat";
pub const PROFILES_FILE: &str = "profiles.dat";

/// Handle on the data directory. Holds no open files between calls.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Opens (creating if needed) the data directory at `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        fs::create_dir_all(&root)?;
        Ok(Store { root: root.as_ref().to_path_buf() })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    /// Appends one record to the end of `file`.
    pub fn append<T: Serialize>(&self, file: &str, record: &T) -> Result<()> {
        let f = OpenOptions::new().create(true).append(true).open(self.path(file))?;
        let mut w = BufWriter::new(f);
        bincode::serialize_into(&mut w, record)?;
        w.flush()?;
        Ok(())
    }

    /// Reads every record of `file` in order. A missing file reads as empty.
    pub fn read_all<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        self.read_up_to(file, usize::MAX)
    }

    /// Reads at most `limit` records from the start of `file`.
    pub fn read_up_to<T: DeserializeOwned>(&self, file: &str, limit: usize) -> Result<Vec<T>> {
        let f = match File::open(self.path(file)) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut reader = BufReader::new(f);
        let mut out = Vec::new();
        while out.len() < limit && !reader.fill_buf()?.is_empty() {
            out.push(bincode::deserialize_from(&mut reader)?);
        }
        Ok(out)
    }

    /// Counts records without keeping them.
    pub fn count<T: DeserializeOwned>(&self, file: &str) -> Result<usize> {
        Ok(self.read_all::<T>(file)?.len())
    }

    /// Replaces the contents of `file` with `records`.
    pub fn rewrite_all<T: Serialize>(&self, file: &str, records: &[T]) -> Result<()> {
        self.swap_in(file, |w| {
            for r in records {
                bincode::serialize_into(&mut *w, r)?;
            }
            Ok(())
        })
    }

    /// Empties `file` in one rename.
    pub fn truncate(&self, file: &str) -> Result<()> {
        self.swap_in(file, |_| Ok(()))
    }

    /// Current size of `file` in bytes; a missing file is empty.
    pub fn len_of(&self, file: &str) -> Result<u64> {
        match fs::metadata(self.path(file)) {
            Ok(m) => Ok(m.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Cuts `file` back to `len` bytes, undoing appends made after
    /// [`Store::len_of`] returned `len`.
    pub fn cut_to(&self, file: &str, len: u64) -> Result<()> {
        match OpenOptions::new().write(true).open(self.path(file)) {
            Ok(f) => {
                f.set_len(len)?;
                f.sync_all()?;
                debug!(file, len, "cut record file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Stores a single value as the whole contents of `file`.
    pub fn put<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        self.swap_in(file, |w| Ok(bincode::serialize_into(w, value)?))
    }

    /// Loads the value written by [`Store::put`], if the file exists.
    pub fn get<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>> {
        match File::open(self.path(file)) {
            Ok(f) => Ok(Some(bincode::deserialize_from(BufReader::new(f))?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn swap_in<F>(&self, file: &str, write: F) -> Result<()>
    where
        F: FnOnce(&mut BufWriter<File>) -> Result<()>,
    {
        let target = self.path(file);
        let tmp = self.path(&format!("{file}.tmp"));
        {
            let mut w = BufWriter::new(File::create(&tmp)?);
            write(&mut w)?;
            w.flush()?;
            w.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &target)?;
        debug!(file, "rewrote record file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_read_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        assert!(store.read_all::<u32>("nums.dat").unwrap().is_empty(), "missing file reads empty");

        for n in [7u32, 8, 9] {
            store.append("nums.dat", &n).unwrap();
        }
        assert_eq!(store.read_all::<u32>("nums.dat").unwrap(), vec![7, 8, 9]);
        assert_eq!(store.read_up_to::<u32>("nums.dat", 2).unwrap(), vec![7, 8]);

        store.rewrite_all("nums.dat", &[1u32]).unwrap();
        assert_eq!(store.read_all::<u32>("nums.dat").unwrap(), vec![1]);

        store.truncate("nums.dat").unwrap();
        assert_eq!(store.count::<u32>("nums.dat").unwrap(), 0);
        assert!(!store.path("nums.dat.tmp").exists());
    }

    #[test]
    fn cut_to_undoes_trailing_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        assert_eq!(store.len_of("nums.dat").unwrap(), 0);
        store.cut_to("nums.dat", 0).unwrap();

        store.append("nums.dat", &1u32).unwrap();
        let mark = store.len_of("nums.dat").unwrap();
        store.append("nums.dat", &2u32).unwrap();
        store.append("nums.dat", &3u32).unwrap();
        store.cut_to("nums.dat", mark).unwrap();
        assert_eq!(store.read_all::<u32>("nums.dat").unwrap(), vec![1]);
    }

    #[test]
    fn put_get_whole_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        assert_eq!(store.get::<Vec<String>>("v.dat").unwrap(), None);
        store.put("v.dat", &vec!["a".to_string()]).unwrap();
        assert_eq!(store.get::<Vec<String>>("v.dat").unwrap(), Some(vec!["a".to_string()]));
    }
}
