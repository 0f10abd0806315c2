use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::fs;
use std::os::unix::fs::MetadataExt as _;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use crate::ErrorExt as _;
use crate::Result;

use super::loader::ElfData;


/// The identity of a file on disk, used to detect when a cached parse
/// result has gone stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FileId {
    dev: u64,
    inode: u64,
    size: u64,
    mtime_sec: i64,
    mtime_nsec: i64,
}

impl From<&fs::Metadata> for FileId {
    fn from(meta: &fs::Metadata) -> Self {
        Self {
            dev: meta.dev(),
            inode: meta.ino(),
            size: meta.size(),
            mtime_sec: meta.mtime(),
            mtime_nsec: meta.mtime_nsec(),
        }
    }
}


struct CacheEntry {
    id: FileId,
    data: Rc<ElfData>,
}


/// A cache of parsed object files, keyed by path.
///
/// Parsing a symbol table and debug information is the expensive part of
/// resolver construction; sharing one [`ElfData`] per file amortizes it
/// across repeated symbolization requests. Entries are rebuilt when the
/// file's on-disk identity changes.
pub(crate) struct ElfCache {
    debug_info: bool,
    entries: RefCell<HashMap<PathBuf, CacheEntry>>,
}

impl ElfCache {
    pub(crate) fn new(debug_info: bool) -> Self {
        Self {
            debug_info,
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// Retrieve the parsed state of the file at `path`, building it if
    /// necessary.
    pub(crate) fn find(&self, path: &Path) -> Result<Rc<ElfData>> {
        let meta = fs::metadata(path)
            .with_context(|| format!("failed to inspect {}", path.display()))?;
        let id = FileId::from(&meta);

        if let Some(entry) = self.entries.borrow().get(path) {
            if entry.id == id {
                return Ok(Rc::clone(&entry.data))
            }
        }

        let data = Rc::new(ElfData::open(path, self.debug_info)?);
        let entry = CacheEntry {
            id,
            data: Rc::clone(&data),
        };
        let _previous = self.entries.borrow_mut().insert(path.to_path_buf(), entry);
        Ok(data)
    }
}

impl Debug for ElfCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "ElfCache({} entries)", self.entries.borrow().len())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use std::env::current_exe;

    use test_log::test;


    /// Repeated lookups of the same path share one parse result.
    #[test]
    fn cache_sharing() {
        let cache = ElfCache::new(false);
        let exe = current_exe().unwrap();
        let data1 = cache.find(&exe).unwrap();
        let data2 = cache.find(&exe).unwrap();
        assert!(Rc::ptr_eq(&data1, &data2));
    }

    /// A missing file reports a not-found error.
    #[test]
    fn cache_missing_file() {
        let cache = ElfCache::new(false);
        let err = cache.find(Path::new("/does/not/exist")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
    }
}
