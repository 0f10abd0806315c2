use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::fs::File;
use std::io::BufRead as _;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use crate::util::find_match_or_lower_bound_by_key;
use crate::Addr;
use crate::ErrorExt as _;
use crate::Result;

/// The conventional location of the running kernel's symbol listing.
pub const KALLSYMS: &str = "/proc/kallsyms";

const DFL_KSYM_CAP: usize = 200000;


/// A kallsyms-style kernel symbol: a name and a start address. Kernel
/// listings carry neither sizes nor source information.
#[derive(Debug)]
struct Ksym {
    addr: Addr,
    name: Box<str>,
}


/// A symbol resolver for a kernel symbol listing such as
/// `/proc/kallsyms`.
///
/// The resolver holds an immutable table sorted by address and is usable
/// independently of [`Symbolizer`][crate::symbolize::Symbolizer], e.g.,
/// to symbolize kernel stack traces against a kallsyms snapshot copied
/// from another machine.
pub struct KsymResolver {
    syms: Box<[Ksym]>,
    file_name: PathBuf,
}

impl KsymResolver {
    /// Load a symbol listing from the file at `path`.
    ///
    /// Construction fails if the listing cannot be read. An empty
    /// listing, on the other hand, yields a valid resolver that simply
    /// never reports a match.
    pub fn load_file_name(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Self::load_from_reader(file, path)
    }

    pub(crate) fn load_from_reader<R>(reader: R, path: &Path) -> Result<Self>
    where
        R: Read,
    {
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        let mut syms = Vec::with_capacity(DFL_KSYM_CAP);

        loop {
            let () = line.clear();
            let sz = reader
                .read_line(&mut line)
                .with_context(|| format!("failed to read {}", path.display()))?;
            if sz == 0 {
                break
            }

            // Records have the shape `ffffffff81000000 T startup_64`;
            // anything shorter is skipped.
            let mut tokens = line.split_ascii_whitespace();
            let (Some(addr), Some(_typ), Some(name)) =
                (tokens.next(), tokens.next(), tokens.next())
            else {
                continue
            };

            if let Ok(addr) = Addr::from_str_radix(addr, 16) {
                // Symbols at address zero are placeholders reported to
                // unprivileged readers; they cannot be resolved against.
                if addr == 0 {
                    continue
                }
                let () = syms.push(Ksym {
                    addr,
                    name: Box::from(name),
                });
            }
        }

        let () = syms.sort_by(|a, b| a.addr.cmp(&b.addr).then_with(|| a.name.cmp(&b.name)));

        let slf = Self {
            syms: syms.into_boxed_slice(),
            file_name: path.to_path_buf(),
        };
        Ok(slf)
    }

    /// Find the symbol covering the given address.
    ///
    /// The match is the entry with the greatest start address not
    /// exceeding `addr`, with no upper bound: kernel symbol regions are
    /// contiguous by convention, so the next entry's start implicitly
    /// bounds each symbol. An address preceding the first entry has no
    /// match.
    ///
    /// The returned string borrows from the resolver and is valid for as
    /// long as the resolver lives.
    pub fn find_addr(&self, addr: Addr) -> Option<&str> {
        self.find_ksym(addr).map(|sym| sym.name.as_ref())
    }

    fn find_ksym(&self, addr: Addr) -> Option<&Ksym> {
        let idx = find_match_or_lower_bound_by_key(&self.syms, addr, |sym| sym.addr)?;
        self.syms.get(idx)
    }

    pub(crate) fn find_sym(&self, addr: Addr) -> Option<(&str, Addr)> {
        self.find_ksym(addr).map(|sym| (sym.name.as_ref(), sym.addr))
    }
}

impl Debug for KsymResolver {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "KsymResolver(\"{}\")", self.file_name.display())
    }
}


/// A cache of [`KsymResolver`] instances, keyed by listing path.
pub(crate) struct KsymCache {
    resolvers: RefCell<HashMap<PathBuf, Rc<KsymResolver>>>,
}

impl KsymCache {
    pub(crate) fn new() -> Self {
        Self {
            resolvers: RefCell::new(HashMap::new()),
        }
    }

    /// Retrieve the resolver for `path` from the cache, creating it on
    /// first use.
    pub(crate) fn get_resolver(&self, path: &Path) -> Result<Rc<KsymResolver>> {
        if let Some(resolver) = self.resolvers.borrow().get(path) {
            return Ok(Rc::clone(resolver))
        }

        let resolver = Rc::new(KsymResolver::load_file_name(path)?);
        let _previous = self
            .resolvers
            .borrow_mut()
            .insert(path.to_path_buf(), Rc::clone(&resolver));
        Ok(resolver)
    }
}

impl Debug for KsymCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "KsymCache({} entries)", self.resolvers.borrow().len())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write as _;

    use tempfile::NamedTempFile;
    use test_log::test;

    use crate::ErrorKind;


    const KALLSYMS_SNIPPET: &[u8] = br#"0000000000000000 A fixed_percpu_data
ffffffff81000000 T startup_64
ffffffff81000070 T secondary_startup_64
ffffffff810001f0 T verify_cpu
ffffffffc0279010 T fuse_dev_init	[fuse]
garbage
"#;

    fn snippet_resolver() -> KsymResolver {
        KsymResolver::load_from_reader(KALLSYMS_SNIPPET, Path::new("<snippet>")).unwrap()
    }

    /// Check that a kallsyms listing parses, skipping zero addresses
    /// and malformed records.
    #[test]
    fn kallsyms_parsing() {
        let resolver = snippet_resolver();
        assert_eq!(resolver.syms.len(), 4);
        assert_eq!(resolver.syms[0].name.as_ref(), "startup_64");
        assert_eq!(resolver.syms[0].addr, 0xffffffff81000000);
    }

    /// Exercise the nearest-preceding-entry semantics of `find_addr`.
    #[test]
    fn find_addr_semantics() {
        let resolver = snippet_resolver();

        // Before the first entry there is no match.
        assert_eq!(resolver.find_addr(0x1000), None);
        assert_eq!(resolver.find_addr(0xffffffff80ffffff), None);

        // Exact hits.
        assert_eq!(resolver.find_addr(0xffffffff81000000), Some("startup_64"));
        assert_eq!(resolver.find_addr(0xffffffff810001f0), Some("verify_cpu"));

        // Between two entries the preceding one matches.
        assert_eq!(resolver.find_addr(0xffffffff81000010), Some("startup_64"));
        assert_eq!(
            resolver.find_addr(0xffffffff8100007f),
            Some("secondary_startup_64")
        );

        // Past the last entry the last one matches, without bound.
        assert_eq!(resolver.find_addr(0xffffffffdeadbeef), Some("fuse_dev_init"));
    }

    /// An empty listing is a valid, degenerate resolver.
    #[test]
    fn empty_listing() {
        let resolver = KsymResolver::load_from_reader(&b""[..], Path::new("<empty>")).unwrap();
        assert_eq!(resolver.syms.len(), 0);
        assert_eq!(resolver.find_addr(0xffffffff81000000), None);
    }

    /// A missing listing fails construction distinctly.
    #[test]
    fn missing_listing() {
        let err = KsymResolver::load_file_name(Path::new("/does/not/exist")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    /// Loading the same file twice yields a resolver with identical
    /// answers, and the cache shares one instance.
    #[test]
    fn deterministic_and_cached() {
        let mut file = NamedTempFile::new().unwrap();
        let () = file.write_all(KALLSYMS_SNIPPET).unwrap();

        let resolver1 = KsymResolver::load_file_name(file.path()).unwrap();
        let resolver2 = KsymResolver::load_file_name(file.path()).unwrap();
        for addr in [0x0, 0xffffffff81000000, 0xffffffff81000080] {
            assert_eq!(resolver1.find_addr(addr), resolver2.find_addr(addr));
        }

        let cache = KsymCache::new();
        let shared1 = cache.get_resolver(file.path()).unwrap();
        let shared2 = cache.get_resolver(file.path()).unwrap();
        assert!(Rc::ptr_eq(&shared1, &shared2));
    }
}
