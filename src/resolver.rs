use std::collections::HashSet;
use std::fmt::Debug;
use std::path::Path;
use std::path::PathBuf;

use crate::elf::ElfCache;
use crate::elf::ElfResolver;
use crate::kernel::KernelResolver;
use crate::kernel::KsymCache;
use crate::kernel::KALLSYMS;
use crate::log;
use crate::maps;
use crate::symbolize::Elf;
use crate::symbolize::Kernel;
use crate::symbolize::Process;
use crate::symbolize::Source;
use crate::util::uname_release;
use crate::Addr;
use crate::ErrorExt as _;
use crate::Pid;
use crate::Result;


/// Source location information for an address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct AddrLineInfo {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
}


/// The trait of symbol resolvers.
///
/// A symbol resolver answers queries against one symbol source, e.g.,
/// one loaded object file or one kernel symbol listing. Resolvers are
/// immutable once constructed.
pub(crate) trait SymResolver
where
    Self: Debug,
{
    /// Find the name and start address (in the query address space) of
    /// the symbol covering the given address.
    fn find_sym(&self, addr: Addr) -> Option<(&str, Addr)>;
    /// Find the source file and line of an address.
    fn find_line_info(&self, addr: Addr) -> Option<AddrLineInfo>;
}


/// The set of resolvers instantiated for a list of symbol sources, in
/// source-declaration order.
///
/// A process source expands into one resolver per loaded object, in the
/// order the process' memory map reports them.
#[derive(Debug)]
pub(crate) struct ResolverMap {
    resolvers: Vec<Box<dyn SymResolver>>,
}

impl ResolverMap {
    fn add_elf_resolver(
        cfg: &Elf,
        elf_cache: &ElfCache,
        resolvers: &mut Vec<Box<dyn SymResolver>>,
    ) -> Result<()> {
        let Elf {
            path,
            base_address,
            _non_exhaustive: (),
        } = cfg;

        let data = elf_cache.find(path)?;
        let resolver = ElfResolver::new(path, *base_address, data);
        let () = resolvers.push(Box::new(resolver));
        Ok(())
    }

    /// Discover the loaded objects of a process and add one resolver per
    /// distinct module.
    ///
    /// Modules that cannot be loaded (e.g., because the file vanished
    /// after the memory map was read) are skipped; symbolization
    /// proceeds with whatever modules remain readable.
    fn add_process_resolvers(
        pid: Pid,
        elf_cache: &ElfCache,
        resolvers: &mut Vec<Box<dyn SymResolver>>,
    ) -> Result<()> {
        let entries = maps::parse(pid)?;
        let mut seen = HashSet::new();

        for entry in entries.iter().filter(|e| maps::is_module_candidate(e)) {
            if !seen.insert(entry.path.clone()) {
                continue
            }
            let result = elf_cache
                .find(&entry.path)
                .map(|data| ElfResolver::new(&entry.path, entry.range.start, data));
            match result {
                Ok(resolver) => {
                    let () = resolvers.push(Box::new(resolver));
                }
                Err(err) => log::warn!(
                    "failed to load {} for process {pid}: {err}; skipping",
                    entry.path.display()
                ),
            }
        }
        Ok(())
    }

    /// Locate the image of the running kernel in its conventional boot
    /// locations.
    fn find_kernel_image() -> Option<PathBuf> {
        let release = uname_release().ok()?;
        let dirs = [Path::new("/boot"), Path::new("/usr/lib/debug/boot")];
        dirs.iter()
            .map(|dir| dir.join(format!("vmlinux-{release}")))
            .find(|path| path.exists())
    }

    fn create_kernel_resolver(
        cfg: &Kernel,
        ksym_cache: &KsymCache,
        elf_cache: &ElfCache,
    ) -> Result<KernelResolver> {
        let Kernel {
            kallsyms,
            kernel_image,
            _non_exhaustive: (),
        } = cfg;

        let ksym_resolver = match kallsyms {
            // An explicitly configured listing has to be usable.
            Some(path) => Some(ksym_cache.get_resolver(path)?),
            None => {
                let path = Path::new(KALLSYMS);
                match ksym_cache.get_resolver(path) {
                    Ok(resolver) => Some(resolver),
                    Err(err) => {
                        log::warn!(
                            "failed to load kallsyms from {}: {err}; ignoring",
                            path.display()
                        );
                        None
                    }
                }
            }
        };

        let elf_resolver = match kernel_image {
            Some(image) => {
                let data = elf_cache.find(image)?;
                Some(ElfResolver::new(image, 0, data))
            }
            None => Self::find_kernel_image().and_then(|image| {
                match elf_cache.find(&image) {
                    Ok(data) => Some(ElfResolver::new(&image, 0, data)),
                    Err(err) => {
                        log::warn!(
                            "failed to load kernel image {}: {err}; ignoring",
                            image.display()
                        );
                        None
                    }
                }
            }),
        };

        KernelResolver::new(ksym_resolver, elf_resolver)
    }

    /// Build the resolver set for the given sources.
    ///
    /// Sources that fail to produce a resolver are reported and skipped,
    /// so that addresses covered by the remaining sources still get
    /// symbolized. Only when not a single source is usable does
    /// construction fail, with the first source's error.
    pub(crate) fn new(
        srcs: &[Source],
        ksym_cache: &KsymCache,
        elf_cache: &ElfCache,
    ) -> Result<ResolverMap> {
        let mut resolvers = Vec::new();
        let mut first_error = None;

        for src in srcs {
            let result = match src {
                Source::Elf(elf) => Self::add_elf_resolver(elf, elf_cache, &mut resolvers),
                Source::Kernel(kernel) => {
                    Self::create_kernel_resolver(kernel, ksym_cache, elf_cache).map(|resolver| {
                        let () = resolvers.push(Box::new(resolver) as Box<dyn SymResolver>);
                    })
                }
                Source::Process(Process {
                    pid,
                    _non_exhaustive: (),
                }) => Self::add_process_resolvers(*pid, elf_cache, &mut resolvers),
            };

            if let Err(err) = result {
                log::warn!("failed to set up resolvers for source {src:?}: {err}; skipping");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        if resolvers.is_empty() {
            if let Some(err) = first_error {
                return Err(err.context("failed to create any symbol resolver"))
            }
        }

        Ok(ResolverMap { resolvers })
    }

    /// Iterate over the resolvers, in source-declaration order.
    pub(crate) fn resolvers(&self) -> impl Iterator<Item = &dyn SymResolver> + '_ {
        self.resolvers.iter().map(|resolver| resolver.as_ref())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::ErrorKind;


    /// A process source expands into resolvers for the loaded objects of
    /// the process, including the executable itself.
    #[test]
    fn process_source_expansion() {
        let ksym_cache = KsymCache::new();
        let elf_cache = ElfCache::new(false);
        let srcs = [Source::Process(Process::new(Pid::Slf))];

        let map = ResolverMap::new(&srcs, &ksym_cache, &elf_cache).unwrap();
        let reprs = map
            .resolvers()
            .map(|resolver| format!("{resolver:?}"))
            .collect::<Vec<_>>();
        assert!(!reprs.is_empty());
        assert!(reprs.iter().all(|repr| repr.starts_with("ELF ")), "{reprs:?}");
    }

    /// With no sources at all, an empty resolver set is not an error.
    #[test]
    fn empty_sources() {
        let ksym_cache = KsymCache::new();
        let elf_cache = ElfCache::new(false);

        let map = ResolverMap::new(&[], &ksym_cache, &elf_cache).unwrap();
        assert_eq!(map.resolvers().count(), 0);
    }

    /// When not a single source is usable, construction fails with the
    /// first source's error.
    #[test]
    fn total_failure() {
        let ksym_cache = KsymCache::new();
        let elf_cache = ElfCache::new(false);
        let srcs = [Source::Elf(Elf::new("/does/not/exist", 0x1000))];

        let err = ResolverMap::new(&srcs, &ksym_cache, &elf_cache).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    /// A failing source does not prevent the remaining ones from being
    /// used.
    #[test]
    fn partial_failure() {
        let ksym_cache = KsymCache::new();
        let elf_cache = ElfCache::new(false);
        let srcs = [
            Source::Elf(Elf::new("/does/not/exist", 0x1000)),
            Source::Process(Process::new(Pid::Slf)),
        ];

        let map = ResolverMap::new(&srcs, &ksym_cache, &elf_cache).unwrap();
        assert!(map.resolvers().count() > 0);
    }
}
