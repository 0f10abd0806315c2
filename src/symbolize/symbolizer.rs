use std::path::PathBuf;

use crate::demangle::maybe_demangle;
use crate::elf::ElfCache;
use crate::kernel::KsymCache;
use crate::resolver::ResolverMap;
use crate::resolver::SymResolver;
use crate::Addr;
use crate::Result;

use super::source::Source;


/// The result of symbolizing one address against one covering symbol.
///
/// [`Symbolizer::symbolize`] returns one list of `SymbolizedResult`s per
/// input address. An address may produce more than one result when
/// several configured sources cover it.
#[derive(Clone, Debug, PartialEq)]
pub struct SymbolizedResult {
    /// The name of the symbol the address belongs to.
    pub symbol: String,
    /// The address at which the symbol starts.
    ///
    /// The address is reported in the same address space as the query,
    /// i.e., already relocated for sources mapped at a base address.
    pub start_address: Addr,
    /// The path of the source file that defines the symbol.
    ///
    /// An empty path means no source information was available.
    pub path: PathBuf,
    /// The line number of the symbolized instruction in the source code.
    ///
    /// This is the line number of the instruction at the queried
    /// address, not the line that defines the symbol. `0` means no line
    /// information was available.
    pub line_no: usize,
    /// The column of the symbolized instruction, or `0` when
    /// unavailable.
    pub column: usize,
}


/// Switches for the features of a [`Symbolizer`].
#[derive(Clone, Copy, Debug)]
pub enum SymbolizerFeature {
    /// Whether to report source file names and line numbers for
    /// addresses (`true` by default).
    LineNumberInfo(bool),
    /// Whether to demangle symbol names (`true` by default; only
    /// effective when the crate's `demangle` feature is enabled).
    Demangle(bool),
}


/// Symbolizer provides an interface to symbolize addresses against a
/// list of symbol sources.
///
/// Resolver state is built lazily per source on first use and cached for
/// the lifetime of the symbolizer, keyed by source identity (file path
/// plus on-disk identity, or kallsyms path), so that repeated
/// symbolization requests against the same binaries or kernel do not pay
/// the parse cost again.
#[derive(Debug)]
pub struct Symbolizer {
    ksym_cache: KsymCache,
    elf_cache: ElfCache,
    line_number_info: bool,
    demangle: bool,
}

impl Symbolizer {
    /// Create a new [`Symbolizer`] with default features.
    pub fn new() -> Self {
        Self::with_opts(&[])
    }

    /// Create a new [`Symbolizer`], with the provided features toggled.
    pub fn with_opts(features: &[SymbolizerFeature]) -> Self {
        let mut line_number_info = true;
        let mut demangle = true;

        for feature in features {
            match feature {
                SymbolizerFeature::LineNumberInfo(enabled) => line_number_info = *enabled,
                SymbolizerFeature::Demangle(enabled) => demangle = *enabled,
            }
        }

        Self {
            ksym_cache: KsymCache::new(),
            elf_cache: ElfCache::new(line_number_info),
            line_number_info,
            demangle,
        }
    }

    /// Symbolize one address against one resolver.
    fn symbolize_with_resolver(
        &self,
        addr: Addr,
        resolver: &dyn SymResolver,
    ) -> Option<SymbolizedResult> {
        let sym = resolver.find_sym(addr);
        let linfo = if self.line_number_info {
            resolver.find_line_info(addr)
        } else {
            None
        };

        match (sym, linfo) {
            (None, None) => None,
            (None, Some(linfo)) => {
                // Debug information may cover an address the symbol
                // table does not, e.g., in objects with debug data but a
                // stripped symbol table. Report what we know.
                Some(SymbolizedResult {
                    symbol: String::new(),
                    start_address: 0,
                    path: linfo.path,
                    line_no: linfo.line,
                    column: linfo.column,
                })
            }
            (Some((name, start_address)), linfo) => {
                let symbol = if self.demangle {
                    maybe_demangle(name).into_owned()
                } else {
                    name.to_string()
                };
                let (path, line_no, column) = linfo
                    .map(|linfo| (linfo.path, linfo.line, linfo.column))
                    .unwrap_or_default();
                Some(SymbolizedResult {
                    symbol,
                    start_address,
                    path,
                    line_no,
                    column,
                })
            }
        }
    }

    /// Symbolize a list of addresses.
    ///
    /// Every address is queried against every resolver instantiated from
    /// `srcs`, in source-declaration order, and all matches are
    /// concatenated; when sources overlap, an address may thus report
    /// several results. The returned list always has exactly one entry
    /// per input address, in input order; an address no source covers
    /// yields an empty entry.
    ///
    /// Sources that cannot be set up (e.g., a missing file) are skipped
    /// with a warning so that the remaining sources still serve their
    /// addresses. Only when not a single source is usable is an error
    /// returned.
    ///
    /// # Arguments
    ///
    /// * `srcs` - The list of symbol and debug information sources.
    /// * `addrs` - The addresses to symbolize.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn symbolize(
        &self,
        srcs: &[Source],
        addrs: &[Addr],
    ) -> Result<Vec<Vec<SymbolizedResult>>> {
        let resolver_map = ResolverMap::new(srcs, &self.ksym_cache, &self.elf_cache)?;

        let results = addrs
            .iter()
            .map(|addr| {
                resolver_map
                    .resolvers()
                    .filter_map(|resolver| self.symbolize_with_resolver(*addr, resolver))
                    .collect()
            })
            .collect();
        Ok(results)
    }
}

impl Default for Symbolizer {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::resolver::AddrLineInfo;


    /// A test resolver serving a fixed symbol over a fixed address
    /// range.
    #[derive(Debug)]
    struct FixedResolver {
        name: &'static str,
        start: Addr,
        end: Addr,
    }

    impl SymResolver for FixedResolver {
        fn find_sym(&self, addr: Addr) -> Option<(&str, Addr)> {
            (self.start..self.end)
                .contains(&addr)
                .then_some((self.name, self.start))
        }

        fn find_line_info(&self, _addr: Addr) -> Option<AddrLineInfo> {
            None
        }
    }

    /// Matches from multiple resolvers are concatenated in declaration
    /// order, and unmatched addresses produce empty (not absent)
    /// entries.
    #[test]
    fn fan_out_ordering() {
        let symbolizer = Symbolizer::new();
        let first = FixedResolver {
            name: "first",
            start: 0x1000,
            end: 0x2000,
        };
        let second = FixedResolver {
            name: "second",
            start: 0x1800,
            end: 0x2800,
        };
        let resolvers: [&dyn SymResolver; 2] = [&first, &second];

        let addrs = [0x1100u64, 0x1900, 0x2700, 0x5000];
        let results = addrs
            .iter()
            .map(|addr| {
                resolvers
                    .iter()
                    .filter_map(|resolver| symbolizer.symbolize_with_resolver(*addr, *resolver))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        assert_eq!(results.len(), addrs.len());

        let names = |idx: usize| {
            results[idx]
                .iter()
                .map(|result| result.symbol.as_str())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(0), vec!["first"]);
        // Overlapping coverage reports both, declaration order first.
        assert_eq!(names(1), vec!["first", "second"]);
        assert_eq!(names(2), vec!["second"]);
        assert_eq!(names(3), Vec::<&str>::new());
    }

    /// Disabling line information leaves the symbol match intact.
    #[test]
    fn line_info_toggle() {
        let symbolizer = Symbolizer::with_opts(&[SymbolizerFeature::LineNumberInfo(false)]);
        let resolver = FixedResolver {
            name: "stub",
            start: 0x100,
            end: 0x200,
        };

        let result = symbolizer
            .symbolize_with_resolver(0x100, &resolver)
            .unwrap();
        assert_eq!(result.symbol, "stub");
        assert_eq!(result.start_address, 0x100);
        assert_eq!(result.path, PathBuf::new());
        assert_eq!(result.line_no, 0);
    }
}
