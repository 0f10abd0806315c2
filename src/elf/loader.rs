use std::cmp::Reverse;
use std::fs::File;
use std::path::Path;
#[cfg(feature = "dwarf")]
use std::path::PathBuf;
#[cfg(feature = "dwarf")]
use std::rc::Rc;

use memmap2::Mmap;
use object::Object as _;
use object::ObjectSegment as _;
use object::ObjectSymbol as _;
use object::SymbolKind;

use crate::log;
use crate::resolver::AddrLineInfo;
use crate::util::find_match_or_lower_bound_by_key;
use crate::Addr;
use crate::ErrorExt as _;
use crate::Result;


/// One symbol table entry, in the object file's address space.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SymEntry {
    pub name: Box<str>,
    pub addr: Addr,
    /// The symbol's size; `0` means the symbol extends up to the next
    /// entry in the table.
    pub size: u64,
}


/// An immutable symbol table, sorted ascending by address and unique per
/// address.
#[derive(Debug, Default)]
pub(crate) struct SymTab {
    syms: Box<[SymEntry]>,
}

impl SymTab {
    pub(crate) fn from_entries(mut entries: Vec<SymEntry>) -> Self {
        // When multiple symbols share a start address, keep the one with
        // the largest size.
        let () = entries.sort_by_key(|sym| (sym.addr, Reverse(sym.size)));
        let () = entries.dedup_by_key(|sym| sym.addr);
        Self {
            syms: entries.into_boxed_slice(),
        }
    }

    /// Find the entry covering the given file-space address, if any.
    ///
    /// The covering entry is the one with the greatest start address not
    /// exceeding `addr`, subject to its size: a sized entry only covers
    /// addresses below `start + size`, while a zero sized one covers
    /// everything up to the next entry.
    pub(crate) fn find(&self, addr: Addr) -> Option<&SymEntry> {
        let idx = find_match_or_lower_bound_by_key(&self.syms, addr, |sym| sym.addr)?;
        let sym = &self.syms[idx];
        if sym.size > 0 {
            let covered = sym
                .addr
                .checked_add(sym.size)
                .map(|end| addr < end)
                .unwrap_or(true);
            if !covered {
                return None
            }
        }
        Some(sym)
    }

    pub(crate) fn len(&self) -> usize {
        self.syms.len()
    }
}


#[cfg(feature = "dwarf")]
type LineReader = gimli::EndianRcSlice<gimli::RunTimeEndian>;


/// The parsed state of one object file: its symbol table, the virtual
/// address of its executable segment, and (optionally) a line lookup
/// context over its debug information.
///
/// Built once per file and shared between resolvers; immutable after
/// construction.
pub(crate) struct ElfData {
    pub(crate) syms: SymTab,
    /// The virtual address of the first executable load segment. Used to
    /// translate between mapped and file-space addresses.
    pub(crate) exec_bias: Addr,
    /// The end of the highest load segment, bounding the file-space
    /// addresses this object can cover. `None` if the object carries no
    /// segments (e.g., a symbols-only file).
    pub(crate) vaddr_end: Option<Addr>,
    #[cfg(feature = "dwarf")]
    lines: Option<addr2line::Context<LineReader>>,
}

impl std::fmt::Debug for ElfData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("ElfData");
        let () = {
            s.field("syms", &self.syms);
            s.field("exec_bias", &self.exec_bias);
            s.field("vaddr_end", &self.vaddr_end);
        };
        #[cfg(feature = "dwarf")]
        let () = {
            s.field("lines", &self.lines.is_some());
        };
        s.finish()
    }
}

impl ElfData {
    /// Parse the object file at `path`.
    ///
    /// A stripped file yields an empty, queryable symbol table. Missing
    /// or garbled debug information downgrades to name-only resolution.
    /// `debug_info` controls whether a line lookup context is built at
    /// all.
    pub(crate) fn open(path: &Path, debug_info: bool) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        // SAFETY: The file is open for reading; we never write through
        //         the mapping.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("failed to memory map {}", path.display()))?;
        let obj = object::File::parse(&*mmap)
            .with_context(|| format!("failed to parse {} as an object file", path.display()))?;

        let mut exec_bias = None;
        let mut vaddr_end = None;
        for segment in obj.segments() {
            let start = segment.address();
            let end = start.saturating_add(segment.size());
            vaddr_end = Some(vaddr_end.map_or(end, |max: Addr| max.max(end)));

            let executable = matches!(
                segment.flags(),
                object::SegmentFlags::Elf { p_flags } if p_flags & object::elf::PF_X != 0
            );
            if executable && exec_bias.is_none() {
                exec_bias = Some(start);
            }
        }

        let syms = Self::collect_syms(&obj);
        if syms.len() == 0 {
            log::debug!("{} has no symbols", path.display());
        }

        #[cfg(feature = "dwarf")]
        let lines = if debug_info {
            Self::load_line_context(&obj, path)
        } else {
            None
        };
        #[cfg(not(feature = "dwarf"))]
        let _debug_info = debug_info;

        let slf = Self {
            syms,
            exec_bias: exec_bias.unwrap_or(0),
            vaddr_end,
            #[cfg(feature = "dwarf")]
            lines,
        };
        Ok(slf)
    }

    /// Collect function and data symbols, falling back to the dynamic
    /// symbol table when the static one is absent (as in most stripped
    /// shared objects).
    fn collect_syms(obj: &object::File<'_>) -> SymTab {
        fn collect<'data: 'file, 'file>(
            symbols: impl Iterator<Item = object::Symbol<'data, 'file>>,
        ) -> Vec<SymEntry> {
            symbols
                .filter(|sym| {
                    sym.is_definition()
                        && matches!(sym.kind(), SymbolKind::Text | SymbolKind::Data)
                })
                .filter_map(|sym| {
                    let name = sym.name().ok()?;
                    if name.is_empty() {
                        return None
                    }
                    Some(SymEntry {
                        name: Box::from(name),
                        addr: sym.address(),
                        size: sym.size(),
                    })
                })
                .collect()
        }

        let mut entries = collect(obj.symbols());
        if entries.is_empty() {
            entries = collect(obj.dynamic_symbols());
        }
        SymTab::from_entries(entries)
    }

    #[cfg(feature = "dwarf")]
    fn load_line_context(
        obj: &object::File<'_>,
        path: &Path,
    ) -> Option<addr2line::Context<LineReader>> {
        use object::ObjectSection as _;

        if obj.section_by_name(".debug_info").is_none() {
            log::debug!("{} carries no debug information", path.display());
            return None
        }

        let endian = if obj.is_little_endian() {
            gimli::RunTimeEndian::Little
        } else {
            gimli::RunTimeEndian::Big
        };

        // Copy each section into reference counted storage so that the
        // resulting context owns its data independently of the file
        // mapping.
        let load_section = |id: gimli::SectionId| -> Result<LineReader, gimli::Error> {
            let data = obj
                .section_by_name(id.name())
                .and_then(|section| section.uncompressed_data().ok())
                .unwrap_or(std::borrow::Cow::Borrowed(&[][..]));
            Ok(gimli::EndianRcSlice::new(Rc::from(&*data), endian))
        };

        let result = gimli::Dwarf::load(load_section)
            .and_then(|dwarf| addr2line::Context::from_dwarf(dwarf));
        match result {
            Ok(context) => Some(context),
            Err(err) => {
                log::warn!(
                    "failed to load debug information from {}: {err}; continuing without",
                    path.display()
                );
                None
            }
        }
    }

    /// Look up source location information for a file-space address.
    #[cfg(feature = "dwarf")]
    pub(crate) fn find_line(&self, addr: Addr) -> Option<AddrLineInfo> {
        let context = self.lines.as_ref()?;
        let location = context.find_location(addr).ok()??;
        let file = location.file?;
        Some(AddrLineInfo {
            path: PathBuf::from(file),
            line: location.line.unwrap_or(0) as usize,
            column: location.column.unwrap_or(0) as usize,
        })
    }

    #[cfg(not(feature = "dwarf"))]
    pub(crate) fn find_line(&self, _addr: Addr) -> Option<AddrLineInfo> {
        None
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        entries: Vec<SymEntry>,
        exec_bias: Addr,
        vaddr_end: Option<Addr>,
    ) -> Self {
        Self {
            syms: SymTab::from_entries(entries),
            exec_bias,
            vaddr_end,
            #[cfg(feature = "dwarf")]
            lines: None,
        }
    }
}
