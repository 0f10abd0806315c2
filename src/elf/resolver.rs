use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use crate::resolver::AddrLineInfo;
use crate::resolver::SymResolver;
use crate::Addr;

use super::loader::ElfData;


/// The symbol resolver for a single object file.
///
/// An object file may be loaded into an address space with a relocation.
/// `base_address` is the address at which the file's executable segment
/// is mapped; for files located at their link-time addresses (e.g., a
/// kernel image) pass `0`.
pub(crate) struct ElfResolver {
    data: Rc<ElfData>,
    base_address: Addr,
    file_name: PathBuf,
}

impl ElfResolver {
    pub(crate) fn new(path: &Path, base_address: Addr, data: Rc<ElfData>) -> Self {
        Self {
            data,
            base_address,
            file_name: path.to_path_buf(),
        }
    }

    /// Translate a query address into the object file's address space.
    ///
    /// Addresses below the base address cannot belong to this module and
    /// translate to nothing (rather than an error).
    fn file_addr(&self, addr: Addr) -> Option<Addr> {
        if self.base_address == 0 {
            return Some(addr)
        }
        addr.checked_sub(self.base_address)?
            .checked_add(self.data.exec_bias)
    }

    /// Translate a file-space address back into the query address space.
    fn query_addr(&self, file_addr: Addr) -> Option<Addr> {
        if self.base_address == 0 {
            return Some(file_addr)
        }
        file_addr
            .checked_sub(self.data.exec_bias)?
            .checked_add(self.base_address)
    }
}

impl SymResolver for ElfResolver {
    fn find_sym(&self, addr: Addr) -> Option<(&str, Addr)> {
        let file_addr = self.file_addr(addr)?;
        if let Some(end) = self.data.vaddr_end {
            if file_addr >= end {
                return None
            }
        }
        let sym = self.data.syms.find(file_addr)?;
        let start_address = self.query_addr(sym.addr)?;
        Some((&sym.name, start_address))
    }

    fn find_line_info(&self, addr: Addr) -> Option<AddrLineInfo> {
        let file_addr = self.file_addr(addr)?;
        self.data.find_line(file_addr)
    }
}

impl Debug for ElfResolver {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "ELF {}", self.file_name.display())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use crate::elf::loader::SymEntry;

    use test_log::test;


    fn resolver_with(entries: Vec<SymEntry>, base_address: Addr) -> ElfResolver {
        let data = Rc::new(ElfData::from_parts(entries, 0, None));
        ElfResolver::new(Path::new("libfoo.so"), base_address, data)
    }

    /// A relocated symbol is found through the mapped address and its
    /// start address is reported in the query address space.
    #[test]
    fn relocated_lookup() {
        let entries = vec![SymEntry {
            name: Box::from("do_work"),
            addr: 0x2500,
            size: 0x50,
        }];
        let resolver = resolver_with(entries, 0x1000);

        let (name, start) = resolver.find_sym(0x3510).unwrap();
        assert_eq!(name, "do_work");
        assert_eq!(start, 0x3500);

        // An exact hit on the relocated start address.
        let (name, _start) = resolver.find_sym(0x3500).unwrap();
        assert_eq!(name, "do_work");

        // One past the end of the symbol misses.
        assert_eq!(resolver.find_sym(0x3550), None);
        assert_eq!(resolver.find_sym(0x3560), None);
    }

    /// Addresses below the base address yield no match instead of
    /// underflowing.
    #[test]
    fn address_below_base() {
        let entries = vec![SymEntry {
            name: Box::from("do_work"),
            addr: 0x2500,
            size: 0x50,
        }];
        let resolver = resolver_with(entries, 0x1000);

        assert_eq!(resolver.find_sym(0xfff), None);
        assert_eq!(resolver.find_sym(0x0), None);
    }

    /// With a base address of zero, addresses are interpreted as file
    /// virtual addresses directly.
    #[test]
    fn unrelocated_lookup() {
        let entries = vec![SymEntry {
            name: Box::from("startup"),
            addr: 0xffffffff81000000,
            size: 0,
        }];
        let resolver = resolver_with(entries, 0);

        let (name, start) = resolver.find_sym(0xffffffff81000010).unwrap();
        assert_eq!(name, "startup");
        assert_eq!(start, 0xffffffff81000000);
    }

    /// The executable segment bias participates in both translation
    /// directions.
    #[test]
    fn biased_translation() {
        let entries = vec![SymEntry {
            name: Box::from("handler"),
            addr: 0x28100,
            size: 0x40,
        }];
        let data = Rc::new(ElfData::from_parts(entries, 0x28000, None));
        let resolver = ElfResolver::new(Path::new("libc.so.6"), 0x7f0000000000, data);

        let (name, start) = resolver.find_sym(0x7f0000000110).unwrap();
        assert_eq!(name, "handler");
        assert_eq!(start, 0x7f0000000100);
    }

    /// The module extent bounds trailing zero sized symbols.
    #[test]
    fn extent_bounds_lookup() {
        let entries = vec![SymEntry {
            name: Box::from("tail"),
            addr: 0x2500,
            size: 0,
        }];
        let data = Rc::new(ElfData::from_parts(entries, 0, Some(0x3000)));
        let resolver = ElfResolver::new(Path::new("libfoo.so"), 0x1000, data);

        assert!(resolver.find_sym(0x3f00).is_some());
        assert_eq!(resolver.find_sym(0x4000), None);
    }
}
