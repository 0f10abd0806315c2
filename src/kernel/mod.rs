//! Kernel address symbolization.
//!
//! The [`KsymResolver`] answers nearest-symbol queries against a kernel
//! symbol listing (kallsyms) and can be used on its own. The
//! crate-internal [`KernelResolver`] combines it with an optional kernel
//! image for source line information.

mod ksym;

use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::rc::Rc;

use crate::elf::ElfResolver;
use crate::resolver::AddrLineInfo;
use crate::resolver::SymResolver;
use crate::Addr;
use crate::Error;
use crate::Result;

pub use ksym::KsymResolver;
pub use ksym::KALLSYMS;

pub(crate) use ksym::KsymCache;


/// A resolver for kernel addresses.
///
/// Symbol names come from the kallsyms listing (with the kernel image's
/// symbol table as a fallback); source line information, where
/// requested, comes from the kernel image's debug data.
pub(crate) struct KernelResolver {
    ksym_resolver: Option<Rc<KsymResolver>>,
    elf_resolver: Option<ElfResolver>,
}

impl KernelResolver {
    pub(crate) fn new(
        ksym_resolver: Option<Rc<KsymResolver>>,
        elf_resolver: Option<ElfResolver>,
    ) -> Result<Self> {
        if ksym_resolver.is_none() && elf_resolver.is_none() {
            return Err(Error::with_not_found(
                "failed to create kernel resolver: neither kallsyms nor a kernel image are usable",
            ))
        }

        Ok(Self {
            ksym_resolver,
            elf_resolver,
        })
    }
}

impl SymResolver for KernelResolver {
    fn find_sym(&self, addr: Addr) -> Option<(&str, Addr)> {
        if let Some(ksym_resolver) = self.ksym_resolver.as_ref() {
            if let Some(found) = ksym_resolver.find_sym(addr) {
                return Some(found)
            }
        }
        self.elf_resolver
            .as_ref()
            .and_then(|resolver| resolver.find_sym(addr))
    }

    fn find_line_info(&self, addr: Addr) -> Option<AddrLineInfo> {
        self.elf_resolver
            .as_ref()
            .and_then(|resolver| resolver.find_line_info(addr))
    }
}

impl Debug for KernelResolver {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "KernelResolver({:?}, {:?})",
            self.ksym_resolver, self.elf_resolver
        )
    }
}
