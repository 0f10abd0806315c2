use std::path::PathBuf;

use crate::Addr;
use crate::Pid;

#[cfg(doc)]
use super::Symbolizer;


/// A single ELF file, symbolized against a given base address.
#[derive(Clone, Debug, PartialEq)]
pub struct Elf {
    /// The path of the ELF file.
    ///
    /// It can be an executable or a shared object. For example, passing
    /// `"/bin/sh"` will load symbols and debug information from `sh`,
    /// whereas passing `"/lib/libc.so.xxx"` will load symbols and debug
    /// information from libc.
    pub path: PathBuf,
    /// The address at which the file's executable segment is mapped.
    ///
    /// It should be the address in the process' memory map at which the
    /// executable segment's first byte is located. For example, in
    /// `/proc/<pid>/maps`:
    /// ```text
    ///     7fe1b2dc4000-7fe1b2f80000 r-xp 00000000 00:1d 71695032   /usr/lib64/libc-2.28.so
    ///     7fe1b2f80000-7fe1b3180000 ---p 001bc000 00:1d 71695032   /usr/lib64/libc-2.28.so
    /// ```
    /// the executable segment of `libc-2.28.so` is mapped at
    /// `0x7fe1b2dc4000`. This base address is used to translate
    /// addresses in the process' address space to the corresponding
    /// addresses in the ELF file.
    ///
    /// For files located at an address determined at link time (e.g., a
    /// non-relocated executable queried with file virtual addresses),
    /// pass `0`.
    pub base_address: Addr,
    /// The struct is non-exhaustive and open to extension.
    #[doc(hidden)]
    pub(crate) _non_exhaustive: (),
}

impl Elf {
    /// Create a new [`Elf`] object, referencing the provided path and
    /// base address.
    pub fn new(path: impl Into<PathBuf>, base_address: Addr) -> Self {
        Self {
            path: path.into(),
            base_address,
            _non_exhaustive: (),
        }
    }
}

impl From<Elf> for Source {
    fn from(elf: Elf) -> Self {
        Source::Elf(elf)
    }
}


/// The Linux kernel, as described by a kallsyms listing and optionally a
/// kernel image.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Kernel {
    /// The path of a kallsyms listing.
    ///
    /// For the running kernel this is usually `"/proc/kallsyms"`, but a
    /// snapshot copied from another machine works just as well. Passing
    /// `None` uses `"/proc/kallsyms"`.
    pub kallsyms: Option<PathBuf>,
    /// The path of a kernel image.
    ///
    /// This should be the path of an image such as
    /// `"/boot/vmlinux-xxxx"`. With `None` the image of the running
    /// kernel is looked for in `"/boot/"` and
    /// `"/usr/lib/debug/boot/"`.
    pub kernel_image: Option<PathBuf>,
    /// The struct is non-exhaustive and open to extension.
    #[doc(hidden)]
    pub(crate) _non_exhaustive: (),
}

impl From<Kernel> for Source {
    fn from(kernel: Kernel) -> Self {
        Source::Kernel(kernel)
    }
}


/// A live process, whose loaded objects are discovered from its memory
/// map.
///
/// The addresses supplied to [`Symbolizer::symbolize`] are expected to
/// be absolute addresses as valid within the process identified by the
/// [`pid`][Process::pid] member.
#[derive(Clone, Debug, PartialEq)]
pub struct Process {
    /// The referenced process' ID.
    pub pid: Pid,
    /// The struct is non-exhaustive and open to extension.
    #[doc(hidden)]
    pub(crate) _non_exhaustive: (),
}

impl Process {
    /// Create a new [`Process`] object for the provided `pid`.
    pub fn new(pid: Pid) -> Self {
        Self {
            pid,
            _non_exhaustive: (),
        }
    }
}

impl From<Process> for Source {
    fn from(process: Process) -> Self {
        Source::Process(process)
    }
}


/// The description of a source of symbols and debug information.
///
/// A source can be an ELF file, the kernel, or a process. Sources are
/// immutable once constructed.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Source {
    /// A single ELF file.
    Elf(Elf),
    /// Information about the Linux kernel.
    Kernel(Kernel),
    /// Information about a process.
    Process(Process),
}
