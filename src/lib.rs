// addrsym resolves raw runtime addresses to symbol names and, where
// debug information is available, source file, line, and column.
#![doc = include_str!("../README.md")]

mod demangle;
mod elf;
mod error;
pub mod kernel;
mod log;
mod maps;
mod pid;
mod resolver;
pub mod symbolize;
mod util;

pub use crate::error::Error;
pub use crate::error::ErrorExt;
pub use crate::error::ErrorKind;
pub use crate::error::Result;
pub use crate::pid::Pid;

/// A type representing an address in some address space.
///
/// Depending on the symbol source an address is interpreted against, it
/// is either an address as a process sees it (possibly relocated and
/// randomized) or a virtual address as recorded in an object file.
pub type Addr = u64;
