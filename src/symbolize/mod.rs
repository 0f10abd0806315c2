//! Functionality for symbolizing addresses.
//!
//! This module contains the functionality for symbolizing "raw"
//! addresses — as captured from stack traces, allocation sites, or
//! kernel events — into symbol names and source code locations.
//!
//! ```no_run
//! use addrsym::symbolize::Process;
//! use addrsym::symbolize::Source;
//! use addrsym::symbolize::Symbolizer;
//! use addrsym::Pid;
//!
//! let addrs = [0x55f3a2b4c780u64, 0x7f8b3c1a0010];
//! let src = Source::Process(Process::new(Pid::from(1234)));
//! let symbolizer = Symbolizer::new();
//!
//! let results = symbolizer.symbolize(&[src], &addrs).unwrap();
//! assert_eq!(results.len(), addrs.len());
//!
//! for (addr, syms) in addrs.iter().zip(&results) {
//!     if syms.is_empty() {
//!         println!("{addr:#x}: <no-symbol>");
//!     }
//!     for sym in syms {
//!         println!(
//!             "{addr:#x}: {} @ {:#x} {}:{}",
//!             sym.symbol,
//!             sym.start_address,
//!             sym.path.display(),
//!             sym.line_no,
//!         );
//!     }
//! }
//! ```

mod source;
mod symbolizer;

pub use source::Elf;
pub use source::Kernel;
pub use source::Process;
pub use source::Source;
pub use symbolizer::SymbolizedResult;
pub use symbolizer::Symbolizer;
pub use symbolizer::SymbolizerFeature;
