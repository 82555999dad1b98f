//! Turn a directory tree into a gzip'd tarball.
//!
//! [`Scanner`] walks the tree, [`filter()`] drops the entries that never ship,
//! and [`Packager`] writes what's left into any [`Sink`].

mod archive;
pub mod error;
mod filter;
mod scan;

pub use crate::archive::{CountingWriter, PackageSummary, Packager, Sink};
pub use crate::filter::{EntryFilter, filter, is_excluded};
pub use crate::scan::{FileRecord, Scanner};
