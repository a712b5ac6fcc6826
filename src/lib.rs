//! Shared-library tracking for debug targets that report their own library
//! list.
//!
//! Most debuggers discover the shared libraries ("solibs") loaded into an
//! inferior by walking the dynamic linker's in-memory data structures. Some
//! targets — remote stubs for embedded OSes, Windows gdbservers, simulators —
//! instead report the list themselves, as an XML `library-list` document:
//!
//! ```xml
//! <library-list version="1.0">
//!   <library name="libfoo.so">
//!     <segment address="0x1000"/>
//!     <segment address="0x2000"/>
//!   </library>
//!   <library name="libbar.so">
//!     <section address="0x4000"/>
//!   </library>
//! </library-list>
//! ```
//!
//! This crate parses that document into per-library records, and computes the
//! per-section address offsets needed to relocate each library's symbols and
//! breakpoints to their runtime addresses. A target may report one base
//! address per loadable *segment*, or one per allocatable *section*; either
//! way the result is a single offset table in the object file's native
//! section order, computed lazily (the object file must be open first) and
//! cached per library.
//!
//! The debugger embedding this crate supplies its own collaborators:
//!
//! - [`LibraryProvider`] — fetches the raw library-list document from the
//!   target (e.g. via `qXfer:libraries:read`).
//! - [`ObjectFile`] — layout queries against an opened object file.
//! - [`SymfileBackend`] — object-file opening and PLT-section lookup.
//!
//! [`TargetSolibOps`] wires these together behind the [`SolibOps`] facade,
//! and [`SolibRegistry`] lets the embedder install it as the active
//! library-tracking implementation at startup.
//!
//! Malformed or mismatched target data never takes the debugger down: every
//! failure degrades to "library listed but not relocated", surfaced through
//! `log::warn!`.

#![forbid(unsafe_code)]

pub mod objfile;
pub mod ops;
pub mod parser;
pub mod record;
pub mod solib;
pub mod util;

mod relocate;

#[cfg(feature = "elf")]
pub mod elf;

pub use objfile::{ObjectFile, Section, SectionFlags, SectionOffsets, SegmentLayout};
pub use ops::{SolibOps, SolibRegistry, SymfileBackend, TargetSolibOps};
pub use parser::ParseError;
#[cfg(feature = "xml")]
pub use parser::parse_library_list;
pub use record::LmInfo;
pub use solib::{LibraryProvider, Solib, TargetSection};
pub use util::SO_NAME_MAX_PATH_SIZE;

#[cfg(feature = "elf")]
pub use elf::ElfObjectFile;
