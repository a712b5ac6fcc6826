//! The generic loaded-library node and the list builder that populates it.

use std::fmt;

use crate::objfile::ObjectFile;
use crate::parser;
use crate::record::LmInfo;
use crate::util::bounded_so_name;

/// Fetches the raw library-list document from the execution target.
///
/// This is the `qXfer:libraries:read` flavor of capability: the target
/// either hands back the whole document or reports that none is available.
pub trait LibraryProvider {
    /// Read the target's current library-list document.
    ///
    /// `None` means the target has nothing to report right now; the caller
    /// treats the library set as unknown rather than empty.
    fn read_library_list(&mut self) -> Option<Vec<u8>>;
}

/// One section of an opened object file as the debugger tracks it at
/// runtime: the half-open address range `[addr, endaddr)` plus the section's
/// index in the file's native enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSection {
    pub addr: u64,
    pub endaddr: u64,
    /// Index within the owning object file's section enumeration.
    pub index: usize,
}

/// A currently loaded shared library.
///
/// Owns the target-reported [`LmInfo`] record from construction until the
/// node is freed; no other component keeps a reference to it.
pub struct Solib {
    pub(crate) so_name: String,
    pub(crate) so_original_name: String,

    /// Lowest and highest address this library occupies, once known.
    /// `low <= high` always; `(0, 0)` when the range is unknown or empty.
    pub addr_low: u64,
    pub addr_high: u64,

    /// The opened object file for this library, if any. Set by the embedder
    /// once symbols are loaded; required before relocation can happen.
    pub objfile: Option<Box<dyn ObjectFile>>,

    pub(crate) lm_info: LmInfo,
}

impl Solib {
    /// Wrap a parsed record into a node, taking over its name.
    ///
    /// Both name fields get a bounded copy of the record's name, and the
    /// record's own name is cleared to mark the hand-off. [`Solib::free`]
    /// asserts on that marker.
    pub(crate) fn from_lm_info(mut lm_info: LmInfo) -> Solib {
        let so_name = bounded_so_name(&lm_info.name);
        lm_info.name.clear();

        Solib {
            so_original_name: so_name.clone(),
            so_name,
            addr_low: 0,
            addr_high: 0,
            objfile: None,
            lm_info,
        }
    }

    /// The library's display name, bounded to
    /// [`SO_NAME_MAX_PATH_SIZE`](crate::util::SO_NAME_MAX_PATH_SIZE).
    pub fn so_name(&self) -> &str {
        &self.so_name
    }

    /// The name the target originally reported, under the same bound.
    pub fn so_original_name(&self) -> &str {
        &self.so_original_name
    }

    /// The target-reported record backing this node. Opaque to the generic
    /// machinery; exposed read-only for diagnostics.
    pub fn lm_info(&self) -> &LmInfo {
        &self.lm_info
    }

    /// Release this node and its record.
    ///
    /// The record's name must already have been handed off to the node;
    /// anything else means a record escaped the builder.
    pub(crate) fn free(self) {
        assert!(
            self.lm_info.name.is_empty(),
            "freeing a solib whose record still owns its name"
        );
    }
}

impl fmt::Debug for Solib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Solib")
            .field("so_name", &self.so_name)
            .field("addr_low", &format_args!("{:#x}", self.addr_low))
            .field("addr_high", &format_args!("{:#x}", self.addr_high))
            .field("objfile", &self.objfile.as_ref().map(|_| ".."))
            .field("lm_info", &self.lm_info)
            .finish()
    }
}

/// Fetch, parse, and wrap the target's current library list.
///
/// An empty result covers both "target reported zero libraries" and "no
/// data / unparseable data"; parse problems surface as warnings only.
pub(crate) fn current_sos<T: LibraryProvider + ?Sized>(target: &mut T) -> Vec<Solib> {
    let Some(document) = target.read_library_list() else {
        return Vec::new();
    };

    let Some(library_list) = parser::parse_libraries(&document) else {
        return Vec::new();
    };

    library_list.into_iter().map(Solib::from_lm_info).collect()
}
