//! Per-library state, as reported by the target.

use crate::objfile::SectionOffsets;

/// Everything this crate knows about one reported library.
///
/// A target reports either one base address per loadable segment or one per
/// allocatable section, never both; the parser rejects documents that mix
/// the two kinds on a single library.
#[derive(Debug, Default)]
pub struct LmInfo {
    /// The library's name. The name normally lives on the [`Solib`] node;
    /// it is only held here between parsing and hand-off, and is cleared
    /// when the node takes ownership of it.
    ///
    /// [`Solib`]: crate::solib::Solib
    pub(crate) name: String,

    /// Base addresses for each independently relocatable segment.
    pub segment_bases: Vec<u64>,

    /// Base addresses for each independently relocatable, allocatable
    /// section.
    pub section_bases: Vec<u64>,

    /// Cached per-section offsets, determined from `segment_bases` or
    /// `section_bases` once the object file is open. Computed at most once.
    pub(crate) offsets: Option<SectionOffsets>,
}

impl LmInfo {
    /// A fresh record for a library named `name`, with no bases yet.
    pub fn named(name: impl Into<String>) -> Self {
        LmInfo {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The library's name, while this record still owns it.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Has at least one segment or section base been reported?
    pub fn has_bases(&self) -> bool {
        !self.segment_bases.is_empty() || !self.section_bases.is_empty()
    }
}
