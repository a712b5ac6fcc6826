//! Layout queries against an opened object file.
//!
//! The debugger's object-file reader (BFD, goblin, whatever the embedder
//! uses) sits behind the [`ObjectFile`] trait. This crate only needs the
//! section list in native enumeration order, each section's flags and size,
//! and — for targets that report per-segment bases — the file's natural
//! segment layout plus a way to spread N reported bases across it.

use bitflags::bitflags;

bitflags! {
    /// Section attribute flags, in the spirit of BFD's `SEC_*` bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u32 {
        /// The section occupies space in the process image at runtime.
        const ALLOC = 1 << 0;
        /// The section's contents are loaded from the file.
        const LOAD = 1 << 1;
        /// The section contains executable code.
        const CODE = 1 << 2;
        /// The section contains data.
        const DATA = 1 << 3;
    }
}

/// One section of an object file, in native enumeration order.
#[derive(Debug, Clone)]
pub struct Section {
    /// Section name (".text", ".data", ...). Informational only.
    pub name: String,
    /// Attribute flags. Only [`SectionFlags::ALLOC`] matters for relocation.
    pub flags: SectionFlags,
    /// Section size in bytes.
    pub size: u64,
}

impl Section {
    /// Does this section occupy space in the process image?
    pub fn is_alloc(&self) -> bool {
        self.flags.contains(SectionFlags::ALLOC)
    }
}

/// Per-section address deltas, indexed by the object file's native section
/// enumeration order. The index space is fixed once the file is open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionOffsets(Vec<u64>);

impl SectionOffsets {
    /// An all-zero table for a file with `num_sections` sections.
    pub fn new_zeroed(num_sections: usize) -> Self {
        SectionOffsets(vec![0; num_sections])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The offset for section `index`. Out-of-range indices read as zero, so
    /// an un-relocated library applies the identity offset everywhere.
    pub fn get(&self, index: usize) -> u64 {
        self.0.get(index).copied().unwrap_or(0)
    }

    pub fn set(&mut self, index: usize, offset: u64) {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = offset;
        }
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }
}

/// The file-declared layout of an object's loadable segments.
///
/// `bases[i]` is the address segment `i` was linked at, `sizes[i]` its size
/// in memory. The vectors are expected to have the same length; a segment
/// is only considered described when it has both, so a lopsided layout is
/// treated as the well-formed prefix rather than indexed out of bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentLayout {
    pub bases: Vec<u64>,
    pub sizes: Vec<u64>,
}

impl SegmentLayout {
    /// Number of fully described segments (a base and a size).
    pub fn len(&self) -> usize {
        self.bases.len().min(self.sizes.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An opened object file, as far as relocation is concerned.
pub trait ObjectFile {
    /// Number of sections, fixing the index space of the offset table.
    fn section_count(&self) -> usize;

    /// All sections, in native enumeration order.
    fn sections(&self) -> &[Section];

    /// The file's natural segment layout, or `None` if the file has no
    /// segment information (e.g. a relocatable object).
    fn segment_layout(&self) -> Option<SegmentLayout>;

    /// Map per-segment target bases onto the file's segments, producing one
    /// offset per section. Bases beyond the file's segment count are
    /// ignored; segments beyond `bases.len()` take the last reported base's
    /// delta. Returns `None` if the mapping cannot be computed (no segment
    /// layout, or a section that belongs to no segment).
    fn map_segment_bases(&self, bases: &[u64]) -> Option<SectionOffsets>;
}
