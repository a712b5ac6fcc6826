//! An [`ObjectFile`] backed by goblin's ELF parser.
//!
//! The debugger embedding this crate usually brings its own object-file
//! layer; this adapter covers the common ELF case so the relocation engine
//! can be used against real images out of the box.

use goblin::elf::program_header::PT_LOAD;
use goblin::elf::section_header::{SHF_ALLOC, SHF_EXECINSTR, SHF_WRITE};
use goblin::elf::Elf;

use crate::objfile::{ObjectFile, Section, SectionFlags, SectionOffsets, SegmentLayout};

/// Section and segment layout extracted from an ELF image.
///
/// All layout data is copied out during [`parse`](ElfObjectFile::parse), so
/// the file's bytes don't need to stay around.
pub struct ElfObjectFile {
    sections: Vec<Section>,
    /// Link-time virtual address of each section, native order.
    section_vaddrs: Vec<u64>,
    /// One entry per `PT_LOAD` program header, in file order.
    segments: Option<SegmentLayout>,
}

impl ElfObjectFile {
    /// Extract the layout of an ELF image.
    pub fn parse(bytes: &[u8]) -> Result<ElfObjectFile, goblin::error::Error> {
        let elf = Elf::parse(bytes)?;

        let mut sections = Vec::with_capacity(elf.section_headers.len());
        let mut section_vaddrs = Vec::with_capacity(elf.section_headers.len());
        for header in &elf.section_headers {
            let name = elf
                .shdr_strtab
                .get_at(header.sh_name)
                .unwrap_or("")
                .to_owned();

            let mut flags = SectionFlags::empty();
            if header.sh_flags & SHF_ALLOC as u64 != 0 {
                flags |= SectionFlags::ALLOC | SectionFlags::LOAD;
            }
            if header.sh_flags & SHF_EXECINSTR as u64 != 0 {
                flags |= SectionFlags::CODE;
            }
            if header.sh_flags & SHF_WRITE as u64 != 0 {
                flags |= SectionFlags::DATA;
            }

            sections.push(Section {
                name,
                flags,
                size: header.sh_size,
            });
            section_vaddrs.push(header.sh_addr);
        }

        let mut bases = Vec::new();
        let mut sizes = Vec::new();
        for header in &elf.program_headers {
            if header.p_type == PT_LOAD {
                bases.push(header.p_vaddr);
                sizes.push(header.p_memsz);
            }
        }
        let segments = if bases.is_empty() {
            None
        } else {
            Some(SegmentLayout { bases, sizes })
        };

        Ok(ElfObjectFile {
            sections,
            section_vaddrs,
            segments,
        })
    }

    /// The index of the `PT_LOAD` segment containing `vaddr`, if any.
    fn segment_containing(&self, layout: &SegmentLayout, vaddr: u64) -> Option<usize> {
        layout
            .bases
            .iter()
            .zip(&layout.sizes)
            .position(|(&base, &size)| vaddr >= base && vaddr - base < size.max(1))
    }
}

impl ObjectFile for ElfObjectFile {
    fn section_count(&self) -> usize {
        self.sections.len()
    }

    fn sections(&self) -> &[Section] {
        &self.sections
    }

    fn segment_layout(&self) -> Option<SegmentLayout> {
        self.segments.clone()
    }

    fn map_segment_bases(&self, bases: &[u64]) -> Option<SectionOffsets> {
        let layout = self.segments.as_ref()?;
        if bases.is_empty() {
            return None;
        }

        // delta for segment `index`, with segments past the reported bases
        // continuing the last known delta
        let delta_for = |index: usize| {
            let clamped = index.min(bases.len() - 1).min(layout.len() - 1);
            bases[clamped].wrapping_sub(layout.bases[clamped])
        };

        let mut offsets = SectionOffsets::new_zeroed(self.sections.len());
        for (index, section) in self.sections.iter().enumerate() {
            if !section.is_alloc() {
                continue;
            }
            // an allocatable section outside every PT_LOAD means the image
            // and its headers disagree; give up on the mapping
            let segment = self.segment_containing(layout, self.section_vaddrs[index])?;
            offsets.set(index, delta_for(segment));
        }

        Some(offsets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc() -> SectionFlags {
        SectionFlags::ALLOC | SectionFlags::LOAD
    }

    fn fixture() -> ElfObjectFile {
        // .text in segment 0, .data/.bss in segment 1, .comment unmapped
        ElfObjectFile {
            sections: vec![
                Section {
                    name: ".text".to_owned(),
                    flags: alloc() | SectionFlags::CODE,
                    size: 0x400,
                },
                Section {
                    name: ".data".to_owned(),
                    flags: alloc() | SectionFlags::DATA,
                    size: 0x100,
                },
                Section {
                    name: ".bss".to_owned(),
                    flags: alloc() | SectionFlags::DATA,
                    size: 0x80,
                },
                Section {
                    name: ".comment".to_owned(),
                    flags: SectionFlags::empty(),
                    size: 0x20,
                },
            ],
            section_vaddrs: vec![0x0, 0x1000, 0x1100, 0x0],
            segments: Some(SegmentLayout {
                bases: vec![0x0, 0x1000],
                sizes: vec![0x400, 0x180],
            }),
        }
    }

    #[test]
    fn bases_map_to_per_section_deltas() {
        let objfile = fixture();
        let offsets = objfile.map_segment_bases(&[0x40000, 0x50000]).unwrap();
        assert_eq!(offsets.get(0), 0x40000); // .text: 0x40000 - 0x0
        assert_eq!(offsets.get(1), 0x50000 - 0x1000); // .data
        assert_eq!(offsets.get(2), 0x50000 - 0x1000); // .bss
        assert_eq!(offsets.get(3), 0); // .comment untouched
    }

    #[test]
    fn trailing_segments_reuse_last_delta() {
        let objfile = fixture();
        let offsets = objfile.map_segment_bases(&[0x40000]).unwrap();
        assert_eq!(offsets.get(0), 0x40000);
        // segment 1 has no reported base; it keeps segment 0's delta
        assert_eq!(offsets.get(1), 0x40000);
        assert_eq!(offsets.get(2), 0x40000);
    }

    #[test]
    fn unmappable_section_fails_the_mapping() {
        let mut objfile = fixture();
        objfile.section_vaddrs[1] = 0x9000; // .data outside both PT_LOADs
        assert!(objfile.map_segment_bases(&[0x40000, 0x50000]).is_none());
    }

    #[test]
    fn no_bases_fails_the_mapping() {
        assert!(fixture().map_segment_bases(&[]).is_none());
    }
}
