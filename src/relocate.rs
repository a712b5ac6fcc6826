//! Offset-table computation and per-section relocation.

use log::*;

use crate::objfile::{ObjectFile, SectionOffsets};
use crate::record::LmInfo;
use crate::solib::{Solib, TargetSection};

/// Relocate `sec`'s address bounds in place, using (and on first use,
/// building) the per-section offset table of the library that owns it.
///
/// The table can only be built once the object file is open, so it is
/// computed here on the first call and cached on the record; later calls
/// just look up and apply the section's offset. A mismatch between the
/// target's report and the file's layout downgrades to a warning, leaving
/// the offsets at zero and the library's range at `(0, 0)` — the library
/// stays visible, just un-relocated.
pub(crate) fn relocate_section_addresses(so: &mut Solib, sec: &mut TargetSection) {
    let Solib {
        so_name,
        addr_low,
        addr_high,
        objfile,
        lm_info,
        ..
    } = so;

    let Some(objfile) = objfile.as_deref() else {
        warn!("Could not relocate shared library \"{so_name}\": object file is not open");
        return;
    };

    if lm_info.offsets.is_none() {
        let (offsets, range) = compute_offsets(lm_info, objfile, so_name);
        if let Some((low, high)) = range {
            debug_assert!(low <= high);
            *addr_low = low;
            *addr_high = high;
        }
        lm_info.offsets = Some(offsets);
    }

    // cached by the block above on the first call
    let offset = match &lm_info.offsets {
        Some(offsets) => offsets.get(sec.index),
        None => 0,
    };
    sec.addr = sec.addr.wrapping_add(offset);
    sec.endaddr = sec.endaddr.wrapping_add(offset);
}

/// Build the offset table for one library, plus the address range to report
/// for it (`None` leaves the node's range untouched).
fn compute_offsets(
    lm_info: &LmInfo,
    objfile: &dyn ObjectFile,
    so_name: &str,
) -> (SectionOffsets, Option<(u64, u64)>) {
    debug!(
        "computing section offsets for \"{so_name}\" ({} segment bases, {} section bases)",
        lm_info.segment_bases.len(),
        lm_info.section_bases.len()
    );

    let mut offsets = SectionOffsets::new_zeroed(objfile.section_count());

    if !lm_info.section_bases.is_empty() {
        let sections = objfile.sections();
        let num_alloc_sections = sections.iter().filter(|s| s.is_alloc()).count();

        if num_alloc_sections != lm_info.section_bases.len() {
            warn!(
                "Could not relocate shared library \"{so_name}\": \
                 wrong number of ALLOC sections"
            );
            return (offsets, None);
        }

        let mut low = u64::MAX;
        let mut high = 0;
        let mut found_range = false;
        let mut bases_index = 0;

        for (index, section) in sections.iter().enumerate() {
            if !section.is_alloc() {
                continue;
            }
            let base = lm_info.section_bases[bases_index];
            bases_index += 1;

            if section.size > 0 {
                low = low.min(base);
                high = high.max(base.wrapping_add(section.size - 1));
                found_range = true;
            }
            offsets.set(index, base);
        }

        let range = if found_range { (low, high) } else { (0, 0) };
        (offsets, Some(range))
    } else if !lm_info.segment_bases.is_empty() {
        let Some(layout) = objfile.segment_layout().filter(|l| !l.is_empty()) else {
            warn!("Could not relocate shared library \"{so_name}\": no segments");
            return (offsets, None);
        };

        match objfile.map_segment_bases(&lm_info.segment_bases) {
            Some(mapped) => offsets = mapped,
            // keep the zeroed table, but still report a range below
            None => warn!("Could not relocate shared library \"{so_name}\": bad offsets"),
        }

        // Report any leading run of segments relocated by the same delta as
        // a single range. Segments past the reported bases are assumed to
        // keep the last known delta; whether targets actually intend that
        // extrapolation is an open question, but it matches long-standing
        // debugger behavior.
        let delta = lm_info.segment_bases[0].wrapping_sub(layout.bases[0]);
        let mut run_end = 1;
        while run_end < layout.len() {
            if run_end < lm_info.segment_bases.len()
                && lm_info.segment_bases[run_end].wrapping_sub(layout.bases[run_end]) != delta
            {
                break;
            }
            run_end += 1;
        }

        let low = lm_info.segment_bases[0];
        let end = layout.bases[run_end - 1]
            .wrapping_add(layout.sizes[run_end - 1])
            .wrapping_add(delta);
        // inclusive upper bound; a zero-length run collapses onto `low`
        let high = if end > low { end - 1 } else { low };

        (offsets, Some((low, high)))
    } else {
        // parser guarantees one base kind is present; a hand-built record
        // without bases just stays un-relocated
        (offsets, None)
    }
}
