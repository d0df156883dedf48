//! UCSC-style hierarchical interval bins. The finest level covers 128 Kb
//! per bin, each level above widens by a factor of 8, with first-of-level
//! offsets 585, 73, 9, 1, 0 (finest first). An interval lands in the
//! smallest bin that wholly contains it; the same constants drive both
//! the insert-side assignment and the query-side enumeration, so the two
//! always agree.

/// log2 of the finest bin extent (128 Kb).
const FIRST_SHIFT: u32 = 17;
/// log2 of the per-level widening factor.
const NEXT_SHIFT: u32 = 3;
/// First bin id of each level, finest level first.
const LEVEL_OFFSETS: [u32; 5] = [585, 73, 9, 1, 0];

/// Smallest bin containing [start, end). Empty intervals are treated as
/// one base wide. Coordinates beyond the addressable range fall back to
/// the root bin.
#[must_use]
pub fn bin_of(start: u32, end: u32) -> u32 {
    let last = end.max(start + 1) - 1;
    let mut lo = start >> FIRST_SHIFT;
    let mut hi = last >> FIRST_SHIFT;
    for offset in LEVEL_OFFSETS {
        if lo == hi {
            return offset + lo;
        }
        lo >>= NEXT_SHIFT;
        hi >>= NEXT_SHIFT;
    }
    0
}

/// Every bin whose extent can overlap [start, end), across all levels.
/// Feed the result to `WHERE bin IN (...)` over `field_position`.
#[must_use]
pub fn overlapping_bins(start: u32, end: u32) -> Vec<u32> {
    let last = end.max(start + 1) - 1;
    let mut lo = start >> FIRST_SHIFT;
    let mut hi = last >> FIRST_SHIFT;
    let mut bins = Vec::new();
    for offset in LEVEL_OFFSETS {
        for bin in lo..=hi {
            bins.push(offset + bin);
        }
        lo >>= NEXT_SHIFT;
        hi >>= NEXT_SHIFT;
    }
    bins
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_interval_lands_in_finest_level() {
        assert_eq!(bin_of(0, 100), 585);
        assert_eq!(bin_of(1 << 17, (1 << 17) + 1), 586);
    }

    #[test]
    fn straddling_interval_climbs_a_level() {
        // Crosses the first 128 Kb boundary, so the 1 Mb level holds it.
        assert_eq!(bin_of((1 << 17) - 10, (1 << 17) + 10), 73);
    }

    #[test]
    fn whole_chromosome_is_the_root_bin() {
        assert_eq!(bin_of(0, 249_000_000), 0);
    }

    #[test]
    fn empty_interval_is_one_base() {
        assert_eq!(bin_of(500, 500), bin_of(500, 501));
    }

    #[test]
    fn query_enumeration_contains_every_stored_bin() {
        // Any interval contained in the query range must have its bin in
        // the enumerated set.
        let cases = [
            (0_u32, 300_000_u32),
            (120_000, 140_000),
            (1_000_000, 9_000_000),
            (0, 200_000_000),
        ];
        for (qs, qe) in cases {
            let bins = overlapping_bins(qs, qe);
            let mut s = qs;
            while s < qe {
                let e = (s + 77_777).min(qe);
                assert!(
                    bins.contains(&bin_of(s, e)),
                    "bin_of({s},{e}) missing from overlapping_bins({qs},{qe})"
                );
                s += 99_999;
            }
        }
    }

    #[test]
    fn levels_do_not_collide() {
        // 128 Kb and 1 Mb bins of the same region get distinct ids.
        assert_ne!(bin_of(0, 1000), bin_of(0, 1 << 20));
    }
}
