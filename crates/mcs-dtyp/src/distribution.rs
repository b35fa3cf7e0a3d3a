//! Equal distribution of `m` elements into `p` slots.
//!
//! The `p` ranges `[begin(m, p, 0), end(m, p, 0)) …` are a partition of
//! `[0, m)`: touching, starting at zero, with sizes differing pairwise by
//! at most one. `begin(m, p, p)` is well defined and equals `m`.

pub mod equal {
    pub fn begin(m: u64, p: u64, slot: u64) -> u64 {
        debug_assert!(slot <= p);
        slot * (m / p) + slot.min(m % p)
    }

    pub fn end(m: u64, p: u64, slot: u64) -> u64 {
        begin(m, p, slot + 1)
    }

    pub fn size(m: u64, p: u64, slot: u64) -> u64 {
        end(m, p, slot) - begin(m, p, slot)
    }
}

#[cfg(test)]
mod tests {
    use super::equal;

    #[test]
    fn ranges_partition_the_input() {
        for (m, p) in [(0u64, 1u64), (10, 3), (300, 3), (17, 17), (5, 8)] {
            assert_eq!(equal::begin(m, p, 0), 0);
            assert_eq!(equal::begin(m, p, p), m);
            for slot in 0..p {
                assert_eq!(equal::end(m, p, slot), equal::begin(m, p, slot + 1));
            }
        }
    }

    #[test]
    fn sizes_differ_pairwise_by_at_most_one() {
        for (m, p) in [(10u64, 3u64), (300, 7), (5, 8), (1000, 13)] {
            let sizes: Vec<u64> = (0..p).map(|slot| equal::size(m, p, slot)).collect();
            let min = sizes.iter().min().unwrap();
            let max = sizes.iter().max().unwrap();
            assert!(max - min <= 1, "m={m} p={p} sizes={sizes:?}");
        }
    }
}
