// Resynchronization search.
//
// Given the old window `ow = old[o..o+W+A]` and the new window
// `nw = new[n..n+W+A]`, find the pair (d_old, d_new), both below W, with the
// smallest total skip d_old + d_new (ties: smaller d_old) such that
//
//   ow[d_old..d_old+A] == nw[d_new..d_new+A]
//
// Near the end of `new`, where fewer than A bytes remain after d_new, the
// remaining bytes must all match instead.
//
// Scanning is row by row over d_new. Each row only visits the old offsets
// whose first byte matches (via `AnchorIndex`), and the best pair found so
// far bounds the rest of the scan. The result equals a breadth-first scan
// over increasing d_old + d_new.

/// Outcome of a resynchronization search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resync {
    /// Skip `d_old` bytes of old and `d_new` bytes of new to realign.
    Found { d_old: usize, d_new: usize },
    NotFound,
}

// ---------------------------------------------------------------------------
// First-byte index over the old window
// ---------------------------------------------------------------------------

/// Offsets into the old search window, bucketed by byte value and sorted
/// ascending.
pub struct AnchorIndex {
    origin: Option<u64>,
    buckets: Vec<Vec<u32>>,
}

impl Default for AnchorIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl AnchorIndex {
    pub fn new() -> Self {
        Self {
            origin: None,
            buckets: vec![Vec::new(); 256],
        }
    }

    /// Whether the index describes the window starting at `origin`.
    pub fn is_built_for(&self, origin: u64) -> bool {
        self.origin == Some(origin)
    }

    /// Index the first `search_window` bytes of `old_window`.
    pub fn rebuild(&mut self, origin: u64, old_window: &[u8], search_window: usize) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        // Config::validate caps the window, so every offset fits in u32.
        for (d_old, &byte) in old_window.iter().take(search_window).enumerate() {
            self.buckets[byte as usize].push(d_old as u32);
        }
        self.origin = Some(origin);
    }

    #[inline]
    fn candidates(&self, byte: u8) -> &[u32] {
        &self.buckets[byte as usize]
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Search rows `first_row..min(search_window, nw.len())`.
///
/// Rows below `first_row` are assumed to have been scanned against the same
/// old window without a hit. Returns the result and the end of the scanned
/// row range, so a later search from a further position in `new` can skip
/// what was already covered.
pub fn search(
    index: &AnchorIndex,
    ow: &[u8],
    nw: &[u8],
    anchor_length: usize,
    search_window: usize,
    first_row: usize,
) -> (Resync, usize) {
    let rows_end = search_window.min(nw.len());
    let mut best: Option<(usize, usize)> = None;

    for d_new in first_row..rows_end {
        if let Some((bo, bn)) = best {
            if d_new > bo + bn {
                break;
            }
        }
        // Fewer than A bytes left in new: the tail itself is the anchor.
        let need = (nw.len() - d_new).min(anchor_length);
        let target = &nw[d_new..d_new + need];

        for &d_old in index.candidates(target[0]) {
            let d_old = d_old as usize;
            if let Some((bo, bn)) = best {
                if (d_old + d_new, d_old) >= (bo + bn, bo) {
                    break;
                }
            }
            if d_old + need > ow.len() {
                break;
            }
            if &ow[d_old..d_old + need] == target {
                best = Some((d_old, d_new));
                break;
            }
        }
    }

    let result = match best {
        Some((d_old, d_new)) => Resync::Found { d_old, d_new },
        None => Resync::NotFound,
    };
    (result, rows_end)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn run(ow: &[u8], nw: &[u8], a: usize, w: usize) -> Resync {
        let mut index = AnchorIndex::new();
        index.rebuild(0, ow, w);
        search(&index, ow, nw, a, w, 0).0
    }

    /// Literal breadth-first scan used as the reference ordering.
    fn brute_force(ow: &[u8], nw: &[u8], a: usize, w: usize) -> Resync {
        for s in 0..2 * w {
            for d_old in 0..=s {
                let d_new = s - d_old;
                if d_old >= w || d_new >= w || d_new >= nw.len() {
                    continue;
                }
                let need = (nw.len() - d_new).min(a);
                if d_old + need <= ow.len() && ow[d_old..d_old + need] == nw[d_new..d_new + need] {
                    return Resync::Found { d_old, d_new };
                }
            }
        }
        Resync::NotFound
    }

    #[test]
    fn finds_shared_tail() {
        assert_eq!(
            run(b"DEFGHIJ", b"XYZGHIJ", 8, 4096),
            Resync::Found { d_old: 3, d_new: 3 }
        );
    }

    #[test]
    fn prefers_smallest_total_skip() {
        // "abcd" at (0, 5) has s = 5, at (2, 1) has s = 3.
        let ow = b"xxabcdyy";
        let nw = b"_abcd_abcd";
        assert_eq!(run(ow, nw, 4, 16), Resync::Found { d_old: 2, d_new: 1 });
    }

    #[test]
    fn ties_go_to_smaller_old_skip() {
        // "BBB" at (6, 0) and "AAA" at (2, 4) both have s = 6.
        let ow = b"..AAA.BBB";
        let nw = b"BBB_AAA";
        let expected = brute_force(ow, nw, 3, 16);
        assert_eq!(expected, Resync::Found { d_old: 2, d_new: 4 });
        assert_eq!(run(ow, nw, 3, 16), expected);
    }

    #[test]
    fn respects_window() {
        let mut ow = vec![b'.'; 20];
        ow.extend_from_slice(b"ANCHOR");
        let nw = b"ANCHOR";
        assert_eq!(run(&ow, nw, 6, 16), Resync::NotFound);
        assert_eq!(run(&ow, nw, 6, 32), Resync::Found { d_old: 20, d_new: 0 });
    }

    #[test]
    fn incremental_rows_match_full_scan() {
        let ow = b"qwertyuiopasdfghjkl";
        let nw = b"zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz";
        let mut index = AnchorIndex::new();
        index.rebuild(0, ow, 8);
        let (r, end) = search(&index, ow, nw, 4, 8, 0);
        assert_eq!(r, Resync::NotFound);
        assert_eq!(end, 8);
        // One byte later only row 7 is new.
        let (r, _) = search(&index, ow, &nw[1..], 4, 8, end - 1);
        assert_eq!(r, Resync::NotFound);
    }

    #[test]
    fn agrees_with_breadth_first_reference() {
        use rand::{Rng, SeedableRng, rngs::StdRng};

        // Small alphabet so partial matches are common.
        let mut rng = StdRng::seed_from_u64(0x2545_F491_4F6C_DD1D);
        for _ in 0..200 {
            let ow: Vec<u8> = (0..24).map(|_| rng.random_range(b'a'..=b'd')).collect();
            let nw: Vec<u8> = (0..24).map(|_| rng.random_range(b'a'..=b'd')).collect();
            for (a, w) in [(2, 8), (3, 16), (4, 20)] {
                assert_eq!(
                    run(&ow, &nw, a, w),
                    brute_force(&ow, &nw, a, w),
                    "ow={ow:?} nw={nw:?} a={a} w={w}"
                );
            }
        }
    }
}
