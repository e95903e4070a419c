//! Minimum-size filter for detected source regions.
//!
//! Regions are 8-connected groups of set bits. Rows are run-length encoded
//! and runs of adjacent rows are merged with a union-find, so the cost scales
//! with the number of runs rather than the number of pixels.

use common::BitBuffer2;

/// A horizontal run of set bits in one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    y: u32,
    start: u32, // inclusive
    end: u32,   // exclusive
}

impl Run {
    #[inline]
    fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    /// 8-connectivity: runs on adjacent rows touch when they overlap or meet
    /// diagonally.
    #[inline]
    fn touches(&self, below: &Run) -> bool {
        self.start < below.end + 1 && self.end + 1 > below.start
    }
}

/// Append the runs of one packed row, scanning word by word.
fn extract_runs(words: &[u64], width: usize, y: u32, runs: &mut Vec<Run>) {
    let mut open: Option<u32> = None;

    for (word_idx, &word) in words.iter().enumerate() {
        let base = (word_idx * 64) as u32;
        let mut bit = 0u32;
        while bit < 64 {
            let rest = word >> bit;
            match open {
                Some(start) => {
                    let ones = rest.trailing_ones();
                    if ones >= 64 - bit {
                        break;
                    }
                    bit += ones;
                    runs.push(Run {
                        y,
                        start,
                        end: base + bit,
                    });
                    open = None;
                }
                None => {
                    if rest == 0 {
                        break;
                    }
                    bit += rest.trailing_zeros();
                    open = Some(base + bit);
                }
            }
        }
    }

    if let Some(start) = open {
        runs.push(Run {
            y,
            start,
            end: width as u32,
        });
    }
}

/// Union-find over run indices.
struct DisjointSet {
    parent: Vec<u32>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len as u32).collect(),
        }
    }

    fn find(&mut self, mut node: u32) -> u32 {
        while self.parent[node as usize] != node {
            let grandparent = self.parent[self.parent[node as usize] as usize];
            self.parent[node as usize] = grandparent;
            node = grandparent;
        }
        node
    }

    fn union(&mut self, a: u32, b: u32) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi as usize] = lo;
        }
    }
}

/// Clear every 8-connected region with fewer than `min_pixels` set bits.
///
/// Returns the number of regions kept.
pub fn remove_small_regions(mask: &mut BitBuffer2, min_pixels: usize) -> usize {
    let width = mask.width();
    let mut runs = Vec::new();
    for y in 0..mask.height() {
        extract_runs(mask.row_words(y), width, y as u32, &mut runs);
    }
    if runs.is_empty() {
        return 0;
    }

    let mut sets = DisjointSet::new(runs.len());

    // Runs are ordered by row then column; `prev` spans the previous row.
    let mut prev = 0..0;
    let mut row_start = 0;
    while row_start < runs.len() {
        let y = runs[row_start].y;
        let row_end = runs[row_start..]
            .iter()
            .position(|r| r.y != y)
            .map_or(runs.len(), |n| row_start + n);

        if prev.end > prev.start && runs[prev.start].y + 1 == y {
            for curr in row_start..row_end {
                for above in prev.clone() {
                    if runs[above].start > runs[curr].end {
                        break;
                    }
                    if runs[above].touches(&runs[curr]) {
                        sets.union(above as u32, curr as u32);
                    }
                }
            }
        }

        prev = row_start..row_end;
        row_start = row_end;
    }

    let mut sizes = vec![0usize; runs.len()];
    for (idx, run) in runs.iter().enumerate() {
        sizes[sets.find(idx as u32) as usize] += run.len();
    }

    let mut kept = 0;
    for (idx, run) in runs.iter().enumerate() {
        let root = sets.find(idx as u32) as usize;
        if sizes[root] < min_pixels {
            for x in run.start..run.end {
                mask.set_xy(x as usize, run.y as usize, false);
            }
        } else if root == idx {
            kept += 1;
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from_rows(rows: &[&str]) -> BitBuffer2 {
        let width = rows[0].len();
        let data: Vec<bool> = rows
            .iter()
            .flat_map(|r| r.chars().map(|c| c == '#'))
            .collect();
        BitBuffer2::from_slice(width, rows.len(), &data)
    }

    #[test]
    fn test_extract_runs_across_words() {
        let mut mask = BitBuffer2::new_default(130, 1);
        for x in 60..70 {
            mask.set_xy(x, 0, true);
        }
        mask.set_xy(129, 0, true);
        let mut runs = Vec::new();
        extract_runs(mask.row_words(0), 130, 0, &mut runs);
        assert_eq!(
            runs,
            vec![
                Run {
                    y: 0,
                    start: 60,
                    end: 70
                },
                Run {
                    y: 0,
                    start: 129,
                    end: 130
                },
            ]
        );
    }

    #[test]
    fn test_full_row_run() {
        let mask = BitBuffer2::new_filled(128, 1, true);
        let mut runs = Vec::new();
        extract_runs(mask.row_words(0), 128, 0, &mut runs);
        assert_eq!(runs.len(), 1);
        assert_eq!((runs[0].start, runs[0].end), (0, 128));
    }

    #[test]
    fn test_removes_isolated_pixels() {
        let mut mask = mask_from_rows(&[
            "#.......", //
            "....##..", //
            "....##..", //
            "........", //
            ".......#", //
        ]);
        let kept = remove_small_regions(&mut mask, 3);
        assert_eq!(kept, 1);
        assert_eq!(mask.count_ones(), 4);
        assert!(!mask.get_xy(0, 0));
        assert!(!mask.get_xy(7, 4));
    }

    #[test]
    fn test_diagonal_pixels_are_connected() {
        let mut mask = mask_from_rows(&[
            "#...", //
            ".#..", //
            "..#.", //
        ]);
        let kept = remove_small_regions(&mut mask, 3);
        assert_eq!(kept, 1);
        assert_eq!(mask.count_ones(), 3);
    }

    #[test]
    fn test_u_shape_merges_late() {
        // Two columns joined only by the bottom row.
        let mut mask = mask_from_rows(&[
            "#..#", //
            "#..#", //
            "####", //
        ]);
        let kept = remove_small_regions(&mut mask, 8);
        assert_eq!(kept, 1);
        assert_eq!(mask.count_ones(), 8);
    }

    #[test]
    fn test_gap_row_breaks_connection() {
        let mut mask = mask_from_rows(&[
            "##", //
            "..", //
            "##", //
        ]);
        let kept = remove_small_regions(&mut mask, 3);
        assert_eq!(kept, 0);
        assert_eq!(mask.count_ones(), 0);
    }
}
