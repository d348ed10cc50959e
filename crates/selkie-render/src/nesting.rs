//! Fragment nesting analysis within one chunk.
//!
//! Highlight boxes for nested spans shrink inward so the outer and inner
//! highlight stay distinguishable; the background draw order puts deeper
//! boxes on top. Depth and height come from two sweeps, left-to-right and
//! right-to-left, and each fragment keeps the maximum of the two.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Nesting {
    /// How many still-open fragments enclose this one.
    pub depth: usize,
    /// Over how many later fragments this one stays open.
    pub height: usize,
}

/// Computes nesting for fragments given as `(from, to)` extents. The result
/// is index-parallel to the input.
pub fn compute(extents: &[(usize, usize)]) -> Vec<Nesting> {
    let n = extents.len();

    let mut lr: Vec<usize> = (0..n).collect();
    lr.sort_by(|&a, &b| match extents[a].0.cmp(&extents[b].0) {
        Ordering::Equal => extents[b].1.cmp(&extents[a].1),
        other => other,
    });
    let (depth_lr, height_lr) = sweep(&lr, |o, c| extents[o].1 > extents[c].0, n);

    let mut rl: Vec<usize> = (0..n).collect();
    rl.sort_by(|&a, &b| match extents[b].1.cmp(&extents[a].1) {
        Ordering::Equal => extents[a].0.cmp(&extents[b].0),
        other => other,
    });
    let (depth_rl, height_rl) = sweep(&rl, |o, c| extents[o].0 < extents[c].1, n);

    (0..n)
        .map(|i| Nesting {
            depth: depth_lr[i].max(depth_rl[i]),
            height: height_lr[i].max(height_rl[i]),
        })
        .collect()
}

fn sweep(
    order: &[usize],
    still_open: impl Fn(usize, usize) -> bool,
    n: usize,
) -> (Vec<usize>, Vec<usize>) {
    let mut depth = vec![0usize; n];
    let mut height = vec![0usize; n];
    let mut open: Vec<usize> = Vec::new();
    for &current in order {
        open.retain(|&o| still_open(o, current));
        for &o in &open {
            height[o] += 1;
        }
        depth[current] = open.len();
        open.push(current);
    }
    (depth, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_fragments_have_no_nesting() {
        let n = compute(&[(0, 5), (6, 10)]);
        assert_eq!(n[0], Nesting::default());
        assert_eq!(n[1], Nesting::default());
    }

    #[test]
    fn contained_fragment_gains_depth_and_container_gains_height() {
        let n = compute(&[(0, 10), (2, 5)]);
        assert_eq!(n[0].depth, 0);
        assert!(n[0].height >= 1);
        assert_eq!(n[1].depth, 1);
        assert_eq!(n[1].height, 0);
    }

    #[test]
    fn double_nesting_counts_both_ancestors() {
        let n = compute(&[(0, 12), (1, 10), (2, 5)]);
        assert_eq!(n[2].depth, 2);
        assert!(n[0].height >= 2);
        assert!(n[1].height >= 1);
    }

    #[test]
    fn partial_overlap_registers_in_one_sweep() {
        // (0,6) and (4,10) overlap without containment; the right-to-left
        // sweep sees (4,10) still open over (0,6)
        let n = compute(&[(0, 6), (4, 10)]);
        assert!(n[0].depth + n[1].depth >= 1);
    }

    #[test]
    fn identical_extents_stack() {
        let n = compute(&[(0, 5), (0, 5)]);
        assert_eq!(n[0].depth + n[1].depth, 1);
    }
}
