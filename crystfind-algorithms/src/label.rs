//! Connected-component labeling of boolean images.
//!
//! Uses a union-find data structure over provisional labels from a single
//! raster pass, then renumbers components in raster order of their first
//! pixel.

use ndarray::{Array2, ArrayView2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pixel neighborhood used for labeling and morphology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Connectivity {
    /// Edge-sharing neighbors only.
    Four,
    /// Edge- and corner-sharing neighbors.
    #[default]
    Eight,
}

impl Connectivity {
    /// Neighbor offsets that precede a pixel in raster order.
    #[must_use]
    pub fn forward_offsets(self) -> &'static [(isize, isize)] {
        match self {
            Self::Four => &[(-1, 0), (0, -1)],
            Self::Eight => &[(-1, -1), (-1, 0), (-1, 1), (0, -1)],
        }
    }

    /// All neighbor offsets.
    #[must_use]
    pub fn offsets(self) -> &'static [(isize, isize)] {
        match self {
            Self::Four => &[(-1, 0), (0, -1), (0, 1), (1, 0)],
            Self::Eight => &[
                (-1, -1),
                (-1, 0),
                (-1, 1),
                (0, -1),
                (0, 1),
                (1, -1),
                (1, 0),
                (1, 1),
            ],
        }
    }
}

/// Offsets `(row, col)` by `(dr, dc)`, returning `None` outside `dim`.
#[inline]
pub(crate) fn neighbor(
    (row, col): (usize, usize),
    (dr, dc): (isize, isize),
    (rows, cols): (usize, usize),
) -> Option<(usize, usize)> {
    let r = row.checked_add_signed(dr)?;
    let c = col.checked_add_signed(dc)?;
    (r < rows && c < cols).then_some((r, c))
}

/// Union-Find data structure for connected component detection.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    fn new() -> Self {
        // Slot 0 is the background label.
        Self {
            parent: vec![0],
            rank: vec![0],
        }
    }

    fn make_set(&mut self) -> usize {
        let id = self.parent.len();
        self.parent.push(id);
        self.rank.push(0);
        id
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, x: usize, y: usize) {
        let px = self.find(x);
        let py = self.find(y);

        if px == py {
            return;
        }

        match self.rank[px].cmp(&self.rank[py]) {
            std::cmp::Ordering::Less => self.parent[px] = py,
            std::cmp::Ordering::Greater => self.parent[py] = px,
            std::cmp::Ordering::Equal => {
                self.parent[py] = px;
                self.rank[px] += 1;
            }
        }
    }
}

/// Labeled image: `0` is background, components are numbered from `1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    labels: Array2<usize>,
    count: usize,
}

impl Labels {
    /// Number of components.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Label image.
    #[must_use]
    pub fn as_array(&self) -> &Array2<usize> {
        &self.labels
    }

    /// Consumes the labeling and returns the label image.
    #[must_use]
    pub fn into_array(self) -> Array2<usize> {
        self.labels
    }

    /// Pixel count of every component, indexed by `label - 1`.
    #[must_use]
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.count];
        for &label in &self.labels {
            if label > 0 {
                sizes[label - 1] += 1;
            }
        }
        sizes
    }

    /// Unweighted `(row, col)` centroid of every component, in label order.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn centroids(&self) -> Vec<(f64, f64)> {
        let mut sums = vec![(0.0, 0.0, 0_usize); self.count];
        for ((row, col), &label) in self.labels.indexed_iter() {
            if label > 0 {
                let entry = &mut sums[label - 1];
                entry.0 += row as f64;
                entry.1 += col as f64;
                entry.2 += 1;
            }
        }
        sums.into_iter()
            .map(|(r, c, n)| (r / n as f64, c / n as f64))
            .collect()
    }
}

/// Labels the `true` pixels of `mask` into connected components.
#[must_use]
pub fn label(mask: ArrayView2<'_, bool>, connectivity: Connectivity) -> Labels {
    let dim = mask.dim();
    let mut provisional = Array2::<usize>::zeros(dim);
    let mut uf = UnionFind::new();

    for ((row, col), &set) in mask.indexed_iter() {
        if !set {
            continue;
        }
        let mut current = 0;
        for &offset in connectivity.forward_offsets() {
            let Some(pos) = neighbor((row, col), offset, dim) else {
                continue;
            };
            let other = provisional[pos];
            if other == 0 {
                continue;
            }
            if current == 0 {
                current = other;
            } else {
                uf.union(current, other);
            }
        }
        if current == 0 {
            current = uf.make_set();
        }
        provisional[[row, col]] = current;
    }

    // Renumber roots in raster order of first appearance.
    let mut final_of_root = vec![0; uf.parent.len()];
    let mut count = 0;
    for label in &mut provisional {
        if *label == 0 {
            continue;
        }
        let root = uf.find(*label);
        if final_of_root[root] == 0 {
            count += 1;
            final_of_root[root] = count;
        }
        *label = final_of_root[root];
    }

    Labels {
        labels: provisional,
        count,
    }
}
