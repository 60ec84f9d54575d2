//! Exact nearest-neighbor search over squared L2 distance.

use super::RowId;

/// A search hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: RowId,
    /// Squared Euclidean distance to the query.
    pub distance: f32,
}

/// Flat vector index: vectors stored contiguously, searched by brute force.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row id the next added vector will receive.
    pub fn next_row(&self) -> RowId {
        RowId(self.len())
    }

    /// Append a vector and return its row id.
    ///
    /// Callers check the dimension first; [`super::KnowledgeBase::commit`]
    /// does so for the whole batch before touching the index.
    pub(crate) fn add(&mut self, vector: &[f32]) -> RowId {
        debug_assert_eq!(vector.len(), self.dimension);
        let row = self.next_row();
        self.data.extend_from_slice(vector);
        row
    }

    /// Stored vector for `row`, if present.
    pub fn vector(&self, row: RowId) -> Option<&[f32]> {
        let start = row.0.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Iterate `(row, vector)` pairs in row order.
    pub fn iter(&self) -> impl Iterator<Item = (RowId, &[f32])> {
        self.data
            .chunks_exact(self.dimension.max(1))
            .enumerate()
            .map(|(idx, v)| (RowId(idx), v))
    }

    /// The `k` nearest rows to `query`, ascending by distance, ties broken by
    /// the lower row id.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        if k == 0 || self.is_empty() || query.len() != self.dimension {
            return Vec::new();
        }

        let mut hits: Vec<Neighbor> = self
            .iter()
            .map(|(row, vector)| Neighbor {
                row,
                distance: squared_l2(query, vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            sort_key(a.distance)
                .total_cmp(&sort_key(b.distance))
                .then(a.row.cmp(&b.row))
        });
        hits.truncate(k);
        hits
    }
}

/// NaN of either sign ranks with the farthest rows.
fn sort_key(distance: f32) -> f32 {
    if distance.is_nan() {
        f32::INFINITY
    } else {
        distance
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
