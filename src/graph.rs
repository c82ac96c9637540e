//! Sparse nearest-neighbour graphs between point sets.

use linfa::Float;
use linfa_nn::{distance::Distance, NearestNeighbour};
use ndarray::{ArrayBase, Data, Ix2};
use sprs::CsMat;

use crate::error::{DiffusionMapError, Result};

/// Directed graph of the `k` nearest reference points for every query point.
///
/// Edge distances are stored in compressed sparse rows with ascending column
/// indices. When the query set overlaps the reference set the self edge
/// appears as an explicit entry with distance zero, so the kernel later
/// evaluates it like any other edge.
pub struct NeighborGraph<F> {
    distances: CsMat<F>,
    k: usize,
}

impl<F: Float> NeighborGraph<F> {
    /// Searches the `k` nearest reference points of every query point.
    ///
    /// Fails with [`DiffusionMapError::InsufficientData`] when the reference
    /// set holds fewer than `k` points.
    pub fn build<DQ, DR, D, N>(
        query: &ArrayBase<DQ, Ix2>,
        reference: &ArrayBase<DR, Ix2>,
        k: usize,
        dist_fn: &D,
        nn_algo: &N,
    ) -> Result<Self>
    where
        DQ: Data<Elem = F>,
        DR: Data<Elem = F>,
        D: Distance<F>,
        N: NearestNeighbour,
    {
        let (n_query, n_ref) = (query.nrows(), reference.nrows());
        if n_ref < k {
            return Err(DiffusionMapError::InsufficientData {
                expected: k,
                found: n_ref,
            });
        }

        let nn = nn_algo.from_batch(reference, dist_fn.clone())?;

        let mut data = Vec::with_capacity(n_query * k);
        let mut indices = Vec::with_capacity(n_query * k);
        let mut indptr = Vec::with_capacity(n_query + 1);
        indptr.push(0);

        for point in query.rows() {
            let mut neighbours = nn
                .k_nearest(point, k)?
                .into_iter()
                .map(|(neighbour, j)| (j, dist_fn.distance(point, neighbour)))
                .collect::<Vec<_>>();

            // CSR wants ascending column indices within each row
            neighbours.sort_unstable_by_key(|&(j, _)| j);

            for (j, dist) in neighbours {
                indices.push(j);
                data.push(dist);
            }
            indptr.push(indices.len());
        }

        let distances = CsMat::new((n_query, n_ref), indptr, indices, data);

        Ok(NeighborGraph { distances, k })
    }

    /// Edge distances as a sparse matrix of shape `(n_query, n_reference)`.
    pub fn distances(&self) -> &CsMat<F> {
        &self.distances
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn n_query(&self) -> usize {
        self.distances.rows()
    }

    /// Squared distances of all stored edges in storage order.
    pub(crate) fn squared_distances(&self) -> Vec<F> {
        self.distances.data().iter().map(|d| *d * *d).collect()
    }
}
