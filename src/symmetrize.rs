//! Symmetrization of directed affinity matrices.

use linfa::Float;
use sprs::CsMat;

/// Policy for merging a directed affinity matrix with its transpose.
///
/// Forward and reverse values agree for radial kernels on shared edges but
/// the neighbour relation itself is directed. Entries are combined
/// elementwise, reading a missing direction as zero:
///
/// * `And` keeps an edge only when both directions exist and takes the
///   smaller value,
/// * `Or` keeps an edge when either direction exists and takes the larger
///   value,
/// * `Average` keeps an edge when either direction exists and takes the
///   mean of both values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symmetrization {
    And,
    Or,
    Average,
}

/// Combines `matrix` with its transpose under the given policy.
///
/// Works row-by-row on the two sorted column streams, so the sparsity is
/// never densified and the result has ascending column indices again.
pub fn symmetrize<F: Float>(matrix: &CsMat<F>, mode: Symmetrization) -> CsMat<F> {
    assert_eq!(matrix.rows(), matrix.cols());

    let transpose = matrix.transpose_view().to_csr();
    let n = matrix.rows();
    let half = F::cast(0.5);

    let mut data = Vec::with_capacity(matrix.nnz());
    let mut indices = Vec::with_capacity(matrix.nnz());
    let mut indptr = Vec::with_capacity(n + 1);
    indptr.push(0);

    for i in 0..n {
        let forward = row_entries(matrix, i);
        let reverse = row_entries(&transpose, i);

        let (mut a, mut b) = (0, 0);
        while a < forward.len() || b < reverse.len() {
            let take_forward = b == reverse.len()
                || (a < forward.len() && forward[a].0 < reverse[b].0);
            let take_reverse = a == forward.len()
                || (b < reverse.len() && reverse[b].0 < forward[a].0);

            let (col, value) = if take_forward {
                let (col, x) = forward[a];
                a += 1;
                match mode {
                    Symmetrization::And => continue,
                    Symmetrization::Or => (col, x),
                    Symmetrization::Average => (col, half * x),
                }
            } else if take_reverse {
                let (col, y) = reverse[b];
                b += 1;
                match mode {
                    Symmetrization::And => continue,
                    Symmetrization::Or => (col, y),
                    Symmetrization::Average => (col, half * y),
                }
            } else {
                let (col, x) = forward[a];
                let y = reverse[b].1;
                a += 1;
                b += 1;
                match mode {
                    Symmetrization::And => (col, x.min(y)),
                    Symmetrization::Or => (col, x.max(y)),
                    Symmetrization::Average => (col, half * (x + y)),
                }
            };

            indices.push(col);
            data.push(value);
        }

        indptr.push(indices.len());
    }

    CsMat::new((n, n), indptr, indices, data)
}

fn row_entries<F: Float>(matrix: &CsMat<F>, i: usize) -> Vec<(usize, F)> {
    matrix
        .outer_view(i)
        .map(|row| row.iter().map(|(j, &value)| (j, value)).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // one shared edge (1, 1), one directed edge (0, 1)
    fn directed() -> CsMat<f64> {
        CsMat::new((2, 2), vec![0, 1, 2], vec![1, 1], vec![2.0, 3.0])
    }

    #[test]
    fn and_takes_the_intersection() {
        let sym = symmetrize(&directed(), Symmetrization::And);
        assert_eq!(sym.to_dense(), array![[0.0, 0.0], [0.0, 3.0]]);
    }

    #[test]
    fn or_takes_the_union() {
        let sym = symmetrize(&directed(), Symmetrization::Or);
        assert_eq!(sym.to_dense(), array![[0.0, 2.0], [2.0, 3.0]]);
    }

    #[test]
    fn average_halves_single_directions() {
        let sym = symmetrize(&directed(), Symmetrization::Average);
        assert_eq!(sym.to_dense(), array![[0.0, 1.0], [1.0, 3.0]]);
    }

    #[test]
    fn conflicting_values_resolve_elementwise() {
        // both directions present with different values
        let m = CsMat::new((2, 2), vec![0, 1, 2], vec![1, 0], vec![2.0, 6.0]);

        let and = symmetrize(&m, Symmetrization::And);
        assert_eq!(and.to_dense(), array![[0.0, 2.0], [2.0, 0.0]]);

        let or = symmetrize(&m, Symmetrization::Or);
        assert_eq!(or.to_dense(), array![[0.0, 6.0], [6.0, 0.0]]);

        let avg = symmetrize(&m, Symmetrization::Average);
        assert_eq!(avg.to_dense(), array![[0.0, 4.0], [4.0, 0.0]]);
    }

    #[test]
    fn symmetric_input_is_preserved() {
        let m = CsMat::new(
            (3, 3),
            vec![0, 2, 4, 6],
            vec![0, 1, 0, 1, 1, 2],
            vec![1.0, 0.5, 0.5, 1.0, 0.25, 1.0],
        );
        // entry (1, 2) = 0.25 has no reverse; everything else is symmetric
        for &mode in &[Symmetrization::And, Symmetrization::Or, Symmetrization::Average] {
            let sym = symmetrize(&m, mode);
            assert_eq!(sym.to_dense(), sym.to_dense().t().to_owned());
        }
    }
}
