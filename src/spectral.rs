//! Leading eigenpairs of the diffusion operator.

use linfa::Float;
use linfa_linalg::{
    eigh::*,
    lobpcg::{self, Lobpcg, Order},
};
use ndarray::{s, Array1, Array2, Axis};
use ndarray_rand::{rand_distr::Uniform, RandomExt};
use rand::{rngs::SmallRng, SeedableRng};
use sprs::CsMat;
use std::cmp::Ordering;
use std::ops::Mul;

use crate::error::{DiffusionMapError, Result};

/// Leading non-trivial eigenpairs of the transition operator
/// `diag(row_sums)^-1 * affinity`.
///
/// The operator is similar to `D^-1/2 A D^-1/2`, which is symmetric and is
/// what actually gets decomposed; eigenvectors are mapped back through
/// `D^-1/2` and renormalized to unit length. The trivial unit eigenpair is
/// dropped, the rest come sorted by descending eigenvalue with arbitrary
/// orientation.
pub(crate) fn solve<F: Float>(
    affinity: &CsMat<F>,
    row_sums: &Array1<F>,
    n_evecs: usize,
    maxiter: usize,
) -> Result<(Array1<F>, Array2<F>)> {
    let n = affinity.rows();
    let n_pairs = n_evecs + 1;

    let inv_sqrt = row_sums.mapv(|d| {
        if d > F::zero() {
            d.sqrt().recip()
        } else {
            F::zero()
        }
    });

    let mut conjugated = affinity.clone();
    for (i, mut row) in conjugated.outer_iterator_mut().enumerate() {
        for (j, value) in row.iter_mut() {
            *value = *value * inv_sqrt[i] * inv_sqrt[j];
        }
    }

    // use the full eigenvalue decomposition for small problem sizes
    let (vals, vecs) = if n < 5 * n_pairs {
        let (vals, vecs) = conjugated.to_dense().eigh_into()?;

        let mut order = (0..n).collect::<Vec<_>>();
        order.sort_unstable_by(|&a, &b| {
            vals[b].partial_cmp(&vals[a]).unwrap_or(Ordering::Equal)
        });
        order.truncate(n_pairs);

        (vals.select(Axis(0), &order), vecs.select(Axis(1), &order))
    } else {
        // truncated decomposition from a seeded random guess
        let mut rng = SmallRng::seed_from_u64(42);
        let guess = Array2::random_using((n, n_pairs), Uniform::new(0.0f64, 1.0), &mut rng)
            .mapv(F::cast);

        let result = lobpcg::lobpcg(
            |y| conjugated.mul(&y),
            guess,
            |_| {},
            None,
            1e-15,
            maxiter,
            Order::Largest,
        );

        // a result that missed the tolerance still carries usable eigenpairs
        match result {
            Ok(Lobpcg {
                eigvals, eigvecs, ..
            })
            | Err((
                _,
                Some(Lobpcg {
                    eigvals, eigvecs, ..
                }),
            )) => (eigvals, eigvecs),
            Err((_, None)) => return Err(DiffusionMapError::NoConvergence),
        }
    };

    // cut away the trivial eigenvalue/eigenvector
    let vals = vals.slice_move(s![1..n_pairs]);
    let mut vecs = vecs.slice_move(s![.., 1..n_pairs]);

    // back to eigenvectors of the transition operator
    for (mut row, factor) in vecs.rows_mut().into_iter().zip(inv_sqrt.iter()) {
        row *= *factor;
    }
    for mut column in vecs.columns_mut() {
        let norm = column.dot(&column).sqrt();
        if norm > F::zero() {
            column /= norm;
        }
    }

    Ok((vals, vecs))
}
