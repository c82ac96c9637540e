//! Density correction and Markov normalization of the affinity matrix.

use linfa::Float;
use ndarray::{Array1, ArrayView2};
use sprs::CsMat;

use crate::error::{DiffusionMapError, Result};
use crate::kernel::MeasureFn;

/// Affinity matrix after density correction, with the vectors needed to turn
/// it into a Markov operator and to replay the correction on new points.
pub(crate) struct NormalizedOperator<F> {
    /// corrected affinity, still symmetric
    pub affinity: CsMat<F>,
    /// row sums of the corrected affinity; the transition operator is
    /// `diag(row_sums)^-1 * affinity` and is never materialized
    pub row_sums: Array1<F>,
    /// per-point factor `deg^-alpha` of the sampling-density correction
    pub alpha_scale: Array1<F>,
    /// per-point factor of the change-of-measure reweighting, when used
    pub measure_scale: Option<Array1<F>>,
}

/// Applies the alpha density correction and the optional change-of-measure
/// reweighting to a symmetric affinity matrix.
///
/// Both corrections multiply on the two sides at once, keeping the matrix
/// symmetric; the left factors cancel under row normalization, so the
/// resulting Markov operator equals the usual one-sided form while the
/// conjugate eigenproblem stays symmetric. Points without any affinity keep
/// a zero row and stay isolated instead of dividing by zero.
pub(crate) fn normalize<F: Float>(
    mut affinity: CsMat<F>,
    alpha: F,
    measure: Option<(&MeasureFn<F>, ArrayView2<F>)>,
) -> Result<NormalizedOperator<F>> {
    let degrees = row_sums(&affinity);
    let alpha_scale = degrees.mapv(|deg| {
        if deg > F::zero() {
            deg.powf(-alpha)
        } else {
            F::zero()
        }
    });
    scale_symmetric(&mut affinity, &alpha_scale);

    let measure_scale = match measure {
        Some((measure_fn, points)) => {
            let corrected_degrees = row_sums(&affinity);
            let mut scale = Array1::zeros(points.nrows());
            for (j, point) in points.rows().into_iter().enumerate() {
                let target = measure_fn(point);
                if !(target.is_finite() && target >= F::zero()) {
                    return Err(DiffusionMapError::InvalidMeasure(j));
                }
                scale[j] = if corrected_degrees[j] > F::zero() {
                    (target / corrected_degrees[j]).sqrt()
                } else {
                    F::zero()
                };
            }
            scale_symmetric(&mut affinity, &scale);
            Some(scale)
        }
        None => None,
    };

    let row_sums = row_sums(&affinity);

    Ok(NormalizedOperator {
        affinity,
        row_sums,
        alpha_scale,
        measure_scale,
    })
}

pub(crate) fn row_sums<F: Float>(matrix: &CsMat<F>) -> Array1<F> {
    let mut sums = Array1::zeros(matrix.rows());
    for (i, row) in matrix.outer_iterator().enumerate() {
        sums[i] = row.iter().map(|(_, &value)| value).sum();
    }
    sums
}

fn scale_symmetric<F: Float>(matrix: &mut CsMat<F>, scale: &Array1<F>) {
    for (i, mut row) in matrix.outer_iterator_mut().enumerate() {
        for (j, value) in row.iter_mut() {
            *value = *value * scale[i] * scale[j];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NeighborGraph;
    use crate::kernel::{affinity_matrix, AffinityKernel};
    use crate::symmetrize::{symmetrize, Symmetrization};
    use linfa_nn::{distance::L2Dist, CommonNearestNeighbour};
    use ndarray::Array2;
    use std::rc::Rc;

    fn line_affinity(n: usize, k: usize) -> (Array2<f64>, CsMat<f64>) {
        let points = Array2::from_shape_fn((n, 1), |(i, _)| i as f64 / n as f64);
        let graph = NeighborGraph::build(
            &points,
            &points,
            k,
            &L2Dist,
            &CommonNearestNeighbour::KdTree,
        )
        .unwrap();
        let affinity = affinity_matrix(
            &graph,
            &AffinityKernel::Gaussian,
            0.05,
            points.view(),
            points.view(),
        );
        (points, symmetrize(&affinity, Symmetrization::Or))
    }

    #[test]
    fn transition_operator_is_row_stochastic() {
        let (_, affinity) = line_affinity(20, 5);
        let normalized = normalize(affinity, 0.5, None).unwrap();

        for (row, &sum) in normalized
            .affinity
            .outer_iterator()
            .zip(normalized.row_sums.iter())
        {
            let total: f64 = row.iter().map(|(_, &v)| v).sum();
            assert!((total / sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn stays_symmetric_after_corrections() {
        let (points, affinity) = line_affinity(20, 5);
        let measure: MeasureFn<f64> = Rc::new(|p| (-p.dot(&p)).exp());
        let normalized = normalize(affinity, 1.0, Some((&measure, points.view()))).unwrap();

        let dense = normalized.affinity.to_dense();
        let diff = (&dense - &dense.t()).mapv(f64::abs);
        assert!(diff.iter().all(|&d| d < 1e-12));
    }

    #[test]
    fn zero_alpha_leaves_the_affinity_untouched() {
        let (_, affinity) = line_affinity(20, 5);
        let before = affinity.to_dense();
        let normalized = normalize(affinity, 0.0, None).unwrap();

        assert_eq!(normalized.affinity.to_dense(), before);
        assert!(normalized.alpha_scale.iter().all(|&c| c == 1.0));
    }

    #[test]
    fn isolated_points_keep_zero_scales() {
        // symmetric affinity where point 1 has no edges at all
        let affinity = CsMat::new(
            (3, 3),
            vec![0, 2, 2, 4],
            vec![0, 2, 0, 2],
            vec![1.0, 0.5, 0.5, 1.0],
        );
        let points = Array2::from_shape_fn((3, 1), |(i, _)| i as f64);
        let measure: MeasureFn<f64> = Rc::new(|_| 1.0);

        let normalized = normalize(affinity, 0.5, Some((&measure, points.view()))).unwrap();

        assert_eq!(normalized.alpha_scale[1], 0.0);
        assert_eq!(normalized.measure_scale.as_ref().unwrap()[1], 0.0);
        assert_eq!(normalized.row_sums[1], 0.0);
        assert!(normalized.affinity.data().iter().all(|v| v.is_finite()));
        assert!(normalized.row_sums[0] > 0.0 && normalized.row_sums[2] > 0.0);
    }

    #[test]
    fn negative_measure_is_rejected() {
        let (points, affinity) = line_affinity(20, 5);
        let measure: MeasureFn<f64> = Rc::new(|p| 0.5 - p[0]);
        let res = normalize(affinity, 1.0, Some((&measure, points.view())));

        assert!(matches!(res, Err(DiffusionMapError::InvalidMeasure(_))));
    }
}
