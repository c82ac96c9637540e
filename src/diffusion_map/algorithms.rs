//! Diffusion map estimator.
//!
//! A diffusion map embeds a point cloud by the leading eigenfunctions of a
//! Markov diffusion over its nearest-neighbour graph. The kernel is
//! symmetrized, corrected for the sampling density and optionally reweighted
//! towards a target measure, then row-normalized into a transition operator
//! whose spectrum is computed through the symmetric conjugate form
//! `D^-1/2 A D^-1/2`. New points are embedded afterwards with the Nystroem
//! or power extension against the fitted point set.

use linfa::{traits::Fit, DatasetBase, Float, ParamGuard};
use linfa_nn::distance::{Distance, L2Dist};
use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use sprs::CsMat;
use std::ops::Mul;

use crate::bandwidth::{select_bandwidth_bgh, Bandwidth};
use crate::error::{DiffusionMapError, Result};
use crate::graph::NeighborGraph;
use crate::kernel::affinity_matrix;
use crate::normalize::{normalize, row_sums, NormalizedOperator};
use crate::spectral;
use crate::symmetrize::symmetrize;

use super::hyperparams::{DiffusionMapParams, DiffusionMapValidParams, Extension};

/// Fitted diffusion map.
///
/// Holds the eigenpairs of the fitted diffusion operator together with a
/// copy of the training points, the fitted bandwidth and the fitted
/// normalization factors, which `transform` replays to embed new points
/// without refitting.
///
/// # Example
///
/// ```
/// use diffmap::{Bandwidth, DiffusionMap};
/// use linfa::traits::Fit;
/// use linfa::DatasetBase;
/// use ndarray::Array2;
///
/// // points along a curve in the plane
/// let records = Array2::from_shape_fn((100, 2), |(i, j)| {
///     let t = i as f64 / 99.0;
///     if j == 0 { t.cos() } else { t.sin() }
/// });
/// let dataset = DatasetBase::from(records);
///
/// let dmap = DiffusionMap::<f64>::params(2)
///     .k(20)
///     .epsilon(Bandwidth::Bgh)
///     .fit(&dataset)
///     .unwrap();
///
/// // one diffusion coordinate pair per point
/// assert_eq!(dmap.dmap().dim(), (100, 2));
/// ```
pub struct DiffusionMap<F: Float, D = L2Dist> {
    params: DiffusionMapValidParams<F, D>,
    data: Array2<F>,
    epsilon: F,
    evals: Array1<F>,
    evecs: Array2<F>,
    dmap: Array2<F>,
    alpha_scale: Array1<F>,
    measure_scale: Option<Array1<F>>,
}

impl<F: Float, DT: Data<Elem = F>, T, D: Distance<F>>
    Fit<ArrayBase<DT, Ix2>, T, DiffusionMapError> for DiffusionMapValidParams<F, D>
{
    type Object = DiffusionMap<F, D>;

    /// Fit the diffusion operator of the records and decompose it.
    fn fit(&self, dataset: &DatasetBase<ArrayBase<DT, Ix2>, T>) -> Result<Self::Object> {
        let records = dataset.records();
        let n = records.nrows();
        if n < self.n_evecs + 1 {
            return Err(DiffusionMapError::InsufficientData {
                expected: self.n_evecs + 1,
                found: n,
            });
        }

        let graph = NeighborGraph::build(records, records, self.k, &self.dist_fn, &self.nn_algo)?;

        let epsilon = match self.bandwidth {
            Bandwidth::Fixed(eps) => eps,
            Bandwidth::Bgh => select_bandwidth_bgh(&graph.squared_distances()).0,
        };

        let data = records.to_owned();
        let affinity = affinity_matrix(&graph, &self.kernel, epsilon, data.view(), data.view());
        let affinity = symmetrize(&affinity, self.symmetrization);

        let measure = self.measure.as_ref().map(|m| (m, data.view()));
        let NormalizedOperator {
            affinity,
            row_sums,
            alpha_scale,
            measure_scale,
        } = normalize(affinity, self.alpha, measure)?;

        let (evals, evecs) = spectral::solve(&affinity, &row_sums, self.n_evecs, self.max_iterations)?;

        let mut dmap = evecs.clone();
        for (mut column, val) in dmap.columns_mut().into_iter().zip(evals.iter()) {
            column *= *val;
        }

        Ok(DiffusionMap {
            params: self.clone(),
            data,
            epsilon,
            evals,
            evecs,
            dmap,
            alpha_scale,
            measure_scale,
        })
    }
}

impl<F: Float, D> DiffusionMap<F, D> {
    /// Eigenvalues of the fitted transition operator, descending, trivial
    /// pair excluded.
    pub fn evals(&self) -> &Array1<F> {
        &self.evals
    }

    /// Unit-length eigenvectors of the fitted transition operator, one per
    /// column. Orientation is arbitrary.
    pub fn evecs(&self) -> &Array2<F> {
        &self.evecs
    }

    /// Diffusion coordinates of the training points: the eigenvectors with
    /// each column scaled by its eigenvalue.
    pub fn dmap(&self) -> &Array2<F> {
        &self.dmap
    }

    /// The bandwidth the kernel was evaluated with, after automatic
    /// selection.
    pub fn epsilon_fitted(&self) -> F {
        self.epsilon
    }
}

impl<F: Float, D: Distance<F>> DiffusionMap<F, D> {
    /// Embeds new points into the fitted diffusion space.
    ///
    /// Builds the kernel rows of the new points against the fitted set with
    /// the fitted bandwidth, replays the fitted column corrections and
    /// applies the configured extension. Records equal to the training set
    /// short-circuit to the stored coordinates.
    ///
    /// Returns the diffusion coordinates, matching [`DiffusionMap::dmap`]
    /// rows for points of the training set.
    pub fn transform<DT: Data<Elem = F>>(&self, records: &ArrayBase<DT, Ix2>) -> Result<Array2<F>> {
        if self.data == *records {
            return Ok(self.dmap.clone());
        }

        let graph = NeighborGraph::build(
            records,
            &self.data,
            self.params.k,
            &self.params.dist_fn,
            &self.params.nn_algo,
        )?;
        let kernel_rows = affinity_matrix(
            &graph,
            &self.params.kernel,
            self.epsilon,
            records.view(),
            self.data.view(),
        );

        // replay the fitted right-normalization on every kernel column
        let mut corrected = kernel_rows.clone();
        for mut row in corrected.outer_iterator_mut() {
            for (j, value) in row.iter_mut() {
                *value = *value * self.column_scale(j);
            }
        }

        match self.params.oos {
            Extension::Nystroem => {
                let sums = row_sums(&corrected);
                let mut coords = corrected.mul(&self.evecs.view());
                for (mut row, &sum) in coords.rows_mut().into_iter().zip(sums.iter()) {
                    if sum > F::zero() {
                        row /= sum;
                    }
                }

                Ok(coords)
            }
            Extension::Power { max_steps, tol } => {
                self.power_extension(records, &kernel_rows, &corrected, max_steps, tol)
            }
        }
    }

    /// Power iteration extension.
    ///
    /// Unlike the single Nystroem projection, the self transition of the
    /// new point enters the row normalization and each coordinate solves
    /// the fixed point `c = (p_row . evec + p_self * c) / eval`.
    fn power_extension<DT: Data<Elem = F>>(
        &self,
        records: &ArrayBase<DT, Ix2>,
        kernel_rows: &CsMat<F>,
        corrected: &CsMat<F>,
        max_steps: usize,
        tol: f64,
    ) -> Result<Array2<F>> {
        let tol = F::cast(tol);
        let mut coords = Array2::zeros((records.nrows(), self.evals.len()));

        for (i, point) in records.rows().into_iter().enumerate() {
            let kernel_row = kernel_rows.outer_view(i);
            let corrected_row = corrected.outer_view(i);
            let (kernel_row, corrected_row) = match (kernel_row, corrected_row) {
                (Some(k), Some(c)) => (k, c),
                _ => continue,
            };

            let self_affinity = self.params.kernel.at_origin(point);

            // the new point's own column factors, rebuilt the way the
            // fitted ones were
            let density = kernel_row.iter().map(|(_, &v)| v).sum::<F>() + self_affinity;
            let alpha_self = if density > F::zero() {
                density.powf(-self.params.alpha)
            } else {
                F::zero()
            };

            let alpha_row = corrected_row
                .iter()
                .map(|(j, &v)| {
                    // strip the fitted measure factor to get the pure
                    // alpha-corrected entry
                    match &self.measure_scale {
                        Some(scale) if scale[j] > F::zero() => (j, v / scale[j]),
                        Some(_) => (j, F::zero()),
                        None => (j, v),
                    }
                })
                .map(|(j, v)| (j, v * alpha_self))
                .collect::<Vec<_>>();
            let alpha_self_entry = self_affinity * alpha_self * alpha_self;

            let (row, self_entry) = match (&self.params.measure, &self.measure_scale) {
                (Some(measure_fn), Some(scale)) => {
                    let target = measure_fn(point);
                    if !(target.is_finite() && target >= F::zero()) {
                        return Err(DiffusionMapError::InvalidMeasure(i));
                    }
                    let degree = alpha_row.iter().map(|&(_, v)| v).sum::<F>() + alpha_self_entry;
                    let measure_self = if degree > F::zero() {
                        (target / degree).sqrt()
                    } else {
                        F::zero()
                    };
                    let row = alpha_row
                        .iter()
                        .map(|&(j, v)| (j, v * measure_self * scale[j]))
                        .collect::<Vec<_>>();
                    (row, alpha_self_entry * measure_self * measure_self)
                }
                _ => (alpha_row, alpha_self_entry),
            };

            let total = row.iter().map(|&(_, v)| v).sum::<F>() + self_entry;
            if total <= F::zero() {
                // isolated from the fitted set, coordinates stay zero
                continue;
            }
            let p_self = self_entry / total;

            for (col, (&eval, evec)) in self
                .evals
                .iter()
                .zip(self.evecs.columns())
                .enumerate()
            {
                let projected = row.iter().map(|&(j, v)| v * evec[j]).sum::<F>() / total;

                let mut coord = projected / eval;
                let mut settled = false;
                for _ in 0..max_steps {
                    let next = (projected + p_self * coord) / eval;
                    if (next - coord).abs() <= tol {
                        coord = next;
                        settled = true;
                        break;
                    }
                    coord = next;
                }
                if !settled {
                    return Err(DiffusionMapError::ExtensionDiverged(max_steps));
                }

                // eigenvalue-scaled, like the stored diffusion coordinates
                coords[(i, col)] = coord * eval;
            }
        }

        Ok(coords)
    }

    fn column_scale(&self, j: usize) -> F {
        match &self.measure_scale {
            Some(scale) => self.alpha_scale[j] * scale[j],
            None => self.alpha_scale[j],
        }
    }
}

impl<F: Float, D: Distance<F>> DiffusionMapValidParams<F, D> {
    /// Fit the diffusion map and return the diffusion coordinates of the
    /// training points.
    ///
    /// Equivalent to `fit` followed by `transform` on the same records,
    /// skipping the redundant extension pass.
    pub fn fit_transform<DT: Data<Elem = F>, T>(
        &self,
        dataset: &DatasetBase<ArrayBase<DT, Ix2>, T>,
    ) -> Result<Array2<F>> {
        let fitted = self.fit(dataset)?;
        Ok(fitted.dmap)
    }
}

impl<F: Float, D: Distance<F>> DiffusionMapParams<F, D> {
    /// Validating version of [`DiffusionMapValidParams::fit_transform`].
    pub fn fit_transform<DT: Data<Elem = F>, T>(
        &self,
        dataset: &DatasetBase<ArrayBase<DT, Ix2>, T>,
    ) -> Result<Array2<F>> {
        self.check_ref()?.fit_transform(dataset)
    }
}
