use std::rc::Rc;

use linfa::{Float, ParamGuard};
use linfa_nn::{
    distance::{Distance, L2Dist},
    CommonNearestNeighbour,
};
use ndarray::ArrayView1;

use crate::bandwidth::Bandwidth;
use crate::error::DiffusionMapError;
use crate::kernel::{AffinityKernel, MeasureFn};
use crate::symmetrize::Symmetrization;

use super::DiffusionMap;

/// Out-of-sample extension strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extension {
    /// single projection of the new kernel rows onto the fitted eigenvectors
    Nystroem,
    /// fixed-point iteration that also accounts for the self transition of
    /// the new point; agrees with `Nystroem` as that transition vanishes
    Power {
        /// iteration budget per coordinate
        max_steps: usize,
        /// absolute change between iterates considered settled
        tol: f64,
    },
}

impl Extension {
    /// Power extension with the default budget of 128 steps and a `1e-12`
    /// settling threshold.
    pub fn power() -> Self {
        Extension::Power {
            max_steps: 128,
            tol: 1e-12,
        }
    }
}

/// Validated diffusion map hyperparameters.
///
/// The central trade-offs live in three places: `k` bounds the sparsity of
/// the diffusion graph, `epsilon` sets the scale below which points count as
/// close, and `alpha` removes the influence of the sampling density on the
/// recovered geometry (`0` keeps it, `1` removes it entirely, `0.5`
/// approximates the Fokker-Planck diffusion).
pub struct DiffusionMapValidParams<F, D = L2Dist> {
    pub(crate) n_evecs: usize,
    pub(crate) k: usize,
    pub(crate) alpha: F,
    pub(crate) bandwidth: Bandwidth<F>,
    pub(crate) kernel: AffinityKernel<F>,
    pub(crate) measure: Option<MeasureFn<F>>,
    pub(crate) symmetrization: Symmetrization,
    pub(crate) oos: Extension,
    pub(crate) dist_fn: D,
    pub(crate) nn_algo: CommonNearestNeighbour,
    pub(crate) max_iterations: usize,
}

impl<F: Copy, D: Clone> Clone for DiffusionMapValidParams<F, D> {
    fn clone(&self) -> Self {
        DiffusionMapValidParams {
            n_evecs: self.n_evecs,
            k: self.k,
            alpha: self.alpha,
            bandwidth: self.bandwidth,
            kernel: self.kernel.clone(),
            measure: self.measure.as_ref().map(Rc::clone),
            symmetrization: self.symmetrization,
            oos: self.oos,
            dist_fn: self.dist_fn.clone(),
            nn_algo: self.nn_algo.clone(),
            max_iterations: self.max_iterations,
        }
    }
}

impl<F: Float, D> DiffusionMapValidParams<F, D> {
    pub fn n_evecs(&self) -> usize {
        self.n_evecs
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn alpha(&self) -> F {
        self.alpha
    }

    pub fn bandwidth(&self) -> Bandwidth<F> {
        self.bandwidth
    }

    pub fn symmetrization(&self) -> Symmetrization {
        self.symmetrization
    }

    pub fn oos(&self) -> Extension {
        self.oos
    }
}

/// Diffusion map hyperparameters.
///
/// A diffusion map embeds points by the leading eigenfunctions of a Markov
/// diffusion over their neighbour graph. Distances in the embedding
/// approximate diffusion distances on the sampled manifold.
pub struct DiffusionMapParams<F, D = L2Dist>(pub(crate) DiffusionMapValidParams<F, D>);

impl<F: Float, D> DiffusionMapParams<F, D> {
    /// Set the number of neighbours searched for every point.
    ///
    /// Bounds the sparsity of the kernel matrix; must be large enough that
    /// the kernel decays within each neighbourhood, otherwise the diffusion
    /// is artificially truncated.
    pub fn k(mut self, k: usize) -> Self {
        self.0.k = k;

        self
    }

    /// Set the density exponent in `[0, 1]`.
    pub fn alpha(mut self, alpha: F) -> Self {
        self.0.alpha = alpha;

        self
    }

    /// Set the kernel bandwidth, either fixed or selected from the data.
    pub fn epsilon(mut self, bandwidth: Bandwidth<F>) -> Self {
        self.0.bandwidth = bandwidth;

        self
    }

    /// Set the number of non-trivial eigenpairs to compute.
    pub fn n_evecs(mut self, n_evecs: usize) -> Self {
        self.0.n_evecs = n_evecs;

        self
    }

    /// Replace the Gaussian kernel with a custom edge kernel.
    ///
    /// The closure receives the coordinates of both endpoints and must be
    /// symmetric in its arguments.
    pub fn weight_fxn(
        mut self,
        weight: impl Fn(ArrayView1<F>, ArrayView1<F>) -> F + 'static,
    ) -> Self {
        self.0.kernel = AffinityKernel::Custom(Rc::new(weight));

        self
    }

    /// Reweight the diffusion towards a target measure (TMDmap).
    ///
    /// The closure evaluates the target density at a point; it must be
    /// non-negative and finite wherever the data lives.
    pub fn change_of_measure(mut self, measure: impl Fn(ArrayView1<F>) -> F + 'static) -> Self {
        self.0.measure = Some(Rc::new(measure));

        self
    }

    /// Set the policy merging the directed neighbour graph with its
    /// transpose.
    pub fn symmetrization(mut self, mode: Symmetrization) -> Self {
        self.0.symmetrization = mode;

        self
    }

    /// Set the out-of-sample extension used by `transform`.
    pub fn oos(mut self, oos: Extension) -> Self {
        self.0.oos = oos;

        self
    }

    /// Set the nearest neighbour backend.
    pub fn nn_algo(mut self, nn_algo: CommonNearestNeighbour) -> Self {
        self.0.nn_algo = nn_algo;

        self
    }

    /// Set the iteration budget of the truncated eigensolver.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.0.max_iterations = max_iterations;

        self
    }

    /// Change the point metric, consuming the parameter set.
    pub fn metric<D2: Distance<F>>(self, dist_fn: D2) -> DiffusionMapParams<F, D2> {
        DiffusionMapParams(DiffusionMapValidParams {
            n_evecs: self.0.n_evecs,
            k: self.0.k,
            alpha: self.0.alpha,
            bandwidth: self.0.bandwidth,
            kernel: self.0.kernel,
            measure: self.0.measure,
            symmetrization: self.0.symmetrization,
            oos: self.0.oos,
            dist_fn,
            nn_algo: self.0.nn_algo,
            max_iterations: self.0.max_iterations,
        })
    }
}

impl<F: Float> DiffusionMapParams<F> {
    /// Creates the set of default parameters
    ///
    /// # Parameters
    ///
    /// * `n_evecs`: the number of non-trivial eigenpairs, and therefore
    ///   embedding dimensions
    pub fn new(n_evecs: usize) -> DiffusionMapParams<F> {
        DiffusionMapParams(DiffusionMapValidParams {
            n_evecs,
            k: 64,
            alpha: F::cast(0.5),
            bandwidth: Bandwidth::Bgh,
            kernel: AffinityKernel::Gaussian,
            measure: None,
            symmetrization: Symmetrization::Or,
            oos: Extension::Nystroem,
            dist_fn: L2Dist,
            nn_algo: CommonNearestNeighbour::KdTree,
            max_iterations: 200,
        })
    }
}

impl<F: Float> Default for DiffusionMapParams<F> {
    fn default() -> Self {
        Self::new(1)
    }
}

impl<F: Float> DiffusionMap<F> {
    /// Creates the set of default parameters
    ///
    /// # Parameters
    ///
    /// * `n_evecs`: the number of non-trivial eigenpairs, and therefore
    ///   embedding dimensions
    pub fn params(n_evecs: usize) -> DiffusionMapParams<F> {
        DiffusionMapParams::new(n_evecs)
    }
}

impl<F: Float, D: Distance<F>> ParamGuard for DiffusionMapParams<F, D> {
    type Checked = DiffusionMapValidParams<F, D>;
    type Error = DiffusionMapError;

    fn check_ref(&self) -> Result<&Self::Checked, Self::Error> {
        if self.0.n_evecs == 0 {
            Err(DiffusionMapError::EvecsZero)
        } else if self.0.k == 0 {
            Err(DiffusionMapError::NeighboursZero)
        } else if self.0.alpha < F::zero() || self.0.alpha > F::one() {
            Err(DiffusionMapError::AlphaOutOfRange)
        } else if matches!(self.0.bandwidth, Bandwidth::Fixed(eps) if eps <= F::zero()) {
            Err(DiffusionMapError::NonPositiveBandwidth)
        } else if self.0.max_iterations == 0 {
            Err(DiffusionMapError::MaxIterationsZero)
        } else if matches!(self.0.oos, Extension::Power { max_steps: 0, .. }) {
            Err(DiffusionMapError::ExtensionStepsZero)
        } else {
            Ok(&self.0)
        }
    }

    fn check(self) -> Result<Self::Checked, Self::Error> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let params = DiffusionMapParams::<f64>::new(2);
        assert!(params.check_ref().is_ok());
    }

    #[test]
    fn invalid_configurations_are_rejected() {
        assert!(matches!(
            DiffusionMapParams::<f64>::new(0).check(),
            Err(DiffusionMapError::EvecsZero)
        ));
        assert!(matches!(
            DiffusionMapParams::<f64>::new(2).k(0).check(),
            Err(DiffusionMapError::NeighboursZero)
        ));
        assert!(matches!(
            DiffusionMapParams::<f64>::new(2).alpha(1.5).check(),
            Err(DiffusionMapError::AlphaOutOfRange)
        ));
        assert!(matches!(
            DiffusionMapParams::<f64>::new(2)
                .epsilon(Bandwidth::Fixed(0.0))
                .check(),
            Err(DiffusionMapError::NonPositiveBandwidth)
        ));
        assert!(matches!(
            DiffusionMapParams::<f64>::new(2).max_iterations(0).check(),
            Err(DiffusionMapError::MaxIterationsZero)
        ));
        assert!(matches!(
            DiffusionMapParams::<f64>::new(2)
                .oos(Extension::Power {
                    max_steps: 0,
                    tol: 1e-12
                })
                .check(),
            Err(DiffusionMapError::ExtensionStepsZero)
        ));
    }
}
