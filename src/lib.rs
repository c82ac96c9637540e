//! # Diffusion maps
//!
//! `diffmap` embeds a point cloud by the leading eigenfunctions of a Markov
//! diffusion over its nearest-neighbour graph, a nonlinear dimensionality
//! reduction technique that recovers the intrinsic geometry of sampled
//! manifolds. Euclidean distances in the embedding approximate diffusion
//! distances on the manifold.
//!
//! The pipeline is: sparse Gaussian (or custom) kernel on the k-nearest
//! neighbour graph, symmetrization, correction for the sampling density with
//! the `alpha` exponent, optional reweighting towards a target measure
//! (TMDmap), then eigendecomposition of the transition operator through its
//! symmetric conjugate form. Fitted maps extend to new points with the
//! Nystroem or power out-of-sample extension. The kernel bandwidth can be
//! fixed or selected automatically with the Berry-Giannakis-Harlim
//! criterion.
//!
//! ```
//! use diffmap::{Bandwidth, DiffusionMap};
//! use linfa::traits::Fit;
//! use linfa::DatasetBase;
//! use ndarray::Array2;
//!
//! // points along a periodic strip
//! let records = Array2::from_shape_fn((100, 1), |(i, _)| {
//!     2.0 * std::f64::consts::PI * i as f64 / 99.0
//! });
//! let dataset = DatasetBase::from(records);
//!
//! let dmap = DiffusionMap::<f64>::params(2)
//!     .k(20)
//!     .alpha(1.0)
//!     .epsilon(Bandwidth::Bgh)
//!     .fit(&dataset)
//!     .unwrap();
//!
//! println!("eigenvalues: {}", dmap.evals());
//! ```

mod bandwidth;
mod diffusion_map;
mod error;
mod graph;
mod kernel;
mod normalize;
mod spectral;
mod symmetrize;

pub use bandwidth::{select_bandwidth_bgh, Bandwidth};
pub use diffusion_map::{DiffusionMap, DiffusionMapParams, DiffusionMapValidParams, Extension};
pub use error::{DiffusionMapError, Result};
pub use graph::NeighborGraph;
pub use kernel::{AffinityKernel, MeasureFn, WeightFn};
pub use symmetrize::{symmetrize, Symmetrization};
