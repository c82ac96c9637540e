//! Kernel evaluation on the edges of a neighbour graph.

use std::rc::Rc;

use linfa::Float;
use ndarray::{ArrayView1, ArrayView2};
use sprs::CsMat;

use crate::graph::NeighborGraph;

/// Edge kernel over a pair of endpoint coordinates.
pub type WeightFn<F> = Rc<dyn Fn(ArrayView1<F>, ArrayView1<F>) -> F>;

/// Target density evaluated at a single point.
pub type MeasureFn<F> = Rc<dyn Fn(ArrayView1<F>) -> F>;

/// The kernel applied to every edge of the neighbour graph.
pub enum AffinityKernel<F> {
    /// the radial kernel `exp(-d^2 / eps)`
    Gaussian,
    /// an arbitrary weighting of a point pair; must be symmetric in its
    /// arguments for the spectral solver to apply
    Custom(WeightFn<F>),
}

impl<F> Clone for AffinityKernel<F> {
    fn clone(&self) -> Self {
        match self {
            AffinityKernel::Gaussian => AffinityKernel::Gaussian,
            AffinityKernel::Custom(weight) => AffinityKernel::Custom(Rc::clone(weight)),
        }
    }
}

impl<F: Float> AffinityKernel<F> {
    pub(crate) fn evaluate(
        &self,
        distance: F,
        epsilon: F,
        a: ArrayView1<F>,
        b: ArrayView1<F>,
    ) -> F {
        match self {
            AffinityKernel::Gaussian => (-distance * distance / epsilon).exp(),
            AffinityKernel::Custom(weight) => weight(a, b),
        }
    }

    /// Kernel value of a point paired with itself.
    pub(crate) fn at_origin(&self, point: ArrayView1<F>) -> F {
        match self {
            AffinityKernel::Gaussian => F::one(),
            AffinityKernel::Custom(weight) => weight(point, point),
        }
    }
}

/// Evaluates the kernel on every edge, preserving the sparsity pattern.
pub(crate) fn affinity_matrix<F: Float>(
    graph: &NeighborGraph<F>,
    kernel: &AffinityKernel<F>,
    epsilon: F,
    query: ArrayView2<F>,
    reference: ArrayView2<F>,
) -> CsMat<F> {
    let mut affinity = graph.distances().clone();
    for (i, mut row) in affinity.outer_iterator_mut().enumerate() {
        for (j, value) in row.iter_mut() {
            *value = kernel.evaluate(*value, epsilon, query.row(i), reference.row(j));
        }
    }

    affinity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NeighborGraph;
    use approx::assert_abs_diff_eq;
    use linfa_nn::{distance::L2Dist, CommonNearestNeighbour};
    use ndarray::Array2;

    fn line_graph(n: usize, k: usize) -> (Array2<f64>, NeighborGraph<f64>) {
        let points = Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
        let graph = NeighborGraph::build(
            &points,
            &points,
            k,
            &L2Dist,
            &CommonNearestNeighbour::KdTree,
        )
        .unwrap();
        (points, graph)
    }

    #[test]
    fn gaussian_values() {
        let (points, graph) = line_graph(5, 3);
        let affinity = affinity_matrix(
            &graph,
            &AffinityKernel::Gaussian,
            2.0,
            points.view(),
            points.view(),
        );

        // self edge evaluates to one, unit distance to exp(-1/2)
        assert_abs_diff_eq!(*affinity.get(2, 2).unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            *affinity.get(2, 3).unwrap(),
            (-0.5f64).exp(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn custom_kernel_sees_coordinates() {
        let (points, graph) = line_graph(5, 3);
        let kernel = AffinityKernel::Custom(Rc::new(
            |a: ArrayView1<f64>, b: ArrayView1<f64>| a[0] + b[0],
        ));
        let affinity = affinity_matrix(&graph, &kernel, 1.0, points.view(), points.view());

        assert_abs_diff_eq!(*affinity.get(2, 3).unwrap(), 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(kernel.at_origin(points.row(4)), 8.0, epsilon = 1e-12);
    }
}
