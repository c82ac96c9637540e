mod algorithms;
mod hyperparams;

pub use algorithms::DiffusionMap;
pub use hyperparams::{DiffusionMapParams, DiffusionMapValidParams, Extension};
