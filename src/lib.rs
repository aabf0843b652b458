//! A library to evaluate the PieAPP perceptual image error metric

#![deny(rustdoc::broken_intra_doc_links)]
#![allow(clippy::excessive_precision)]

pub mod error;
pub mod function;
pub mod metric;
pub mod range;

pub use burn::{
    module::Module,
    tensor::{backend::Backend, Tensor},
};
pub use error::Error;
pub use metric::{Metric, PieApp, PieAppConfig, PieAppModelConfig, Reduction};
