pub mod pieapp;
pub mod reduction;

pub use crate::error::Error;
pub use burn::tensor::{backend::Backend, Tensor};
pub use pieapp::*;
pub use reduction::*;

pub trait Metric<B: Backend> {
    /// Evaluate the value against the target.
    ///
    /// ## Arguments
    ///
    /// * `value` - The input tensor with shape `[N, C, H, W]`.
    /// * `target` - The target tensor with shape `[N, C, H, W]`.
    ///
    /// ## Returns
    ///
    /// The metric value with shape `[1]`, or `[N]` if it is not reduced.
    fn evaluate(
        &self,
        value: Tensor<B, 4>,
        target: Tensor<B, 4>,
    ) -> Result<Tensor<B, 1>, Error>;
}
