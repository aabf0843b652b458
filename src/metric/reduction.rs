pub use super::*;
pub use burn::config::Config;

/// Reducing the per-sample scores of a metric.
#[derive(Config, Copy, Debug, PartialEq)]
pub enum Reduction {
    /// The mean of the scores with shape `[1]`.
    Mean,
    /// The sum of the scores with shape `[1]`.
    Sum,
    /// The scores themselves with shape `[N]`.
    None,
}

impl Reduction {
    pub fn reduce<B: Backend>(
        &self,
        scores: Tensor<B, 1>,
    ) -> Tensor<B, 1> {
        match self {
            Reduction::Mean => scores.mean(),
            Reduction::Sum => scores.sum(),
            Reduction::None => scores,
        }
    }
}

impl Default for Reduction {
    #[inline]
    fn default() -> Self {
        Reduction::Mean
    }
}
