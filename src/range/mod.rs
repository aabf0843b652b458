pub use crate::error::Error;
pub use burn::{
    config::Config,
    tensor::{backend::Backend, ElementConversion, Tensor},
};

/// The closed range of values an input representation may take.
#[derive(Config, Copy, Debug, PartialEq)]
pub struct DataRange {
    pub start: f64,
    pub end: f64,
}

impl DataRange {
    /// `[0, end]`
    #[inline]
    pub fn default_with_end(end: f64) -> Self {
        Self {
            end,
            ..Default::default()
        }
    }

    pub fn has(
        &self,
        value: f64,
    ) -> bool {
        value >= self.start && value <= self.end
    }

    /// Checking that every value of the tensor falls within the range.
    ///
    /// ## Details
    ///
    /// * NaN values are out of any range.
    /// * The check never participates in the autodiff graph.
    pub fn check<B: Backend, const D: usize>(
        &self,
        tensor: &Tensor<B, D>,
    ) -> Result<(), Error> {
        let tensor = tensor.to_owned().detach();
        let min = tensor.to_owned().min().into_scalar().elem::<f64>();
        let max = tensor.max().into_scalar().elem::<f64>();

        if self.has(min) && self.has(max) {
            Ok(())
        } else {
            Err(Error::OutOfDataRange {
                min,
                max,
                start: self.start,
                end: self.end,
            })
        }
    }

    /// The factor mapping this range's end onto `end`.
    #[inline]
    pub fn scale_to(
        &self,
        end: f64,
    ) -> f64 {
        end / self.end
    }
}

impl Default for DataRange {
    #[inline]
    fn default() -> Self {
        DataRange {
            start: 0.0,
            end: 1.0,
        }
    }
}
