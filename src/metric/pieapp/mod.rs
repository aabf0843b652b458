//! Perceptual image-error assessment through pairwise preference (PieAPP)
//! metric.

pub mod model;
pub mod patch;

pub use super::*;
pub use crate::range::DataRange;
pub use burn::config::Config;
pub use model::*;
pub use patch::*;

use std::path::PathBuf;

/// The data range expected by [`PieAppModel`].
pub const MODEL_DATA_RANGE_END: f64 = 255.0;

/// Computing the perceptual error between the inputs using the approaches
/// described in the paper:
///
/// *Prashnani, E., Cai, H., Mostofi, Y., & Sen, P. (2018). PieAPP: Perceptual Image-Error Assessment through Pairwise Preference. CVPR 2018.*
/// https://arxiv.org/abs/1806.02067
///
/// ## Details
///
/// - `self.model`: The frozen network scoring pairs of patches.
///
#[derive(Clone, Debug)]
pub struct PieApp<B: Backend> {
    pub config: PieAppConfig,
    pub model: PieAppModel<B>,
}

#[derive(Config, Debug, PartialEq)]
pub struct PieAppConfig {
    /// The maximum value of the inputs.
    #[config(default = "1.0")]
    pub data_range: f64,

    /// Whether the result keeps the gradient path to the inputs.
    #[config(default = "false")]
    pub enable_grad: bool,

    /// The geometry of the network.
    #[config(default = "PieAppModelConfig::new()")]
    pub model: PieAppModelConfig,

    #[config(default = "Reduction::Mean")]
    pub reduction: Reduction,

    /// The step between the origins of adjacent patches.
    #[config(default = "27")]
    pub stride: usize,
}

impl PieAppConfig {
    /// Initialize the metric with a randomly initialized network.
    ///
    /// ## Details
    ///
    /// The scores are only meaningful after loading the pretrained parameters,
    /// see [`PieApp::load_pretrained`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<PieApp<B>, Error> {
        self.check()?;
        self.init_with_model(self.model.init(device)?)
    }

    /// Initialize the metric with the given network.
    ///
    /// ## Details
    ///
    /// The network is frozen and its patch size takes precedence over
    /// `self.model`.
    pub fn init_with_model<B: Backend>(
        &self,
        model: PieAppModel<B>,
    ) -> Result<PieApp<B>, Error> {
        self.check()?;

        Ok(PieApp {
            config: self.to_owned(),
            model: model.no_grad(),
        })
    }

    fn check(&self) -> Result<(), Error> {
        if !self.data_range.is_finite() || self.data_range <= 0.0 {
            return Err(Error::InvalidDataRange(self.data_range));
        }
        if self.stride == 0 {
            return Err(Error::InvalidStride(self.stride));
        }

        Ok(())
    }
}

impl<B: Backend> PieApp<B> {
    /// Loading the pretrained parameters of the network
    /// from a named MessagePack record file.
    pub fn load_pretrained<P: Into<PathBuf>>(
        mut self,
        path: P,
        device: &B::Device,
    ) -> Result<Self, Error> {
        self.model = self.model.load_pretrained(path, device)?.no_grad();
        Ok(self)
    }

    /// Loading the pretrained parameters of the network
    /// from a PyTorch checkpoint.
    #[cfg(feature = "pytorch")]
    pub fn load_pytorch<P: Into<PathBuf>>(
        mut self,
        path: P,
        device: &B::Device,
    ) -> Result<Self, Error> {
        self.model = self.model.load_pytorch(path, device)?.no_grad();
        Ok(self)
    }

    /// Checking the inputs and broadcasting single-channel inputs to RGB.
    fn validate(
        &self,
        value: Tensor<B, 4>,
        target: Tensor<B, 4>,
    ) -> Result<(Tensor<B, 4>, Tensor<B, 4>), Error> {
        let dims = value.dims();
        if dims != target.dims() {
            return Err(Error::MismatchedShapes(dims, target.dims()));
        }

        let [batch_size, channel_count, height, width] = dims;
        let patch_size = self.model.patch_size;
        if channel_count != 1 && channel_count != 3 {
            return Err(Error::UnsupportedChannelCount(channel_count));
        }
        if height < patch_size || width < patch_size {
            return Err(Error::ImageTooSmall([height, width], patch_size));
        }

        let range = DataRange::default_with_end(self.config.data_range);
        range.check(&value)?;
        range.check(&target)?;

        if channel_count == 1 {
            log::warn!(
                target: "pieapp::metric",
                "The inputs have a single channel \
                 and are broadcast to 3 channels",
            );

            let shape = [batch_size, 3, height, width];
            return Ok((value.expand(shape), target.expand(shape)));
        }

        Ok((value, target))
    }
}

impl<B: Backend> Metric<B> for PieApp<B> {
    /// ## Arguments
    ///
    /// * `value` - The prediction with shape `[N, C, H, W]`.
    /// * `target` - The reference with shape `[N, C, H, W]`.
    ///
    /// ## Returns
    ///
    /// The perceptual error with shape `[1]`,
    /// or `[N]` if `self.config.reduction` is [`Reduction::None`].
    ///
    /// ## Details
    ///
    /// * The argument value should range from `0.0` to `self.config.data_range`
    /// * `C` should be `1` or `3`
    /// * `H` and `W` should not be less than the patch size
    /// * The result value is `0.0` for identical inputs
    fn evaluate(
        &self,
        value: Tensor<B, 4>,
        target: Tensor<B, 4>,
    ) -> Result<Tensor<B, 1>, Error> {
        #[cfg(all(debug_assertions, not(test)))]
        log::debug!(target: "pieapp::metric", "PieApp::evaluate");

        let (value, target) = self.validate(value, target)?;
        let (value, target) = if self.config.enable_grad {
            (value, target)
        } else {
            (value.detach(), target.detach())
        };

        let [batch_size, _, height, width] = value.dims();
        let patch_size = self.model.patch_size;
        let stride = self.config.stride;
        let patch_count = patch_count(height, width, patch_size, stride);
        let scale = DataRange::default_with_end(self.config.data_range)
            .scale_to(MODEL_DATA_RANGE_END);

        // [N * P, F], [N * P, F']
        let (features_value, weights_value) = self.model.forward(
            crop_patches(value.mul_scalar(scale), patch_size, stride),
        );
        let (features_target, weights_target) = self.model.forward(
            crop_patches(target.mul_scalar(scale), patch_size, stride),
        );

        #[cfg(all(debug_assertions, not(test)))]
        log::debug!(target: "pieapp::metric", "PieApp::evaluate > forward");

        // [N * P, 1]
        let (scores, weights) = self.model.compare(
            features_target - features_value,
            weights_target - weights_value,
        );
        // [N, P]
        let scores = scores.reshape([batch_size, patch_count]);
        let weights = weights.reshape([batch_size, patch_count]);
        // [N]
        let errors = (scores * weights.to_owned())
            .sum_dim(1)
            .div(weights.sum_dim(1))
            .reshape([batch_size]);

        #[cfg(all(debug_assertions, not(test)))]
        log::debug!(target: "pieapp::metric", "PieApp::evaluate > compare");

        Ok(self.config.reduction.reduce(errors))
    }
}

impl Default for PieAppConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
