pub use crate::error::Error;
pub use burn::{
    config::Config,
    module::{Module, Param},
    tensor::{backend::Backend, Tensor},
};

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, PaddingConfig2d,
    },
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::activation::relu,
};
use std::path::PathBuf;

/// The factor applied to the output of the score head.
pub const SCORE_SCALE: f64 = 1e-2;

/// The value added to the output of the weight head.
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// The number of pooling stages, each halving the patch size.
pub const STAGE_COUNT: usize = 5;

/// The network of PieAPP described in the paper:
///
/// *Prashnani, E., Cai, H., Mostofi, Y., & Sen, P. (2018). PieAPP: Perceptual Image-Error Assessment through Pairwise Preference. CVPR 2018.*
/// https://arxiv.org/abs/1806.02067
///
/// ## Details
///
/// The parameter names follow the published PyTorch checkpoint.
#[derive(Debug, Module)]
pub struct PieAppModel<B: Backend> {
    pub conv1: Conv2d<B>,
    pub conv2: Conv2d<B>,
    pub conv3: Conv2d<B>,
    pub conv4: Conv2d<B>,
    pub conv5: Conv2d<B>,
    pub conv6: Conv2d<B>,
    pub conv7: Conv2d<B>,
    pub conv8: Conv2d<B>,
    pub conv9: Conv2d<B>,
    pub conv10: Conv2d<B>,
    pub conv11: Conv2d<B>,
    pub pool2: MaxPool2d,
    pub fc1_score: Linear<B>,
    pub fc2_score: Linear<B>,
    pub fc1_weight: Linear<B>,
    pub fc2_weight: Linear<B>,
    pub ref_score_subtract: Linear<B>,
    pub patch_size: usize,
}

#[derive(Config, Copy, Debug, PartialEq)]
pub struct PieAppModelConfig {
    /// The output channels of the five convolution stages.
    #[config(default = "[64, 128, 256, 256, 512]")]
    pub channels: [usize; STAGE_COUNT],

    /// The hidden size of the score and weight heads.
    #[config(default = "512")]
    pub hidden_size: usize,

    /// The side length of the patches.
    #[config(default = "64")]
    pub patch_size: usize,
}

impl PieAppModelConfig {
    /// The length of the feature vector of a patch.
    ///
    /// It concatenates the flattened outputs of all stages.
    pub fn feature_count(&self) -> usize {
        self.channels
            .iter()
            .enumerate()
            .map(|(stage, channel_count)| {
                let size = self.patch_size >> (stage + 1);
                channel_count * size * size
            })
            .sum()
    }

    /// The length of the weight vector of a patch.
    ///
    /// It is the flattened output of the last stage.
    pub fn weight_feature_count(&self) -> usize {
        let size = self.patch_size >> STAGE_COUNT;
        self.channels[STAGE_COUNT - 1] * size * size
    }

    /// Initialize the network with calibrated random parameters.
    ///
    /// ## Details
    ///
    /// The subtraction layer is calibrated so that
    /// a zero difference scores `0`.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<PieAppModel<B>, Error> {
        if self.patch_size == 0 || self.patch_size % (1 << STAGE_COUNT) != 0 {
            return Err(Error::InvalidPatchSize(self.patch_size));
        }

        let [c1, c2, c3, c4, c5] = self.channels;
        let conv = |channels: [usize; 2]| {
            Conv2dConfig::new(channels, [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device)
        };

        let model = PieAppModel {
            conv1: conv([3, c1]),
            conv2: conv([c1, c1]),
            conv3: conv([c1, c1]),
            conv4: conv([c1, c2]),
            conv5: conv([c2, c2]),
            conv6: conv([c2, c2]),
            conv7: conv([c2, c3]),
            conv8: conv([c3, c3]),
            conv9: conv([c3, c4]),
            conv10: conv([c4, c5]),
            conv11: conv([c5, c5]),
            pool2: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            fc1_score: LinearConfig::new(self.feature_count(), self.hidden_size)
                .init(device),
            fc2_score: LinearConfig::new(self.hidden_size, 1).init(device),
            fc1_weight: LinearConfig::new(
                self.weight_feature_count(),
                self.hidden_size,
            )
            .init(device),
            fc2_weight: LinearConfig::new(self.hidden_size, 1).init(device),
            ref_score_subtract: LinearConfig::new(1, 1).init(device),
            patch_size: self.patch_size,
        };

        Ok(model.calibrate())
    }
}

impl<B: Backend> PieAppModel<B> {
    /// Extracting the features of the patches.
    ///
    /// ## Arguments
    ///
    /// * `input` - The patches with shape `[P, 3, S, S]`
    ///   ranging from `0.0` to `255.0`.
    ///
    /// ## Returns
    ///
    /// * The feature vectors with shape `[P, F]`.
    /// * The weight vectors with shape `[P, F']`.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        debug_assert_eq!(input.dims()[2], self.patch_size);
        debug_assert_eq!(input.dims()[3], self.patch_size);

        // Each stage pools before its last convolution.
        let x = relu(self.conv1.forward(input));
        let x = self.pool2.forward(relu(self.conv2.forward(x)));
        let x3 = relu(self.conv3.forward(x));
        let x = self.pool2.forward(relu(self.conv4.forward(x3.to_owned())));
        let x5 = relu(self.conv5.forward(x));
        let x = self.pool2.forward(relu(self.conv6.forward(x5.to_owned())));
        let x7 = relu(self.conv7.forward(x));
        let x = self.pool2.forward(relu(self.conv8.forward(x7.to_owned())));
        let x9 = relu(self.conv9.forward(x));
        let x = self.pool2.forward(relu(self.conv10.forward(x9.to_owned())));
        let x11 = relu(self.conv11.forward(x));

        let weights = x11.flatten::<2>(1, 3);
        let features = Tensor::cat(
            vec![
                x3.flatten(1, 3),
                x5.flatten(1, 3),
                x7.flatten(1, 3),
                x9.flatten(1, 3),
                weights.to_owned(),
            ],
            1,
        );

        (features, weights)
    }

    /// Scoring the differences between the features of patch pairs.
    ///
    /// ## Arguments
    ///
    /// * `features_diff` - The feature differences with shape `[P, F]`.
    /// * `weights_diff` - The weight differences with shape `[P, F']`.
    ///
    /// ## Returns
    ///
    /// The error scores and their weights, both with shape `[P, 1]`.
    pub fn compare(
        &self,
        features_diff: Tensor<B, 2>,
        weights_diff: Tensor<B, 2>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let scores = self.ref_score_subtract.forward(self.score(features_diff));
        let weights = self
            .fc2_weight
            .forward(relu(self.fc1_weight.forward(weights_diff)))
            .add_scalar(WEIGHT_EPSILON);

        (scores, weights)
    }

    /// Loading the parameters from a named MessagePack record file.
    pub fn load_pretrained<P: Into<PathBuf>>(
        self,
        path: P,
        device: &B::Device,
    ) -> Result<Self, Error> {
        let path = path.into();

        log::info!(
            target: "pieapp::model",
            "Loading the pretrained parameters from {path:?}",
        );

        Ok(self.load_file(
            path,
            &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
            device,
        )?)
    }

    /// Loading the parameters from a PyTorch checkpoint.
    #[cfg(feature = "pytorch")]
    pub fn load_pytorch<P: Into<PathBuf>>(
        self,
        path: P,
        device: &B::Device,
    ) -> Result<Self, Error> {
        use burn::record::Recorder;
        use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};

        let path = path.into();

        log::info!(
            target: "pieapp::model",
            "Loading the pretrained parameters from {path:?}",
        );

        let record = PyTorchFileRecorder::<FullPrecisionSettings>::default()
            .load(LoadArgs::new(path), device)?;

        Ok(self.load_record(record))
    }

    /// `0.01 * fc2_score(relu(fc1_score(x)))`
    fn score(
        &self,
        features_diff: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        self.fc2_score
            .forward(relu(self.fc1_score.forward(features_diff)))
            .mul_scalar(SCORE_SCALE)
    }

    /// Setting `ref_score_subtract` to `x - score(0)`.
    fn calibrate(mut self) -> Self {
        let weight = self.fc1_score.weight.val();
        let device = weight.device();
        let feature_count = weight.dims()[0];

        // [1, 1]
        let offset = self.score(Tensor::zeros([1, feature_count], &device));

        self.ref_score_subtract.weight =
            Param::from_tensor(Tensor::ones([1, 1], &device));
        self.ref_score_subtract.bias =
            Some(Param::from_tensor(offset.neg().reshape([1]).detach()));

        self
    }
}

impl Default for PieAppModelConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::NdArray,
        tensor::{Distribution, Int},
    };

    fn slim_config() -> PieAppModelConfig {
        PieAppModelConfig::new()
            .with_channels([2, 3, 4, 4, 5])
            .with_hidden_size(6)
    }

    #[test]
    fn feature_count() {
        let config = PieAppModelConfig::default();
        assert_eq!(config.feature_count(), 120832);
        assert_eq!(config.weight_feature_count(), 2048);

        let config = slim_config();
        assert_eq!(
            config.feature_count(),
            2 * 32 * 32 + 3 * 16 * 16 + 4 * 8 * 8 + 4 * 4 * 4 + 5 * 2 * 2
        );
        assert_eq!(config.weight_feature_count(), 5 * 2 * 2);

        let config = slim_config().with_patch_size(32);
        assert_eq!(config.weight_feature_count(), 5);
    }

    #[test]
    fn init_with_invalid_patch_size() {
        let device = Default::default();

        [0, 16, 48, 65].into_iter().for_each(|patch_size| {
            let error = slim_config()
                .with_patch_size(patch_size)
                .init::<NdArray>(&device)
                .unwrap_err();
            assert!(
                matches!(
                    error,
                    Error::InvalidPatchSize(size) if size == patch_size
                ),
                "error: {error:?}"
            );
        });
    }

    #[test]
    fn forward() {
        let device = Default::default();
        let config = slim_config();
        let model = config.init::<NdArray>(&device).unwrap();

        let input = Tensor::random(
            [7, 3, 64, 64],
            Distribution::Uniform(0.0, 255.0),
            &device,
        );
        let (features, weights) = model.forward(input);
        assert_eq!(features.dims(), [7, config.feature_count()]);
        assert_eq!(weights.dims(), [7, config.weight_feature_count()]);

        let feature_count = config.feature_count();
        let output = features
            .slice([0..7, feature_count - 20..feature_count])
            .equal(weights)
            .all()
            .into_scalar();
        assert!(output);
    }

    /// Setting every convolution to fixed sinusoidal parameters.
    fn with_fixed_convolutions<B: Backend>(
        mut model: PieAppModel<B>,
    ) -> PieAppModel<B> {
        let convs = [
            &mut model.conv1,
            &mut model.conv2,
            &mut model.conv3,
            &mut model.conv4,
            &mut model.conv5,
            &mut model.conv6,
            &mut model.conv7,
            &mut model.conv8,
            &mut model.conv9,
            &mut model.conv10,
            &mut model.conv11,
        ];

        convs.into_iter().enumerate().for_each(|(index, conv)| {
            let phase = index as f64;
            conv.weight = conv.weight.to_owned().map(|weight| {
                let dims = weight.dims();
                let count = dims.iter().product::<usize>() as i64;
                Tensor::<B, 1, Int>::arange(0..count, &weight.device())
                    .float()
                    .mul_scalar(0.37)
                    .add_scalar(phase)
                    .sin()
                    .mul_scalar(0.1)
                    .reshape(dims)
            });
            conv.bias = conv.bias.take().map(|bias| {
                bias.map(|bias| {
                    let count = bias.dims()[0] as i64;
                    Tensor::<B, 1, Int>::arange(0..count, &bias.device())
                        .float()
                        .add_scalar(phase)
                        .cos()
                        .mul_scalar(0.01)
                })
            });
        });

        model
    }

    #[test]
    fn forward_layer_order() {
        let device = Default::default();
        let config = slim_config();
        let model =
            with_fixed_convolutions(config.init::<NdArray>(&device).unwrap());

        let count = 2 * 3 * 64 * 64;
        let input = Tensor::<NdArray, 1, Int>::arange(0..count, &device)
            .float()
            .mul_scalar(0.013)
            .sin()
            .add_scalar(1.0)
            .mul_scalar(127.5)
            .reshape([2, 3, 64, 64]);

        // Pooling sits between the two convolutions closing each stage.
        let pool = |x: Tensor<NdArray, 4>| model.pool2.forward(x);
        let x = relu(model.conv1.forward(input.to_owned()));
        let x = relu(model.conv2.forward(x));
        let x3 = relu(model.conv3.forward(pool(x)));
        let x = relu(model.conv4.forward(x3.to_owned()));
        let x5 = relu(model.conv5.forward(pool(x)));
        let x = relu(model.conv6.forward(x5.to_owned()));
        let x7 = relu(model.conv7.forward(pool(x)));
        let x = relu(model.conv8.forward(x7.to_owned()));
        let x9 = relu(model.conv9.forward(pool(x)));
        let x = relu(model.conv10.forward(x9.to_owned()));
        let x11 = relu(model.conv11.forward(pool(x)));

        assert_eq!(x3.dims(), [2, 2, 32, 32]);
        assert_eq!(x11.dims(), [2, 5, 2, 2]);

        let weights_target = x11.flatten::<2>(1, 3);
        let features_target = Tensor::cat(
            vec![
                x3.flatten(1, 3),
                x5.flatten(1, 3),
                x7.flatten(1, 3),
                x9.flatten(1, 3),
                weights_target.to_owned(),
            ],
            1,
        );

        let (features, weights) = model.forward(input);
        assert_eq!(features.dims(), features_target.dims());

        let diff = features.sub(features_target).abs().max().into_scalar();
        assert!(diff <= 1e-4, "diff: {diff:?}");
        let diff = weights.sub(weights_target).abs().max().into_scalar();
        assert!(diff <= 1e-4, "diff: {diff:?}");
    }

    #[test]
    fn compare_calibrated() {
        let device = Default::default();
        let config = slim_config();
        let model = config.init::<NdArray>(&device).unwrap();

        let features_diff = Tensor::zeros([4, config.feature_count()], &device);
        let weights_diff =
            Tensor::zeros([4, config.weight_feature_count()], &device);
        let (scores, weights) = model.compare(features_diff, weights_diff);
        assert_eq!(scores.dims(), [4, 1]);
        assert_eq!(weights.dims(), [4, 1]);

        let score = scores.abs().max().into_scalar();
        assert!(score <= 1e-6, "score: {score:?}");
    }

    #[test]
    fn default() {
        assert_eq!(PieAppModelConfig::default(), PieAppModelConfig::new());
        assert_eq!(PieAppModelConfig::default().patch_size, 64);
    }
}
