pub use burn::tensor::{backend::Backend, Tensor};

/// The number of `size`-by-`size` patches sampled from
/// a `height`-by-`width` image at the given `stride`.
#[inline]
pub fn patch_count(
    height: usize,
    width: usize,
    size: usize,
    stride: usize,
) -> usize {
    if height < size || width < size {
        return 0;
    }

    ((height - size) / stride + 1) * ((width - size) / stride + 1)
}

/// Cropping the images into square patches on a regular grid.
///
/// ## Arguments
///
/// * `input` - The images with shape `[N, C, H, W]`.
/// * `size` - The side length of each patch.
/// * `stride` - The step between the origins of adjacent patches.
///
/// ## Returns
///
/// The patches with shape `[N * P, C, size, size]`,
/// where `P` is the [patch count](patch_count).
///
/// ## Details
///
/// * The patches of one image are contiguous and ordered row by row.
/// * The remaining rows and columns that cannot hold a full patch are skipped.
pub fn crop_patches<B: Backend>(
    input: Tensor<B, 4>,
    size: usize,
    stride: usize,
) -> Tensor<B, 4> {
    let [batch_size, channel_count, height, width] = input.dims();

    debug_assert!(height >= size && width >= size);
    debug_assert_ne!(stride, 0);

    // [N, C, size, size] * P
    let patches = (0..=height - size)
        .step_by(stride)
        .flat_map(|row| {
            (0..=width - size)
                .step_by(stride)
                .map(move |column| (row, column))
        })
        .map(|(row, column)| {
            input.to_owned().slice([
                0..batch_size,
                0..channel_count,
                row..row + size,
                column..column + size,
            ])
        })
        .collect::<Vec<_>>();
    let count = patches.len();

    // [N, P, C, size, size] -> [N * P, C, size, size]
    Tensor::stack::<5>(patches, 1).reshape([
        batch_size * count,
        channel_count,
        size,
        size,
    ])
}

#[cfg(test)]
mod tests {
    #[test]
    fn count() {
        use super::*;

        assert_eq!(patch_count(96, 96, 64, 27), 4);
        assert_eq!(patch_count(64, 64, 64, 27), 1);
        assert_eq!(patch_count(63, 64, 64, 27), 0);
        assert_eq!(patch_count(384, 512, 64, 27), 12 * 17);
        assert_eq!(patch_count(96, 128, 64, 1), 33 * 65);
    }

    #[test]
    fn crop_grid() {
        use super::*;
        use burn::{backend::NdArray, tensor::Int};

        let device = Default::default();

        // [2, 1, 4, 5]
        let input = Tensor::<NdArray, 1, Int>::arange(0..40, &device)
            .float()
            .reshape([2, 1, 4, 5]);
        let output = crop_patches(input, 2, 2);
        assert_eq!(output.dims(), [2 * 4, 1, 2, 2]);
        assert_eq!(output.dims()[0], 2 * patch_count(4, 5, 2, 2));

        let target = Tensor::<NdArray, 4>::from_floats(
            [
                [[[0.0, 1.0], [5.0, 6.0]]],
                [[[2.0, 3.0], [7.0, 8.0]]],
                [[[10.0, 11.0], [15.0, 16.0]]],
                [[[12.0, 13.0], [17.0, 18.0]]],
                [[[20.0, 21.0], [25.0, 26.0]]],
                [[[22.0, 23.0], [27.0, 28.0]]],
                [[[30.0, 31.0], [35.0, 36.0]]],
                [[[32.0, 33.0], [37.0, 38.0]]],
            ],
            &device,
        );
        assert!(output.equal(target).all().into_scalar());
    }

    #[test]
    fn crop_whole() {
        use super::*;
        use burn::{backend::NdArray, tensor::Distribution};

        let device = Default::default();

        let input = Tensor::<NdArray, 4>::random(
            [3, 3, 16, 16],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let output = crop_patches(input.to_owned(), 16, 5);
        assert_eq!(output.dims(), [3, 3, 16, 16]);
        assert!(output.equal(input).all().into_scalar());
    }
}
