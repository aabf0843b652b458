pub use crate::error::Error;
pub use burn::tensor::{backend::Backend, Tensor, TensorData};
pub use image::RgbImage;

use rayon::prelude::*;
use std::path::Path;

/// Reading an image file and converting it to 8-bit RGB.
pub fn read_rgb_image<P: AsRef<Path>>(path: P) -> Result<RgbImage, Error> {
    Ok(image::open(path)?.into_rgb8())
}

/// ## Returns
///
/// The image tensor with shape `[3, H, W]` ranging from `0.0` to `255.0`.
pub fn get_tensor_from_image<B: Backend>(
    image: &RgbImage,
    device: &B::Device,
) -> Tensor<B, 3> {
    let (width, height) = image.dimensions();
    let data = TensorData::new(
        get_planes_from_image(image),
        [3, height as usize, width as usize],
    );

    Tensor::from_data(data, device)
}

/// ## Returns
///
/// The image tensor with shape `[N, 3, H, W]` ranging from `0.0` to `255.0`.
///
/// ## Details
///
/// * The images are converted in parallel.
/// * All the images should have the same size.
pub fn get_tensor_from_images<B: Backend>(
    images: &[RgbImage],
    device: &B::Device,
) -> Result<Tensor<B, 4>, Error> {
    let Some(first) = images.first() else {
        return Err(Error::EmptyImageBatch);
    };
    let (width, height) = first.dimensions();

    if let Some(image) = images
        .iter()
        .find(|image| image.dimensions() != (width, height))
    {
        let (other_width, other_height) = image.dimensions();
        return Err(Error::MismatchedImageSizes(
            [height, width],
            [other_height, other_width],
        ));
    }

    #[cfg(all(debug_assertions, not(test)))]
    log::debug!(
        target: "pieapp::function::convert",
        "get_tensor_from_images > {} images of {width}x{height}",
        images.len(),
    );

    let values = images
        .par_iter()
        .flat_map_iter(get_planes_from_image)
        .collect::<Vec<_>>();
    let data = TensorData::new(
        values,
        [images.len(), 3, height as usize, width as usize],
    );

    Ok(Tensor::from_data(data, device))
}

/// `[H, W, 3] -> [3, H, W]`
fn get_planes_from_image(image: &RgbImage) -> Vec<f32> {
    let pixel_count = image.width() as usize * image.height() as usize;
    let raw = image.as_raw();

    (0..3)
        .flat_map(|channel| {
            (0..pixel_count).map(move |index| raw[index * 3 + channel] as f32)
        })
        .collect()
}
