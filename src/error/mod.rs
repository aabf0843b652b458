#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Empty image batch")]
    EmptyImageBatch,

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Image size {0:?} is smaller than the patch size {1}")]
    ImageTooSmall([usize; 2], usize),

    #[error("Invalid data range: {0} (expected a positive finite number)")]
    InvalidDataRange(f64),

    #[error("Invalid patch size: {0} (expected a positive multiple of 32)")]
    InvalidPatchSize(usize),

    #[error("Invalid stride: {0} (expected a positive number)")]
    InvalidStride(usize),

    #[error("Mismatched image sizes: {0:?} and {1:?}")]
    MismatchedImageSizes([u32; 2], [u32; 2]),

    #[error("Mismatched shapes: {0:?} and {1:?}")]
    MismatchedShapes([usize; 4], [usize; 4]),

    #[error(
        "Values within [{min}, {max}] are out of \
        the data range [{start}, {end}]"
    )]
    OutOfDataRange {
        min: f64,
        max: f64,
        start: f64,
        end: f64,
    },

    #[error("Record error: {0}")]
    Record(#[from] burn::record::RecorderError),

    #[error("Unsupported channel count: {0} (expected 1 or 3)")]
    UnsupportedChannelCount(usize),
}
