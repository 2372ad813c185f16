use crate::prelude::{RecorderError, RecorderResult};
use image::codecs::jpeg::JpegEncoder;
use image::{GenericImageView, PixelWithColorType};

pub fn encode_jpeg<I>(image: &I, quality: u8) -> RecorderResult<Vec<u8>>
where
    I: GenericImageView,
    I::Pixel: PixelWithColorType,
{
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
        .encode_image(image)
        .map_err(|err| RecorderError::storage("encoding jpeg", err))?;
    Ok(bytes)
}
