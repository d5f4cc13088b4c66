// Dump a linear frame buffer to an 8-bit sRGB PNG.

use crate::error::Error;
use crate::gamma::GammaLut;
use crate::types::{FrameBuffer, texel_to_f32};
use image::{ImageBuffer, Rgb, RgbImage};
use std::path::Path;

pub fn to_rgb_image(src: &FrameBuffer, lut: &GammaLut) -> RgbImage {
    let w = src.resolution.width;
    ImageBuffer::from_fn(w, src.resolution.height, |x, y| {
        let t = src.texels[y as usize * w as usize + x as usize];
        Rgb(lut.encode_rgb(texel_to_f32(t)))
    })
}

pub fn save_png(path: &Path, src: &FrameBuffer, lut: &GammaLut) -> Result<(), Error> {
    to_rgb_image(src, lut)
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|source| Error::Snapshot { path: path.to_path_buf(), source })
}
