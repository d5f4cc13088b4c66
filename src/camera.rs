// Live camera as the colour input of the compositor.
// Frames arrive as sRGB bytes and are decoded straight into a linear FrameBuffer.
// Visual expectation: when the frame loop calls `next_frame()`, the colour
// buffer holds your webcam image, ready to be darkened by the shadow.

use crate::error::Error;
use crate::gamma::GammaLut;
use crate::types::{FrameBuffer, Resolution, check_resolution, texel_from_f32};

use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
        Resolution as CameraResolution,
    },
};

pub struct CameraCapture {
    cam: Camera,            // the opened device, streaming
    resolution: Resolution, // what the stream actually delivers
}

impl CameraCapture {
    /// Open camera `index` as close to `requested` as the device allows.
    /// Visual: the camera LED usually turns on here; nothing is drawn yet.
    pub fn new(index: u32, requested: Resolution) -> Result<Self, Error> {
        let fmt = CameraFormat::new(
            CameraResolution::new(requested.width, requested.height),
            FrameFormat::YUYV, // uncompressed; cheap to convert to RGB
            30,
        );
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        let mut cam = Camera::new(CameraIndex::Index(index), req)
            .map_err(|e| Error::CameraInit(format!("create camera: {e}")))?;
        cam.open_stream()
            .map_err(|e| Error::CameraInit(format!("open stream: {e}")))?;

        // The stream might settle on a slightly different size.
        let actual = cam.resolution();
        Ok(Self {
            cam,
            resolution: Resolution::new(actual.width(), actual.height()),
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Block for the next frame and decode it into `out` as linear colour.
    /// Visual: the newest webcam image, unshadowed, in `out`.
    pub fn next_frame(&mut self, lut: &GammaLut, out: &mut FrameBuffer) -> Result<(), Error> {
        let frame = self
            .cam
            .frame()
            .map_err(|e| Error::CameraFrame(format!("fetch frame: {e}")))?;
        let rgb = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CameraFrame(format!("decode RGB: {e}")))?;

        let (w, h) = rgb.dimensions();
        check_resolution("camera", out.resolution, Resolution::new(w, h))
            .map_err(|e| Error::CameraFrame(e.to_string()))?;

        // sRGB bytes -> linear light; alpha is always opaque.
        for (texel, px) in out.texels.iter_mut().zip(rgb.pixels()) {
            *texel = texel_from_f32(lut.decode_rgb(px[0], px[1], px[2]));
        }
        Ok(())
    }
}
