// Where the colour buffer comes from each frame.
// Visual: this is the "unshadowed" picture; the composite darkens it where the
// blended shadow says light is blocked.
// • Camera: your live webcam feed.
// • Pattern: a flat two-tone checkerboard (no camera needed).
// • Traced: the tracer's own shaded ground and spheres, so shadows line up
//   with the geometry that casts them.

use crate::camera::CameraCapture;
use crate::error::Error;
use crate::gamma::GammaLut;
use crate::settings::SourceKind;
use crate::tracer::ShadowTracer;
use crate::types::{FrameBuffer, Resolution, check_resolution};
use log::warn;

// Checker cell size in pixels.
const CELL: u32 = 32;

pub enum ColorSource {
    Camera(CameraCapture),
    Pattern(Resolution),
    Traced(Resolution, ShadowTracer),
}

impl ColorSource {
    /// Open the requested source. A camera that fails to open falls back to the
    /// pattern, so the app still shows something.
    pub fn open(kind: SourceKind, camera: u32, requested: Resolution, tracer: &ShadowTracer) -> Self {
        match kind {
            SourceKind::Pattern => ColorSource::Pattern(requested),
            SourceKind::Traced => ColorSource::Traced(requested, tracer.clone()),
            SourceKind::Camera => match CameraCapture::new(camera, requested) {
                Ok(cam) => ColorSource::Camera(cam),
                Err(e) => {
                    warn!("{e}; using the checker pattern instead");
                    ColorSource::Pattern(requested)
                }
            },
        }
    }

    pub fn resolution(&self) -> Resolution {
        match self {
            ColorSource::Camera(cam) => cam.resolution(),
            ColorSource::Pattern(res) | ColorSource::Traced(res, _) => *res,
        }
    }

    /// Write frame number `frame` of this source into `out` (linear colour).
    /// Visual: the base image for this frame, before any shadow is applied.
    pub fn next_frame(&mut self, lut: &GammaLut, frame: u32, out: &mut FrameBuffer) -> Result<(), Error> {
        match self {
            ColorSource::Camera(cam) => cam.next_frame(lut, out),
            ColorSource::Pattern(res) => {
                check_resolution("pattern", *res, out.resolution)?;
                write_checker(out);
                Ok(())
            }
            ColorSource::Traced(res, tracer) => tracer.trace_color(*res, frame, out),
        }
    }
}

/// Two soft tones so the shadows stay readable on both.
/// Visual: 32-pixel squares, warm light and cool dark.
fn write_checker(out: &mut FrameBuffer) {
    let light = [0.8, 0.75, 0.65, 1.0];
    let dark = [0.35, 0.45, 0.55, 1.0];
    let Resolution { width, height } = out.resolution;
    for y in 0..height {
        for x in 0..width {
            let odd = ((x / CELL) + (y / CELL)) % 2 == 1;
            out.set(x, y, if odd { dark } else { light });
        }
    }
}
