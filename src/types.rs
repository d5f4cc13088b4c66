// Core buffer types shared by the tracer, the compositor and the window.
// Every buffer is linear-light RGBA. Per-frame inputs and outputs are 16-bit
// floats; the temporal history is kept at full f32 so tiny EMA steps still land.

use crate::error::Error;
use half::f16;
use std::fmt::{self, Display};

/// Size of a frame in texels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Sentinel for "nothing allocated yet".
    pub const UNINITIALIZED: Resolution = Resolution { width: 0, height: 0 };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Storage format of one colour channel.
pub trait Channel: Copy + Send + Sync + PartialEq + fmt::Debug + 'static {
    fn from_f32(v: f32) -> Self;
    fn to_f32(self) -> f32;
}

impl Channel for f16 {
    #[inline]
    fn from_f32(v: f32) -> Self {
        f16::from_f32(v)
    }

    #[inline]
    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }
}

impl Channel for f32 {
    #[inline]
    fn from_f32(v: f32) -> Self {
        v
    }

    #[inline]
    fn to_f32(self) -> f32 {
        self
    }
}

/// One half-float RGBA texel in linear light.
pub type Texel = [f16; 4];

/// Full transmittance: the value of a texel nothing occludes.
pub const NO_SHADOW: [f32; 4] = [1.0; 4];

#[inline]
pub fn texel_from_f32<C: Channel>(v: [f32; 4]) -> [C; 4] {
    [C::from_f32(v[0]), C::from_f32(v[1]), C::from_f32(v[2]), C::from_f32(v[3])]
}

#[inline]
pub fn texel_to_f32<C: Channel>(t: [C; 4]) -> [f32; 4] {
    [t[0].to_f32(), t[1].to_f32(), t[2].to_f32(), t[3].to_f32()]
}

/// A 2D image of RGBA texels, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct TexelBuffer<C> {
    pub resolution: Resolution,
    pub texels: Vec<[C; 4]>,
}

/// Colour, raw shadow and output: half precision.
pub type FrameBuffer = TexelBuffer<f16>;

/// Shadow history and this frame's blended shadow: full precision.
pub type HistoryBuffer = TexelBuffer<f32>;

impl<C: Channel> TexelBuffer<C> {
    /// Allocate a buffer with every texel set to `value`.
    /// Reservation failure surfaces as `Error::Allocation` instead of aborting.
    pub fn try_filled(resolution: Resolution, value: [f32; 4]) -> Result<Self, Error> {
        if resolution.is_empty() {
            return Err(Error::InvalidResolution(resolution));
        }
        let len = resolution.texel_count();
        let mut texels = Vec::new();
        texels
            .try_reserve_exact(len)
            .map_err(|source| Error::Allocation { resolution, source })?;
        texels.resize(len, texel_from_f32(value));
        Ok(Self { resolution, texels })
    }

    pub fn fill(&mut self, value: [f32; 4]) {
        let t = texel_from_f32(value);
        self.texels.iter_mut().for_each(|px| *px = t);
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.resolution.width as usize + x as usize
    }

    pub fn get(&self, x: u32, y: u32) -> [f32; 4] {
        texel_to_f32(self.texels[self.index(x, y)])
    }

    pub fn set(&mut self, x: u32, y: u32, value: [f32; 4]) {
        let idx = self.index(x, y);
        self.texels[idx] = texel_from_f32(value);
    }

    /// Every texel widened to f32, row-major.
    pub fn to_f32_vec(&self) -> Vec<[f32; 4]> {
        self.texels.iter().map(|t| texel_to_f32(*t)).collect()
    }

    /// Overwrite this buffer with `other`, converting the channel format if
    /// needed; both must share a resolution.
    pub fn copy_from<D: Channel>(&mut self, other: &TexelBuffer<D>) -> Result<(), Error> {
        check_resolution("copy", self.resolution, other.resolution)?;
        for (dst, src) in self.texels.iter_mut().zip(&other.texels) {
            *dst = texel_from_f32(texel_to_f32(*src));
        }
        Ok(())
    }
}

/// Fails with `ResolutionMismatch` unless `found == expected`.
pub fn check_resolution(
    stage: &'static str,
    expected: Resolution,
    found: Resolution,
) -> Result<(), Error> {
    if expected != found {
        return Err(Error::ResolutionMismatch { stage, expected, found });
    }
    Ok(())
}
