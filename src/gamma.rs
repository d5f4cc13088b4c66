// sRGB <-> linear conversion through lookup tables.
// Camera frames come in as sRGB bytes and get decoded to linear light here;
// composited frames go back out to sRGB for the window and PNG snapshots.
// Visual: without this step shadows look too dark and mid-tones look washed
// out, because the blend and the multiply would happen on gamma-encoded values.

use crate::types::{Channel, TexelBuffer, texel_to_f32};

pub struct GammaLut {
    // sRGB(0..255) -> linear (0..1) as f32
    srgb_to_linear: [f32; 256],
    // linear(0..1) -> sRGB(0..255) via 4096-step quantization
    // (index = (linear * 4095).round())
    linear_to_srgb: [u8; 4096],
}

impl GammaLut {
    /// Build both tables once at startup.
    /// Visual: no effect on screen; just makes per-pixel conversion a table lookup.
    pub fn new() -> Self {
        let mut s2l = [0.0f32; 256];
        for (v, slot) in s2l.iter_mut().enumerate() {
            let c = v as f32 / 255.0;
            *slot = if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) };
        }

        let mut l2s = [0u8; 4096];
        for (i, slot) in l2s.iter_mut().enumerate() {
            let l = i as f32 / 4095.0;
            let s = if l <= 0.003_130_8 { 12.92 * l } else { 1.055 * l.powf(1.0 / 2.4) - 0.055 };
            *slot = (s * 255.0).round().clamp(0.0, 255.0) as u8;
        }

        Self { srgb_to_linear: s2l, linear_to_srgb: l2s }
    }

    #[inline]
    pub fn srgb_u8_to_linear(&self, v: u8) -> f32 {
        self.srgb_to_linear[v as usize]
    }

    #[inline]
    pub fn linear_to_srgb_u8(&self, l: f32) -> u8 {
        let idx = (l.clamp(0.0, 1.0) * 4095.0).round() as usize;
        self.linear_to_srgb[idx]
    }

    /// sRGB bytes -> opaque linear RGBA.
    /// Visual: mid-grey 128 becomes about 0.22, so a 50% shadow really halves the light.
    #[inline]
    pub fn decode_rgb(&self, r: u8, g: u8, b: u8) -> [f32; 4] {
        [self.srgb_u8_to_linear(r), self.srgb_u8_to_linear(g), self.srgb_u8_to_linear(b), 1.0]
    }

    /// Linear RGBA -> sRGB bytes; alpha is dropped.
    #[inline]
    pub fn encode_rgb(&self, px: [f32; 4]) -> [u8; 3] {
        [self.linear_to_srgb_u8(px[0]), self.linear_to_srgb_u8(px[1]), self.linear_to_srgb_u8(px[2])]
    }

    /// Fill `pixels` with 0x00RRGGBB values for the window.
    /// Visual: this is the exact image minifb puts on screen (before the HUD).
    pub fn encode_argb<C: Channel>(&self, src: &TexelBuffer<C>, pixels: &mut Vec<u32>) {
        pixels.clear();
        pixels.extend(src.texels.iter().map(|t| {
            let [r, g, b] = self.encode_rgb(texel_to_f32(*t));
            ((r as u32) << 16) | ((g as u32) << 8) | b as u32
        }));
    }
}

impl Default for GammaLut {
    fn default() -> Self {
        Self::new()
    }
}
