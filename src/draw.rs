// Preview window + HUD.
// The composited (linear) frame is encoded to 0x00RRGGBB, the HUD is drawn
// on top with a tiny 5x7 bitmap font, and the result goes to minifb.
// Visual effects provided here:
// 1) A window that shows the composited frame (or the shadow alone).
// 2) One line of white HUD text in the top-left corner.

use crate::error::Error;
use crate::gamma::GammaLut;
use crate::types::{Channel, TexelBuffer};
use minifb::{Key, KeyRepeat, Window, WindowOptions};

/// The 0x00RRGGBB pixels that actually reach the window.
pub struct Screen {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u32>,
}

/// One-shot key events polled once per frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Input {
    pub toggle_temporal: bool,
    pub toggle_composite: bool,
    pub toggle_shadow_view: bool,
    pub blend_up: bool,
    pub blend_down: bool,
}

pub struct Drawer {
    window: Window, // the on-screen window you see
    screen: Screen, // reused every frame
}

impl Drawer {
    /// Create a window sized to the colour source.
    /// Visual: a new empty window appears with your chosen title.
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self, Error> {
        let window = Window::new(title, width, height, WindowOptions::default())
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        let screen = Screen { width, height, pixels: Vec::with_capacity(width * height) };
        Ok(Self { window, screen })
    }

    /// Encode `frame`, stamp the HUD line on it and show it.
    /// Visual: the window updates to this frame with the HUD on top.
    pub fn present<C: Channel>(
        &mut self,
        frame: &TexelBuffer<C>,
        lut: &GammaLut,
        hud: &str,
    ) -> Result<(), Error> {
        lut.encode_argb(frame, &mut self.screen.pixels);
        self.screen.width = frame.resolution.width as usize;
        self.screen.height = frame.resolution.height as usize;
        draw_text_5x7(&mut self.screen, 8, 8, hud, 0x00_FF_FF_FF);

        self.window
            .update_with_buffer(&self.screen.pixels, self.screen.width, self.screen.height)
            .map_err(|e| Error::WindowUpdate(e.to_string()))
    }

    /// False once the user closes the window or holds ESC.
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    /// Visual: none directly; T/K/S flip stages and views, Up/Down nudge the blend.
    pub fn poll_input(&self) -> Input {
        let once = |k| self.window.is_key_pressed(k, KeyRepeat::No);
        Input {
            toggle_temporal: once(Key::T),
            toggle_composite: once(Key::K),
            toggle_shadow_view: once(Key::S),
            blend_up: self.window.is_key_pressed(Key::Up, KeyRepeat::Yes),
            blend_down: self.window.is_key_pressed(Key::Down, KeyRepeat::Yes),
        }
    }
}

#[inline]
fn put_pixel(s: &mut Screen, x: i32, y: i32, color: u32) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= s.width || y >= s.height {
        return;
    }
    s.pixels[y * s.width + x] = color;
}

/* ---------- 5x7 bitmap font (just the characters the HUD uses) ---------- */

/// Each u8 is a row; the low 5 bits are the pixels (bit 4 = leftmost).
fn glyph5x7(ch: char) -> Option<[u8; 7]> {
    macro_rules! g { ($a:expr,$b:expr,$c:expr,$d:expr,$e:expr,$f:expr,$g:expr) => {
        Some([$a,$b,$c,$d,$e,$f,$g])
    }; }

    match ch {
        '0' => g!(0b01110,0b10001,0b10011,0b10101,0b11001,0b10001,0b01110),
        '1' => g!(0b00100,0b01100,0b00100,0b00100,0b00100,0b00100,0b01110),
        '2' => g!(0b01110,0b10001,0b00001,0b00010,0b00100,0b01000,0b11111),
        '3' => g!(0b11110,0b00001,0b00001,0b01110,0b00001,0b00001,0b11110),
        '4' => g!(0b00010,0b00110,0b01010,0b10010,0b11111,0b00010,0b00010),
        '5' => g!(0b11111,0b10000,0b11110,0b00001,0b00001,0b10001,0b01110),
        '6' => g!(0b00110,0b01000,0b10000,0b11110,0b10001,0b10001,0b01110),
        '7' => g!(0b11111,0b00001,0b00010,0b00100,0b01000,0b01000,0b01000),
        '8' => g!(0b01110,0b10001,0b10001,0b01110,0b10001,0b10001,0b01110),
        '9' => g!(0b01110,0b10001,0b10001,0b01111,0b00001,0b00010,0b01100),

        'A' => g!(0b01110,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001),
        'B' => g!(0b11110,0b10001,0b10001,0b11110,0b10001,0b10001,0b11110),
        'C' => g!(0b01110,0b10001,0b10000,0b10000,0b10000,0b10001,0b01110),
        'D' => g!(0b11100,0b10010,0b10001,0b10001,0b10001,0b10010,0b11100),
        'E' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b11111),
        'F' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b10000),
        'H' => g!(0b10001,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001),
        'I' => g!(0b01110,0b00100,0b00100,0b00100,0b00100,0b00100,0b01110),
        'L' => g!(0b10000,0b10000,0b10000,0b10000,0b10000,0b10000,0b11111),
        'M' => g!(0b10001,0b11011,0b10101,0b10101,0b10001,0b10001,0b10001),
        'N' => g!(0b10001,0b11001,0b10101,0b10011,0b10001,0b10001,0b10001),
        'O' => g!(0b01110,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),
        'P' => g!(0b11110,0b10001,0b10001,0b11110,0b10000,0b10000,0b10000),
        'R' => g!(0b11110,0b10001,0b10001,0b11110,0b10100,0b10010,0b10001),
        'S' => g!(0b01111,0b10000,0b10000,0b01110,0b00001,0b00001,0b11110),
        'T' => g!(0b11111,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        'U' => g!(0b10001,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),
        'W' => g!(0b10001,0b10001,0b10001,0b10101,0b10101,0b10101,0b01010),

        ' ' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00000,0b00000),
        '|' => g!(0b00100,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        ':' => g!(0b00000,0b00100,0b00000,0b00000,0b00100,0b00000,0b00000),
        '.' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00100,0b00000),

        _ => None,
    }
}

/// One glyph with a 1-pixel black drop shadow for contrast.
/// Visual: white text stays readable over both the lit checker and dark shadows.
fn draw_char_5x7(s: &mut Screen, x: i32, y: i32, ch: char, color: u32) {
    let Some(rows) = glyph5x7(ch) else { return };
    for (offset, c) in [(1, 0x00000000), (0, color)] {
        for (ry, rowbits) in rows.iter().enumerate() {
            for rx in 0..5 {
                if (rowbits & (1 << (4 - rx))) != 0 {
                    put_pixel(s, x + rx + offset, y + ry as i32 + offset, c);
                }
            }
        }
    }
}

/// 5x7 glyphs with 1-pixel spacing. Unknown characters leave a gap.
pub fn draw_text_5x7(s: &mut Screen, mut x: i32, y: i32, text: &str, color: u32) {
    for ch in text.chars() {
        draw_char_5x7(s, x, y, ch.to_ascii_uppercase(), color);
        x += 6;
    }
}
