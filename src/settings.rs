// Command-line configuration and the per-frame parameter bundle derived from it.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

pub const DEFAULT_TEMPORAL_BLEND: f32 = 0.9;
pub const DEFAULT_ANGULAR_DIAMETER: f32 = 0.5;
pub const DEFAULT_SAMPLE_COUNT: u32 = 16;

/// Colour input: live camera, a flat checker pattern, or the tracer's own shading.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Camera,
    Pattern,
    Traced,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "rt-shadow-compositor", about = "Ray-traced soft shadows with temporal EMA filtering")]
pub struct Settings {
    /// Camera device index used as the colour source
    #[arg(long, default_value_t = 0)]
    pub camera: u32,

    /// Requested frame width
    #[arg(long, default_value_t = 640)]
    pub width: u32,

    /// Requested frame height
    #[arg(long, default_value_t = 480)]
    pub height: u32,

    /// Where the colour buffer comes from
    #[arg(long, value_enum, default_value_t = SourceKind::Camera)]
    pub source: SourceKind,

    /// Weight of the new shadow sample in the EMA (1 = no temporal filtering)
    #[arg(long, default_value_t = DEFAULT_TEMPORAL_BLEND, value_parser = parse_unit)]
    pub temporal_blend: f32,

    /// Angular diameter of the sun disc, in degrees
    #[arg(long, default_value_t = DEFAULT_ANGULAR_DIAMETER, value_parser = parse_degrees)]
    pub angular_diameter: f32,

    /// Shadow rays per pixel
    #[arg(long, default_value_t = DEFAULT_SAMPLE_COUNT, value_parser = clap::value_parser!(u32).range(1..=64))]
    pub sample_count: u32,

    /// Disable the temporal blend stage (raw shadow passes through)
    #[arg(long)]
    pub no_temporal: bool,

    /// Disable the composite stage (colour passes through)
    #[arg(long)]
    pub no_composite: bool,

    /// Seed for the shadow ray jitter
    #[arg(long, default_value_t = 0x5eed)]
    pub seed: u32,

    /// Render without a window
    #[arg(long)]
    pub headless: bool,

    /// Frames to render in headless mode
    #[arg(long, default_value_t = 60)]
    pub frames: u32,

    /// Write the last composited frame to this PNG
    #[arg(long)]
    pub save: Option<PathBuf>,
}

impl Settings {
    pub fn blend_parameters(&self) -> BlendParameters {
        BlendParameters::new(self.temporal_blend, self.angular_diameter, self.sample_count)
    }

    pub fn stages(&self) -> Stages {
        Stages {
            temporal: !self.no_temporal,
            composite: !self.no_composite,
        }
    }
}

fn parse_unit(s: &str) -> Result<f32, String> {
    parse_in_range(s, 0.0, 1.0)
}

fn parse_degrees(s: &str) -> Result<f32, String> {
    parse_in_range(s, 0.0, 90.0)
}

fn parse_in_range(s: &str, min: f32, max: f32) -> Result<f32, String> {
    let v: f32 = s.parse().map_err(|e| format!("`{s}` is not a number: {e}"))?;
    if !(min..=max).contains(&v) {
        return Err(format!("{v} is not in {min}..={max}"));
    }
    Ok(v)
}

/// Per-frame tunables. Only `temporal_blend` is used by the compositor;
/// the other two travel along to the shadow tracer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendParameters {
    pub temporal_blend: f32,
    pub angular_diameter: f32,
    pub sample_count: u32,
}

impl BlendParameters {
    /// Values are clamped into their valid ranges.
    pub fn new(temporal_blend: f32, angular_diameter: f32, sample_count: u32) -> Self {
        Self {
            temporal_blend: temporal_blend.clamp(0.0, 1.0),
            angular_diameter: angular_diameter.clamp(0.0, 90.0),
            sample_count: sample_count.clamp(1, 64),
        }
    }

    pub fn with_temporal_blend(self, temporal_blend: f32) -> Self {
        Self::new(temporal_blend, self.angular_diameter, self.sample_count)
    }
}

impl Default for BlendParameters {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPORAL_BLEND, DEFAULT_ANGULAR_DIAMETER, DEFAULT_SAMPLE_COUNT)
    }
}

/// Which optional stages run. A disabled stage passes its input through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stages {
    pub temporal: bool,
    pub composite: bool,
}

impl Stages {
    pub const ALL: Stages = Stages { temporal: true, composite: true };
    pub const PASS_THROUGH: Stages = Stages { temporal: false, composite: false };
}

impl Default for Stages {
    fn default() -> Self {
        Self::ALL
    }
}
