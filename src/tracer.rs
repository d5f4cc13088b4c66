// CPU stand-in for the ray-traced sun pass.
// The scene is a checkered ground plane seen straight from above with a handful
// of spheres floating over it. Per pixel, a primary ray finds the visible
// surface; `trace_color` shades it, `trace` fires `sample_count` shadow rays
// from it toward a jittered point on the sun disc.
// Low sample counts give a noisy penumbra; that noise is what the temporal
// filter in `compositor` smooths out.

use crate::error::Error;
use crate::settings::BlendParameters;
use crate::types::{FrameBuffer, Resolution, check_resolution, texel_from_f32};
use glam::Vec3;
use rayon::prelude::*;
use std::f32::consts::TAU;

// Offset along the ray so a surface does not shadow itself.
const RAY_EPSILON: f32 = 1e-4;
// Height of the orthographic eye looking down at the ground.
const EYE_HEIGHT: f32 = 2.0;
// Light that reaches faces turned away from the sun.
const AMBIENT: f32 = 0.25;
// Ground checker cell size in world units.
const GROUND_CELL: f32 = 0.25;

/// Deterministic xorshift32, one per pixel per frame.
#[derive(Clone)]
struct Rng32 {
    state: u32,
}

impl Rng32 {
    fn for_pixel(seed: u32, frame: u32, pixel: u32) -> Self {
        let mut h = seed ^ frame.wrapping_mul(0x9E37_79B9) ^ pixel.wrapping_mul(0x85EB_CA6B);
        // Finalizer from murmur3 to spread neighbouring pixels apart.
        h ^= h >> 16;
        h = h.wrapping_mul(0x7FEB_352D);
        h ^= h >> 15;
        h = h.wrapping_mul(0x846C_A68B);
        h ^= h >> 16;
        Self { state: h | 1 }
    }

    #[inline]
    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform [0,1)
    #[inline]
    fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / ((1u32 << 24) as f32)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
    pub albedo: Vec3,
}

impl Sphere {
    /// Both ray parameters, if the ray's line meets the sphere at all.
    fn roots(&self, origin: Vec3, dir: Vec3) -> Option<(f32, f32)> {
        let oc = origin - self.center;
        let b = oc.dot(dir);
        let c = oc.length_squared() - self.radius * self.radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sq = disc.sqrt();
        Some((-b - sq, -b + sq))
    }

    /// True if the ray hits the sphere ahead of the origin (or starts inside it).
    fn occludes(&self, origin: Vec3, dir: Vec3) -> bool {
        self.roots(origin, dir).is_some_and(|(_, far)| far > RAY_EPSILON)
    }

    /// Distance to the front face, for rays starting outside.
    fn front_hit(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        self.roots(origin, dir)
            .map(|(near, _)| near)
            .filter(|&t| t > RAY_EPSILON)
    }
}

/// Sun position; the azimuth drifts a little every frame so shadows move.
#[derive(Clone, Copy, Debug)]
pub struct Sun {
    pub azimuth: f32,
    pub elevation: f32,
    pub orbit_per_frame: f32,
}

impl Sun {
    fn direction(&self, frame: u32) -> Vec3 {
        let az = self.azimuth + self.orbit_per_frame * frame as f32;
        let (se, ce) = self.elevation.sin_cos();
        Vec3::new(ce * az.cos(), ce * az.sin(), se)
    }
}

impl Default for Sun {
    fn default() -> Self {
        Self {
            azimuth: 0.6,
            elevation: 55f32.to_radians(),
            orbit_per_frame: 0.004,
        }
    }
}

/// What the primary ray landed on.
struct Surface {
    point: Vec3,
    normal: Vec3,
    albedo: Vec3,
}

#[derive(Clone)]
pub struct ShadowTracer {
    seed: u32,
    spheres: Vec<Sphere>,
    sun: Sun,
}

impl ShadowTracer {
    /// Default scene: a small ring of spheres plus one in the middle.
    pub fn new(seed: u32) -> Self {
        let mut spheres = vec![Sphere {
            center: Vec3::new(0.0, 0.0, 0.45),
            radius: 0.22,
            albedo: Vec3::new(0.85, 0.3, 0.2),
        }];
        for i in 0..5 {
            let a = i as f32 / 5.0 * TAU;
            spheres.push(Sphere {
                center: Vec3::new(0.75 * a.cos(), 0.6 * a.sin(), 0.25 + 0.05 * i as f32),
                radius: 0.12,
                albedo: Vec3::new(0.25, 0.45 + 0.08 * i as f32, 0.8),
            });
        }
        Self::with_scene(seed, spheres, Sun::default())
    }

    pub fn with_scene(seed: u32, spheres: Vec<Sphere>, sun: Sun) -> Self {
        Self { seed, spheres, sun }
    }

    /// Ground point under pixel (x, y); x spans the aspect ratio, y spans [-1, 1].
    fn ground_point(resolution: Resolution, x: usize, y: usize) -> Vec3 {
        let aspect = resolution.width as f32 / resolution.height as f32;
        let u = (2.0 * (x as f32 + 0.5) / resolution.width as f32 - 1.0) * aspect;
        let v = 1.0 - 2.0 * (y as f32 + 0.5) / resolution.height as f32;
        Vec3::new(u, v, 0.0)
    }

    /// Nearest surface straight below the eye at this pixel.
    fn primary_hit(&self, ground: Vec3) -> Surface {
        let origin = Vec3::new(ground.x, ground.y, EYE_HEIGHT);
        let down = Vec3::NEG_Z;
        let nearest = self
            .spheres
            .iter()
            .filter_map(|s| s.front_hit(origin, down).map(|t| (t, s)))
            .min_by(|a, b| a.0.total_cmp(&b.0));

        match nearest {
            Some((t, sphere)) => {
                let point = origin + down * t;
                Surface {
                    point,
                    normal: (point - sphere.center).normalize(),
                    albedo: sphere.albedo,
                }
            }
            None => {
                let cell = (ground.x / GROUND_CELL).floor() + (ground.y / GROUND_CELL).floor();
                let albedo = if cell.rem_euclid(2.0) < 1.0 {
                    Vec3::new(0.8, 0.78, 0.7)
                } else {
                    Vec3::new(0.45, 0.5, 0.55)
                };
                Surface { point: ground, normal: Vec3::Z, albedo }
            }
        }
    }

    /// Shade the visible surfaces into `out`: albedo times a Lambert term.
    /// Shadowing is left to the shadow buffer and the composite.
    pub fn trace_color(
        &self,
        resolution: Resolution,
        frame: u32,
        out: &mut FrameBuffer,
    ) -> Result<(), Error> {
        check_resolution("trace color", resolution, out.resolution)?;

        let width = resolution.width as usize;
        let sun = self.sun.direction(frame);
        out.texels.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
            for (x, texel) in row.iter_mut().enumerate() {
                let surface = self.primary_hit(Self::ground_point(resolution, x, y));
                let light = AMBIENT + (1.0 - AMBIENT) * surface.normal.dot(sun).max(0.0);
                let c = surface.albedo * light;
                *texel = texel_from_f32([c.x, c.y, c.z, 1.0]);
            }
        });
        Ok(())
    }

    /// Trace one frame of raw shadow into `out` (1 = lit, 0 = fully occluded).
    pub fn trace(
        &self,
        resolution: Resolution,
        params: &BlendParameters,
        frame: u32,
        out: &mut FrameBuffer,
    ) -> Result<(), Error> {
        check_resolution("trace", resolution, out.resolution)?;

        let width = resolution.width as usize;
        let sun = self.sun.direction(frame);
        // Basis around the sun direction for cone sampling.
        let (tangent, bitangent) = sun.any_orthonormal_pair();
        let cos_max = (params.angular_diameter.to_radians() * 0.5).cos();
        let samples = params.sample_count;

        out.texels.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
            for (x, texel) in row.iter_mut().enumerate() {
                let surface = self.primary_hit(Self::ground_point(resolution, x, y));
                let origin = surface.point + surface.normal * RAY_EPSILON;
                let mut rng = Rng32::for_pixel(self.seed, frame, (y * width + x) as u32);

                let mut lit = 0u32;
                for _ in 0..samples {
                    let cos_t = 1.0 - rng.next_f32() * (1.0 - cos_max);
                    let sin_t = (1.0 - cos_t * cos_t).max(0.0).sqrt();
                    let phi = TAU * rng.next_f32();
                    let dir = (sun * cos_t + (tangent * phi.cos() + bitangent * phi.sin()) * sin_t)
                        .normalize();
                    if !self.spheres.iter().any(|s| s.occludes(origin, dir)) {
                        lit += 1;
                    }
                }

                let t = lit as f32 / samples as f32;
                *texel = texel_from_f32([t, t, t, 1.0]);
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(res: Resolution) -> FrameBuffer {
        FrameBuffer::try_filled(res, [0.5; 4]).unwrap()
    }

    #[test]
    fn empty_scene_is_fully_lit() {
        let res = Resolution::new(8, 6);
        let tracer = ShadowTracer::with_scene(1, Vec::new(), Sun::default());
        let mut out = buffer(res);
        tracer.trace(res, &BlendParameters::default(), 0, &mut out).unwrap();
        assert!(out.texels.iter().all(|t| t[0].to_f32() == 1.0));
    }

    #[test]
    fn enclosing_sphere_shadows_everything() {
        let res = Resolution::new(4, 4);
        let cover = Sphere { center: Vec3::new(0.0, 0.0, 1.0), radius: 10.0, albedo: Vec3::ONE };
        let tracer = ShadowTracer::with_scene(1, vec![cover], Sun::default());
        let mut out = buffer(res);
        tracer.trace(res, &BlendParameters::default(), 3, &mut out).unwrap();
        assert!(out.texels.iter().all(|t| t[0].to_f32() == 0.0));
    }

    #[test]
    fn same_frame_is_reproducible() {
        let res = Resolution::new(32, 24);
        let tracer = ShadowTracer::new(42);
        let params = BlendParameters::new(0.9, 5.0, 4);
        let (mut a, mut b) = (buffer(res), buffer(res));
        tracer.trace(res, &params, 9, &mut a).unwrap();
        tracer.trace(res, &params, 9, &mut b).unwrap();
        assert_eq!(a, b);
        assert!(a.texels.iter().all(|t| (0.0..=1.0).contains(&t[0].to_f32())));
        assert!(a.texels.iter().any(|t| t[0].to_f32() < 1.0));
    }

    #[test]
    fn point_sun_gives_hard_shadows() {
        let res = Resolution::new(32, 24);
        let tracer = ShadowTracer::new(7);
        let params = BlendParameters::new(0.9, 0.0, 8);
        let mut out = buffer(res);
        tracer.trace(res, &params, 0, &mut out).unwrap();
        assert!(out.texels.iter().all(|t| {
            let v = t[0].to_f32();
            v == 0.0 || v == 1.0
        }));
    }

    #[test]
    fn wrong_output_size_is_rejected() {
        let tracer = ShadowTracer::new(0);
        let mut out = buffer(Resolution::new(2, 2));
        let err = tracer.trace(Resolution::new(4, 4), &BlendParameters::default(), 0, &mut out);
        assert!(matches!(err, Err(Error::ResolutionMismatch { stage: "trace", .. })));
        let err = tracer.trace_color(Resolution::new(4, 4), 0, &mut out);
        assert!(matches!(err, Err(Error::ResolutionMismatch { stage: "trace color", .. })));
    }

    #[test]
    fn color_shows_sphere_over_ground() {
        let res = Resolution::new(9, 9);
        let red = Vec3::new(1.0, 0.0, 0.0);
        let ball = Sphere { center: Vec3::new(0.0, 0.0, 0.5), radius: 0.3, albedo: red };
        let tracer = ShadowTracer::with_scene(0, vec![ball], Sun::default());
        let mut out = buffer(res);
        tracer.trace_color(res, 0, &mut out).unwrap();

        // Centre pixel sees the sphere top, the corner sees the ground.
        let centre = out.get(4, 4);
        assert!(centre[0] > 0.0 && centre[1] == 0.0 && centre[2] == 0.0);
        let corner = out.get(0, 0);
        assert!(corner[1] > 0.0);
        assert!(out.texels.iter().all(|t| t[3].to_f32() == 1.0));
    }

    #[test]
    fn lit_sphere_top_is_not_self_shadowed() {
        let res = Resolution::new(9, 9);
        let ball = Sphere { center: Vec3::new(0.0, 0.0, 0.5), radius: 0.3, albedo: Vec3::ONE };
        let tracer = ShadowTracer::with_scene(0, vec![ball], Sun::default());
        let mut out = buffer(res);
        tracer.trace(res, &BlendParameters::new(0.9, 0.0, 4), 0, &mut out).unwrap();
        assert_eq!(out.get(4, 4)[0], 1.0);
    }
}
