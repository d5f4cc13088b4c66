//! Temporally filtered ray-traced shadows.
//!
//! A [`tracer::ShadowTracer`] produces a noisy shadow buffer each frame, a
//! [`compositor::ShadowCompositor`] smooths it with an exponential moving
//! average against its history buffer and multiplies it into the colour
//! buffer. [`scheduler::FrameScheduler`] keeps one compositor per viewport.

pub mod camera;
pub mod compositor;
pub mod draw;
pub mod error;
pub mod gamma;
pub mod history;
pub mod scheduler;
pub mod settings;
pub mod snapshot;
pub mod source;
pub mod tracer;
pub mod types;
