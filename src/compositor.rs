// Temporal shadow filter + colour composite for one viewport.
//
// Per frame:  ensure history  ->  blend(raw shadow, history)  ->  composite(colour, blended)
// The blend writes into its own buffer first and only then refreshes the history,
// so the read of last frame's value never races the write of this frame's.

use crate::error::Error;
use crate::history::CompositorState;
use crate::settings::{BlendParameters, Stages};
use crate::types::{
    FrameBuffer, HistoryBuffer, NO_SHADOW, Resolution, check_resolution, texel_from_f32,
    texel_to_f32,
};
use log::debug;
use rayon::prelude::*;

// Texels per rayon task.
const CHUNK: usize = 4096;

/// What the tracer hands over each frame.
pub struct FrameInputs<'a> {
    pub raw_color: &'a FrameBuffer,
    pub raw_shadow: &'a FrameBuffer,
}

/// `out = factor * raw + (1 - factor) * history`, per texel and channel.
/// History and output stay in f32 so small factors keep converging.
pub fn ema_blend(
    raw: &FrameBuffer,
    history: &HistoryBuffer,
    factor: f32,
    out: &mut HistoryBuffer,
) -> Result<(), Error> {
    check_resolution("blend", raw.resolution, history.resolution)?;
    check_resolution("blend", raw.resolution, out.resolution)?;

    let keep = 1.0 - factor;
    out.texels
        .par_chunks_mut(CHUNK)
        .zip(raw.texels.par_chunks(CHUNK))
        .zip(history.texels.par_chunks(CHUNK))
        .for_each(|((dst, cur), prev)| {
            for ((d, c), p) in dst.iter_mut().zip(cur).zip(prev) {
                let c = texel_to_f32(*c);
                *d = std::array::from_fn(|ch| factor * c[ch] + keep * p[ch]);
            }
        });
    Ok(())
}

/// `output = colour * shadow` when `enabled`, else a plain copy of the colour.
/// Stateless; safe to run again with the same inputs.
pub fn composite(
    enabled: bool,
    raw_color: &FrameBuffer,
    blended_shadow: &HistoryBuffer,
    output: &mut FrameBuffer,
) -> Result<(), Error> {
    check_resolution("composite", raw_color.resolution, output.resolution)?;
    if !enabled {
        return output.copy_from(raw_color);
    }
    check_resolution("composite", raw_color.resolution, blended_shadow.resolution)?;

    output
        .texels
        .par_chunks_mut(CHUNK)
        .zip(raw_color.texels.par_chunks(CHUNK))
        .zip(blended_shadow.texels.par_chunks(CHUNK))
        .for_each(|((dst, color), shadow)| {
            for ((d, c), s) in dst.iter_mut().zip(color).zip(shadow) {
                let c = texel_to_f32(*c);
                *d = texel_from_f32([c[0] * s[0], c[1] * s[1], c[2] * s[2], c[3] * s[3]]);
            }
        });
    Ok(())
}

/// Owns the history of one viewport. Never share one between viewports:
/// the filter assumes a single continuous frame sequence.
#[derive(Debug, Default)]
pub struct ShadowCompositor {
    state: CompositorState,
    stages: Stages,
    // This frame's blended shadow; kept around to avoid a per-frame allocation.
    blended: Option<HistoryBuffer>,
}

impl ShadowCompositor {
    pub fn new(stages: Stages) -> Self {
        Self { state: CompositorState::new(), stages, blended: None }
    }

    pub fn stages(&self) -> Stages {
        self.stages
    }

    pub fn set_stages(&mut self, stages: Stages) {
        self.stages = stages;
    }

    pub fn state(&self) -> &CompositorState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut CompositorState {
        &mut self.state
    }

    pub fn ensure_history_buffer(&mut self, resolution: Resolution) -> Result<(), Error> {
        self.state.ensure_history_buffer(resolution)
    }

    /// Filter `raw_shadow` against the history into `blended_out`, then store
    /// the result as the next frame's history.
    ///
    /// Without a history buffer, or with the temporal stage off, the raw shadow
    /// passes through and (if a history exists) becomes the new history as-is.
    pub fn blend(
        &mut self,
        raw_shadow: &FrameBuffer,
        params: &BlendParameters,
        blended_out: &mut HistoryBuffer,
    ) -> Result<(), Error> {
        check_resolution("blend", raw_shadow.resolution, blended_out.resolution)?;
        if let Some(history) = self.state.history() {
            check_resolution("blend", raw_shadow.resolution, history.resolution)?;
        }

        match self.state.history_mut() {
            Some(history) if self.stages.temporal => {
                ema_blend(raw_shadow, history, params.temporal_blend, blended_out)?;
                history.copy_from(blended_out)?;
            }
            history => {
                debug!("temporal stage bypassed, raw shadow passes through");
                blended_out.copy_from(raw_shadow)?;
                if let Some(history) = history {
                    history.copy_from(raw_shadow)?;
                }
            }
        }
        Ok(())
    }

    /// One full frame: history upkeep, temporal blend, composite into `output`.
    pub fn render_frame(
        &mut self,
        inputs: &FrameInputs<'_>,
        params: &BlendParameters,
        output: &mut FrameBuffer,
    ) -> Result<(), Error> {
        let resolution = inputs.raw_shadow.resolution;
        check_resolution("frame", resolution, inputs.raw_color.resolution)?;
        check_resolution("frame", resolution, output.resolution)?;

        self.state.ensure_history_buffer(resolution)?;
        let mut blended = match self.blended.take() {
            Some(buffer) if buffer.resolution == resolution => buffer,
            _ => HistoryBuffer::try_filled(resolution, NO_SHADOW)?,
        };

        let result = self
            .blend(inputs.raw_shadow, params, &mut blended)
            .and_then(|()| composite(self.stages.composite, inputs.raw_color, &blended, output));
        self.blended = Some(blended);
        result
    }

    /// Shadow produced by the last `render_frame`, for debug views.
    pub fn blended_shadow(&self) -> Option<&HistoryBuffer> {
        self.blended.as_ref()
    }

    pub fn release(&mut self) {
        self.state.release();
        self.blended = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 2e-3;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() <= EPS
    }

    fn uniform(res: Resolution, v: f32) -> FrameBuffer {
        FrameBuffer::try_filled(res, [v, v, v, 1.0]).unwrap()
    }

    fn scratch(res: Resolution) -> HistoryBuffer {
        HistoryBuffer::try_filled(res, [0.0; 4]).unwrap()
    }

    fn params(b: f32) -> BlendParameters {
        BlendParameters::default().with_temporal_blend(b)
    }

    #[test]
    fn ema_converges_geometrically() {
        let res = Resolution::new(4, 4);
        let mut c = ShadowCompositor::new(Stages::ALL);
        c.ensure_history_buffer(res).unwrap();
        let raw = uniform(res, 0.2);
        let mut out = scratch(res);

        for expected in [0.6, 0.4, 0.3] {
            c.blend(&raw, &params(0.5), &mut out).unwrap();
            assert!(close(out.get(1, 1)[0], expected), "{:?} vs {expected}", out.get(1, 1));
            assert!(close(c.state().history().unwrap().get(1, 1)[0], expected));
        }
    }

    #[test]
    fn small_factor_still_reaches_the_target() {
        let res = Resolution::new(1, 1);
        let mut c = ShadowCompositor::new(Stages::ALL);
        c.ensure_history_buffer(res).unwrap();
        let raw = uniform(res, 0.2);
        let target = raw.get(0, 0)[0];
        let mut out = scratch(res);

        for _ in 0..5000 {
            c.blend(&raw, &params(0.01), &mut out).unwrap();
        }
        let settled = c.state().history().unwrap().get(0, 0)[0];
        assert!((settled - target).abs() < 1e-3, "settled at {settled}");
        assert!((settled - 0.2).abs() < 1e-3);
    }

    #[test]
    fn factor_one_is_raw() {
        let res = Resolution::new(2, 2);
        let mut c = ShadowCompositor::new(Stages::ALL);
        c.ensure_history_buffer(res).unwrap();
        c.state_mut().history_mut().unwrap().fill([0.7; 4]);
        let raw = uniform(res, 0.3);
        let mut out = scratch(res);

        c.blend(&raw, &params(1.0), &mut out).unwrap();
        assert_eq!(out.to_f32_vec(), raw.to_f32_vec());
    }

    #[test]
    fn factor_zero_freezes_history() {
        let res = Resolution::new(2, 2);
        let mut c = ShadowCompositor::new(Stages::ALL);
        c.ensure_history_buffer(res).unwrap();
        c.state_mut().history_mut().unwrap().fill([0.7; 4]);
        let history = c.state().history().unwrap().clone();
        let mut out = scratch(res);

        c.blend(&uniform(res, 0.1), &params(0.0), &mut out).unwrap();
        assert_eq!(out, history);
    }

    #[test]
    fn first_frame_blends_against_white() {
        let res = Resolution::new(3, 3);
        let mut c = ShadowCompositor::new(Stages::ALL);
        c.ensure_history_buffer(res).unwrap();
        let mut out = scratch(res);

        c.blend(&uniform(res, 0.3), &params(0.9), &mut out).unwrap();
        assert!(close(out.get(2, 2)[0], 0.37));
    }

    #[test]
    fn no_history_passes_raw_through() {
        let res = Resolution::new(2, 2);
        let mut c = ShadowCompositor::new(Stages::ALL);
        let raw = uniform(res, 0.4);
        let mut out = scratch(res);

        c.blend(&raw, &params(0.5), &mut out).unwrap();
        assert_eq!(out.to_f32_vec(), raw.to_f32_vec());
        assert!(c.state().history().is_none());
    }

    #[test]
    fn disabled_temporal_stage_copies_raw_into_history() {
        let res = Resolution::new(2, 2);
        let mut c = ShadowCompositor::new(Stages { temporal: false, composite: true });
        c.ensure_history_buffer(res).unwrap();
        let raw = uniform(res, 0.25);
        let mut out = scratch(res);

        c.blend(&raw, &params(0.5), &mut out).unwrap();
        assert_eq!(out.to_f32_vec(), raw.to_f32_vec());
        assert_eq!(c.state().history().unwrap().to_f32_vec(), raw.to_f32_vec());
    }

    #[test]
    fn mismatched_history_is_an_error() {
        let mut c = ShadowCompositor::new(Stages::ALL);
        c.ensure_history_buffer(Resolution::new(4, 4)).unwrap();
        let raw = uniform(Resolution::new(2, 2), 0.5);
        let mut out = scratch(Resolution::new(2, 2));

        let err = c.blend(&raw, &params(0.5), &mut out).unwrap_err();
        assert!(matches!(err, Error::ResolutionMismatch { stage: "blend", .. }));
        // History untouched.
        assert_eq!(c.state().history().unwrap().get(0, 0), NO_SHADOW);
    }

    #[test]
    fn composite_multiplies_colour_by_shadow() {
        let res = Resolution::new(1, 1);
        let color = FrameBuffer::try_filled(res, [0.8, 0.5, 0.2, 1.0]).unwrap();
        let shadow = HistoryBuffer::try_filled(res, [0.5, 0.5, 0.5, 1.0]).unwrap();
        let mut out = uniform(res, 0.0);

        composite(true, &color, &shadow, &mut out).unwrap();
        let px = out.get(0, 0);
        assert!(close(px[0], 0.4) && close(px[1], 0.25) && close(px[2], 0.1));

        let first = out.clone();
        composite(true, &color, &shadow, &mut out).unwrap();
        assert_eq!(out, first);
    }

    #[test]
    fn disabled_composite_copies_colour() {
        let res = Resolution::new(2, 1);
        let color = FrameBuffer::try_filled(res, [0.8, 0.5, 0.2, 1.0]).unwrap();
        let shadow = scratch(res);
        let mut out = uniform(res, 0.0);

        composite(false, &color, &shadow, &mut out).unwrap();
        assert_eq!(out, color);
    }

    #[test]
    fn render_frame_runs_every_stage() {
        let res = Resolution::new(4, 2);
        let mut c = ShadowCompositor::new(Stages::ALL);
        let color = FrameBuffer::try_filled(res, [0.8, 0.5, 0.2, 1.0]).unwrap();
        let shadow = uniform(res, 0.3);
        let mut out = uniform(res, 0.0);
        let inputs = FrameInputs { raw_color: &color, raw_shadow: &shadow };

        c.render_frame(&inputs, &params(0.9), &mut out).unwrap();
        assert_eq!(c.state().resolution(), res);
        assert!(close(c.blended_shadow().unwrap().get(0, 0)[0], 0.37));
        assert!(close(out.get(3, 1)[0], 0.8 * 0.37));

        // Resizing mid-stream starts from a white history again.
        let res2 = Resolution::new(2, 2);
        let color2 = FrameBuffer::try_filled(res2, [1.0; 4]).unwrap();
        let shadow2 = uniform(res2, 0.3);
        let mut out2 = uniform(res2, 0.0);
        let inputs = FrameInputs { raw_color: &color2, raw_shadow: &shadow2 };
        c.render_frame(&inputs, &params(0.9), &mut out2).unwrap();
        assert!(close(out2.get(1, 1)[0], 0.37));
    }

    #[test]
    fn release_frees_buffers() {
        let res = Resolution::new(2, 2);
        let mut c = ShadowCompositor::new(Stages::ALL);
        let color = uniform(res, 1.0);
        let shadow = uniform(res, 0.5);
        let mut out = uniform(res, 0.0);
        c.render_frame(&FrameInputs { raw_color: &color, raw_shadow: &shadow }, &params(0.5), &mut out)
            .unwrap();

        c.release();
        assert!(c.state().history().is_none());
        assert!(c.blended_shadow().is_none());
    }
}
