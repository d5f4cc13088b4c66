// Per-viewport compositors, owned by whoever drives the frame loop.
// Viewports are keyed by an id the application picks, inserted the first
// time they are rendered and removed only when the application says so.

use crate::compositor::{FrameInputs, ShadowCompositor};
use crate::error::Error;
use crate::settings::{BlendParameters, Stages};
use crate::types::FrameBuffer;
use log::debug;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ViewportId(pub u32);

#[derive(Debug, Default)]
pub struct FrameScheduler {
    compositors: HashMap<ViewportId, ShadowCompositor>,
    stages: Stages,
}

impl FrameScheduler {
    pub fn new(stages: Stages) -> Self {
        Self { compositors: HashMap::new(), stages }
    }

    /// Run one frame for `viewport`, creating its compositor on first sight.
    pub fn render(
        &mut self,
        viewport: ViewportId,
        inputs: &FrameInputs<'_>,
        params: &BlendParameters,
        output: &mut FrameBuffer,
    ) -> Result<(), Error> {
        let stages = self.stages;
        let compositor = self.compositors.entry(viewport).or_insert_with(|| {
            debug!("new viewport {viewport:?}");
            ShadowCompositor::new(stages)
        });
        compositor.render_frame(inputs, params, output)
    }

    /// Drop the viewport and its buffers. Returns false if it was unknown.
    pub fn teardown(&mut self, viewport: ViewportId) -> bool {
        match self.compositors.remove(&viewport) {
            Some(mut compositor) => {
                compositor.release();
                debug!("released viewport {viewport:?}");
                true
            }
            None => false,
        }
    }

    pub fn stages(&self) -> Stages {
        self.stages
    }

    pub fn set_stages(&mut self, stages: Stages) {
        self.stages = stages;
        for compositor in self.compositors.values_mut() {
            compositor.set_stages(stages);
        }
    }

    pub fn get(&self, viewport: ViewportId) -> Option<&ShadowCompositor> {
        self.compositors.get(&viewport)
    }

    pub fn contains(&self, viewport: ViewportId) -> bool {
        self.compositors.contains_key(&viewport)
    }

    pub fn len(&self) -> usize {
        self.compositors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compositors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Resolution;

    fn frame(res: Resolution, shadow: f32) -> (FrameBuffer, FrameBuffer, FrameBuffer) {
        (
            FrameBuffer::try_filled(res, [1.0; 4]).unwrap(),
            FrameBuffer::try_filled(res, [shadow, shadow, shadow, 1.0]).unwrap(),
            FrameBuffer::try_filled(res, [0.0; 4]).unwrap(),
        )
    }

    #[test]
    fn viewports_keep_independent_history() {
        let mut scheduler = FrameScheduler::new(Stages::ALL);
        let params = BlendParameters::default().with_temporal_blend(0.5);
        let (a, b) = (ViewportId(1), ViewportId(2));
        let res = Resolution::new(2, 2);

        let (color, dark, mut out) = frame(res, 0.0);
        for _ in 0..3 {
            let inputs = FrameInputs { raw_color: &color, raw_shadow: &dark };
            scheduler.render(a, &inputs, &params, &mut out).unwrap();
        }
        assert!((out.get(0, 0)[0] - 0.125).abs() < 2e-3);

        // A second viewport starts from its own white history.
        let inputs = FrameInputs { raw_color: &color, raw_shadow: &dark };
        scheduler.render(b, &inputs, &params, &mut out).unwrap();
        assert!((out.get(0, 0)[0] - 0.5).abs() < 2e-3);
        assert_eq!(scheduler.len(), 2);
    }

    #[test]
    fn teardown_removes_viewport() {
        let mut scheduler = FrameScheduler::new(Stages::ALL);
        let params = BlendParameters::default();
        let res = Resolution::new(2, 2);
        let (color, shadow, mut out) = frame(res, 0.5);
        let inputs = FrameInputs { raw_color: &color, raw_shadow: &shadow };

        scheduler.render(ViewportId(7), &inputs, &params, &mut out).unwrap();
        assert!(scheduler.contains(ViewportId(7)));
        assert!(scheduler.teardown(ViewportId(7)));
        assert!(!scheduler.teardown(ViewportId(7)));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn stage_toggles_reach_existing_viewports() {
        let mut scheduler = FrameScheduler::new(Stages::ALL);
        let params = BlendParameters::default();
        let res = Resolution::new(1, 1);
        let (color, shadow, mut out) = frame(res, 0.25);
        let inputs = FrameInputs { raw_color: &color, raw_shadow: &shadow };
        scheduler.render(ViewportId(0), &inputs, &params, &mut out).unwrap();

        scheduler.set_stages(Stages::PASS_THROUGH);
        assert_eq!(scheduler.get(ViewportId(0)).unwrap().stages(), Stages::PASS_THROUGH);
        scheduler.render(ViewportId(0), &inputs, &params, &mut out).unwrap();
        assert_eq!(out, color);
    }
}
