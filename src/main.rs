// What you SEE:
// • The camera feed (or a checker pattern, or the traced scene itself) lit by
//   a slowly orbiting sun, with soft shadows from a few floating spheres
//   ray-traced on the CPU. Pick the colour with `--source camera|pattern|traced`.
// • The raw shadow is noisy; the temporal EMA filter smooths it over frames.
// • T toggles the temporal stage, K the composite stage, S shows the shadow
//   buffer alone, Up/Down change the blend weight. ESC quits.
//
// `--headless --frames N --save out.png` renders without a window.

use clap::Parser;
use log::info;
use rt_shadow_compositor::compositor::FrameInputs;
use rt_shadow_compositor::draw::Drawer;
use rt_shadow_compositor::error::Error;
use rt_shadow_compositor::gamma::GammaLut;
use rt_shadow_compositor::scheduler::{FrameScheduler, ViewportId};
use rt_shadow_compositor::settings::{BlendParameters, Settings};
use rt_shadow_compositor::snapshot;
use rt_shadow_compositor::source::ColorSource;
use rt_shadow_compositor::tracer::ShadowTracer;
use rt_shadow_compositor::types::{FrameBuffer, NO_SHADOW, Resolution};
use std::time::{Duration, Instant};

const MAIN_VIEWPORT: ViewportId = ViewportId(0);
const BLEND_STEP: f32 = 0.05;

/// Buffers the tracer writes and the compositor reads, reused every frame.
struct Frame {
    color: FrameBuffer,
    shadow: FrameBuffer,
    output: FrameBuffer,
}

impl Frame {
    fn new(resolution: Resolution) -> Result<Self, Error> {
        Ok(Self {
            color: FrameBuffer::try_filled(resolution, [0.0, 0.0, 0.0, 1.0])?,
            shadow: FrameBuffer::try_filled(resolution, NO_SHADOW)?,
            output: FrameBuffer::try_filled(resolution, [0.0, 0.0, 0.0, 1.0])?,
        })
    }
}

/// Everything one frame needs, minus the window.
struct App {
    source: ColorSource,
    tracer: ShadowTracer,
    scheduler: FrameScheduler,
    params: BlendParameters,
    lut: GammaLut,
    frame: Frame,
    frame_index: u32,
}

impl App {
    fn new(settings: &Settings) -> Result<Self, Error> {
        let requested = Resolution::new(settings.width, settings.height);
        let tracer = ShadowTracer::new(settings.seed);
        let source = ColorSource::open(settings.source, settings.camera, requested, &tracer);
        let resolution = source.resolution();
        info!("rendering {:?} colour at {resolution}", settings.source);

        Ok(Self {
            source,
            tracer,
            scheduler: FrameScheduler::new(settings.stages()),
            params: settings.blend_parameters(),
            lut: GammaLut::new(),
            frame: Frame::new(resolution)?,
            frame_index: 0,
        })
    }

    /// Colour, raw shadow, then the compositor for the main viewport.
    fn render(&mut self) -> Result<(), Error> {
        let frame = &mut self.frame;
        self.source.next_frame(&self.lut, self.frame_index, &mut frame.color)?;
        self.tracer
            .trace(frame.shadow.resolution, &self.params, self.frame_index, &mut frame.shadow)?;

        let inputs = FrameInputs { raw_color: &frame.color, raw_shadow: &frame.shadow };
        self.scheduler.render(MAIN_VIEWPORT, &inputs, &self.params, &mut frame.output)?;
        self.frame_index = self.frame_index.wrapping_add(1);
        Ok(())
    }

    fn save(&self, path: &std::path::Path) -> Result<(), Error> {
        snapshot::save_png(path, &self.frame.output, &self.lut)?;
        info!("wrote {}", path.display());
        Ok(())
    }

    fn hud(&self, show_shadow: bool, fps: &str) -> String {
        let on_off = |b: bool| if b { "ON" } else { "OFF" };
        let stages = self.scheduler.stages();
        format!(
            "{} | TEMPORAL {} | COMPOSITE {} | BLEND {:.2} | {}",
            if show_shadow { "SHADOW" } else { "OUTPUT" },
            on_off(stages.temporal),
            on_off(stages.composite),
            self.params.temporal_blend,
            fps,
        )
    }
}

fn run_headless(mut app: App, settings: &Settings) -> Result<(), Error> {
    let started = Instant::now();
    for _ in 0..settings.frames {
        app.render()?;
    }
    info!("rendered {} frames in {:.2?}", settings.frames, started.elapsed());
    if let Some(path) = &settings.save {
        app.save(path)?;
    }
    app.scheduler.teardown(MAIN_VIEWPORT);
    Ok(())
}

fn run_windowed(mut app: App, settings: &Settings) -> Result<(), Error> {
    let res = app.frame.output.resolution;
    let mut drawer = Drawer::new(
        "Ray-traced shadows (temporal)",
        res.width as usize,
        res.height as usize,
    )?;

    let mut show_shadow = false;
    let mut last_fps_time = Instant::now();
    let mut frames_this_second: u32 = 0;
    let mut fps_text = String::from("FPS: 0.0");

    while drawer.is_open() {
        let input = drawer.poll_input();
        let mut stages = app.scheduler.stages();
        if input.toggle_temporal {
            stages.temporal = !stages.temporal;
        }
        if input.toggle_composite {
            stages.composite = !stages.composite;
        }
        app.scheduler.set_stages(stages);
        if input.toggle_shadow_view {
            show_shadow = !show_shadow;
        }
        if input.blend_up {
            app.params = app.params.with_temporal_blend(app.params.temporal_blend + BLEND_STEP);
        }
        if input.blend_down {
            app.params = app.params.with_temporal_blend(app.params.temporal_blend - BLEND_STEP);
        }

        app.render()?;

        let hud = app.hud(show_shadow, &fps_text);
        match app.scheduler.get(MAIN_VIEWPORT).and_then(|c| c.blended_shadow()) {
            Some(shadow) if show_shadow => drawer.present(shadow, &app.lut, &hud)?,
            _ => drawer.present(&app.frame.output, &app.lut, &hud)?,
        }

        frames_this_second += 1;
        let now = Instant::now();
        if now.duration_since(last_fps_time) >= Duration::from_secs(1) {
            let fps = frames_this_second as f32 / now.duration_since(last_fps_time).as_secs_f32();
            info!("FPS: {fps:.1}");
            fps_text = format!("FPS: {fps:.1}");
            frames_this_second = 0;
            last_fps_time = now;
        }
    }

    if let Some(path) = &settings.save {
        app.save(path)?;
    }
    // Window gone: the viewport and its history go with it.
    app.scheduler.teardown(MAIN_VIEWPORT);
    Ok(())
}

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::parse();
    let app = App::new(&settings)?;
    if settings.headless {
        run_headless(app, &settings)
    } else {
        run_windowed(app, &settings)
    }
}
