/* Animation manager: schedules a renderer set at a fixed frame rate, drives
 * each layer's `draw`, composites bottom-up into the device frame buffer,
 * and flips it. State machine: Idle -> Running -> Stopping -> Idle. */

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::error;

use crate::color::RgbaF;
use crate::descriptor::DeviceType;
use crate::error::{Result, UchromaError};
use crate::frame::FrameBuffer;
use crate::input::InputTap;
use crate::layer::Layer;
use crate::quirk::Quirks;
use crate::runner::ReportRunner;
use crate::transport::Session;

/// A pluggable producer of animated pixels. `init`/`draw`/`finish` mirror
/// the renderer lifecycle documented in SPEC_FULL.md §3/§4.8. `input` is
/// the device's key-event tap, available for renderers that react to
/// keypresses (e.g. a reactive/ripple effect).
#[async_trait]
pub trait Renderer: Send {
    async fn init(
        &mut self,
        width: usize,
        height: usize,
        fps: u32,
        args: &serde_json::Value,
        input: Arc<InputTap>,
    ) -> bool;
    /// Returns `false` when the renderer has nothing new to contribute this
    /// frame (e.g. awaiting input); prior layer pixels are retained.
    async fn draw(&mut self, layer: &mut Layer, timestamp_ms: u64) -> bool;
    async fn finish(&mut self);
}

struct RendererSlot {
    renderer: Box<dyn Renderer>,
    layer: Arc<Mutex<Layer>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationState {
    Idle,
    Running,
    Stopping,
}

pub struct AnimationManager {
    width: usize,
    height: usize,
    fps: u32,
    slots: Arc<Mutex<Vec<RendererSlot>>>,
    state: Mutex<AnimationState>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
    next_z_order: Mutex<u32>,
    /// Tracks whether the current renderer set still owes a `finish()`
    /// call. Set on `add_renderer`, cleared once `finish_all` runs, so
    /// `stop()` is safe to call whether or not the loop ever started and
    /// never double-finishes a renderer across repeated `stop()` calls.
    needs_finish: Mutex<bool>,
    /// Key-event tap handed to every renderer's `init`.
    input: Arc<InputTap>,
}

impl AnimationManager {
    pub fn new(width: usize, height: usize, fps: u32, input: Arc<InputTap>) -> Self {
        Self {
            width,
            height,
            fps,
            slots: Arc::new(Mutex::new(Vec::new())),
            state: Mutex::new(AnimationState::Idle),
            loop_handle: Mutex::new(None),
            next_z_order: Mutex::new(0),
            needs_finish: Mutex::new(false),
            input,
        }
    }

    /// Call `finish()` on every current renderer, exactly once per
    /// `add_renderer`/`finish_all` cycle.
    async fn finish_all(&self) {
        let mut needs = self.needs_finish.lock().await;
        if !*needs {
            return;
        }
        for slot in self.slots.lock().await.iter_mut() {
            slot.renderer.finish().await;
        }
        *needs = false;
    }

    pub async fn state(&self) -> AnimationState {
        *self.state.lock().await
    }

    pub async fn running(&self) -> bool {
        matches!(*self.state.lock().await, AnimationState::Running)
    }

    pub async fn layer_count(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Instantiate a renderer, assign it the next z-order, and call
    /// `init`. On failure, unwinds (the renderer is dropped, nothing is
    /// added) and returns `RendererInitFailed`.
    pub async fn add_renderer(
        &self,
        mut renderer: Box<dyn Renderer>,
        args: serde_json::Value,
    ) -> Result<u32> {
        let ok = renderer
            .init(self.width, self.height, self.fps, &args, Arc::clone(&self.input))
            .await;
        if !ok {
            return Err(UchromaError::RendererInitFailed);
        }

        let mut next_z = self.next_z_order.lock().await;
        let z_order = *next_z;
        *next_z += 1;

        let layer = Arc::new(Mutex::new(Layer::new(self.height, self.width, z_order)));
        self.slots.lock().await.push(RendererSlot { renderer, layer });
        *self.needs_finish.lock().await = true;

        Ok(z_order)
    }

    /// Stop (if running), then drop every renderer without calling
    /// `finish` again beyond what `stop()` already guaranteed.
    pub async fn clear_renderers(&self) {
        self.stop().await;
        self.slots.lock().await.clear();
        *self.next_z_order.lock().await = 0;
    }

    /// Start the animation loop. Requires at least one renderer.
    pub async fn start(
        self: &Arc<Self>,
        session: Arc<Session>,
        quirks: Quirks,
        device_type: DeviceType,
        frame: Arc<Mutex<FrameBuffer>>,
    ) -> Result<()> {
        if self.slots.lock().await.is_empty() {
            return Err(UchromaError::BadArgument(
                "at least one renderer is required to start an animation".into(),
            ));
        }

        {
            let mut state = self.state.lock().await;
            if *state == AnimationState::Running {
                return Ok(());
            }
            *state = AnimationState::Running;
        }

        session.set_defer_close(true);

        let manager = Arc::clone(self);
        let period = Duration::from_secs_f64(1.0 / self.fps as f64);

        let handle = tokio::spawn(async move {
            manager.run_loop(session, quirks, device_type, frame, period).await;
        });

        *self.loop_handle.lock().await = Some(handle);
        Ok(())
    }

    /// Cancel the loop (if running), await its completion, and ensure
    /// `finish()` has run on every current renderer exactly once. Safe to
    /// call on an idle manager (e.g. one whose renderers were added but
    /// never started) and safe to call repeatedly.
    pub async fn stop(&self) {
        let was_running = {
            let mut state = self.state.lock().await;
            let running = *state == AnimationState::Running;
            if running {
                *state = AnimationState::Stopping;
            }
            running
        };

        if was_running {
            if let Some(handle) = self.loop_handle.lock().await.take() {
                handle.abort();
                let _ = handle.await;
            }
        }

        /* `finish_all` is guarded by `needs_finish`, so this is a no-op if
         * the loop's own cleanup path (flip failure) already ran it. */
        self.finish_all().await;

        *self.state.lock().await = AnimationState::Idle;
    }

    async fn run_loop(
        self: Arc<Self>,
        session: Arc<Session>,
        quirks: Quirks,
        device_type: DeviceType,
        frame: Arc<Mutex<FrameBuffer>>,
        period: Duration,
    ) {
        loop {
            if *self.state.lock().await != AnimationState::Running {
                break;
            }

            let t0 = tokio::time::Instant::now();
            let now_ms = 0u64; // cooperative scheduler: relative tick, not wall clock.

            let mut slots = self.slots.lock().await;
            for slot in slots.iter_mut() {
                let mut layer = slot.layer.lock().await;
                if !layer.is_locked() {
                    let _ = slot.renderer.draw(&mut layer, now_ms).await;
                }
            }

            {
                let mut fb = frame.lock().await;
                composite(&mut fb, &slots).await;
                let runner = ReportRunner::new(&session, quirks);
                if let Err(e) = fb.flip(&runner, quirks, device_type, true, 0xFF).await {
                    error!("animation loop: frame flip failed: {e}");
                    drop(slots);
                    break;
                }
            }
            drop(slots);

            let elapsed = t0.elapsed();
            let sleep_for = if elapsed < period {
                period - elapsed
            } else {
                Duration::from_nanos((elapsed.as_nanos() % period.as_nanos().max(1)) as u64)
            };
            tokio::time::sleep(sleep_for).await;
        }

        self.finish_all().await;
        *self.state.lock().await = AnimationState::Idle;
    }
}

/// Composite layers bottom-up into the device frame buffer using each
/// layer's blend mode and opacity. `slots` is already in ascending
/// z-order: `add_renderer` hands out z-orders in insertion order and
/// nothing ever reorders the vector.
async fn composite(frame: &mut FrameBuffer, slots: &[RendererSlot]) {
    for row in 0..frame.height() {
        for col in 0..frame.width() {
            let mut acc: RgbaF = RgbaF::from_rgb(frame.base_color(), 1.0);
            for slot in slots.iter() {
                let layer = slot.layer.lock().await;
                let px = layer.get(row, col);
                if px.a <= 0.0 {
                    continue;
                }
                let (r, g, b) = layer.blend_mode.apply(
                    (px.r, px.g, px.b),
                    (acc.r, acc.g, acc.b),
                );
                let scaled = RgbaF::new(r, g, b, px.a * layer.opacity);
                acc = scaled.over(acc);
            }
            frame.put(row, col, acc.to_rgb());
        }
    }
}
