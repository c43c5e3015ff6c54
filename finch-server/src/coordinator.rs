use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::{engine::general_purpose, Engine as _};
use finch_capture::CaptureController;
use finch_gpio::{GpioCoprocessor, Sequencer};
use finch_hub::{Hub, Message, SubscriberId, SubscriberQueue};
use finch_protocol::{
    decode_illumination_mode, ClientMessage, ControlValue, FpsUpdate, ImageResponse,
    ServerMessage, SlmImage, TriggerConfig,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

use crate::config::SweepConfig;
use crate::display::DisplaySink;

/// How long an `update_wave` swap is left installed before the
/// superseded waveforms are deleted. Long enough that any in-flight
/// control-program cycle has finished dispatching against the old ids.
const UPDATE_GRACE_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriberPrefs {
    pub stream_frames: bool,
    pub use_base64_encoding: bool,
    pub send_fps_updates: bool,
}

/// Sweeps `led_time` from `t_min` to `t_max` in steps of `dt`, resetting
/// outright to `t_min` on overflow rather than wrapping modulo `t_max`.
#[derive(Debug, Clone, Copy)]
pub struct SweepState {
    pub enabled: bool,
    pub led_time: u32,
    pub t_min: u32,
    pub t_max: u32,
    pub dt: u32,
}

impl SweepState {
    pub fn new(cfg: &SweepConfig, initial_led_time: u32) -> Self {
        SweepState {
            enabled: false,
            led_time: initial_led_time,
            t_min: cfg.t_min,
            t_max: cfg.t_max,
            dt: cfg.dt,
        }
    }

    pub fn advance(&mut self) -> u32 {
        self.led_time += self.dt;
        if self.led_time > self.t_max {
            self.led_time = self.t_min;
        }
        self.led_time
    }
}

/// What the transport layer must do after a dispatched message, beyond
/// whatever replies the Coordinator already enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostDispatch {
    None,
    /// `slm_image: "next"` arrived; the following binary frame on this
    /// socket is the image, not a stray frame.
    AwaitBinaryImage,
}

/// The Session Coordinator: owns the Sequencer, the Capture Controller,
/// the broadcast Hub, and all per-subscriber preferences. Every mutation
/// of shared state — TriggerConfig, the subscriber set, sweep state —
/// happens through `&self` methods backed by interior mutexes, never by
/// handing out a reference a caller could hold across an await point.
pub struct Coordinator {
    sequencer: Mutex<Sequencer<Box<dyn GpioCoprocessor>>>,
    capture: Mutex<CaptureController>,
    hub: Hub,
    display: Mutex<Box<dyn DisplaySink>>,
    subscribers: Mutex<HashMap<SubscriberId, SubscriberPrefs>>,
    sweep: Mutex<SweepState>,
    system_fps: Mutex<finch_capture::FrameRateMonitor>,
    last_fps_update: Mutex<Instant>,
    pending_update_since: Mutex<Option<Instant>>,
}

impl Coordinator {
    pub fn new(
        sequencer: Sequencer<Box<dyn GpioCoprocessor>>,
        capture: CaptureController,
        display: Box<dyn DisplaySink>,
        sweep_config: SweepConfig,
    ) -> Self {
        let initial_led_time = sequencer.config().led_time;
        Coordinator {
            sequencer: Mutex::new(sequencer),
            capture: Mutex::new(capture),
            hub: Hub::new(),
            display: Mutex::new(display),
            subscribers: Mutex::new(HashMap::new()),
            sweep: Mutex::new(SweepState::new(&sweep_config, initial_led_time)),
            system_fps: Mutex::new(finch_capture::FrameRateMonitor::standard()),
            last_fps_update: Mutex::new(Instant::now()),
            pending_update_since: Mutex::new(None),
        }
    }

    pub fn register_subscriber(&self) -> (SubscriberId, Arc<SubscriberQueue>) {
        let (id, queue) = self.hub.register();
        self.subscribers.lock().insert(id, SubscriberPrefs::default());
        (id, queue)
    }

    pub fn unregister_subscriber(&self, id: SubscriberId) {
        self.hub.unregister(id);
        self.subscribers.lock().remove(&id);
    }

    /// Opens the camera backend and starts its reader thread. Called once
    /// during startup, before the Coordinator is shared across tasks.
    pub fn open_capture(&self) -> Result<(), finch_capture::CameraError> {
        self.capture.lock().open()
    }

    pub fn trigger_config(&self) -> TriggerConfig {
        *self.sequencer.lock().config()
    }

    fn install_wave(&self, new_config: TriggerConfig) {
        let mut seq = self.sequencer.lock();
        if *seq.config() == new_config {
            return;
        }
        match seq.update_wave(new_config) {
            Ok(()) => *self.pending_update_since.lock() = Some(Instant::now()),
            Err(e) => warn!("update_wave rejected, keeping previous waveform: {e}"),
        }
    }

    /// Finishes a previously-staged `update_wave` once the grace period
    /// has elapsed. Called once per tick; a no-op when nothing is
    /// pending or the grace period hasn't passed yet.
    fn complete_pending_update(&self) {
        let mut pending = self.pending_update_since.lock();
        if let Some(since) = *pending {
            if since.elapsed() >= UPDATE_GRACE_PERIOD {
                if let Err(e) = self.sequencer.lock().complete_update() {
                    warn!("complete_update failed: {e}");
                }
                *pending = None;
            }
        }
    }

    /// Dispatches one inbound client message, applying every present key
    /// in the order the external interface table lists them. Errors from
    /// individual keys (an unknown control, an out-of-range value) are
    /// logged and do not stop processing of the remaining keys.
    pub fn handle_client_message(&self, id: SubscriberId, msg: &ClientMessage) -> PostDispatch {
        if let Some(controls) = &msg.set_control {
            for (name, value) in controls {
                if let Err(e) = self.capture.lock().set_control(name, value.clone()) {
                    warn!("set_control({name}) rejected: {e}");
                }
            }
        }

        if let Some(enable) = &msg.sweep_enable {
            self.sweep.lock().enabled = enable.value;
        }

        if msg.update_controls.is_some() {
            self.reply_current_controls(id);
        }

        if let Some(mode) = &msg.capture_mode {
            if let Err(e) = self.capture.lock().set_mode(mode.value) {
                warn!("capture_mode rejected: {e}");
            }
        }

        let mut config = self.trigger_config();
        let mut config_changed = false;
        if let Some(v) = &msg.led_time {
            config.led_time = v.value;
            config_changed = true;
        }
        if let Some(v) = &msg.led_width {
            config.led_width = v.value;
            config_changed = true;
        }
        if let Some(v) = &msg.wave_duration {
            config.wave_duration = v.value;
            config_changed = true;
        }
        if config_changed {
            self.install_wave(config);
        }

        if let Some(mode) = &msg.illumination_mode {
            // This instrument's TriggerConfig already carries independent
            // start offsets per channel, so the subfield bitmask doesn't
            // gate anything further here; decoding it just validates the
            // format and keeps the value available to echo back.
            if decode_illumination_mode(&mode.value).is_none() {
                warn!("malformed ILLUMINATION_MODE: {:?}", mode.value);
            }
        }

        if let Some(v) = &msg.stream_frames {
            self.with_prefs(id, |p| p.stream_frames = v.value);
        }
        if let Some(v) = &msg.use_base64_encoding {
            self.with_prefs(id, |p| p.use_base64_encoding = v.value);
        }
        if let Some(v) = &msg.send_fps_updates {
            self.with_prefs(id, |p| p.send_fps_updates = v.value);
        }

        if let Some(url) = &msg.slm_image_url {
            if let Err(e) = self.display.lock().show_image_url(url) {
                warn!("slm_image_url failed: {e}");
            }
        }

        let mut post = PostDispatch::None;
        if let Some(slm) = &msg.slm_image {
            match slm {
                SlmImage::Next => post = PostDispatch::AwaitBinaryImage,
                SlmImage::Base64(b64) => match general_purpose::STANDARD.decode(b64) {
                    Ok(bytes) => {
                        if let Err(e) = self.display.lock().show_image(&bytes) {
                            warn!("slm_image failed: {e}");
                        }
                    }
                    Err(e) => warn!("slm_image base64 decode failed: {e}"),
                },
            }
        }

        // image_request is a reserved no-op; msg.image_request is
        // intentionally never read.

        post
    }

    pub fn list_controls(&self) -> Vec<finch_protocol::NativeControl> {
        self.capture.lock().list_controls()
    }

    /// Hands a binary frame to the display, for the case where a prior
    /// `slm_image: "next"` requested one.
    pub fn display_binary_image(&self, bytes: &[u8]) {
        if let Err(e) = self.display.lock().show_image(bytes) {
            warn!("slm_image binary frame failed: {e}");
        }
    }

    fn with_prefs(&self, id: SubscriberId, f: impl FnOnce(&mut SubscriberPrefs)) {
        if let Some(prefs) = self.subscribers.lock().get_mut(&id) {
            f(prefs);
        }
    }

    fn reply_current_controls(&self, id: SubscriberId) {
        let controls = self.capture.lock().list_controls();
        let mut named = std::collections::BTreeMap::new();
        for native in controls {
            match native {
                finch_protocol::NativeControl::Scalar(desc) => {
                    let value = match &desc {
                        finch_protocol::ControlDescriptor::Integer { value, .. } => {
                            ControlValue::Integer(*value)
                        }
                        finch_protocol::ControlDescriptor::Float { value, .. } => {
                            ControlValue::Float(*value)
                        }
                        finch_protocol::ControlDescriptor::Boolean { value, .. } => {
                            ControlValue::Boolean(*value)
                        }
                        finch_protocol::ControlDescriptor::Menu { value, .. } => {
                            ControlValue::Text(value.clone())
                        }
                    };
                    named.insert(desc.name().to_string(), value);
                }
                finch_protocol::NativeControl::ColourGains { value, .. } => {
                    named.insert("colour_gain_red".to_string(), ControlValue::Float(value.0));
                    named.insert("colour_gain_blue".to_string(), ControlValue::Float(value.1));
                }
            }
        }
        if let Ok(json) = ServerMessage::UpdateControls(named).to_json() {
            self.hub.enqueue(id, Message::Text(json));
        }
    }

    /// One Coordinator tick: publish the latest captured frame to every
    /// streaming subscriber, advance the sweep if enabled, finish any
    /// staged waveform update, and emit fps telemetry at most once a
    /// second. Mirrors the `send_captured_image` / `send_fps_update`
    /// pair the external interface's periodic task runs.
    pub fn tick(&self) {
        self.complete_pending_update();

        let frame = self.capture.lock().take();
        if let Some(frame) = frame {
            self.system_fps.lock().tick();

            // Sweep advances (and its LED_TIME echo) are pegged to served
            // frames, not ticker ticks — one sweep step per frame actually
            // handed to subscribers.
            if self.sweep.lock().enabled {
                let new_led_time = self.sweep.lock().advance();
                let mut config = self.trigger_config();
                config.led_time = new_led_time;
                self.install_wave(config);
                let echo = ServerMessage::LedTimeEcho { value: new_led_time };
                if let Ok(json) = echo.to_json() {
                    self.hub.broadcast(|_id| Some(Message::Text(json.clone())));
                }
            }

            let subscribers = self.subscribers.clone_snapshot();
            self.hub.broadcast(move |id| {
                let prefs = subscribers.get(&id).copied().unwrap_or_default();
                if !prefs.stream_frames {
                    return None;
                }
                if prefs.use_base64_encoding {
                    let image_base64 = general_purpose::STANDARD.encode(&frame.payload);
                    let msg = ServerMessage::ImageResponse(ImageResponse::Here {
                        metadata: frame.metadata.clone(),
                        image_base64,
                    });
                    msg.to_json().ok().map(Message::Text)
                } else {
                    let msg = ServerMessage::ImageResponse(ImageResponse::Next {
                        metadata: frame.metadata.clone(),
                    });
                    msg.to_json()
                        .ok()
                        .map(|json| Message::TextAndBinary(json, frame.payload.clone()))
                }
            });
        }

        self.maybe_send_fps_update();
    }

    fn maybe_send_fps_update(&self) {
        let mut last = self.last_fps_update.lock();
        if last.elapsed() < Duration::from_secs(1) {
            return;
        }
        *last = Instant::now();
        drop(last);

        let update = FpsUpdate {
            image_capture_reader_fps: self.capture.lock().reader_fps(),
            image_capture_capture_fps: self.capture.lock().consumer_fps(),
            system_controller_fps: self.system_fps.lock().fps(),
        };
        let Ok(json) = ServerMessage::FpsUpdate(update).to_json() else {
            return;
        };
        let subscribers = self.subscribers.clone_snapshot();
        self.hub.broadcast(move |id| {
            if subscribers.get(&id).copied().unwrap_or_default().send_fps_updates {
                Some(Message::Text(json.clone()))
            } else {
                None
            }
        });
    }

    pub fn shutdown(&self) {
        if let Err(e) = self.capture.lock().close() {
            warn!("capture controller close failed during shutdown: {e}");
        }
        self.sequencer.lock().stop();
    }
}

trait SubscriberMapExt {
    fn clone_snapshot(&self) -> HashMap<SubscriberId, SubscriberPrefs>;
}

impl SubscriberMapExt for Mutex<HashMap<SubscriberId, SubscriberPrefs>> {
    fn clone_snapshot(&self) -> HashMap<SubscriberId, SubscriberPrefs> {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_coordinator() -> Coordinator {
        let coprocessor: Box<dyn GpioCoprocessor> = Box::new(finch_gpio::MockCoprocessor::new());
        let mut sequencer = Sequencer::new(coprocessor, TriggerConfig::default());
        sequencer.start().unwrap();
        let capture =
            CaptureController::new(Box::new(finch_capture::backends::mock::MockBackend::new(4, 4)), 80);
        let display: Box<dyn DisplaySink> = Box::new(crate::display::NoopDisplay::default());
        Coordinator::new(sequencer, capture, display, SweepConfig::default())
    }

    #[test]
    fn sweep_wraps_to_t_min_instead_of_modulo() {
        let cfg = SweepConfig {
            t_min: 0,
            t_max: 2730,
            dt: 10,
        };
        let mut sweep = SweepState::new(&cfg, 2720);
        assert_eq!(sweep.advance(), 2730);
        assert_eq!(sweep.advance(), 0);
    }

    #[test]
    fn set_control_reaches_the_capture_backend() {
        let coordinator = make_coordinator();
        let (id, _queue) = coordinator.register_subscriber();
        let mut controls = std::collections::BTreeMap::new();
        controls.insert("gain".to_string(), ControlValue::Float(3.0));
        let msg = ClientMessage {
            set_control: Some(controls),
            ..Default::default()
        };
        coordinator.handle_client_message(id, &msg);
        assert_eq!(
            coordinator.capture.lock().get_control("gain").unwrap(),
            ControlValue::Float(3.0)
        );
    }

    #[test]
    fn led_time_message_installs_a_new_waveform() {
        let coordinator = make_coordinator();
        let (id, _queue) = coordinator.register_subscriber();
        let before = coordinator.trigger_config().led_time;
        let msg = ClientMessage {
            led_time: Some(finch_protocol::ValueWrapper { value: before + 10 }),
            ..Default::default()
        };
        coordinator.handle_client_message(id, &msg);
        assert_eq!(coordinator.trigger_config().led_time, before + 10);
    }

    #[test]
    fn slm_image_next_requests_a_following_binary_frame() {
        let coordinator = make_coordinator();
        let (id, _queue) = coordinator.register_subscriber();
        let msg = ClientMessage {
            slm_image: Some(SlmImage::Next),
            ..Default::default()
        };
        assert_eq!(
            coordinator.handle_client_message(id, &msg),
            PostDispatch::AwaitBinaryImage
        );
    }

    #[test]
    fn non_streaming_subscriber_receives_no_frame_messages() {
        let coordinator = make_coordinator();
        let (_id, queue) = coordinator.register_subscriber();
        coordinator.capture.lock().open().ok();
        std::thread::sleep(Duration::from_millis(50));
        coordinator.tick();
        coordinator.capture.lock().close().ok();
        assert!(queue.is_empty());
    }

    #[test]
    fn sweep_advances_and_echoes_only_once_per_served_frame() {
        let coordinator = make_coordinator();
        let (_id, queue) = coordinator.register_subscriber();
        coordinator.sweep.lock().enabled = true;

        // No frame is ever available, so no number of ticks should
        // advance the sweep or emit a LED_TIME echo.
        for _ in 0..20 {
            coordinator.tick();
        }
        assert!(queue.is_empty());
        let led_time_before = coordinator.sweep.lock().led_time;

        coordinator.capture.lock().open().ok();
        std::thread::sleep(Duration::from_millis(50));
        coordinator.tick();
        coordinator.capture.lock().close().ok();

        // Exactly one frame was served by this single tick, so exactly
        // one LED_TIME echo (and one sweep step) should have happened.
        assert_eq!(queue.len(), 1);
        assert_ne!(coordinator.sweep.lock().led_time, led_time_before);
    }
}
