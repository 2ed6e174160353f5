use std::sync::{Arc, Mutex, MutexGuard};

use rhai::Engine;
use tracing::{debug, warn};

use crate::plot::{Figure, PlotArtifact};

/// Output and plot collected while one unit ran.
#[derive(Debug, Default)]
pub struct Captured {
    /// `print` and `debug` output, in call order.
    pub output: String,
    /// The first figure shown, if any.
    pub plot: Option<PlotArtifact>,
    /// Figures shown after the first; they are not retained.
    pub dropped_plots: usize,
}

/// Redirects script output and figure display into a per-unit buffer.
///
/// The harness is installed on the engine once; the redirection is only
/// live while a [`CaptureGuard`] returned by [`CaptureHarness::begin`] is
/// held. Outside a capture, output is logged and figures are discarded.
#[derive(Clone)]
pub struct CaptureHarness {
    active: Arc<Mutex<Option<Captured>>>,
    default_size: (f64, f64),
}

impl CaptureHarness {
    /// Create a harness; `default_size` is the session's default figure size.
    pub fn new(default_size: (f64, f64)) -> Self {
        Self {
            active: Arc::new(Mutex::new(None)),
            default_size,
        }
    }

    /// Route the engine's `print` (stdout) and `debug` (stderr) callbacks
    /// through this harness.
    pub(crate) fn install(&self, engine: &mut Engine) {
        let stdout = self.clone();
        engine.on_print(move |text| stdout.write(text, "stdout"));

        let stderr = self.clone();
        engine.on_debug(move |text, _source, _pos| stderr.write(text, "stderr"));
    }

    /// Start capturing. Everything written or shown until the guard is
    /// finished or dropped belongs to this capture.
    ///
    /// A capture begun while another is live shadows it; the outer one is
    /// restored when the inner guard goes away.
    pub fn begin(&self) -> CaptureGuard<'_> {
        let previous = self.lock().replace(Captured::default());
        CaptureGuard {
            harness: self,
            previous: Some(previous),
        }
    }

    /// Whether a capture is currently live.
    pub fn is_capturing(&self) -> bool {
        self.lock().is_some()
    }

    fn write(&self, text: &str, channel: &'static str) {
        let mut active = self.lock();
        match active.as_mut() {
            Some(captured) => {
                captured.output.push_str(text);
                captured.output.push('\n');
            }
            None => debug!(channel, "script output outside capture: {}", text),
        }
    }

    /// Display entry point for scripts: render the figure and keep it if it
    /// is the first one shown during the live capture.
    pub(crate) fn display(&self, figure: &Figure) -> Result<(), String> {
        let artifact = figure.render(self.default_size)?;
        let mut active = self.lock();
        match active.as_mut() {
            Some(captured) if captured.plot.is_none() => {
                debug!(
                    width = artifact.size_pixels.0,
                    height = artifact.size_pixels.1,
                    "captured figure"
                );
                captured.plot = Some(artifact);
            }
            Some(captured) => {
                captured.dropped_plots += 1;
                warn!(
                    dropped = captured.dropped_plots,
                    "only the first figure shown per unit is kept"
                );
            }
            None => debug!("figure shown outside capture, discarding"),
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Captured>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Live capture. Dropping it, on any path, restores the previous state.
pub struct CaptureGuard<'a> {
    harness: &'a CaptureHarness,
    previous: Option<Option<Captured>>,
}

impl CaptureGuard<'_> {
    /// End the capture and return what it collected.
    pub fn finish(mut self) -> Captured {
        let mut active = self.harness.lock();
        let captured = active.take().unwrap_or_default();
        *active = self.previous.take().flatten();
        captured
    }
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.harness.lock() = previous;
        }
    }
}
