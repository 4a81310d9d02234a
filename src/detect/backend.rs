use anyhow::{anyhow, Result};

use crate::config::DetectorSettings;
use crate::frame::Frame;

use super::backends::StubBackend;
use super::result::{DetectParams, DetectionResult};

/// Object detector seam.
///
/// The gate owns exactly one backend and calls it synchronously once per
/// active frame. Implementations must treat the frame as borrowed for the
/// duration of the call.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<DetectionResult>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Build and warm up the backend named in the settings.
pub fn open_backend(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    let mut backend: Box<dyn DetectorBackend> = match settings.backend.as_str() {
        "stub" => Box::new(StubBackend::new()),
        "tract" => open_tract(settings)?,
        other => return Err(anyhow!("unknown detector backend '{}'", other)),
    };
    backend.warm_up()?;
    log::info!("detector backend '{}' ready", backend.name());
    Ok(backend)
}

#[cfg(feature = "backend-tract")]
fn open_tract(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    let backend = super::backends::TractBackend::new(&settings.model_path, settings.params.input_size)?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn open_tract(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    Err(anyhow!(
        "detector backend 'tract' (model {}) requires the backend-tract feature",
        settings.model_path.display()
    ))
}
