//! Training launcher.
//!
//! Training is delegated to the Ultralytics `yolo` CLI; this module only
//! assembles its `key=value` arguments and runs it to completion.

use anyhow::{anyhow, Context, Result};
use std::process::Command;

use crate::config::TrainSettings;

#[derive(Clone, Debug)]
pub struct TrainJob {
    settings: TrainSettings,
}

impl TrainJob {
    pub fn from_settings(settings: &TrainSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    pub fn program(&self) -> &str {
        &self.settings.program
    }

    pub fn args(&self) -> Vec<String> {
        let s = &self.settings;
        vec![
            "detect".to_string(),
            "train".to_string(),
            format!("model={}", s.model.display()),
            format!("data={}", s.data.display()),
            format!("epochs={}", s.epochs),
            format!("imgsz={}", s.imgsz),
            format!("device={}", s.device),
            format!("conf={}", s.conf),
            format!("iou={}", s.iou),
            format!("project={}", s.project.display()),
        ]
    }

    pub fn command(&self) -> Command {
        let mut command = Command::new(self.program());
        command.args(self.args());
        command
    }

    /// Run the trainer and wait for it. Non-zero exit is an error.
    pub fn run(&self) -> Result<()> {
        if !self.settings.data.is_file() {
            log::warn!(
                "dataset yaml {} does not exist yet; run the conversion first",
                self.settings.data.display()
            );
        }
        log::info!(
            "training started: {} {}",
            self.program(),
            self.args().join(" ")
        );
        let status = self.command().status().with_context(|| {
            format!(
                "failed to launch '{}' (is the Ultralytics CLI installed?)",
                self.program()
            )
        })?;
        if !status.success() {
            return Err(anyhow!("training failed: '{}' exited with {}", self.program(), status));
        }
        log::info!("training finished successfully");
        Ok(())
    }
}
