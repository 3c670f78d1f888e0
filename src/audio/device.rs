use std::sync::Arc;

use voice_duplex_utils::cpal;
use voice_duplex_utils::device::{get_or_default_input, get_or_default_output};

use crate::error::{Error, Result};

/// The process-wide capture/playback device pair.
pub struct AudioDevice {
    input: cpal::Device,
    output: cpal::Device,
}

impl AudioDevice {
    pub fn input(&self) -> &cpal::Device {
        &self.input
    }

    pub fn output(&self) -> &cpal::Device {
        &self.output
    }
}

/// Opens the audio devices once and hands the same handle to every caller.
/// A failure is remembered and reported again without retrying.
#[derive(Default)]
pub struct DeviceFactory {
    input_name: Option<String>,
    output_name: Option<String>,
    acquired: Option<std::result::Result<Arc<AudioDevice>, String>>,
}

impl DeviceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, name: &str) -> Self {
        self.input_name = Some(name.to_string());
        self
    }

    pub fn with_output(mut self, name: &str) -> Self {
        self.output_name = Some(name.to_string());
        self
    }

    pub fn acquire(&mut self) -> Result<Arc<AudioDevice>> {
        if let Some(acquired) = &self.acquired {
            return acquired.clone().map_err(Error::MediaUnsupported);
        }

        let opened = self.open();
        match &opened {
            Ok(_) => tracing::info!("audio devices ready"),
            Err(reason) => tracing::error!("audio devices unavailable: {}", reason),
        }
        self.acquired = Some(opened.clone());
        opened.map_err(Error::MediaUnsupported)
    }

    fn open(&self) -> std::result::Result<Arc<AudioDevice>, String> {
        let input = get_or_default_input(self.input_name.clone()).map_err(|e| format!("no microphone: {}", e))?;
        let output = get_or_default_output(self.output_name.clone()).map_err(|e| format!("no playback device: {}", e))?;
        Ok(Arc::new(AudioDevice { input, output }))
    }
}
