//! Building a frame driver from configuration

use anyhow::{Context, Result};
use tracing::info;

use hotloop_core::config::{self, Config};
use hotloop_core::{
    Arena, AudioDevice, AudioOutput, FrameBuffer, FrameDriver, GradientSimulation, ModuleLoader,
    Simulation, StaticModuleLoader, WasmModuleLoader,
};

/// Loader for the configured module, or the built-in demo
pub fn module_loader(config: &Config) -> Result<Box<dyn ModuleLoader>> {
    match &config.module.path {
        Some(path) => {
            info!("Watching simulation module {}", path.display());
            Ok(Box::new(WasmModuleLoader::new(path.clone())?))
        }
        None => {
            info!("No module given, running the built-in demo");
            let volume = config.audio.tone_volume;
            Ok(Box::new(StaticModuleLoader::new(move || {
                Box::new(GradientSimulation::new(volume)) as Box<dyn Simulation>
            })))
        }
    }
}

/// Driver with arena, module, slots and (optionally) audio set up
pub fn build_driver(config: &Config, device: Option<Box<dyn AudioDevice>>) -> Result<FrameDriver> {
    let arena = Arena::from_config(&config.arena);
    let frame = FrameBuffer::new(config.video.width, config.video.height);
    let mut driver = FrameDriver::new(arena, module_loader(config)?, frame);

    if let Some(device) = device {
        let margin = config
            .audio
            .margin_frames(device.samples_per_second(), config.timing.update_hz);
        let audio = AudioOutput::new(device, margin).context("Audio ring does not fit")?;
        driver = driver.with_audio(audio);
    }

    if let Some(dir) = config::slot_dir(&config.replay) {
        driver = driver.with_slot_dir(dir);
    }
    driver
        .select_slot(config.replay.default_slot)
        .context("Invalid default replay slot")?;
    Ok(driver)
}
