//! OS power collaborator
//!
//! Reboot and power-off are fire-and-forget: the request is issued, failures
//! are logged, and nothing is returned to the caller.

use crate::config::PowerConfig;
use serde::{Deserialize, Serialize};
use std::process::Command;

/// Power state transition requested of the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Reboot,
    PowerOff,
}

/// Which power collaborator the daemon uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerBackend {
    /// Run the OS `reboot` / `poweroff` commands
    System,
    /// Only log the request (development hosts)
    Log,
}

/// OS power interface consumed by the supervisor
pub trait PowerControl: Send + Sync {
    fn reboot(&self);
    fn power_off(&self);

    /// Dispatch a [`PowerAction`]
    fn apply(&self, action: PowerAction) {
        match action {
            PowerAction::Reboot => self.reboot(),
            PowerAction::PowerOff => self.power_off(),
        }
    }
}

/// Runs `reboot` / `poweroff`, optionally through sudo
pub struct SystemPower {
    use_sudo: bool,
}

impl SystemPower {
    pub fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }

    fn run(&self, program: &str) {
        let mut cmd = if self.use_sudo {
            let mut c = Command::new("sudo");
            c.arg(program);
            c
        } else {
            Command::new(program)
        };

        log::warn!("Invoking OS {}", program);
        match cmd.status() {
            Ok(status) if status.success() => {}
            Ok(status) => log::error!("{} exited with {}", program, status),
            Err(e) => log::error!("Failed to run {}: {}", program, e),
        }
    }
}

impl PowerControl for SystemPower {
    fn reboot(&self) {
        self.run("reboot");
    }

    fn power_off(&self) {
        self.run("poweroff");
    }
}

/// Logs power requests without acting on them
pub struct LoggingPower;

impl PowerControl for LoggingPower {
    fn reboot(&self) {
        log::warn!("Reboot requested (power backend 'log': not rebooting)");
    }

    fn power_off(&self) {
        log::warn!("Power-off requested (power backend 'log': not powering off)");
    }
}

/// Create the power collaborator named in configuration
pub fn create_power(config: &PowerConfig, device: &str) -> Box<dyn PowerControl> {
    match config.backend_for(device) {
        PowerBackend::System => Box::new(SystemPower::new(config.use_sudo)),
        PowerBackend::Log => Box::new(LoggingPower),
    }
}
