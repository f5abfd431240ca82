//! Radio device implementations

#[cfg(feature = "fmcomms5")]
pub mod fmcomms5;
pub mod mock;

use crate::config::RadioConfig;
use crate::core::radio::RadioCollaborator;
use crate::error::{Error, Result};
use mock::MockRadio;

/// Create a radio collaborator based on configuration
pub fn create_radio(config: &RadioConfig) -> Result<Box<dyn RadioCollaborator>> {
    match config.device.as_str() {
        "mock" => Ok(Box::new(MockRadio::new(config.simulation.clone()))),
        #[cfg(feature = "fmcomms5")]
        "fmcomms5" => Ok(Box::new(fmcomms5::Fmcomms5Radio::open()?)),
        #[cfg(not(feature = "fmcomms5"))]
        "fmcomms5" => Err(Error::Config(
            "fmcomms5 device requires building with --features fmcomms5".to_string(),
        )),
        _ => Err(Error::UnknownDevice(config.device.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mock() {
        let config = RadioConfig::default();
        let radio = create_radio(&config).unwrap();
        assert_eq!(radio.name(), "mock");
    }

    #[test]
    fn test_unknown_device() {
        let config = RadioConfig {
            device: "hackrf".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create_radio(&config),
            Err(Error::UnknownDevice(name)) if name == "hackrf"
        ));
    }
}
