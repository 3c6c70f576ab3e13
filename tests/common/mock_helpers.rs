//! Mock construction helpers

use arduino_bridge::error::Result;
use arduino_bridge::hardware::HardwareLink;
use arduino_bridge::types::PinMode;
use mockall::mock;

mock! {
    pub Link {}

    impl HardwareLink for Link {
        fn set_pin_mode(&mut self, pin: u8, mode: PinMode) -> Result<()>;
        fn pin_mode(&mut self, pin: u8) -> Result<PinMode>;
        fn digital_read(&mut self, pin: u8) -> Result<u16>;
        fn analog_read(&mut self, pin: u8) -> Result<u16>;
        fn digital_write(&mut self, pin: u8, value: u16) -> Result<()>;
        fn analog_write(&mut self, pin: u8, value: u16) -> Result<()>;
        fn servo_config(&mut self, pin: u8) -> Result<()>;
        fn shutdown(&mut self) -> Result<()>;
    }
}

/// Link whose reads are a fixed function of the pin number
///
/// Odd digital pins read HIGH, analog channel N reads `N * 100 + 3`, every
/// digital pin reports INPUT. Writes and mode changes succeed and change
/// nothing.
pub fn deterministic_link() -> MockLink {
    let mut link = MockLink::new();
    link.expect_set_pin_mode().returning(|_, _| Ok(()));
    link.expect_digital_write().returning(|_, _| Ok(()));
    link.expect_pin_mode().returning(|_| Ok(PinMode::Input));
    link.expect_digital_read().returning(|pin| Ok(u16::from(pin % 2)));
    link.expect_analog_read()
        .returning(|pin| Ok(u16::from(pin) * 100 + 3));
    link.expect_shutdown().returning(|| Ok(()));
    link
}

/// Connector handing out one [`deterministic_link`]
pub fn deterministic_connector() -> impl FnMut() -> Result<Box<dyn HardwareLink>> + Send {
    let mut link = Some(deterministic_link());
    move || {
        link.take()
            .map(|l| Box::new(l) as Box<dyn HardwareLink>)
            .ok_or_else(|| {
                arduino_bridge::BridgeError::Hardware("link already handed out".to_string())
            })
    }
}
