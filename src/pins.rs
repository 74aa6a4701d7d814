//! Optional pins
//!
//! The end-of-conversion and reset lines are both optional.
//! [`MicroPressure::new`](crate::MicroPressure::new) starts out with [`NoPin`] in both
//! places; attach real pins with
//! [`MicroPressure::with_eoc`](crate::MicroPressure::with_eoc) and
//! [`MicroPressure::with_reset`](crate::MicroPressure::with_reset).

use core::convert::Infallible;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

/// Placeholder for an unconnected pin
///
/// Never driven or read by the driver.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoPin;

impl ErrorType for NoPin {
    type Error = Infallible;
}

impl InputPin for NoPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(false)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
