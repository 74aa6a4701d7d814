//! To get started, create a [`MicroPressure`].
//!
//! Works with the Honeywell MPR series of pressure sensors, as found on the SparkFun Qwiic
//! MicroPressure board.
//!
//! ## Examples
//!
//! ```no_run
//! use micropressure::{Config, MicroPressure, PressureUnit};
//! # use embedded_hal::i2c::ErrorKind;
//! # use embedded_hal_mock::eh1::{delay::NoopDelay, i2c::Mock};
//! # fn main() -> Result<(), micropressure::Error<ErrorKind>> {
//!
//! // ... initialise i2c device and delay
//! # let i2c = Mock::new(&[]);
//! # let delay = NoopDelay::new();
//!
//! let mut sensor = MicroPressure::new(i2c, delay, Config::default());
//! if !sensor.begin()? {
//!     println!("No sensor found");
//! }
//! let pres = sensor.read_pressure(PressureUnit::Kpa)?;
//! println!("Pressure: {}kPa", pres);
//! # Ok(())
//! # }
//! ```
//!
//! ## Pins
//!
//! Without an end-of-conversion pin, the driver polls the status byte of the sensor to
//! find out when a measurement is done.
//! Use [`MicroPressure::with_eoc`] to wait on the pin instead, and
//! [`MicroPressure::with_reset`] to pulse the reset line in [`MicroPressure::begin`].
//!
//! ## Bus ownership
//!
//! The driver takes any [`I2c`], so a bus shared with other devices can be lent to it as
//! `&mut bus` and is released again when the driver is dropped or
//! [destroyed](MicroPressure::destroy).
//!
//! ## Features
//!
//! The `defmt` feature provides logging of various levels with the
//! [`defmt`](https://defmt.ferrous-systems.com/introduction.html) crate.
//! It is disabled by default.
#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::enum_glob_use)]

pub mod calibration;
mod flags;
pub mod pins;
mod units;

pub use calibration::{Calibration, TransferFunction};
pub use flags::Status;
use pins::NoPin;
pub use units::PressureUnit;

#[cfg(feature = "defmt")]
use defmt::{debug, info, trace, warn};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::i2c::I2c;
use fugit::MillisDurationU32;

/// Factory default I2C address
pub const DEFAULT_ADDRESS: u8 = 0x18;

/// Default bound on waiting for a measurement
pub const DEFAULT_TIMEOUT: MillisDurationU32 = MillisDurationU32::millis(100);

/// Starts a conversion
const OUTPUT_MEASUREMENT: [u8; 3] = [0xAA, 0x00, 0x00];

const POLL_INTERVAL_MS: u32 = 1;
const RESET_PULSE_MS: u32 = 5;

/// All possible errors in this crate
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Error from the underlying I2C bus
    I2c(E),
    /// Driving or reading one of the optional pins failed
    Pin,
    /// The sensor reported a failed check of its internal memory
    Integrity,
    /// The sensor reported that its internal math saturated
    Saturation,
    /// The status byte read back as `0xFF`
    ///
    /// This is what an undriven bus returns, so the sensor is most likely disconnected.
    NoResponse,
    /// The measurement did not finish within [`Config::timeout`]
    Timeout,
}

/// Settings for a [`MicroPressure`]
///
/// The pressure range and transfer function are printed in the part's datasheet.
/// The range must be given in PSI, whatever unit the part is specified in.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// 7-bit I2C address
    pub address: u8,
    /// Pressure at the bottom of the range, in PSI
    pub min_pressure: f32,
    /// Pressure at the top of the range, in PSI
    pub max_pressure: f32,
    /// Transfer function of the part
    pub transfer_function: TransferFunction,
    /// Longest time to wait for a measurement
    ///
    /// `None` waits forever.
    pub timeout: Option<MillisDurationU32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            min_pressure: 0.0,
            max_pressure: 25.0,
            transfer_function: TransferFunction::A,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

impl Config {
    /// Use a non-default I2C address
    #[must_use]
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Set the pressure range of the part, in PSI
    #[must_use]
    pub fn with_range(mut self, min_pressure: f32, max_pressure: f32) -> Self {
        self.min_pressure = min_pressure;
        self.max_pressure = max_pressure;
        self
    }

    /// Set the transfer function of the part
    #[must_use]
    pub fn with_transfer_function(mut self, transfer_function: TransferFunction) -> Self {
        self.transfer_function = transfer_function;
        self
    }

    /// Set how long to wait for a measurement, `None` to wait forever
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<MillisDurationU32>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// One measurement frame, as read off the device
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawReading {
    /// Status byte sent with the measurement
    pub status: Status,
    /// 24-bit pressure count
    pub counts: u32,
}

impl From<[u8; 4]> for RawReading {
    fn from(frame: [u8; 4]) -> Self {
        Self {
            status: Status::from(frame[0]),
            counts: u32::from_be_bytes([0, frame[1], frame[2], frame[3]]),
        }
    }
}

impl RawReading {
    /// The pressure count, if the status flags say it can be trusted
    pub fn validate<E>(self) -> Result<u32, Error<E>> {
        if self.status.is_valid() {
            Ok(self.counts)
        } else if self.status.contains(Status::INTEGRITY_ERR) {
            Err(Error::Integrity)
        } else {
            Err(Error::Saturation)
        }
    }
}

/// A Honeywell MPR series pressure sensor.
///
/// `EOC` and `RST` are the optional end-of-conversion and reset pins, [`NoPin`] when not
/// connected.
pub struct MicroPressure<I, D, EOC = NoPin, RST = NoPin> {
    i2c: I,
    delay: D,
    address: u8,
    eoc: Option<EOC>,
    rst: Option<RST>,
    calibration: Calibration,
    timeout: Option<MillisDurationU32>,
}

impl<I, D> MicroPressure<I, D, NoPin, NoPin> {
    /// Create the driver
    ///
    /// Doesn't talk to the device; call [`Self::begin`] for that.
    pub fn new(i2c: I, delay: D, config: Config) -> Self {
        #[cfg(feature = "defmt")]
        debug!("Creating new MicroPressure sensor with {}", config);
        Self {
            i2c,
            delay,
            address: config.address,
            eoc: None,
            rst: None,
            calibration: Calibration::new(
                config.transfer_function,
                config.min_pressure,
                config.max_pressure,
            ),
            timeout: config.timeout,
        }
    }
}

impl<I, D, EOC, RST> MicroPressure<I, D, EOC, RST> {
    /// Wait on an end-of-conversion pin rather than polling the status byte
    ///
    /// The pin is read as an active-high ready signal.
    pub fn with_eoc<P>(self, eoc: P) -> MicroPressure<I, D, P, RST> {
        MicroPressure {
            i2c: self.i2c,
            delay: self.delay,
            address: self.address,
            eoc: Some(eoc),
            rst: self.rst,
            calibration: self.calibration,
            timeout: self.timeout,
        }
    }

    /// Attach the active-low reset pin, pulsed by [`Self::begin`]
    pub fn with_reset<P>(self, rst: P) -> MicroPressure<I, D, EOC, P> {
        MicroPressure {
            i2c: self.i2c,
            delay: self.delay,
            address: self.address,
            eoc: self.eoc,
            rst: Some(rst),
            calibration: self.calibration,
            timeout: self.timeout,
        }
    }

    /// Destroy the sensor struct and yield the resources it held
    pub fn destroy(self) -> (I, D, Option<EOC>, Option<RST>) {
        (self.i2c, self.delay, self.eoc, self.rst)
    }

    /// I2C address the sensor is talked to on
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Current calibration
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Replace the count value at minimum pressure
    ///
    /// See [`Calibration::set_zero`].
    pub fn set_zero(&mut self, zero: u32) {
        self.calibration.set_zero(zero);
    }

    /// Replace the scale factor, in PSI per count
    ///
    /// See [`Calibration::set_cal_factor`].
    pub fn set_cal_factor(&mut self, factor: f32) {
        self.calibration.set_cal_factor(factor);
    }
}

macro_rules! read_unit_impl {
    ($($unit:ident),*) => {
        paste::paste! {
        $(
            #[doc = "Read a pressure measurement in [`PressureUnit::" $unit "`], block until ready"]
            #[inline]
            pub fn [<read_ $unit:lower>](&mut self) -> Result<f32, Error<E>> {
                self.read_pressure(PressureUnit::$unit)
            }
        )*
        }
    };
}

impl<I, E, D, EOC, RST> MicroPressure<I, D, EOC, RST>
where
    I: I2c<Error = E>,
    D: DelayNs,
    EOC: InputPin,
    RST: OutputPin,
{
    /// Reset the device if a reset pin is attached, then check it answers on the bus
    ///
    /// Returns `Ok(false)` if nothing acknowledged the address.
    /// No other check of the device's identity is made.
    pub fn begin(&mut self) -> Result<bool, Error<E>> {
        if let Some(rst) = self.rst.as_mut() {
            #[cfg(feature = "defmt")]
            debug!("Pulsing reset pin");
            rst.set_low().map_err(|_| Error::<E>::Pin)?;
            self.delay.delay_ms(RESET_PULSE_MS);
            rst.set_high().map_err(|_| Error::<E>::Pin)?;
            self.delay.delay_ms(RESET_PULSE_MS);
        }

        #[cfg(feature = "defmt")]
        trace!("Probing address {=u8:#x}", self.address);
        if self.i2c.write(self.address, &[]).is_err() {
            #[cfg(feature = "defmt")]
            warn!("No answer from MicroPressure sensor at {=u8:#x}", self.address);
            return Ok(false);
        }

        #[cfg(feature = "defmt")]
        info!("MicroPressure sensor found at {=u8:#x}", self.address);
        Ok(true)
    }

    /// Read the status byte, verbatim
    pub fn read_status(&mut self) -> Result<u8, Error<E>> {
        let mut raw = [0];
        #[cfg(feature = "defmt")]
        trace!("Reading status byte");
        self.i2c.read(self.address, &mut raw).map_err(Error::I2c)?;
        Ok(raw[0])
    }

    /// Read the status byte as flags
    pub fn status(&mut self) -> Result<Status, Error<E>> {
        Ok(Status::from(self.read_status()?))
    }

    /// Check whether a triggered measurement has finished
    ///
    /// Reads the end-of-conversion pin if there is one, otherwise the busy flag.
    pub fn is_ready(&mut self) -> Result<bool, Error<E>> {
        if let Some(eoc) = self.eoc.as_mut() {
            #[cfg(feature = "defmt")]
            trace!("Reading end-of-conversion pin");
            return eoc.is_high().map_err(|_| Error::Pin);
        }

        let raw = self.read_status()?;
        if raw == flags::NO_RESPONSE {
            #[cfg(feature = "defmt")]
            warn!("Status byte read back as {=u8:#x}", raw);
            return Err(Error::NoResponse);
        }
        Ok(!Status::from(raw).is_busy())
    }

    /// Returns `Err(WouldBlock)` until the triggered measurement has finished
    pub fn poll_ready(&mut self) -> nb::Result<(), Error<E>> {
        if !self.is_ready()? {
            #[cfg(feature = "defmt")]
            trace!("Measurement not finished, sending WouldBlock");
            return Err(nb::Error::WouldBlock);
        }

        Ok(())
    }

    /// Block until the triggered measurement has finished
    ///
    /// Polls once per millisecond, and gives up with [`Error::Timeout`] after the timeout
    /// from [`Config`].
    pub fn wait_ready(&mut self) -> Result<(), Error<E>> {
        let mut waited = 0;
        loop {
            match self.poll_ready() {
                Ok(()) => return Ok(()),
                Err(nb::Error::Other(e)) => return Err(e),
                Err(nb::Error::WouldBlock) => {}
            }

            if let Some(timeout) = self.timeout {
                if waited >= timeout.to_millis() {
                    #[cfg(feature = "defmt")]
                    warn!("Measurement not ready after {}ms", waited);
                    return Err(Error::Timeout);
                }
            }
            self.delay.delay_ms(POLL_INTERVAL_MS);
            waited = waited.saturating_add(POLL_INTERVAL_MS);
        }
    }

    /// Trigger a measurement without waiting for it
    ///
    /// The returned guard yields the value once the device has finished, and holds the
    /// sensor until then.
    pub fn start_measurement(
        &mut self,
        unit: PressureUnit,
    ) -> Result<MeasurementGuard<'_, I, D, EOC, RST>, Error<E>> {
        #[cfg(feature = "defmt")]
        debug!("Starting measurement in {}", unit);
        self.trigger()?;
        Ok(MeasurementGuard {
            sensor: Some(self),
            unit,
        })
    }

    /// Read a pressure measurement, block until ready
    ///
    /// [`PressureUnit::Raw`] returns the 24-bit count without applying the calibration.
    pub fn read_pressure(&mut self, unit: PressureUnit) -> Result<f32, Error<E>> {
        #[cfg(feature = "defmt")]
        debug!("Reading pressure in {}", unit);
        let reading = self.read_raw_reading()?;
        self.convert(reading, unit)
    }

    /// Read a pressure measurement, with any failure reported as NaN
    pub fn read_pressure_or_nan(&mut self, unit: PressureUnit) -> f32 {
        self.read_pressure(unit).unwrap_or(f32::NAN)
    }

    /// Trigger a measurement, block until ready, and return the frame unchecked
    pub fn read_raw_reading(&mut self) -> Result<RawReading, Error<E>> {
        self.trigger()?;
        self.wait_ready()?;
        self.read_frame()
    }

    read_unit_impl!(Psi, Pa, Kpa, Torr, InHg, Atm, Bar, Raw);

    fn trigger(&mut self) -> Result<(), Error<E>> {
        #[cfg(feature = "defmt")]
        trace!("Sending measurement command");
        self.i2c
            .write(self.address, &OUTPUT_MEASUREMENT)
            .map_err(Error::I2c)
    }

    fn read_frame(&mut self) -> Result<RawReading, Error<E>> {
        let mut frame = [0; 4];
        #[cfg(feature = "defmt")]
        trace!("Reading 4 bytes");
        self.i2c.read(self.address, &mut frame).map_err(Error::I2c)?;
        Ok(RawReading::from(frame))
    }

    #[allow(clippy::cast_precision_loss)]
    fn convert(&self, reading: RawReading, unit: PressureUnit) -> Result<f32, Error<E>> {
        let counts = match reading.validate() {
            Ok(counts) => counts,
            Err(e) => {
                #[cfg(feature = "defmt")]
                warn!("Rejecting reading with status {}", reading.status);
                return Err(e);
            }
        };

        if unit == PressureUnit::Raw {
            return Ok(counts as f32);
        }
        let res = unit.from_psi(self.calibration.to_base_pressure(counts));
        #[cfg(feature = "defmt")]
        trace!("Converted {} counts to {}{}", counts, res, unit.symbol());
        Ok(res)
    }
}

/// RAII guard for a measurement started with [`MicroPressure::start_measurement`]
///
/// Lets the caller do other work while the sensor converts, while still holding exclusive
/// access to the device.
///
/// ```no_run
/// use micropressure::{Config, MicroPressure, PressureUnit};
/// # use embedded_hal::i2c::ErrorKind;
/// # use embedded_hal_mock::eh1::{delay::NoopDelay, i2c::Mock};
/// # fn main() -> Result<(), micropressure::Error<ErrorKind>> {
///
/// let mut sensor = {
///     // ... initialise device
/// # MicroPressure::new(Mock::new(&[]), NoopDelay::new(), Config::default())
/// };
/// let mut guard = sensor.start_measurement(PressureUnit::Psi)?;
///
/// // do something else while the sensor converts...
///
/// let pres = nb::block!(guard.try_take())?;
/// println!("Pressure: {}psi", pres);
/// # Ok(()) }
/// ```
pub struct MeasurementGuard<'a, I, D, EOC, RST> {
    sensor: Option<&'a mut MicroPressure<I, D, EOC, RST>>,
    unit: PressureUnit,
}

impl<'a, I, E, D, EOC, RST> MeasurementGuard<'a, I, D, EOC, RST>
where
    I: I2c<Error = E>,
    D: DelayNs,
    EOC: InputPin,
    RST: OutputPin,
{
    /// Unit the value will be converted to
    pub fn unit(&self) -> PressureUnit {
        self.unit
    }

    /// Read the value off the device or yield execution if not ready
    ///
    /// # Panics
    ///
    /// Panics if the value has previously been taken.
    pub fn try_take(&mut self) -> nb::Result<f32, Error<E>> {
        self.sensor
            .as_mut()
            .expect("Reading already used")
            .poll_ready()?;
        let sensor = self.sensor.take().expect("Reading already used");
        let reading = sensor.read_frame()?;
        sensor
            .convert(reading, self.unit)
            .map_err(nb::Error::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case([0x40, 0x19, 0x99, 0x9A], 1_677_722)]
    #[test_case([0x40, 0xE6, 0x66, 0x66], 15_099_494)]
    #[test_case([0x40, 0xFF, 0xFF, 0xFF], 0x00FF_FFFF)]
    #[test_case([0x40, 0x00, 0x00, 0x01], 1)]
    #[test_case([0x60, 0x00, 0x00, 0x2A], 42 ; "busy bit is not an error")]
    #[test_case([0x00, 0x00, 0x00, 0x2A], 42 ; "power bit is not required")]
    fn frame_to_counts(frame: [u8; 4], expected: u32) {
        let reading = RawReading::from(frame);
        assert_eq!(reading.counts, expected);
        assert_eq!(reading.validate::<()>(), Ok(expected));
    }

    #[test_case(0x44, Error::Integrity)]
    #[test_case(0x41, Error::Saturation)]
    #[test_case(0x45, Error::Integrity ; "integrity reported first")]
    #[test_case(0x04, Error::Integrity ; "without power bit")]
    fn flagged_frame(status: u8, expected: Error<()>) {
        let reading = RawReading::from([status, 0x80, 0x00, 0x00]);
        assert_eq!(reading.validate(), Err(expected));
    }

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.address, 0x18);
        assert_eq!(config.min_pressure, 0.0);
        assert_eq!(config.max_pressure, 25.0);
        assert_eq!(config.transfer_function, TransferFunction::A);
        assert_eq!(config.timeout, Some(MillisDurationU32::millis(100)));
    }

    #[test]
    fn config_builders() {
        let config = Config::default()
            .with_address(0x28)
            .with_range(-1.0, 1.0)
            .with_transfer_function(TransferFunction::C)
            .with_timeout(None);
        assert_eq!(config.address, 0x28);
        assert_eq!(config.min_pressure, -1.0);
        assert_eq!(config.max_pressure, 1.0);
        assert_eq!(config.transfer_function, TransferFunction::C);
        assert_eq!(config.timeout, None);
    }
}
