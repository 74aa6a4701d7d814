/// Unit a pressure reading is reported in
///
/// Calibration always works in PSI; the other units are fixed multiples of it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PressureUnit {
    /// Pounds per square inch
    #[default]
    Psi,
    /// Pascal
    Pa,
    /// Kilopascal
    Kpa,
    /// Torr, equivalent to mmHg
    Torr,
    /// Inches of mercury
    InHg,
    /// Standard atmospheres
    Atm,
    /// Bar
    Bar,
    /// Unconverted 24-bit count from the sensor
    Raw,
}

impl PressureUnit {
    /// Multiplier from PSI to this unit
    ///
    /// `None` for [`PressureUnit::Raw`], which is not a pressure.
    #[must_use]
    pub fn factor(self) -> Option<f32> {
        use PressureUnit::*;

        match self {
            Psi => Some(1.0),
            Pa => Some(6894.7573),
            Kpa => Some(6.89476),
            Torr => Some(51.7149),
            InHg => Some(2.03602),
            Atm => Some(0.06805),
            Bar => Some(0.06895),
            Raw => None,
        }
    }

    /// Convert a pressure in PSI to this unit
    ///
    /// [`PressureUnit::Raw`] passes the value through untouched.
    #[must_use]
    pub fn from_psi(self, psi: f32) -> f32 {
        self.factor().map_or(psi, |factor| psi * factor)
    }

    /// Short symbol for display
    #[must_use]
    pub fn symbol(self) -> &'static str {
        use PressureUnit::*;

        match self {
            Psi => "psi",
            Pa => "Pa",
            Kpa => "kPa",
            Torr => "Torr",
            InHg => "inHg",
            Atm => "atm",
            Bar => "bar",
            Raw => "counts",
        }
    }
}
