use bitflags::bitflags;

/// Value read back when nothing drives the bus
///
/// Every bit is set, including the busy flag, so status polling would never end on it.
pub(crate) const NO_RESPONSE: u8 = 0xFF;

bitflags! {
    /// Flags in the status byte
    ///
    /// The status byte is returned on its own by a 1-byte read, and as the first byte of
    /// every 4-byte measurement frame.
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Status: u8 {
        /// Device is powered
        const POWERED = 0b0100_0000;
        /// Conversion in progress
        const BUSY = 0b0010_0000;
        /// Checksum of the internal memory failed
        const INTEGRITY_ERR = 0b0000_0100;
        /// Internal math saturated during conversion
        const MATH_SAT = 0b0000_0001;
        /// Either error flag
        const ERRORS = Self::INTEGRITY_ERR.bits | Self::MATH_SAT.bits;
    }
}

impl Status {
    /// Whether a triggered conversion is still running
    #[must_use]
    pub fn is_busy(self) -> bool {
        self.contains(Self::BUSY)
    }

    /// Whether the data accompanying this status can be trusted
    #[must_use]
    pub fn is_valid(self) -> bool {
        !self.intersects(Self::ERRORS)
    }
}

impl From<u8> for Status {
    fn from(raw: u8) -> Self {
        Self::from_bits_truncate(raw)
    }
}
