//! Level assessment for light readings
//!
//! Classifies a raw light reading against the configured thresholds into the
//! label that ends up in the log record.

/// Light level assessment for one reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightLevel {
    /// Below the low threshold
    Low,
    /// Between the two thresholds
    Average,
    /// At or above the high threshold
    High,
}

impl LightLevel {
    /// Assess a raw 10-bit reading against `low` and `high`.
    ///
    /// The low threshold is exclusive and the high threshold inclusive, so a
    /// reading equal to `high` is already [`LightLevel::High`].
    pub fn assess(raw: u16, low: u16, high: u16) -> Self {
        if raw < low {
            Self::Low
        } else if raw < high {
            Self::Average
        } else {
            Self::High
        }
    }

    /// Get the log label for this level
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Average => "AVERAGE",
            Self::High => "HIGH",
        }
    }
}
