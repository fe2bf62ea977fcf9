//! Conversion between micrometres and integer database units.

/// µm-per-DBU scale of a layout.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Units {
    dbu: f64,
}

impl Units {
    pub fn new(dbu: f64) -> Self {
        Self { dbu }
    }

    pub fn dbu(&self) -> f64 {
        self.dbu
    }

    /// Banker's rounding, so a value converted twice does not drift by one.
    pub fn to_dbu(&self, um: f64) -> i64 {
        (um / self.dbu).round_ties_even() as i64
    }

    pub fn to_um(&self, dbu: i64) -> f64 {
        dbu as f64 * self.dbu
    }
}

impl Default for Units {
    fn default() -> Self {
        Self::new(0.001)
    }
}
