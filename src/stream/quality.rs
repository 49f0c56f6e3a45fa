/// Bar range used when drawing SNR meters.
pub const SNR_BAR_RANGE_DB: (f64, f64) = (-10.0, 50.0);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnrGrade {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl SnrGrade {
    pub fn from_db(snr: f64) -> Self {
        if snr < 10.0 {
            SnrGrade::Poor
        } else if snr < 20.0 {
            SnrGrade::Fair
        } else if snr < 30.0 {
            SnrGrade::Good
        } else {
            SnrGrade::Excellent
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SnrGrade::Poor => "POOR",
            SnrGrade::Fair => "FAIR",
            SnrGrade::Good => "GOOD",
            SnrGrade::Excellent => "EXCELLENT",
        }
    }
}

/// Raw vs filtered SNR comparison. Missing readings count as 0 dB.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SignalQuality {
    pub raw_db: f64,
    pub filtered_db: f64,
}

impl SignalQuality {
    pub fn new(raw_db: Option<f64>, filtered_db: Option<f64>) -> Self {
        Self {
            raw_db: raw_db.unwrap_or(0.0),
            filtered_db: filtered_db.unwrap_or(0.0),
        }
    }

    pub fn improvement_db(&self) -> f64 {
        self.filtered_db - self.raw_db
    }

    /// Filtered/raw ratio, or 0 when the raw SNR is not positive.
    pub fn improvement_ratio(&self) -> f64 {
        if self.raw_db > 0.0 {
            self.filtered_db / self.raw_db
        } else {
            0.0
        }
    }
}

/// Fill fraction in `0..=1` for an SNR meter.
pub fn snr_bar_fraction(snr: f64) -> f64 {
    let (lo, hi) = SNR_BAR_RANGE_DB;
    ((snr - lo) / (hi - lo)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_thresholds() {
        let grades: Vec<_> = [-3.0, 9.99, 10.0, 25.0, 30.0]
            .into_iter()
            .map(SnrGrade::from_db)
            .collect();
        assert_eq!(
            grades,
            [
                SnrGrade::Poor,
                SnrGrade::Poor,
                SnrGrade::Fair,
                SnrGrade::Good,
                SnrGrade::Excellent
            ]
        );
    }

    #[test]
    fn bar_is_clamped() {
        assert_eq!(snr_bar_fraction(-40.0), 0.0);
        assert_eq!(snr_bar_fraction(20.0), 0.5);
        assert_eq!(snr_bar_fraction(90.0), 1.0);
    }

    #[test]
    fn improvement() {
        let q = SignalQuality::new(Some(-5.0), Some(12.0));
        assert_eq!(q.improvement_db(), 17.0);
        assert_eq!(q.improvement_ratio(), 0.0);
        let q = SignalQuality::new(Some(10.0), None);
        assert_eq!(q.filtered_db, 0.0);
        assert_eq!(q.improvement_ratio(), 0.0);
        assert_eq!(SignalQuality::new(Some(10.0), Some(25.0)).improvement_ratio(), 2.5);
    }
}
