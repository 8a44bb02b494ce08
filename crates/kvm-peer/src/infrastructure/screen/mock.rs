//! Mock screen metrics for unit testing the control core without a real
//! display.

use kvm_core::domain::geometry::Rect;

use super::{ScreenMetrics, ScreenMetricsError};

pub struct MockScreenMetrics {
    pub bounds: Rect,
}

impl MockScreenMetrics {
    pub fn new(bounds: Rect) -> Self {
        Self { bounds }
    }

    pub fn single_1080p() -> Self {
        Self::new(Rect::new(1920, 1080))
    }

    pub fn single_1440p() -> Self {
        Self::new(Rect::new(2560, 1440))
    }
}

impl ScreenMetrics for MockScreenMetrics {
    fn primary_bounds(&self) -> Result<Rect, ScreenMetricsError> {
        Ok(self.bounds)
    }

    fn virtual_bounds(&self) -> Result<Rect, ScreenMetricsError> {
        Ok(self.bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_1080p_reports_1920x1080() {
        let m = MockScreenMetrics::single_1080p();
        assert_eq!(m.primary_bounds().unwrap(), Rect::new(1920, 1080));
    }

    #[test]
    fn virtual_bounds_matches_primary_bounds() {
        let m = MockScreenMetrics::single_1440p();
        assert_eq!(m.primary_bounds().unwrap(), m.virtual_bounds().unwrap());
    }
}
