//! Auto-stretch math shared by the workflows.
//!
//! The screen transfer function (STF) and the histogram transformation (HT)
//! that makes it permanent are both derived from one shadows clipping point
//! and one midtones balance, computed from the median and MAD of channel 0.

use deepsky_engine::ProcessingJob;

/// Midtones transfer function: maps `x` so that `m` lands on 0.5.
pub fn mtf(m: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    ((m - 1.0) * x) / ((2.0 * m - 1.0) * x - m)
}

const STF_IDENTITY: [f64; 5] = [0.0, 1.0, 0.5, 0.0, 1.0];
const HT_IDENTITY: [f64; 5] = [0.0, 0.5, 1.0, 0.0, 1.0];

/// Shadows clipping point and midtones balance of an auto stretch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoStretch {
    pub clipping: f64,
    pub midtones: f64,
}

impl AutoStretch {
    /// Derive the stretch from image statistics.
    ///
    /// With a zero MAD there is nothing to clip against and the clipping
    /// point stays at 0.
    pub fn compute(median: f64, mad: f64, target_background: f64, shadows_clipping: f64) -> Self {
        let clipping = if mad != 0.0 {
            (median + shadows_clipping * mad).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            clipping,
            midtones: mtf(target_background, median - clipping),
        }
    }

    /// STF rows `[c0, c1, m, r0, r1]`: R, G, B, then luminance.
    /// Grayscale images only use the first row.
    pub fn stf_rows(&self, grayscale: bool) -> Vec<[f64; 5]> {
        let row = [self.clipping, 1.0, self.midtones, 0.0, 1.0];
        let mut rows = vec![STF_IDENTITY; 4];
        rows[0] = row;
        if !grayscale {
            rows[1] = row;
            rows[2] = row;
        }
        rows
    }

    /// HT rows `[c0, m, c1, r0, r1]`: R, G, B, combined RGB/K, alpha.
    /// Grayscale images are stretched through the combined row.
    pub fn histogram_rows(&self, grayscale: bool) -> Vec<[f64; 5]> {
        let row = [self.clipping, self.midtones, 1.0, 0.0, 1.0];
        let mut rows = vec![HT_IDENTITY; 5];
        if grayscale {
            rows[3] = row;
        } else {
            rows[0] = row;
            rows[1] = row;
            rows[2] = row;
        }
        rows
    }

    pub fn stf_job(&self, grayscale: bool) -> ProcessingJob {
        ProcessingJob::new("ScreenTransferFunction").with("STF", to_json_rows(&self.stf_rows(grayscale)))
    }

    pub fn histogram_job(&self, grayscale: bool) -> ProcessingJob {
        ProcessingJob::new("HistogramTransformation").with("H", to_json_rows(&self.histogram_rows(grayscale)))
    }
}

fn to_json_rows(rows: &[[f64; 5]]) -> Vec<Vec<f64>> {
    rows.iter().map(|r| r.to_vec()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_mtf_fixed_points() {
        assert_eq!(mtf(0.25, 0.0), 0.0);
        assert_eq!(mtf(0.25, 1.0), 1.0);
        assert_eq!(mtf(0.25, -0.3), 0.0);
        assert!((mtf(0.25, 0.25) - 0.5).abs() < 1e-12);
        // m = 0.5 is the identity
        assert!((mtf(0.5, 0.3) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_compute_clips_below_median() {
        let s = AutoStretch::compute(0.1, 0.01, 0.2, -2.4);
        assert!((s.clipping - 0.076).abs() < 1e-12);
        assert!((s.midtones - mtf(0.2, 0.1 - 0.076)).abs() < 1e-12);
    }

    #[test]
    fn test_zero_mad_does_not_clip() {
        let s = AutoStretch::compute(0.1, 0.0, 0.2, -2.4);
        assert_eq!(s.clipping, 0.0);
        assert_eq!(s.midtones, mtf(0.2, 0.1));
    }

    #[test]
    fn test_rows_by_color_mode() {
        let s = AutoStretch { clipping: 0.05, midtones: 0.01 };

        let color = s.stf_rows(false);
        assert_eq!(color[2], [0.05, 1.0, 0.01, 0.0, 1.0]);
        assert_eq!(color[3], STF_IDENTITY);
        let gray = s.stf_rows(true);
        assert_eq!(gray[1], STF_IDENTITY);

        let ht = s.histogram_rows(true);
        assert_eq!(ht[0], HT_IDENTITY);
        assert_eq!(ht[3], [0.05, 0.01, 1.0, 0.0, 1.0]);
        assert_eq!(s.histogram_rows(false)[1], [0.05, 0.01, 1.0, 0.0, 1.0]);
    }

    proptest! {
        #[test]
        fn prop_stretch_stays_in_unit_range(
            median in 0.0f64..1.0,
            mad in 0.0f64..0.2,
            target in 0.01f64..0.5,
            shadows in -15.0f64..1.0,
        ) {
            let s = AutoStretch::compute(median, mad, target, shadows);
            prop_assert!((0.0..=1.0).contains(&s.clipping));
            prop_assert!((0.0..=1.0).contains(&s.midtones));
        }
    }
}
