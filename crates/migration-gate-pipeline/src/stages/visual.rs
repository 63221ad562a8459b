// crates/migration-gate-pipeline/src/stages/visual.rs
// ============================================================================
// Module: Visual Diff Stage
// Description: Per-viewport screenshot comparison, heatmap generation, and
// layout-shift detection.
// Purpose: Produce a per-pair visual verdict and a per-run summary for
// reasoning to consume.
// Dependencies: migration-gate-core, image
// ============================================================================

//! ## Overview
//! A dimension mismatch is resolved by nearest-neighbor resampling the
//! candidate image up or down to the baseline's size before diffing, so the
//! diff ratio is always computed over equal-sized buffers. Severity is a
//! pure function of `(diffRatio, hasLayoutShift)`, never of any other
//! signal, so it can be unit-tested as a table.

// ============================================================================
// SECTION: Imports
// ============================================================================

use image::GenericImageView;
use image::Rgba;
use image::RgbaImage;
use image::imageops::FilterType;
use migration_gate_core::Severity;
use migration_gate_core::VisualSummary;
use serde::Deserialize;
use serde::Serialize;

const ANTI_ALIAS_THRESHOLD: f64 = 0.1;
const LAYOUT_SHIFT_MIN_PIXELS: u32 = 5;
const GRID_SIZE: u32 = 10;

// ============================================================================
// SECTION: Layout Shift
// ============================================================================

/// One region of the diff image whose pixel difference count exceeded the
/// minimum-pixel threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutShiftRegion {
    /// Grid cell column.
    pub cell_x: u32,
    /// Grid cell row.
    pub cell_y: u32,
    /// Pixels differing within this cell.
    pub diff_pixel_count: u32,
    /// Magnitude of the cell's center-of-mass shift from the image center.
    pub shift_magnitude: f64,
}

// ============================================================================
// SECTION: Pair Result
// ============================================================================

/// The result of diffing one baseline/candidate screenshot pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualPairResult {
    /// Fraction of pixels that differ beyond the anti-alias threshold.
    pub diff_ratio: f64,
    /// Layout-shift regions detected on the 10x10 grid.
    pub layout_shifts: Vec<LayoutShiftRegion>,
    /// Severity classification per the documented table.
    pub severity: Severity,
}

fn pixel_differs(a: Rgba<u8>, b: Rgba<u8>) -> bool {
    let channel_diff = |x: u8, y: u8| (i32::from(x) - i32::from(y)).unsigned_abs();
    let total = channel_diff(a[0], b[0]) + channel_diff(a[1], b[1]) + channel_diff(a[2], b[2]);
    let tolerance = (ANTI_ALIAS_THRESHOLD * 255.0 * 3.0) as u32;
    total > tolerance
}

/// Resamples `candidate` to `baseline`'s dimensions with nearest-neighbor if
/// they differ, then computes the per-pixel diff image, the diff ratio, and
/// any layout-shift regions on a 10x10 grid.
#[must_use]
pub fn diff_pair(baseline: &RgbaImage, candidate: &RgbaImage) -> (RgbaImage, VisualPairResult) {
    let (width, height) = baseline.dimensions();
    let resampled = if candidate.dimensions() == (width, height) {
        candidate.clone()
    } else {
        image::imageops::resize(candidate, width, height, FilterType::Nearest)
    };

    let mut diff_image = RgbaImage::new(width, height);
    let mut diff_pixels: u32 = 0;
    let mut cell_counts = vec![0u32; (GRID_SIZE * GRID_SIZE) as usize];

    for y in 0..height {
        for x in 0..width {
            let a = *baseline.get_pixel(x, y);
            let b = *resampled.get_pixel(x, y);
            if pixel_differs(a, b) {
                diff_pixels += 1;
                diff_image.put_pixel(x, y, Rgba([255, 0, 0, 255]));
                let cell_x = (x * GRID_SIZE / width.max(1)).min(GRID_SIZE - 1);
                let cell_y = (y * GRID_SIZE / height.max(1)).min(GRID_SIZE - 1);
                cell_counts[(cell_y * GRID_SIZE + cell_x) as usize] += 1;
            } else {
                diff_image.put_pixel(x, y, Rgba([0, 0, 0, 0]));
            }
        }
    }

    let total_pixels = u64::from(width) * u64::from(height);
    let diff_ratio = if total_pixels == 0 {
        0.0
    } else {
        f64::from(diff_pixels) / total_pixels as f64
    };

    let center_x = f64::from(GRID_SIZE) / 2.0;
    let center_y = f64::from(GRID_SIZE) / 2.0;
    let mut layout_shifts = Vec::new();
    for cell_y in 0..GRID_SIZE {
        for cell_x in 0..GRID_SIZE {
            let count = cell_counts[(cell_y * GRID_SIZE + cell_x) as usize];
            if count > LAYOUT_SHIFT_MIN_PIXELS {
                let dx = f64::from(cell_x) - center_x;
                let dy = f64::from(cell_y) - center_y;
                layout_shifts.push(LayoutShiftRegion {
                    cell_x,
                    cell_y,
                    diff_pixel_count: count,
                    shift_magnitude: (dx * dx + dy * dy).sqrt(),
                });
            }
        }
    }

    let severity = classify_severity(diff_ratio, !layout_shifts.is_empty());
    (
        diff_image,
        VisualPairResult {
            diff_ratio,
            layout_shifts,
            severity,
        },
    )
}

/// Classifies severity from `(diffRatio, hasLayoutShift)` per the documented
/// table. A pure function so it is testable independent of image decoding.
#[must_use]
pub fn classify_severity(diff_ratio: f64, has_layout_shift: bool) -> Severity {
    if diff_ratio == 0.0 && !has_layout_shift {
        Severity::None
    } else if has_layout_shift && diff_ratio > 0.5 {
        Severity::Critical
    } else if has_layout_shift || diff_ratio > 0.3 {
        Severity::High
    } else if diff_ratio > 0.1 {
        Severity::Medium
    } else if diff_ratio > 0.05 {
        Severity::Low
    } else {
        Severity::None
    }
}

/// Renders a heatmap from a diff image: red above intensity 200, a gradient
/// through yellow to green below it, fully transparent where the baseline
/// diff is zero.
#[must_use]
pub fn render_heatmap(diff_image: &RgbaImage) -> RgbaImage {
    let (width, height) = diff_image.dimensions();
    let mut heatmap = RgbaImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let pixel = diff_image.get_pixel(x, y);
            let intensity = pixel[0];
            if intensity == 0 {
                heatmap.put_pixel(x, y, Rgba([0, 0, 0, 0]));
            } else if intensity > 200 {
                heatmap.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            } else {
                let fraction = f64::from(intensity) / 200.0;
                let red = 255u8;
                let green = (255.0 * fraction) as u8;
                heatmap.put_pixel(x, y, Rgba([red, green, 0, 255]));
            }
        }
    }
    heatmap
}

// ============================================================================
// SECTION: Per-Run Summary
// ============================================================================

/// Aggregates per-pair results into the compact summary reasoning consumes.
/// Each page's severity is the maximum across its viewports, consistent with
/// the decided per-page-max rollup.
#[must_use]
pub fn summarize(per_page_max_severity: &[Severity], diff_ratios: &[f64]) -> VisualSummary {
    let mut severity_counts = [0u32; 5];
    let mut pages_with_diffs = 0;
    for severity in per_page_max_severity {
        severity_counts[*severity as usize] += 1;
        if *severity != Severity::None {
            pages_with_diffs += 1;
        }
    }
    let average_diff_percent = if diff_ratios.is_empty() {
        0.0
    } else {
        diff_ratios.iter().sum::<f64>() / diff_ratios.len() as f64 * 100.0
    };
    VisualSummary {
        pages_with_diffs,
        severity_counts,
        average_diff_percent,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "test-only assertions")]
mod tests {
    use super::*;

    #[test]
    fn severity_table_matches_the_documented_thresholds() {
        assert_eq!(classify_severity(0.0, false), Severity::None);
        assert_eq!(classify_severity(0.0, true), Severity::High);
        assert_eq!(classify_severity(0.6, true), Severity::Critical);
        assert_eq!(classify_severity(0.4, false), Severity::High);
        assert_eq!(classify_severity(0.2, false), Severity::Medium);
        assert_eq!(classify_severity(0.07, false), Severity::Low);
        assert_eq!(classify_severity(0.01, false), Severity::None);
    }

    #[test]
    fn identical_images_produce_zero_diff_ratio_and_none_severity() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        let (_, result) = diff_pair(&image, &image);
        assert_eq!(result.diff_ratio, 0.0);
        assert_eq!(result.severity, Severity::None);
        assert!(result.layout_shifts.is_empty());
    }

    #[test]
    fn fully_different_images_produce_full_diff_ratio() {
        let baseline = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        let candidate = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let (_, result) = diff_pair(&baseline, &candidate);
        assert_eq!(result.diff_ratio, 1.0);
        assert_eq!(result.severity, Severity::Critical);
    }

    #[test]
    fn mismatched_dimensions_are_resampled_before_diffing() {
        let baseline = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]));
        let candidate = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        let (diff_image, result) = diff_pair(&baseline, &candidate);
        assert_eq!(diff_image.dimensions(), (8, 8));
        assert_eq!(result.diff_ratio, 0.0);
    }

    #[test]
    fn summary_counts_pages_by_severity_and_averages_diff_percent() {
        let summary = summarize(
            &[Severity::None, Severity::High, Severity::High],
            &[0.0, 0.4, 0.6],
        );
        assert_eq!(summary.pages_with_diffs, 2);
        assert_eq!(summary.severity_counts[Severity::High as usize], 2);
        assert!((summary.average_diff_percent - 33.333).abs() < 0.01);
    }
}
