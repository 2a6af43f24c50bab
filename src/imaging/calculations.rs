//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;

/// Scale `size` to fit inside `max` while covering `min`, keeping the aspect ratio.
///
/// The factor is `max(min(max_w/w, max_h/h), max(min_w/w, min_h/h))`, so the
/// minimum bounds win when both cannot be honoured. Each side is rounded to
/// nearest and never drops below 1.
///
/// Without `allow_upscaling`, images already smaller than `max` in both
/// directions, or smaller than `min` in either, are left alone.
///
/// # Returns
/// * `Some(new)` when the dimensions change, `None` otherwise.
///
/// # Examples
/// ```
/// # use web_album::imaging::{Dimensions, scale_keeping_ratio_min};
/// let size = Dimensions::new(4000, 3000);
/// let scaled = scale_keeping_ratio_min(size, Dimensions::new(0, 0), Dimensions::new(640, 480), false);
/// assert_eq!(scaled, Some(Dimensions::new(640, 480)));
/// ```
pub fn scale_keeping_ratio_min(
    size: Dimensions,
    min: Dimensions,
    max: Dimensions,
    allow_upscaling: bool,
) -> Option<Dimensions> {
    if size.width == 0 || size.height == 0 {
        return None;
    }
    if !allow_upscaling {
        if size.width < max.width && size.height < max.height {
            return None;
        }
        if size.width < min.width || size.height < min.height {
            return None;
        }
    }

    let w = f64::from(size.width);
    let h = f64::from(size.height);
    let shrink = (f64::from(max.width) / w).min(f64::from(max.height) / h);
    let grow = (f64::from(min.width) / w).max(f64::from(min.height) / h);
    let factor = shrink.max(grow);

    let scaled = Dimensions {
        width: ((w * factor + 0.5).floor() as u32).max(1),
        height: ((h * factor + 0.5).floor() as u32).max(1),
    };
    (scaled != size).then_some(scaled)
}

/// [`scale_keeping_ratio_min`] with no minimum bounds.
pub fn scale_keeping_ratio(
    size: Dimensions,
    max: Dimensions,
    allow_upscaling: bool,
) -> Option<Dimensions> {
    scale_keeping_ratio_min(size, Dimensions::default(), max, allow_upscaling)
}

/// Downscale to fit a `max_side` square, or return `size` unchanged.
pub fn fit_within(size: Dimensions, max_side: u32) -> Dimensions {
    scale_keeping_ratio(size, Dimensions::new(max_side, max_side), false).unwrap_or(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(width: u32, height: u32) -> Dimensions {
        Dimensions::new(width, height)
    }

    // =========================================================================
    // scale_keeping_ratio tests
    // =========================================================================

    #[test]
    fn landscape_fits_width() {
        assert_eq!(
            scale_keeping_ratio(d(4000, 3000), d(100, 100), false),
            Some(d(100, 75))
        );
    }

    #[test]
    fn portrait_fits_height() {
        assert_eq!(
            scale_keeping_ratio(d(3000, 4000), d(100, 100), false),
            Some(d(75, 100))
        );
    }

    #[test]
    fn smaller_image_is_untouched() {
        assert_eq!(scale_keeping_ratio(d(80, 60), d(100, 100), false), None);
    }

    #[test]
    fn one_side_at_bound_still_scales() {
        // Width equals the bound, so the early exit does not apply.
        assert_eq!(scale_keeping_ratio(d(100, 50), d(100, 100), false), None);
        assert_eq!(
            scale_keeping_ratio(d(200, 50), d(100, 100), false),
            Some(d(100, 25))
        );
    }

    #[test]
    fn upscaling_when_allowed() {
        assert_eq!(
            scale_keeping_ratio(d(50, 25), d(100, 100), true),
            Some(d(100, 50))
        );
    }

    #[test]
    fn rounding_is_to_nearest() {
        // 1000x333 → factor 0.3 → 300 x 99.9 → 100
        assert_eq!(
            scale_keeping_ratio(d(1000, 333), d(300, 300), false),
            Some(d(300, 100))
        );
    }

    #[test]
    fn extreme_aspect_never_reaches_zero() {
        assert_eq!(
            scale_keeping_ratio(d(10000, 10), d(100, 100), false),
            Some(d(100, 1))
        );
    }

    #[test]
    fn zero_sized_input_is_ignored() {
        assert_eq!(scale_keeping_ratio(d(0, 10), d(100, 100), false), None);
    }

    // =========================================================================
    // scale_keeping_ratio_min tests
    // =========================================================================

    #[test]
    fn minimum_bounds_win_over_maximum() {
        // A very wide panorama: fitting 640x480 would make it 640x64, but the
        // minimum height of 200 pushes the factor up.
        let scaled = scale_keeping_ratio_min(d(6000, 600), d(0, 200), d(640, 480), false);
        assert_eq!(scaled, Some(d(2000, 200)));
    }

    #[test]
    fn image_below_minimum_is_untouched() {
        assert_eq!(
            scale_keeping_ratio_min(d(900, 150), d(0, 200), d(640, 480), false),
            None
        );
    }

    // =========================================================================
    // fit_within tests
    // =========================================================================

    #[test]
    fn fit_within_scales_down() {
        assert_eq!(fit_within(d(640, 480), 320), d(320, 240));
    }

    #[test]
    fn fit_within_keeps_small() {
        assert_eq!(fit_within(d(64, 48), 320), d(64, 48));
    }
}
