use childtrack_protocol::{FrameBounds, Rect};

/// Whether `rect` (in the embedded document's coordinates) lies inside the
/// on-screen part of the frame.
///
/// Vertically the element must fit between the top of the host viewport and
/// [`FrameBounds::vertical_bound`], so an element whose bottom is below the
/// fold does not count. Horizontally it only has to overlap
/// `[0, viewport_width]`. Every bound is inclusive. Non-finite rects (a
/// malformed geometry reply) are never visible.
pub fn is_element_in_viewport(rect: &Rect, bounds: &FrameBounds) -> bool {
    if !rect.is_finite() {
        return false;
    }

    let vertical_bound = bounds.vertical_bound();

    let left_is_right_of_window = rect.left > bounds.viewport_width;
    let right_is_left_of_window = rect.right < 0.0;
    let top_is_below_fold = rect.top > vertical_bound;
    let bottom_is_above_window = rect.bottom < bounds.upper_bound();
    let bottom_is_below_fold = rect.bottom > vertical_bound;

    !(left_is_right_of_window
        || right_is_left_of_window
        || top_is_below_fold
        || bottom_is_above_window
        || bottom_is_below_fold)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1024x800 viewport, frame scrolled 100px above the viewport top: the
    /// on-screen frame region is y in [100, 900].
    fn bounds() -> FrameBounds {
        FrameBounds::new(Rect::new(-100.0, 0.0, 1900.0, 1024.0), 1024.0, 800.0)
    }

    #[test]
    fn element_inside_is_visible() {
        assert!(is_element_in_viewport(&Rect::new(50.0, 10.0, 200.0, 100.0), &bounds()));
    }

    #[test]
    fn bottom_exactly_at_fold_is_visible() {
        assert!(is_element_in_viewport(&Rect::new(800.0, 10.0, 900.0, 100.0), &bounds()));
        assert!(!is_element_in_viewport(&Rect::new(800.0, 10.0, 900.5, 100.0), &bounds()));
    }

    #[test]
    fn element_below_fold_is_hidden() {
        assert!(!is_element_in_viewport(&Rect::new(900.0, 10.0, 1050.0, 100.0), &bounds()));
        assert!(!is_element_in_viewport(&Rect::new(950.0, 10.0, 1050.0, 100.0), &bounds()));
    }

    #[test]
    fn element_scrolled_past_is_hidden() {
        assert!(!is_element_in_viewport(&Rect::new(0.0, 10.0, 99.0, 100.0), &bounds()));
        // Bottom exactly at the viewport top still counts.
        assert!(is_element_in_viewport(&Rect::new(0.0, 10.0, 100.0, 100.0), &bounds()));
    }

    #[test]
    fn horizontal_bounds() {
        assert!(!is_element_in_viewport(&Rect::new(50.0, 1025.0, 200.0, 1100.0), &bounds()));
        assert!(is_element_in_viewport(&Rect::new(50.0, 1024.0, 200.0, 1100.0), &bounds()));
        assert!(!is_element_in_viewport(&Rect::new(50.0, -300.0, 200.0, -1.0), &bounds()));
        assert!(is_element_in_viewport(&Rect::new(50.0, -300.0, 200.0, 0.0), &bounds()));
    }

    #[test]
    fn malformed_rect_is_hidden() {
        assert!(!is_element_in_viewport(&Rect::nan(), &bounds()));
        let partial = Rect::new(50.0, 10.0, f64::NAN, 100.0);
        assert!(!is_element_in_viewport(&partial, &bounds()));
    }

    #[test]
    fn agrees_with_containment_on_a_grid() {
        let b = bounds();
        for top in (0..1100).step_by(50) {
            for height in [0, 10, 150, 400, 900] {
                let top = f64::from(top);
                let bottom = top + f64::from(height);
                let rect = Rect::new(top, 10.0, bottom, 100.0);
                let expected = bottom >= 100.0 && bottom <= 900.0 && top <= 900.0;
                assert_eq!(
                    is_element_in_viewport(&rect, &b),
                    expected,
                    "top={top} bottom={bottom}"
                );
            }
        }
    }
}
