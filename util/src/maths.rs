//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::{Float, FloatConst};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Wrap an angle into the half-open interval (-pi, pi].
pub fn wrap_to_pi<T>(angle: T) -> T
where
    T: Float + FloatConst,
{
    let two_pi = T::PI() + T::PI();

    // Shift so the target interval maps onto [0, 2pi), take the euclidean
    // remainder, and shift back.
    let shifted = angle + T::PI();
    let mut wrapped = shifted - two_pi * (shifted / two_pi).floor() - T::PI();

    // The remainder lands in [-pi, pi), the interval is (-pi, pi].
    if wrapped <= -T::PI() {
        wrapped = wrapped + two_pi;
    }

    wrapped
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_wrap_to_pi() {
        assert!((wrap_to_pi(0.0f64)).abs() < 1e-12);
        assert!((wrap_to_pi(3.0 * PI) - PI).abs() < 1e-9);
        assert!((wrap_to_pi(-3.0 * PI) - PI).abs() < 1e-9);
        assert!((wrap_to_pi(1.5 * PI) + 0.5 * PI).abs() < 1e-9);
        assert!((wrap_to_pi(-1.5 * PI) - 0.5 * PI).abs() < 1e-9);

        // Both boundaries map onto +pi
        assert!((wrap_to_pi(PI) - PI).abs() < 1e-12);
        assert!((wrap_to_pi(-PI) - PI).abs() < 1e-9);
    }
}
