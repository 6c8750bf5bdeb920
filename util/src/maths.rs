//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Clamp the magnitude of a value into `[min, max]`, keeping its sign.
///
/// A value of exactly zero stays zero, so that a zero demand is never turned
/// into a minimum speed demand.
pub fn clamp_magnitude<T>(value: T, min: T, max: T) -> T
where
    T: Float
{
    if value == T::zero() {
        return T::zero()
    }

    value.signum() * value.abs().max(min).min(max)
}

/// Wrap an angle into the range (-pi, pi].
pub fn wrap_pi<T>(angle: T) -> T
where
    T: Float
{
    let pi_t: T = T::from(std::f64::consts::PI).unwrap();
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    // Shift into [0, 2pi) then back down, -pi maps onto +pi
    let wrapped = pi_t - rem_euclid(pi_t - angle, tau_t);

    if wrapped <= -pi_t {
        wrapped + tau_t
    }
    else {
        wrapped
    }
}

/// Get the signed angular distance from `from` to `to`, wrapped into (-pi, pi].
///
/// A positive result means `to` lies anticlockwise of `from`.
pub fn ang_dist<T>(from: T, to: T) -> T
where
    T: Float
{
    wrap_pi(to - from)
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}
