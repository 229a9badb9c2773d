//! Reference-frame calibration and quaternion → Euler conversion.

use crate::types::{EulerAngles, Quaternion};

/// Convert a quaternion to roll/pitch/yaw in radians (ZYX / aerospace order).
///
///   roll  = atan2(2(wx + yz), 1 − 2(x² + y²))
///   pitch = asin(clamp(2(wy − zx), −1, 1))
///   yaw   = atan2(2(wz + xy), 1 − 2(y² + z²))
///
/// The clamp keeps rounding noise at ±90° pitch inside the arcsine domain.
pub fn quaternion_to_euler(q: &Quaternion) -> EulerAngles {
    let Quaternion { w, x, y, z } = *q;
    let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));
    let pitch = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0).asin();
    let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));
    EulerAngles { roll, pitch, yaw }
}

/// The orientation treated as "zero", stored with its precomputed inverse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFrame {
    reference: Quaternion,
    inverse: Quaternion,
    angles: EulerAngles,
}

impl ReferenceFrame {
    pub const IDENTITY: ReferenceFrame = ReferenceFrame {
        reference: Quaternion::IDENTITY,
        inverse: Quaternion::IDENTITY,
        angles: EulerAngles::ZERO,
    };

    /// Capture `reference` as the new zero orientation.
    ///
    /// The inverse is the conjugate of the normalized reference, so any
    /// non-zero scaling of a rotation yields the same frame. A zero or
    /// non-finite reference is conjugated as given. `invert_angles` applies
    /// to the stored reference angles only.
    pub fn new(reference: Quaternion, invert_angles: bool) -> Self {
        let angles = quaternion_to_euler(&reference);
        Self {
            reference,
            inverse: reference.normalized().conjugate(),
            angles: if invert_angles { angles.negated() } else { angles },
        }
    }

    pub fn reference(&self) -> Quaternion {
        self.reference
    }

    pub fn inverse(&self) -> Quaternion {
        self.inverse
    }

    /// Roll/pitch/yaw of the reference itself.
    pub fn angles(&self) -> EulerAngles {
        self.angles
    }

    /// Rotation of `raw` relative to this frame: `inverse * raw`.
    pub fn relative(&self, raw: &Quaternion) -> Quaternion {
        self.inverse * *raw
    }
}

impl Default for ReferenceFrame {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Converts device-frame quaternions into reference-relative Euler angles.
///
/// Not synchronized; `SessionState` wraps it in a single lock so the
/// reference and its inverse are always swapped together.
#[derive(Debug, Clone)]
pub struct OrientationCalibrator {
    invert_angles: bool,
    frame: ReferenceFrame,
    raw: Option<Quaternion>,
    relative: Quaternion,
    angles: EulerAngles,
}

impl OrientationCalibrator {
    /// `invert_angles` is fixed for the calibrator's lifetime (band worn reversed).
    pub fn new(invert_angles: bool) -> Self {
        Self {
            invert_angles,
            frame: ReferenceFrame::IDENTITY,
            raw: None,
            relative: Quaternion::IDENTITY,
            angles: EulerAngles::ZERO,
        }
    }

    pub fn invert_angles(&self) -> bool {
        self.invert_angles
    }

    /// Replace the reference frame with `reference`.
    ///
    /// The latest sample, if any, is re-expressed against the new frame at once.
    pub fn set_reference(&mut self, reference: Quaternion) {
        self.frame = ReferenceFrame::new(reference, self.invert_angles);
        if let Some(raw) = self.raw {
            self.apply(raw);
        }
        log::debug!(
            "Reference set: q=({:.4}, {:.4}, {:.4}, {:.4}) rpy={:?}",
            reference.w,
            reference.x,
            reference.y,
            reference.z,
            self.frame.angles().as_array()
        );
    }

    /// Use the most recent raw sample as the reference.
    pub fn recalibrate(&mut self) {
        self.set_reference(self.raw());
    }

    /// Process a raw sample and return the reference-relative angles.
    pub fn update(&mut self, raw: Quaternion) -> EulerAngles {
        self.raw = Some(raw);
        self.apply(raw);
        self.angles
    }

    fn apply(&mut self, raw: Quaternion) {
        self.relative = self.frame.relative(&raw);
        let angles = quaternion_to_euler(&self.relative);
        self.angles = if self.invert_angles {
            angles.negated()
        } else {
            angles
        };
    }

    /// Latest reference-relative angles.
    pub fn angles(&self) -> EulerAngles {
        self.angles
    }

    /// Angles of the reference frame itself.
    pub fn reference_angles(&self) -> EulerAngles {
        self.frame.angles()
    }

    pub fn frame(&self) -> ReferenceFrame {
        self.frame
    }

    /// Latest raw quaternion, unmodified by the reference; identity before the first sample.
    pub fn raw(&self) -> Quaternion {
        self.raw.unwrap_or(Quaternion::IDENTITY)
    }

    /// Latest reference-relative quaternion.
    pub fn relative(&self) -> Quaternion {
        self.relative
    }
}

impl Default for OrientationCalibrator {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2};

    const TOL: f64 = 1e-5;

    fn assert_angles(actual: EulerAngles, expected: EulerAngles) {
        assert!(
            (actual.roll - expected.roll).abs() < TOL
                && (actual.pitch - expected.pitch).abs() < TOL
                && (actual.yaw - expected.yaw).abs() < TOL,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    fn sample_rotations() -> Vec<Quaternion> {
        vec![
            Quaternion::IDENTITY,
            Quaternion::from_axis_angle([1.0, 0.0, 0.0], 0.7),
            Quaternion::from_axis_angle([0.0, 1.0, 0.0], -1.2),
            Quaternion::from_axis_angle([0.0, 0.0, 1.0], 2.9),
            Quaternion::from_axis_angle([0.48, 0.6, 0.64], 1.9),
            Quaternion::new(-0.994, 0.050, 0.097, -0.041).normalized(),
        ]
    }

    #[test]
    fn test_quaternion_to_euler_identity() {
        assert_angles(quaternion_to_euler(&Quaternion::IDENTITY), EulerAngles::ZERO);
    }

    #[test]
    fn test_quarter_turn_yaw() {
        let mut cal = OrientationCalibrator::new(false);
        let angles = cal.update(Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2));
        assert_angles(angles, EulerAngles::new(0.0, 0.0, FRAC_PI_2));
    }

    #[test]
    fn test_single_axis_rotations() {
        let roll = quaternion_to_euler(&Quaternion::from_axis_angle([1.0, 0.0, 0.0], 0.4));
        assert_angles(roll, EulerAngles::new(0.4, 0.0, 0.0));

        let pitch = quaternion_to_euler(&Quaternion::from_axis_angle([0.0, 1.0, 0.0], -0.3));
        assert_angles(pitch, EulerAngles::new(0.0, -0.3, 0.0));
    }

    #[test]
    fn test_identity_reference_matches_direct_conversion() {
        let mut cal = OrientationCalibrator::new(false);
        for q in sample_rotations() {
            assert_angles(cal.update(q), quaternion_to_euler(&q));
        }
    }

    #[test]
    fn test_calibration_zeroes_output() {
        let mut cal = OrientationCalibrator::new(false);
        for q in sample_rotations() {
            cal.set_reference(q);
            assert_angles(cal.update(q), EulerAngles::ZERO);
        }
    }

    #[test]
    fn test_recalibrate_uses_latest_raw() {
        let mut cal = OrientationCalibrator::new(false);
        let q = Quaternion::from_axis_angle([0.0, 0.0, 1.0], 1.0);
        cal.update(Quaternion::IDENTITY);
        cal.update(q);
        cal.recalibrate();
        assert_eq!(cal.frame().reference(), q);
        assert_angles(cal.update(q), EulerAngles::ZERO);

        // Turning a further 0.5 rad reads as 0.5 rad from the new zero.
        let further = Quaternion::from_axis_angle([0.0, 0.0, 1.0], 1.5);
        assert_angles(cal.update(further), EulerAngles::new(0.0, 0.0, 0.5));
    }

    #[test]
    fn test_recalibrate_before_any_sample_is_identity() {
        let mut cal = OrientationCalibrator::new(true);
        cal.recalibrate();
        assert_eq!(cal.frame(), ReferenceFrame::IDENTITY);
        assert_angles(cal.reference_angles(), EulerAngles::ZERO);
    }

    #[test]
    fn test_pole_safety() {
        // 2(wy - zx) lands just above 1.
        let s = FRAC_1_SQRT_2 * 1.0000001;
        let up = Quaternion::new(s, 0.0, s, 0.0);
        assert!(2.0 * (up.w * up.y - up.z * up.x) > 1.0);

        let mut cal = OrientationCalibrator::new(false);
        let angles = cal.update(up);
        assert!(angles.roll.is_finite() && angles.pitch.is_finite() && angles.yaw.is_finite());
        assert!((angles.pitch - FRAC_PI_2).abs() < 1e-12);

        let down = Quaternion::new(s, 0.0, -s, 0.0);
        let angles = cal.update(down);
        assert!(!angles.pitch.is_nan());
        assert!((angles.pitch + FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_inversion_negates_exactly() {
        let reference = Quaternion::from_axis_angle([0.0, 0.6, 0.8], 0.35);
        let mut plain = OrientationCalibrator::new(false);
        let mut inverted = OrientationCalibrator::new(true);
        plain.set_reference(reference);
        inverted.set_reference(reference);

        assert_eq!(inverted.reference_angles(), plain.reference_angles().negated());
        for q in sample_rotations() {
            assert_eq!(inverted.update(q), plain.update(q).negated());
        }
    }

    #[test]
    fn test_relative_uses_inverse_times_raw() {
        let reference = Quaternion::from_axis_angle([1.0, 0.0, 0.0], 0.9);
        let raw = Quaternion::from_axis_angle([0.0, 0.0, 1.0], 0.6);

        let mut cal = OrientationCalibrator::new(false);
        cal.set_reference(reference);
        cal.update(raw);

        let expected = reference.conjugate() * raw;
        let swapped = raw * reference.conjugate();
        assert!(cal.relative().approx_eq(&expected, 1e-12));
        assert!(!cal.relative().approx_eq(&swapped, 1e-6));
        assert_angles(cal.angles(), quaternion_to_euler(&expected));
    }

    #[test]
    fn test_reference_angles_track_reference() {
        let reference = Quaternion::from_axis_angle([0.0, 0.0, 1.0], -0.8);
        let mut cal = OrientationCalibrator::new(false);
        cal.set_reference(reference);
        assert_angles(cal.reference_angles(), EulerAngles::new(0.0, 0.0, -0.8));
        assert_eq!(cal.raw(), Quaternion::IDENTITY);
    }

    #[test]
    fn test_non_unit_reference_is_normalized() {
        // (2, 0, 0, 0) is the identity rotation scaled by two.
        let mut cal = OrientationCalibrator::new(false);
        cal.set_reference(Quaternion::new(2.0, 0.0, 0.0, 0.0));
        assert!(cal.frame().inverse().approx_eq(&Quaternion::IDENTITY, 1e-12));
        let yaw90 = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        assert_angles(cal.update(yaw90), EulerAngles::new(0.0, 0.0, FRAC_PI_2));

        let q = Quaternion::new(2.0, 0.0, 0.0, 2.0);
        cal.set_reference(q);
        assert_angles(cal.update(q), EulerAngles::ZERO);
        let further = Quaternion::from_axis_angle([0.0, 0.0, 1.0], FRAC_PI_2 + 0.3);
        assert_angles(cal.update(further), EulerAngles::new(0.0, 0.0, 0.3));
    }

    #[test]
    fn test_new_reference_applies_to_latest_sample() {
        let yaw90 = Quaternion::from_axis_angle([0.0, 0.0, 1.0], FRAC_PI_2);
        let mut cal = OrientationCalibrator::new(false);
        cal.update(yaw90);
        assert_angles(cal.angles(), EulerAngles::new(0.0, 0.0, FRAC_PI_2));

        cal.set_reference(yaw90);
        assert_angles(cal.angles(), EulerAngles::ZERO);
        assert!(cal.relative().approx_eq(&Quaternion::IDENTITY, 1e-12));

        cal.set_reference(Quaternion::from_axis_angle([0.0, 0.0, 1.0], 0.5));
        assert_angles(cal.angles(), EulerAngles::new(0.0, 0.0, FRAC_PI_2 - 0.5));
    }

    #[test]
    fn test_reference_before_any_sample_keeps_zero_output() {
        let mut cal = OrientationCalibrator::new(false);
        cal.set_reference(Quaternion::from_axis_angle([1.0, 0.0, 0.0], 0.4));
        assert_eq!(cal.angles(), EulerAngles::ZERO);
    }

    #[test]
    fn test_zero_reference_stays_finite() {
        let mut cal = OrientationCalibrator::new(false);
        cal.set_reference(Quaternion::new(0.0, 0.0, 0.0, 0.0));
        let angles = cal.update(Quaternion::from_axis_angle([0.0, 1.0, 0.0], 0.5));
        assert!(angles.roll.is_finite() && angles.pitch.is_finite() && angles.yaw.is_finite());
    }
}
