//! Mahony attitude and heading reference filter
//!
//! A nonlinear complementary filter: gyroscope rates are integrated into the
//! orientation quaternion, and the cross product between measured and
//! predicted gravity (and magnetic field) directions feeds back through a
//! proportional-integral controller to cancel gyro drift.

use core::time::Duration;

use nalgebra::{Quaternion, Vector3};

/// Default filter update rate
pub const DEFAULT_SAMPLE_FREQUENCY_HZ: f32 = 512.0;

const RAD_TO_DEG: f32 = 57.295_78;

/// Feedback gains
///
/// Both gains are stored doubled, as they appear in the update equations.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MahonyParams {
    /// 2 × proportional gain
    pub two_kp: f32,
    /// 2 × integral gain; zero disables the integral term
    pub two_ki: f32,
}

impl Default for MahonyParams {
    fn default() -> Self {
        Self {
            two_kp: 2.0 * 0.5,
            two_ki: 2.0 * 0.0,
        }
    }
}

/// What an update did with its inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateOutcome {
    /// Corrected against gravity and the magnetic field
    Full,
    /// Corrected against gravity only
    GravityOnly,
    /// Inputs were degenerate; the state is unchanged
    Skipped,
}

/// Roll, pitch and yaw
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EulerAngles {
    /// Rotation about X
    pub roll: f32,
    /// Rotation about Y
    pub pitch: f32,
    /// Rotation about Z
    pub yaw: f32,
}

impl EulerAngles {
    /// Convert from radians to degrees
    #[must_use]
    pub fn to_degrees(self) -> Self {
        Self {
            roll: self.roll * RAD_TO_DEG,
            pitch: self.pitch * RAD_TO_DEG,
            yaw: self.yaw * RAD_TO_DEG,
        }
    }
}

/// Mahony filter state
#[derive(Debug, Clone)]
pub struct Mahony {
    sample_period: f32,
    params: MahonyParams,
    quaternion: Quaternion<f32>,
    integral: Vector3<f32>,
}

impl Default for Mahony {
    fn default() -> Self {
        Self::new(
            Duration::from_secs_f32(1.0 / DEFAULT_SAMPLE_FREQUENCY_HZ),
            MahonyParams::default(),
        )
    }
}

impl Mahony {
    /// Create a filter at the identity orientation
    #[must_use]
    pub fn new(sample_period: Duration, params: MahonyParams) -> Self {
        Self {
            sample_period: sample_period.as_secs_f32(),
            params,
            quaternion: Quaternion::identity(),
            integral: Vector3::zeros(),
        }
    }

    /// Nominal period used by [`update`](Self::update) and [`update_imu`](Self::update_imu)
    #[must_use]
    pub fn sample_period(&self) -> f32 {
        self.sample_period
    }

    /// Feedback gains
    #[must_use]
    pub fn params(&self) -> MahonyParams {
        self.params
    }

    /// Current orientation (w, i, j, k)
    #[must_use]
    pub fn quaternion(&self) -> Quaternion<f32> {
        self.quaternion
    }

    /// Accumulated integral feedback
    #[must_use]
    pub fn integral_feedback(&self) -> Vector3<f32> {
        self.integral
    }

    /// Replace the orientation and clear the integral term
    ///
    /// The quaternion is normalized; a zero quaternion resets to identity.
    pub fn set_orientation(&mut self, quaternion: Quaternion<f32>) {
        self.quaternion = quaternion
            .coords
            .try_normalize(f32::EPSILON)
            .map_or_else(Quaternion::identity, Quaternion::from);
        self.integral = Vector3::zeros();
    }

    /// Return to the identity orientation with no integral feedback
    pub fn reset(&mut self) {
        self.set_orientation(Quaternion::identity());
    }

    /// Fuse one gyro (rad/s), accelerometer and magnetometer sample at the nominal period
    ///
    /// A zero accelerometer vector skips the update. A zero magnetometer
    /// vector falls back to the gravity-only correction.
    pub fn update(
        &mut self,
        gyro: Vector3<f32>,
        accel: Vector3<f32>,
        mag: Vector3<f32>,
    ) -> UpdateOutcome {
        self.update_with_dt(gyro, accel, mag, self.sample_period)
    }

    /// Same as [`update`](Self::update) with an explicit period in seconds
    pub fn update_with_dt(
        &mut self,
        gyro: Vector3<f32>,
        accel: Vector3<f32>,
        mag: Vector3<f32>,
        dt: f32,
    ) -> UpdateOutcome {
        let Some(mag) = mag.try_normalize(f32::EPSILON) else {
            return self.update_imu_with_dt(gyro, accel, dt);
        };
        let Some(accel) = accel.try_normalize(f32::EPSILON) else {
            return self.skip();
        };
        if !(dt.is_finite() && dt > 0.0) {
            return self.skip();
        }

        let q = self.quaternion;
        let (q0, q1, q2, q3) = (q.w, q.i, q.j, q.k);
        let q0q1 = q0 * q1;
        let q0q2 = q0 * q2;
        let q0q3 = q0 * q3;
        let q1q1 = q1 * q1;
        let q1q2 = q1 * q2;
        let q1q3 = q1 * q3;
        let q2q2 = q2 * q2;
        let q2q3 = q2 * q3;
        let q3q3 = q3 * q3;

        // Earth-frame field, flattened onto the x-z plane
        let hx = 2.0
            * (mag.x * (0.5 - q2q2 - q3q3) + mag.y * (q1q2 - q0q3) + mag.z * (q1q3 + q0q2));
        let hy = 2.0
            * (mag.x * (q1q2 + q0q3) + mag.y * (0.5 - q1q1 - q3q3) + mag.z * (q2q3 - q0q1));
        let bx = libm::sqrtf(hx * hx + hy * hy);
        let bz = 2.0
            * (mag.x * (q1q3 - q0q2) + mag.y * (q2q3 + q0q1) + mag.z * (0.5 - q1q1 - q2q2));

        let half_v = Self::half_gravity(q);
        let half_w = Vector3::new(
            bx * (0.5 - q2q2 - q3q3) + bz * (q1q3 - q0q2),
            bx * (q1q2 - q0q3) + bz * (q0q1 + q2q3),
            bx * (q0q2 + q1q3) + bz * (0.5 - q1q1 - q2q2),
        );

        let half_e = accel.cross(&half_v) + mag.cross(&half_w);
        self.feedback_and_integrate(gyro, half_e, dt);
        UpdateOutcome::Full
    }

    /// Fuse one gyro (rad/s) and accelerometer sample at the nominal period
    ///
    /// Yaw is not observable in this mode.
    pub fn update_imu(&mut self, gyro: Vector3<f32>, accel: Vector3<f32>) -> UpdateOutcome {
        self.update_imu_with_dt(gyro, accel, self.sample_period)
    }

    /// Same as [`update_imu`](Self::update_imu) with an explicit period in seconds
    pub fn update_imu_with_dt(
        &mut self,
        gyro: Vector3<f32>,
        accel: Vector3<f32>,
        dt: f32,
    ) -> UpdateOutcome {
        let Some(accel) = accel.try_normalize(f32::EPSILON) else {
            return self.skip();
        };
        if !(dt.is_finite() && dt > 0.0) {
            return self.skip();
        }

        let half_e = accel.cross(&Self::half_gravity(self.quaternion));
        self.feedback_and_integrate(gyro, half_e, dt);
        UpdateOutcome::GravityOnly
    }

    /// Half the predicted gravity direction in the body frame
    fn half_gravity(q: Quaternion<f32>) -> Vector3<f32> {
        Vector3::new(
            q.i * q.k - q.w * q.j,
            q.w * q.i + q.j * q.k,
            q.w * q.w - 0.5 + q.k * q.k,
        )
    }

    fn skip(&self) -> UpdateOutcome {
        #[cfg(feature = "defmt")]
        defmt::trace!("Mahony update skipped: degenerate input");
        UpdateOutcome::Skipped
    }

    fn feedback_and_integrate(&mut self, gyro: Vector3<f32>, half_e: Vector3<f32>, dt: f32) {
        let mut rate = gyro;

        if self.params.two_ki > 0.0 {
            self.integral += half_e * (self.params.two_ki * dt);
            rate += self.integral;
        } else {
            self.integral = Vector3::zeros();
        }
        rate += half_e * self.params.two_kp;

        let q = self.quaternion;
        let q_dot = q * Quaternion::from_parts(0.0, rate) * 0.5;
        let next = q + q_dot * dt;

        // Renormalize every step; keep the previous state if the result collapsed
        let norm = next.norm();
        if norm > f32::EPSILON && norm.is_finite() {
            self.quaternion = next / norm;
        }
    }

    /// Orientation as roll, pitch and yaw in radians
    #[must_use]
    pub fn euler_angles(&self) -> EulerAngles {
        let q = self.quaternion;
        let (q0, q1, q2, q3) = (q.w, q.i, q.j, q.k);
        let sin_pitch = (-2.0 * (q1 * q3 - q0 * q2)).clamp(-1.0, 1.0);
        EulerAngles {
            roll: libm::atan2f(q0 * q1 + q2 * q3, 0.5 - q1 * q1 - q2 * q2),
            pitch: libm::asinf(sin_pitch),
            yaw: libm::atan2f(q1 * q2 + q0 * q3, 0.5 - q2 * q2 - q3 * q3),
        }
    }

    /// Orientation as roll, pitch and yaw in degrees
    #[must_use]
    pub fn euler_angles_degrees(&self) -> EulerAngles {
        self.euler_angles().to_degrees()
    }

    /// Roll in degrees
    #[must_use]
    pub fn roll(&self) -> f32 {
        self.euler_angles_degrees().roll
    }

    /// Pitch in degrees
    #[must_use]
    pub fn pitch(&self) -> f32 {
        self.euler_angles_degrees().pitch
    }

    /// Yaw in degrees
    #[must_use]
    pub fn yaw(&self) -> f32 {
        self.euler_angles_degrees().yaw
    }
}
