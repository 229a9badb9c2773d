use std::ops::Mul;

/// Rotation quaternion `(w, x, y, z)`.
///
/// Unit norm is a convention of the producer, not enforced here.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    pub const fn identity() -> Self {
        Self::IDENTITY
    }

    /// Rotation of `angle` radians about a unit `axis`.
    pub fn from_axis_angle(axis: [f64; 3], angle: f64) -> Self {
        let (s, c) = (angle / 2.0).sin_cos();
        Self::new(c, axis[0] * s, axis[1] * s, axis[2] * s)
    }

    /// Negates the vector part. Equals the inverse only for unit quaternions.
    pub fn conjugate(&self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    pub fn norm_squared(&self) -> f64 {
        self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn norm(&self) -> f64 {
        self.norm_squared().sqrt()
    }

    /// Unit quaternion in the same direction; the zero quaternion is returned unchanged.
    pub fn normalized(&self) -> Self {
        let n = self.norm();
        if n <= f64::EPSILON || !n.is_finite() {
            return *self;
        }
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// Multiplicative inverse, `conjugate / |q|²`.
    ///
    /// Degenerate (zero or non-finite norm) input falls back to the plain conjugate.
    pub fn inverse(&self) -> Self {
        let n2 = self.norm_squared();
        let c = self.conjugate();
        if n2 <= f64::EPSILON || !n2.is_finite() {
            return c;
        }
        Self::new(c.w / n2, c.x / n2, c.y / n2, c.z / n2)
    }

    pub fn is_finite(&self) -> bool {
        self.w.is_finite() && self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Component-wise comparison within `tolerance`.
    pub fn approx_eq(&self, other: &Quaternion, tolerance: f64) -> bool {
        (self.w - other.w).abs() <= tolerance
            && (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.z - other.z).abs() <= tolerance
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Hamilton product. `a * b` applies `b` first, then `a`.
impl Mul for Quaternion {
    type Output = Quaternion;

    fn mul(self, rhs: Quaternion) -> Quaternion {
        let (a, b) = (self, rhs);
        Quaternion {
            w: a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
            x: a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            y: a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            z: a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
        }
    }
}

/// Roll, pitch and yaw (ZYX / aerospace order), in radians unless converted.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl EulerAngles {
    pub const ZERO: EulerAngles = EulerAngles {
        roll: 0.0,
        pitch: 0.0,
        yaw: 0.0,
    };

    pub const fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }

    pub fn negated(&self) -> Self {
        Self::new(-self.roll, -self.pitch, -self.yaw)
    }

    pub fn to_degrees(&self) -> Self {
        Self::new(
            self.roll.to_degrees(),
            self.pitch.to_degrees(),
            self.yaw.to_degrees(),
        )
    }

    /// `[roll, pitch, yaw]`.
    pub fn as_array(&self) -> [f64; 3] {
        [self.roll, self.pitch, self.yaw]
    }
}

/// Raw orientation sample delivered by the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationSample {
    /// Device timestamp in microseconds.
    pub timestamp_us: u64,
    pub quaternion: Quaternion,
}

/// Which arm the band is worn on. Integer codes are part of the C ABI.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Arm {
    Left = 0,
    Right = 1,
    #[default]
    Unknown = 2,
}

impl Arm {
    pub fn from_code(code: i32) -> Arm {
        match code {
            0 => Arm::Left,
            1 => Arm::Right,
            _ => Arm::Unknown,
        }
    }
}

/// Direction of the band's +x axis along the arm.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XDirection {
    TowardWrist = 0,
    TowardElbow = 1,
    #[default]
    Unknown = 2,
}

impl XDirection {
    pub fn from_code(code: i32) -> XDirection {
        match code {
            0 => XDirection::TowardWrist,
            1 => XDirection::TowardElbow,
            _ => XDirection::Unknown,
        }
    }
}

/// Muscle warm-up state reported on arm sync.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WarmupState {
    #[default]
    Unknown = 0,
    Cold = 1,
    Warm = 2,
}

impl WarmupState {
    pub fn from_code(code: i32) -> WarmupState {
        match code {
            1 => WarmupState::Cold,
            2 => WarmupState::Warm,
            _ => WarmupState::Unknown,
        }
    }
}

/// Hand pose classified by the device.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pose {
    Rest = 0,
    Fist = 1,
    WaveIn = 2,
    WaveOut = 3,
    FingersSpread = 4,
    DoubleTap = 5,
    #[default]
    Unknown = 0xffff,
}

impl Pose {
    pub fn from_code(code: i32) -> Pose {
        match code {
            0 => Pose::Rest,
            1 => Pose::Fist,
            2 => Pose::WaveIn,
            3 => Pose::WaveOut,
            4 => Pose::FingersSpread,
            5 => Pose::DoubleTap,
            _ => Pose::Unknown,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

/// How long an unlock lasts.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnlockType {
    /// Re-locks after a short device-defined timeout.
    Timed = 0,
    /// Stays unlocked until an explicit lock.
    #[default]
    Hold = 1,
}

/// Identification reported when a device pairs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    pub name: String,
    pub firmware_version: String,
}

bitflags::bitflags! {
    /// Session status bitmap, also returned through the C ABI.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(C)]
    pub struct StatusFlags: u32 {
        const PAIRED    = 1 << 0;
        const CONNECTED = 1 << 1;
        /// A device handle is available for lock/unlock commands.
        const ATTACHED  = 1 << 2;
        const ON_ARM    = 1 << 3;
        const UNLOCKED  = 1 << 4;
    }
}

impl Default for StatusFlags {
    fn default() -> Self {
        StatusFlags::empty()
    }
}
