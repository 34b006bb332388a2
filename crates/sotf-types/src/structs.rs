//! Value types carried inside action records.

use serde::{Deserialize, Serialize};

/// A position or scale in world space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// X coordinate (board column axis).
    pub x: f64,
    /// Y coordinate (stacking height).
    pub y: f64,
    /// Z coordinate (board row axis).
    pub z: f64,
}

impl Vec3 {
    /// Create a vector from its components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// A vector with every component set to `v`.
    pub const fn splat(v: f64) -> Self {
        Self { x: v, y: v, z: v }
    }

    /// Euclidean distance between two points.
    pub fn distance(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dz.mul_add(dz, dx.mul_add(dx, dy * dy)).sqrt()
    }
}

/// Axis-angle rotation: `(x, y, z)` is the axis, `w` the angle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    /// Axis X component.
    pub x: f64,
    /// Axis Y component.
    pub y: f64,
    /// Axis Z component.
    pub z: f64,
    /// Angle in radians.
    pub w: f64,
}

/// An RGB colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red.
    pub r: f64,
    /// Green.
    pub g: f64,
    /// Blue.
    pub b: f64,
}

impl Color {
    /// Create a colour from its components.
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }
}

/// A structured account handed out by the (external) accounts service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Display name; this is what other participants address the account by.
    pub name: String,
    /// Numeric account id, if the service assigned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

/// Who a controller belongs to: a bare name or a structured account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identity {
    /// A plain name, used for automated controllers and guests.
    Name(String),
    /// An account from the accounts service.
    Account(Account),
}

impl Identity {
    /// The name other participants resolve this identity by.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Account(account) => &account.name,
        }
    }

    /// Whether `name` refers to this identity.
    pub fn matches(&self, name: &str) -> bool {
        self.display_name() == name
    }
}

impl From<&str> for Identity {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for Identity {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl core::fmt::Display for Identity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.display_name())
    }
}
