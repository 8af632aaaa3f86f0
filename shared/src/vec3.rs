/// Plain 3D coordinate used for collectible placement.
///
/// Collectibles are matched by exact coordinate equality, so layouts only use
/// whole-number components (these survive a JSON round trip unchanged).
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize, PartialEq, ts_rs::TS)]
#[ts(export, export_to = "../../client/generated/")]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Last reported skier pose: location plus heading around the vertical axis.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize, PartialEq, ts_rs::TS)]
#[ts(export, export_to = "../../client/generated/")]
#[serde(rename_all = "camelCase")]
pub struct PlayerPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Heading in radians
    pub rotation_y: f64,
}

impl PlayerPosition {
    pub fn new(x: f64, y: f64, z: f64, rotation_y: f64) -> Self {
        Self {
            x,
            y,
            z,
            rotation_y,
        }
    }
}
