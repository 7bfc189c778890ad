use serde::Serialize;

use crate::models::{CameraParameters, LightingParameters};

// Scale factors for the on-screen schematic. Distances are meters mapped to
// layout pixels; the light sits on its own fixed ring so it stays visually
// distinct from the camera orbit at any subject distance.
pub const MIN_CAMERA_RADIUS: f64 = 50.0;
pub const DISTANCE_SCALE: f64 = 30.0;
pub const LIGHT_RADIUS: f64 = 220.0;

// 50mm reads as scale 1; 16mm roughly 3x wide, 200mm a quarter.
pub const REFERENCE_FOCAL: f64 = 50.0;
pub const CONE_SCALE: f64 = 40.0;
pub const MIN_CONE_HALF_WIDTH: f64 = 10.0;
pub const MAX_CONE_HALF_WIDTH: f64 = 150.0;

pub const REFERENCE_INTENSITY: f64 = 50.0;
pub const RAY_LENGTH: f64 = 300.0;

const MIN_FOCAL: f64 = 12.0;
const MAX_FOCAL: f64 = 200.0;

/// Camera marker on the schematic: polar placement plus the field-of-view
/// cone drawn toward the subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraMarker {
    pub radius: f64,
    pub azimuth: f64,
    pub elevation: f64,
    pub roll: f64,
    pub cone_half_width: f64,
}

/// Light marker: fixed-ring placement plus the ray drawn toward the subject,
/// scaled by intensity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LightMarker {
    pub radius: f64,
    pub direction: f64,
    pub elevation: f64,
    pub ray_length: f64,
    pub ray_scale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schematic {
    pub camera: CameraMarker,
    pub light: LightMarker,
    /// Position along the wide-to-tele bar, 0.0 at 12mm and 1.0 at 200mm.
    pub focal_position: f64,
}

/// Projects polar camera and light parameters into the 2D schematic layout.
/// Pure and deterministic: the same input always yields the same schematic.
pub fn project(camera: &CameraParameters, lighting: &LightingParameters) -> Schematic {
    let camera_radius = (camera.distance * DISTANCE_SCALE).max(MIN_CAMERA_RADIUS);

    // Wide lenses widen the cone, telephoto narrows it, inversely
    // proportional to focal length and clamped so the extremes stay drawable.
    let cone_half_width = ((REFERENCE_FOCAL / camera.focal_length) * CONE_SCALE)
        .clamp(MIN_CONE_HALF_WIDTH, MAX_CONE_HALF_WIDTH);

    let focal_position = (camera.focal_length - MIN_FOCAL) / (MAX_FOCAL - MIN_FOCAL);

    Schematic {
        camera: CameraMarker {
            radius: camera_radius,
            azimuth: camera.azimuth,
            elevation: camera.elevation,
            roll: camera.roll,
            cone_half_width,
        },
        light: LightMarker {
            radius: LIGHT_RADIUS,
            direction: lighting.direction,
            elevation: lighting.elevation,
            ray_length: RAY_LENGTH,
            ray_scale: lighting.intensity / REFERENCE_INTENSITY,
        },
        focal_position,
    }
}
