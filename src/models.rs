use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::vocab;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraParameters {
    pub azimuth: f64,
    pub elevation: f64,
    pub distance: f64,
    pub focal_length: f64,
    pub roll: f64,
    pub aperture: String,
    pub shutter_angle: String,
    pub iso: u32,
    pub sensor_format: String,
}

impl Default for CameraParameters {
    fn default() -> Self {
        Self {
            azimuth: 45.0,
            elevation: 15.0,
            distance: 4.0,
            focal_length: 50.0,
            roll: 0.0,
            aperture: "f/2.8".into(),
            shutter_angle: "180° (Standard)".into(),
            iso: 800,
            sensor_format: "Super 35".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightingParameters {
    pub direction: f64,
    pub elevation: f64,
    pub intensity: f64,
    pub temperature: String,
    #[serde(rename = "type")]
    pub light_type: String,
}

impl Default for LightingParameters {
    fn default() -> Self {
        Self {
            direction: 45.0,
            elevation: 45.0,
            intensity: 80.0,
            temperature: "Neutral (5600K)".into(),
            light_type: "Softbox / Diffused".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDescription {
    /// Authoritative character identity, kept stable across regenerations.
    pub character_description: String,
    pub character_action: String,
    pub clothing_and_props: String,
    pub environment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtDirectionSelection {
    pub theme: Vec<String>,
    pub composition: Vec<String>,
    pub artist_style: Vec<String>,
    pub color_grade: Vec<String>,
    pub atmosphere: Vec<String>,
    pub custom_atmosphere: String,
    pub character_count: String,
    pub character_arrangement: String,
}

impl Default for ArtDirectionSelection {
    fn default() -> Self {
        Self {
            theme: Vec::new(),
            composition: Vec::new(),
            artist_style: Vec::new(),
            color_grade: Vec::new(),
            atmosphere: Vec::new(),
            custom_atmosphere: String::new(),
            character_count: "1".into(),
            character_arrangement: vocab::default_arrangement("1").into(),
        }
    }
}

// Merge-patch bodies. Only present fields are applied; the same shapes carry
// the reconstructed parameters coming back from image analysis.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraPatch {
    pub azimuth: Option<f64>,
    pub elevation: Option<f64>,
    pub distance: Option<f64>,
    pub focal_length: Option<f64>,
    pub roll: Option<f64>,
    pub aperture: Option<String>,
    pub shutter_angle: Option<String>,
    pub iso: Option<u32>,
    pub sensor_format: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LightingPatch {
    pub direction: Option<f64>,
    pub elevation: Option<f64>,
    pub intensity: Option<f64>,
    pub temperature: Option<String>,
    #[serde(rename = "type")]
    pub light_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScenePatch {
    pub character_description: Option<String>,
    pub character_action: Option<String>,
    pub clothing_and_props: Option<String>,
    pub environment: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptionsPatch {
    pub theme: Option<Vec<String>>,
    pub composition: Option<Vec<String>>,
    pub artist_style: Option<Vec<String>>,
    pub color_grade: Option<Vec<String>>,
    pub atmosphere: Option<Vec<String>>,
    pub custom_atmosphere: Option<String>,
    pub character_count: Option<String>,
    pub character_arrangement: Option<String>,
}

/// Parameters the model inferred from a reference image, shaped like the
/// editable aggregates so they merge through the same paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconstructedParameters {
    pub camera: CameraPatch,
    pub lighting: LightingPatch,
    pub scene: ScenePatch,
    pub options: ReconstructedOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconstructedOptions {
    pub character_count: Option<String>,
    pub character_arrangement: Option<String>,
    pub themes: Vec<String>,
    pub compositions: Vec<String>,
    pub styles: Vec<String>,
    pub colors: Vec<String>,
    pub atmospheres: Vec<String>,
}

// The structured prompt is the durable output contract: fixed top-level keys
// camera/subject/lighting/artDirection/elements. Consumers should depend on
// this shape, not on the free-text visual description.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredPrompt {
    pub camera: PromptCamera,
    pub subject: PromptSubject,
    pub lighting: PromptLighting,
    pub art_direction: PromptArtDirection,
    pub elements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptCamera {
    #[serde(rename = "type")]
    pub camera_type: String,
    pub lens: String,
    pub settings: PromptCameraSettings,
    pub position: Position3,
    pub rotation: CameraRotation,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptCameraSettings {
    pub aperture: String,
    pub shutter: String,
    pub iso: String,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRotation {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSubject {
    pub count: String,
    pub arrangement: String,
    pub visuals: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptLighting {
    pub setup: String,
    pub position: LightPosition,
    pub parameters: LightParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightPosition {
    pub azimuth: f64,
    pub elevation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightParameters {
    pub intensity: String,
    pub temperature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptArtDirection {
    pub theme: String,
    pub style: String,
    pub palette: String,
}

/// One generation or analysis result. Each successful call replaces the
/// previous result; uploading a new reference image clears it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedResult {
    pub json: StructuredPrompt,
    pub visual_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconstructed_params: Option<ReconstructedParameters>,
    #[serde(default = "Utc::now")]
    pub generated_at: DateTime<Utc>,
}

// Request bodies for the non-patch endpoints.

#[derive(Debug, Deserialize)]
pub struct PresetRequest {
    pub preset: String,
}

#[derive(Debug, Deserialize)]
pub struct CharacterCountRequest {
    pub count: String,
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: crate::workflow::WorkflowMode,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    /// Base64-encoded raster image.
    pub data: String,
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionRequest {
    pub text: String,
}
