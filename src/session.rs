use bytes::Bytes;
use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    ArtDirectionSelection, CameraParameters, CameraPatch, GeneratedResult, LightingParameters,
    LightingPatch, OptionsPatch, ReconstructedParameters, SceneDescription, ScenePatch,
};
use crate::vocab;
use crate::workflow::Workflow;

#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub data: Bytes,
    pub context: String,
}

/// All state for one authoring session. Mutated only through the methods
/// below so the range and vocabulary invariants hold at every step.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub camera: CameraParameters,
    pub lighting: LightingParameters,
    pub scene: SceneDescription,
    pub options: ArtDirectionSelection,
    pub workflow: Workflow,
    pub reference_image: Option<ReferenceImage>,
    pub result: Option<GeneratedResult>,
    pub atmosphere_suggestions: Vec<String>,
    suggestion_seq: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            camera: CameraParameters::default(),
            lighting: LightingParameters::default(),
            scene: SceneDescription::default(),
            options: ArtDirectionSelection::default(),
            workflow: Workflow::default(),
            reference_image: None,
            result: None,
            atmosphere_suggestions: Vec::new(),
            suggestion_seq: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Merge-patch the camera rig. Enumerated tokens are validated before
    /// anything is written, numeric fields are clamped into their ranges.
    pub fn patch_camera(&mut self, patch: &CameraPatch) -> Result<(), AppError> {
        validate_camera_tokens(patch)?;
        apply_camera_patch(&mut self.camera, patch);
        self.touch();
        Ok(())
    }

    pub fn patch_lighting(&mut self, patch: &LightingPatch) -> Result<(), AppError> {
        validate_lighting_tokens(patch)?;
        apply_lighting_patch(&mut self.lighting, patch);
        self.touch();
        Ok(())
    }

    pub fn patch_scene(&mut self, patch: &ScenePatch) {
        apply_scene_patch(&mut self.scene, patch);
        self.touch();
    }

    pub fn patch_options(&mut self, patch: &OptionsPatch) -> Result<(), AppError> {
        let theme = validated_tokens(patch.theme.as_deref(), vocab::THEMES, "theme")?;
        let composition =
            validated_tokens(patch.composition.as_deref(), vocab::COMPOSITIONS, "composition")?;
        let artist_style =
            validated_tokens(patch.artist_style.as_deref(), vocab::ARTIST_STYLES, "artistStyle")?;
        let color_grade =
            validated_tokens(patch.color_grade.as_deref(), vocab::COLOR_GRADES, "colorGrade")?;
        let atmosphere =
            validated_tokens(patch.atmosphere.as_deref(), vocab::ATMOSPHERES, "atmosphere")?;

        // Count and arrangement are coupled: a count change resets the
        // arrangement unless the same patch names a valid one.
        let count = match &patch.character_count {
            Some(count) => {
                require_member(vocab::CHARACTER_COUNTS, count, "characterCount")?;
                Some(count.clone())
            }
            None => None,
        };
        let effective_count = count.as_deref().unwrap_or(&self.options.character_count);
        let arrangement = match &patch.character_arrangement {
            Some(arrangement) => {
                require_member(
                    vocab::arrangements_for(effective_count),
                    arrangement,
                    "characterArrangement",
                )?;
                Some(arrangement.clone())
            }
            None => count.as_deref().map(|c| vocab::default_arrangement(c).to_string()),
        };

        if let Some(theme) = theme {
            self.options.theme = theme;
        }
        if let Some(composition) = composition {
            self.options.composition = composition;
        }
        if let Some(artist_style) = artist_style {
            self.options.artist_style = artist_style;
        }
        if let Some(color_grade) = color_grade {
            self.options.color_grade = color_grade;
        }
        if let Some(atmosphere) = atmosphere {
            self.options.atmosphere = atmosphere;
        }
        if let Some(custom) = &patch.custom_atmosphere {
            self.options.custom_atmosphere = custom.clone();
        }
        if let Some(count) = count {
            self.options.character_count = count;
        }
        if let Some(arrangement) = arrangement {
            self.options.character_arrangement = arrangement;
        }
        self.touch();
        Ok(())
    }

    /// Sets the character count and resets the arrangement to the first
    /// entry of that count's vocabulary. Derived state, not a free choice.
    pub fn set_character_count(&mut self, count: &str) -> Result<(), AppError> {
        require_member(vocab::CHARACTER_COUNTS, count, "characterCount")?;
        self.options.character_count = count.to_string();
        self.options.character_arrangement = vocab::default_arrangement(count).to_string();
        self.touch();
        Ok(())
    }

    /// Overwrites the orbital and lens fields from a named preset. Roll and
    /// everything outside the camera stay as they are.
    pub fn apply_preset(&mut self, preset_id: &str) -> Result<(), AppError> {
        let preset = vocab::camera_preset(preset_id)
            .ok_or_else(|| AppError::Validation(format!("unknown camera preset '{preset_id}'")))?;
        self.camera.azimuth = preset.azimuth;
        self.camera.elevation = preset.elevation;
        self.camera.distance = preset.distance;
        self.camera.focal_length = preset.focal_length;
        self.camera.aperture = preset.aperture.to_string();
        self.camera.shutter_angle = preset.shutter_angle.to_string();
        self.camera.iso = preset.iso;
        self.camera.sensor_format = preset.sensor_format.to_string();
        self.touch();
        Ok(())
    }

    /// Rolls a new orbital position and lens. Roll usually stays neutral;
    /// a pronounced dutch angle is a rare draw, not the norm.
    pub fn randomize_camera(&mut self, rng: &mut impl Rng) {
        self.camera.azimuth = rng.gen_range(0..360) as f64;
        self.camera.elevation = (rng.gen_range(0..90) - 30) as f64;
        self.camera.distance = 1.0 + rng.gen::<f64>() * 6.0;
        self.camera.focal_length =
            vocab::RANDOM_FOCAL_LENGTHS[rng.gen_range(0..vocab::RANDOM_FOCAL_LENGTHS.len())];
        self.camera.roll = if rng.gen::<f64>() > 0.8 {
            rng.gen_range(-10..10) as f64
        } else {
            0.0
        };
        self.touch();
    }

    pub fn randomize_lighting(&mut self, rng: &mut impl Rng) {
        self.lighting.direction = rng.gen_range(0..360) as f64;
        self.lighting.elevation = rng.gen_range(10..90) as f64;
        self.lighting.intensity = (50 + rng.gen_range(0..50)) as f64;
        self.lighting.temperature =
            vocab::LIGHTING_TEMPS[rng.gen_range(0..vocab::LIGHTING_TEMPS.len())].to_string();
        self.lighting.light_type =
            vocab::LIGHTING_TYPES[rng.gen_range(0..vocab::LIGHTING_TYPES.len())].to_string();
        self.touch();
    }

    /// Stores a new reference image for reverse engineering. Clears the
    /// previous result; the old analysis no longer describes this image.
    pub fn upload_image(&mut self, data: Bytes, context: String) -> Result<(), AppError> {
        self.workflow.image_uploaded()?;
        self.reference_image = Some(ReferenceImage { data, context });
        self.result = None;
        self.touch();
        Ok(())
    }

    /// Folds analysis output back into the editable state. An analysis is a
    /// fresh assessment: the art-direction token lists are replaced, not
    /// merged. Out-of-vocabulary tokens from the model are dropped rather
    /// than failing the whole analysis; numerics are clamped like any other
    /// write.
    pub fn merge_reconstructed(&mut self, payload: &ReconstructedParameters) {
        apply_camera_patch_lenient(&mut self.camera, &payload.camera);
        apply_lighting_patch_lenient(&mut self.lighting, &payload.lighting);
        apply_scene_patch(&mut self.scene, &payload.scene);

        let opts = &payload.options;
        self.options.theme = filter_tokens(&opts.themes, vocab::THEMES);
        self.options.composition = filter_tokens(&opts.compositions, vocab::COMPOSITIONS);
        self.options.artist_style = filter_tokens(&opts.styles, vocab::ARTIST_STYLES);
        self.options.color_grade = filter_tokens(&opts.colors, vocab::COLOR_GRADES);
        self.options.atmosphere = filter_tokens(&opts.atmospheres, vocab::ATMOSPHERES);

        if let Some(count) = &opts.character_count {
            if vocab::is_member(vocab::CHARACTER_COUNTS, count) {
                self.options.character_count = count.clone();
            }
        }
        let count = self.options.character_count.clone();
        let table = vocab::arrangements_for(&count);
        self.options.character_arrangement = match &opts.character_arrangement {
            Some(arr) if vocab::is_member(table, arr) => arr.clone(),
            _ if vocab::is_member(table, &self.options.character_arrangement) => {
                self.options.character_arrangement.clone()
            }
            _ => vocab::default_arrangement(&count).to_string(),
        };
        self.touch();
    }

    /// Claims a fresh suggestion generation. Later generations supersede
    /// earlier ones: last input wins, not first response.
    pub fn next_suggestion_seq(&mut self) -> u64 {
        self.suggestion_seq += 1;
        self.suggestion_seq
    }

    pub fn suggestion_is_current(&self, seq: u64) -> bool {
        self.suggestion_seq == seq
    }

    /// Applies a suggestion response only if no newer request has been made
    /// since; a stale response is discarded.
    pub fn apply_suggestions(&mut self, seq: u64, suggestions: Vec<String>) -> bool {
        if !self.suggestion_is_current(seq) {
            return false;
        }
        self.atmosphere_suggestions = suggestions;
        self.touch();
        true
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn wrap_degrees(value: f64) -> f64 {
    value.rem_euclid(360.0)
}

fn snap_iso(value: u32) -> u32 {
    (((value + 50) / 100) * 100).clamp(100, 6400)
}

fn require_member(table: &[&str], token: &str, field: &str) -> Result<(), AppError> {
    if vocab::is_member(table, token) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("'{token}' is not a valid {field}")))
    }
}

/// Validates every token, then dedupes keeping first occurrence.
fn validated_tokens(
    tokens: Option<&[String]>,
    table: &[&str],
    field: &str,
) -> Result<Option<Vec<String>>, AppError> {
    let Some(tokens) = tokens else {
        return Ok(None);
    };
    for token in tokens {
        require_member(table, token, field)?;
    }
    Ok(Some(dedupe(tokens.iter().cloned())))
}

/// Keeps vocabulary members only, deduped; for model output where a stray
/// token should not sink the payload.
fn filter_tokens(tokens: &[String], table: &[&str]) -> Vec<String> {
    dedupe(tokens.iter().filter(|t| vocab::is_member(table, t)).cloned())
}

fn dedupe(tokens: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in tokens {
        if !out.contains(&token) {
            out.push(token);
        }
    }
    out
}

fn validate_camera_tokens(patch: &CameraPatch) -> Result<(), AppError> {
    if let Some(aperture) = &patch.aperture {
        require_member(vocab::F_STOPS, aperture, "aperture")?;
    }
    if let Some(shutter) = &patch.shutter_angle {
        require_member(vocab::SHUTTER_ANGLES, shutter, "shutterAngle")?;
    }
    if let Some(sensor) = &patch.sensor_format {
        require_member(vocab::SENSOR_FORMATS, sensor, "sensorFormat")?;
    }
    Ok(())
}

fn validate_lighting_tokens(patch: &LightingPatch) -> Result<(), AppError> {
    if let Some(temperature) = &patch.temperature {
        require_member(vocab::LIGHTING_TEMPS, temperature, "temperature")?;
    }
    if let Some(light_type) = &patch.light_type {
        require_member(vocab::LIGHTING_TYPES, light_type, "type")?;
    }
    Ok(())
}

fn apply_camera_numerics(camera: &mut CameraParameters, patch: &CameraPatch) {
    if let Some(azimuth) = patch.azimuth {
        camera.azimuth = wrap_degrees(azimuth);
    }
    if let Some(elevation) = patch.elevation {
        camera.elevation = elevation.clamp(-90.0, 90.0);
    }
    if let Some(distance) = patch.distance {
        camera.distance = distance.clamp(1.0, 10.0);
    }
    if let Some(focal) = patch.focal_length {
        camera.focal_length = focal.clamp(12.0, 200.0);
    }
    if let Some(roll) = patch.roll {
        camera.roll = roll.clamp(-45.0, 45.0);
    }
    if let Some(iso) = patch.iso {
        camera.iso = snap_iso(iso);
    }
}

fn apply_camera_patch(camera: &mut CameraParameters, patch: &CameraPatch) {
    apply_camera_numerics(camera, patch);
    if let Some(aperture) = &patch.aperture {
        camera.aperture = aperture.clone();
    }
    if let Some(shutter) = &patch.shutter_angle {
        camera.shutter_angle = shutter.clone();
    }
    if let Some(sensor) = &patch.sensor_format {
        camera.sensor_format = sensor.clone();
    }
}

/// Like `apply_camera_patch` but drops unknown tokens instead of erroring.
fn apply_camera_patch_lenient(camera: &mut CameraParameters, patch: &CameraPatch) {
    apply_camera_numerics(camera, patch);
    if let Some(aperture) = &patch.aperture {
        if vocab::is_member(vocab::F_STOPS, aperture) {
            camera.aperture = aperture.clone();
        }
    }
    if let Some(shutter) = &patch.shutter_angle {
        if vocab::is_member(vocab::SHUTTER_ANGLES, shutter) {
            camera.shutter_angle = shutter.clone();
        }
    }
    if let Some(sensor) = &patch.sensor_format {
        if vocab::is_member(vocab::SENSOR_FORMATS, sensor) {
            camera.sensor_format = sensor.clone();
        }
    }
}

fn apply_lighting_numerics(lighting: &mut LightingParameters, patch: &LightingPatch) {
    if let Some(direction) = patch.direction {
        lighting.direction = wrap_degrees(direction);
    }
    if let Some(elevation) = patch.elevation {
        lighting.elevation = elevation.clamp(0.0, 90.0);
    }
    if let Some(intensity) = patch.intensity {
        lighting.intensity = intensity.clamp(0.0, 100.0);
    }
}

fn apply_lighting_patch(lighting: &mut LightingParameters, patch: &LightingPatch) {
    apply_lighting_numerics(lighting, patch);
    if let Some(temperature) = &patch.temperature {
        lighting.temperature = temperature.clone();
    }
    if let Some(light_type) = &patch.light_type {
        lighting.light_type = light_type.clone();
    }
}

fn apply_lighting_patch_lenient(lighting: &mut LightingParameters, patch: &LightingPatch) {
    apply_lighting_numerics(lighting, patch);
    if let Some(temperature) = &patch.temperature {
        if vocab::is_member(vocab::LIGHTING_TEMPS, temperature) {
            lighting.temperature = temperature.clone();
        }
    }
    if let Some(light_type) = &patch.light_type {
        if vocab::is_member(vocab::LIGHTING_TYPES, light_type) {
            lighting.light_type = light_type.clone();
        }
    }
}

fn apply_scene_patch(scene: &mut SceneDescription, patch: &ScenePatch) {
    if let Some(description) = &patch.character_description {
        scene.character_description = description.clone();
    }
    if let Some(action) = &patch.character_action {
        scene.character_action = action.clone();
    }
    if let Some(props) = &patch.clothing_and_props {
        scene.clothing_and_props = props.clone();
    }
    if let Some(environment) = &patch.environment {
        scene.environment = environment.clone();
    }
}
