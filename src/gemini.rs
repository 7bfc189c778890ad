use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info};

use crate::models::{
    ArtDirectionSelection, CameraParameters, GeneratedResult, LightingParameters, SceneDescription,
};

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// The generative-model collaborator. Calls are fallible and never retried
/// here; a failure must leave session state untouched, which the handlers
/// guarantee by merging results only on success.
#[async_trait]
pub trait PromptService: Send + Sync {
    async fn generate(
        &self,
        camera: &CameraParameters,
        lighting: &LightingParameters,
        scene: &SceneDescription,
        options: &ArtDirectionSelection,
    ) -> Result<GeneratedResult, GeminiError>;

    async fn analyze_image(
        &self,
        image: &Bytes,
        context: &str,
    ) -> Result<GeneratedResult, GeminiError>;

    async fn suggest_atmospheres(&self, text: &str) -> Result<Vec<String>, GeminiError>;
}

const GENERATE_SYSTEM_INSTRUCTION: &str = "You are an expert Director of Photography (DP) and Cinematographer. \
Your task is to translate technical camera coordinates, lighting setups, and artistic preferences into a precise JSON structure for image generation prompts. \
Calculate the precise X,Y,Z coordinates based on the polar coordinates provided (Distance, Azimuth, Elevation). \
Coordinate system assumption: Target is at (0,0,0). Y is Up.";

const ANALYZE_SYSTEM_INSTRUCTION: &str = "You are an expert Director of Photography (DP) and Visual Stylist analyzing a reference image. \
Your task is to reverse engineer the photo to deduce the camera settings, lighting, composition, character details, and style used to create it. \
Detailed tasks: \
1. Analyze perspective: estimate camera azimuth, elevation, distance. \
2. Estimate lens/sensor: focal length, aperture (depth of field), shutter, ISO. \
3. Analyze lighting: direction (0-360), height, intensity, temperature, type. \
4. Extract character and scene details: physical appearance, clothing and accessories, props and environment, current action/pose. \
5. Identify artistic elements (theme, style, color, atmosphere). \
6. Return the standard JSON output AND a 'reconstructedParams' object mapping these to the editing controls.";

pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>) -> Self {
        let base_url = std::env::var("GEMINI_API_BASE")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string());
        let model = std::env::var("GEMINI_MODEL")
            .unwrap_or_else(|_| "gemini-3-flash-preview".to_string());
        Self {
            client: Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    /// Credential check happens before any network attempt.
    fn require_key(&self) -> Result<&str, GeminiError> {
        self.api_key.as_deref().ok_or(GeminiError::MissingApiKey)
    }

    async fn perform_api_call(&self, body: Value) -> Result<String, GeminiError> {
        let key = self.require_key()?;
        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, self.model, key);

        info!("🔗 Making request to: {}", url.replace(key, "***"));

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ API error response: {}", error_body);
            return Err(GeminiError::Http(format!("status={} body={}", status, error_body)));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        let parsed: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Malformed(format!("response envelope: {e}")))?;

        extract_first_text(&parsed)
            .ok_or_else(|| GeminiError::Malformed("no text content in response".into()))
    }
}

#[async_trait]
impl PromptService for GeminiClient {
    async fn generate(
        &self,
        camera: &CameraParameters,
        lighting: &LightingParameters,
        scene: &SceneDescription,
        options: &ArtDirectionSelection,
    ) -> Result<GeneratedResult, GeminiError> {
        let prompt = build_generation_prompt(camera, lighting, scene, options);
        info!("🎬 Generating cinematic prompt ({}mm, {} chars)", camera.focal_length, prompt.len());

        let body = json!({
            "systemInstruction": { "parts": [{ "text": GENERATE_SYSTEM_INSTRUCTION }] },
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": generation_response_schema(),
                "temperature": 0.7
            }
        });

        let text = self.perform_api_call(body).await?;
        parse_generated(&text)
    }

    async fn analyze_image(
        &self,
        image: &Bytes,
        context: &str,
    ) -> Result<GeneratedResult, GeminiError> {
        let mime = sniff_mime(image);
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        info!("🔍 Analyzing reference image ({} bytes, {})", image.len(), mime);

        let context_part = if context.is_empty() {
            String::new()
        } else {
            format!(" Context: {context}")
        };
        let instruction = format!(
            "Analyze this image.{context_part} Return the standard JSON prompt structure AND the \
             reconstructedParams object so the shot can be replicated with consistency."
        );

        let body = json!({
            "systemInstruction": { "parts": [{ "text": ANALYZE_SYSTEM_INSTRUCTION }] },
            "contents": [{ "parts": [
                { "inlineData": { "mimeType": mime, "data": encoded } },
                { "text": instruction }
            ] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": analysis_response_schema()
            }
        });

        let text = self.perform_api_call(body).await?;
        let result = parse_generated(&text)?;
        if result.reconstructed_params.is_none() {
            return Err(GeminiError::Malformed("analysis response lacks reconstructedParams".into()));
        }
        Ok(result)
    }

    async fn suggest_atmospheres(&self, text: &str) -> Result<Vec<String>, GeminiError> {
        if text.trim().chars().count() < 3 {
            return Ok(Vec::new());
        }

        let body = json!({
            "contents": [{ "parts": [{ "text": format!(
                "The user wants a cinematic atmosphere like \"{text}\". List 5 distinct, short \
                 (1-3 words) related atmospheric visual elements (e.g., \"Neon Rain\", \"Dust Motes\"). \
                 Return JSON array of strings."
            ) }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": { "type": "ARRAY", "items": { "type": "STRING" } }
            }
        });

        let text = self.perform_api_call(body).await?;
        let mut suggestions: Vec<String> = serde_json::from_str(&text)
            .map_err(|e| GeminiError::Malformed(format!("suggestion payload: {e}")))?;
        suggestions.truncate(5);
        info!("💡 Got {} atmosphere suggestions", suggestions.len());
        Ok(suggestions)
    }
}

/// Strict parse of the model's JSON text into the result contract. Any shape
/// mismatch is a service error; partially-typed data never leaves here.
fn parse_generated(text: &str) -> Result<GeneratedResult, GeminiError> {
    serde_json::from_str(text).map_err(|e| GeminiError::Malformed(format!("prompt payload: {e}")))
}

fn sniff_mime(image: &Bytes) -> &'static str {
    match image::guess_format(image) {
        Ok(image::ImageFormat::Jpeg) => "image/jpeg",
        _ => "image/png",
    }
}

fn join_or(tokens: &[String], fallback: &str) -> String {
    if tokens.is_empty() {
        fallback.to_string()
    } else {
        tokens.join(", ")
    }
}

pub fn build_generation_prompt(
    camera: &CameraParameters,
    lighting: &LightingParameters,
    scene: &SceneDescription,
    options: &ArtDirectionSelection,
) -> String {
    let atmospheres: Vec<String> = options
        .atmosphere
        .iter()
        .cloned()
        .chain(
            (!options.custom_atmosphere.is_empty()).then(|| options.custom_atmosphere.clone()),
        )
        .collect();

    format!(
        "**Technical Inputs:**\n\
         - Azimuth (Horizontal): {azimuth} degrees\n\
         - Elevation (Vertical): {elevation} degrees\n\
         - Distance: {distance} meters\n\
         - Lens/Focal Length: {focal}mm\n\
         - Roll/Dutch: {roll} degrees\n\n\
         **Detailed Camera Settings:**\n\
         - Sensor Format: {sensor} (Controls Field of View characteristics)\n\
         - Aperture: {aperture} (Controls Depth of Field / Bokeh)\n\
         - Shutter: {shutter} (Controls Motion Blur characteristic)\n\
         - ISO: {iso} (Controls Grain structure / Light sensitivity vibe)\n\n\
         **Lighting Setup:**\n\
         - Key Light Direction: {light_dir} degrees (0=Front, 90=Side, 180=Back)\n\
         - Key Light Height: {light_elev} degrees\n\
         - Intensity: {intensity}%\n\
         - Type: {light_type}\n\
         - Temperature: {temperature}\n\n\
         **Subject & Staging (Use this for consistency):**\n\
         - Number of Characters: {count}\n\
         - Arrangement: {arrangement}\n\
         - Character Appearance (Locked): {appearance}\n\
         - Action/Pose (Current): {action}\n\
         - Scene/Props: {props} / {environment}\n\n\
         **Artistic Inputs:**\n\
         - Theme/Genre: {theme}\n\
         - Composition Rule: {composition}\n\
         - Artist/Director Style: {style}\n\
         - Color Grade: {palette}\n\
         - Atmospheric Elements: {atmosphere}\n\n\
         **Task:**\n\
         1. Calculate the cartesian position (x,y,z) of the camera relative to the subject (0,0,0).\n\
         2. Generate a highly detailed descriptive prompt. CRITICAL: combine the 'Character Appearance' \
         with the 'Action/Pose' and 'Scene' naturally, keeping the character description consistent. \
         Describe the lighting precisely based on the angle (e.g., rim lighting if direction is 135-225). \
         Mention depth of field if the aperture is wide (low f-number).\n\
         3. Return strictly JSON.",
        azimuth = camera.azimuth,
        elevation = camera.elevation,
        distance = camera.distance,
        focal = camera.focal_length,
        roll = camera.roll,
        sensor = camera.sensor_format,
        aperture = camera.aperture,
        shutter = camera.shutter_angle,
        iso = camera.iso,
        light_dir = lighting.direction,
        light_elev = lighting.elevation,
        intensity = lighting.intensity,
        light_type = lighting.light_type,
        temperature = lighting.temperature,
        count = options.character_count,
        arrangement = options.character_arrangement,
        appearance = scene.character_description,
        action = scene.character_action,
        props = scene.clothing_and_props,
        environment = scene.environment,
        theme = join_or(&options.theme, "General Cinematic"),
        composition = join_or(&options.composition, "Standard"),
        style = join_or(&options.artist_style, "Neutral"),
        palette = join_or(&options.color_grade, "Standard"),
        atmosphere = atmospheres.join(", "),
    )
}

// Response schemas in the Gemini REST dialect. The structured prompt shape is
// shared; analysis additionally demands the reconstructed parameter block.

fn structured_prompt_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "camera": {
                "type": "OBJECT",
                "properties": {
                    "type": { "type": "STRING" },
                    "lens": { "type": "STRING" },
                    "settings": {
                        "type": "OBJECT",
                        "properties": {
                            "aperture": { "type": "STRING" },
                            "shutter": { "type": "STRING" },
                            "iso": { "type": "STRING" },
                            "format": { "type": "STRING" }
                        }
                    },
                    "position": {
                        "type": "OBJECT",
                        "properties": {
                            "x": { "type": "NUMBER" },
                            "y": { "type": "NUMBER" },
                            "z": { "type": "NUMBER" }
                        }
                    },
                    "rotation": {
                        "type": "OBJECT",
                        "properties": {
                            "pitch": { "type": "NUMBER" },
                            "yaw": { "type": "NUMBER" },
                            "roll": { "type": "NUMBER" }
                        }
                    },
                    "description": { "type": "STRING" }
                }
            },
            "subject": {
                "type": "OBJECT",
                "properties": {
                    "count": { "type": "STRING" },
                    "arrangement": { "type": "STRING" },
                    "visuals": { "type": "STRING" },
                    "action": { "type": "STRING" }
                }
            },
            "lighting": {
                "type": "OBJECT",
                "properties": {
                    "setup": { "type": "STRING" },
                    "position": {
                        "type": "OBJECT",
                        "properties": {
                            "azimuth": { "type": "NUMBER" },
                            "elevation": { "type": "NUMBER" }
                        }
                    },
                    "parameters": {
                        "type": "OBJECT",
                        "properties": {
                            "intensity": { "type": "STRING" },
                            "temperature": { "type": "STRING" }
                        }
                    }
                }
            },
            "artDirection": {
                "type": "OBJECT",
                "properties": {
                    "theme": { "type": "STRING" },
                    "style": { "type": "STRING" },
                    "palette": { "type": "STRING" }
                }
            },
            "elements": { "type": "ARRAY", "items": { "type": "STRING" } }
        }
    })
}

fn generation_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "json": structured_prompt_schema(),
            "visualDescription": {
                "type": "STRING",
                "description": "A cohesive, poetic natural language prompt optimized for diffusion models"
            }
        }
    })
}

fn analysis_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "json": structured_prompt_schema(),
            "visualDescription": { "type": "STRING" },
            "reconstructedParams": {
                "type": "OBJECT",
                "description": "Estimated parameters for the editing controls",
                "properties": {
                    "camera": {
                        "type": "OBJECT",
                        "properties": {
                            "azimuth": { "type": "NUMBER" },
                            "elevation": { "type": "NUMBER" },
                            "distance": { "type": "NUMBER" },
                            "focalLength": { "type": "NUMBER" },
                            "roll": { "type": "NUMBER" },
                            "iso": { "type": "NUMBER" },
                            "aperture": { "type": "STRING" },
                            "shutterAngle": { "type": "STRING" },
                            "sensorFormat": { "type": "STRING" }
                        }
                    },
                    "lighting": {
                        "type": "OBJECT",
                        "properties": {
                            "direction": { "type": "NUMBER" },
                            "elevation": { "type": "NUMBER" },
                            "intensity": { "type": "NUMBER" },
                            "temperature": { "type": "STRING" },
                            "type": { "type": "STRING" }
                        }
                    },
                    "scene": {
                        "type": "OBJECT",
                        "properties": {
                            "characterDescription": { "type": "STRING" },
                            "characterAction": { "type": "STRING" },
                            "clothingAndProps": { "type": "STRING" },
                            "environment": { "type": "STRING" }
                        }
                    },
                    "options": {
                        "type": "OBJECT",
                        "properties": {
                            "characterCount": { "type": "STRING" },
                            "characterArrangement": { "type": "STRING" },
                            "themes": { "type": "ARRAY", "items": { "type": "STRING" } },
                            "compositions": { "type": "ARRAY", "items": { "type": "STRING" } },
                            "styles": { "type": "ARRAY", "items": { "type": "STRING" } },
                            "colors": { "type": "ARRAY", "items": { "type": "STRING" } },
                            "atmospheres": { "type": "ARRAY", "items": { "type": "STRING" } }
                        }
                    }
                }
            }
        }
    })
}

// --- Response parsing helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Other(serde_json::Value),
}

fn extract_first_text(resp: &GeminiResponse) -> Option<String> {
    for candidate in &resp.candidates {
        for part in &candidate.content.parts {
            if let Part::Text { text } = part {
                return Some(text.trim().to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn default_inputs() -> (CameraParameters, LightingParameters, SceneDescription, ArtDirectionSelection)
    {
        (
            CameraParameters::default(),
            LightingParameters::default(),
            SceneDescription::default(),
            ArtDirectionSelection::default(),
        )
    }

    #[test]
    fn prompt_carries_technical_inputs_and_fallbacks() {
        let (camera, lighting, scene, options) = default_inputs();
        let prompt = build_generation_prompt(&camera, &lighting, &scene, &options);

        assert!(prompt.contains("Azimuth (Horizontal): 45 degrees"));
        assert!(prompt.contains("Lens/Focal Length: 50mm"));
        assert!(prompt.contains("Arrangement: Center Frame"));
        // Empty selections fall back to neutral wording, not empty strings.
        assert!(prompt.contains("Theme/Genre: General Cinematic"));
        assert!(prompt.contains("Artist/Director Style: Neutral"));
    }

    #[test]
    fn prompt_appends_custom_atmosphere_to_the_selection() {
        let (camera, lighting, scene, mut options) = default_inputs();
        options.atmosphere = vec!["Foggy".into()];
        options.custom_atmosphere = "Neon rain in Tokyo".into();
        let prompt = build_generation_prompt(&camera, &lighting, &scene, &options);
        assert!(prompt.contains("Atmospheric Elements: Foggy, Neon rain in Tokyo"));
    }

    #[test]
    fn valid_payload_parses_strictly() {
        let text = serde_json::json!({
            "json": {
                "camera": {
                    "type": "cinema camera",
                    "lens": "85mm prime",
                    "settings": {"aperture": "f/1.8", "shutter": "180°", "iso": "400", "format": "Full Frame 35mm"},
                    "position": {"x": 0.5, "y": 0.2, "z": 1.9},
                    "rotation": {"pitch": -5.0, "yaw": 195.0, "roll": 0.0},
                    "description": "tight portrait"
                },
                "subject": {"count": "1", "arrangement": "Center Frame", "visuals": "weathered sailor", "action": "staring"},
                "lighting": {
                    "setup": "rembrandt key",
                    "position": {"azimuth": 40.0, "elevation": 55.0},
                    "parameters": {"intensity": "75%", "temperature": "Warm / Golden (3200K)"}
                },
                "artDirection": {"theme": "Noir", "style": "Roger Deakins", "palette": "Desaturated"},
                "elements": ["smoke", "hard shadows"]
            },
            "visualDescription": "A weathered sailor in warm rembrandt light."
        })
        .to_string();

        let result = parse_generated(&text).unwrap();
        assert_eq!(result.json.camera.lens, "85mm prime");
        assert_eq!(result.json.elements.len(), 2);
        assert!(result.reconstructed_params.is_none());
    }

    #[test]
    fn missing_contract_keys_are_a_malformed_payload() {
        // No `json` object at all.
        let err = parse_generated(r#"{"visualDescription": "pretty"}"#).unwrap_err();
        assert!(matches!(err, GeminiError::Malformed(_)));

        // Truncated camera block.
        let err = parse_generated(r#"{"json": {"camera": {"type": "x"}}, "visualDescription": ""}"#)
            .unwrap_err();
        assert!(matches!(err, GeminiError::Malformed(_)));
    }

    #[test]
    fn envelope_text_extraction_takes_first_text_part() {
        let envelope: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "image/png", "data": "zzz"}},
                {"text": "  {\"a\": 1}  "}
            ]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_first_text(&envelope).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn png_magic_sniffs_as_png() {
        let bytes = Bytes::from_static(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0]);
        assert_eq!(sniff_mime(&bytes), "image/png");
    }

    #[tokio::test]
    async fn short_suggestion_input_returns_empty_without_config() {
        // No API key configured: a sub-3-character input must still succeed
        // because it never reaches the credential check or the network.
        let client = GeminiClient::new(None);
        let suggestions = client.suggest_atmospheres("ab").await.unwrap();
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn missing_key_fails_fast_before_any_network_call() {
        let client = GeminiClient::new(None);
        let err = client.suggest_atmospheres("neon").await.unwrap_err();
        assert!(matches!(err, GeminiError::MissingApiKey));
    }
}
