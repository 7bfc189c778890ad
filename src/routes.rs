use axum::extract::{Path, State};
use axum::Json;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc, time::Duration};
use uuid::Uuid;

use crate::errors::AppError;
use crate::gemini::PromptService;
use crate::models::{
    ArtDirectionSelection, CameraParameters, CameraPatch, CharacterCountRequest, GeneratedResult,
    LightingParameters, LightingPatch, ModeRequest, OptionsPatch, PresetRequest, SceneDescription,
    ScenePatch, SuggestionRequest, UploadRequest,
};
use crate::projector::{self, Schematic};
use crate::session::Session;
use crate::vocab;
use crate::workflow::WorkflowState;

/// Quiet period for the atmosphere suggestion flow: a request only reaches
/// the model after sitting unsuperseded this long.
const SUGGESTION_DEBOUNCE: Duration = Duration::from_millis(800);

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<HashMap<Uuid, Session>>>,
    pub prompts: Arc<dyn PromptService>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub camera: CameraParameters,
    pub lighting: LightingParameters,
    pub scene: SceneDescription,
    pub options: ArtDirectionSelection,
    pub workflow: WorkflowState,
    pub busy: bool,
    pub has_analyzed: bool,
    pub controls_enabled: bool,
    pub can_generate: bool,
    pub has_reference_image: bool,
    pub atmosphere_suggestions: Vec<String>,
    pub schematic: Schematic,
    pub result: Option<GeneratedResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn snapshot(session: &Session) -> SessionSnapshot {
    SessionSnapshot {
        id: session.id,
        camera: session.camera.clone(),
        lighting: session.lighting.clone(),
        scene: session.scene.clone(),
        options: session.options.clone(),
        workflow: session.workflow.state(),
        busy: session.workflow.is_busy(),
        has_analyzed: session.workflow.has_analyzed(),
        controls_enabled: session.workflow.controls_enabled(),
        can_generate: session.workflow.can_generate(),
        has_reference_image: session.reference_image.is_some(),
        atmosphere_suggestions: session.atmosphere_suggestions.clone(),
        schematic: projector::project(&session.camera, &session.lighting),
        result: session.result.clone(),
        created_at: session.created_at,
        updated_at: session.updated_at,
    }
}

fn with_session<T>(
    state: &AppState,
    id: Uuid,
    f: impl FnOnce(&mut Session) -> Result<T, AppError>,
) -> Result<T, AppError> {
    let mut guard = state.store.write();
    let session = guard.get_mut(&id).ok_or(AppError::SessionNotFound)?;
    f(session)
}

/// Editing is only possible when the workflow says the rig is unlocked.
fn ensure_unlocked(session: &Session) -> Result<(), AppError> {
    if session.workflow.controls_enabled() {
        Ok(())
    } else {
        Err(AppError::Input("controls are locked until the reference image is analyzed".into()))
    }
}

pub async fn create_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    let session = Session::new();
    let snap = snapshot(&session);
    tracing::info!("🎬 Created session {}", session.id);
    state.store.write().insert(session.id, session);
    Json(snap)
}

pub async fn get_session(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let guard = state.store.read();
    let session = guard.get(&id).ok_or(AppError::SessionNotFound)?;
    Ok(Json(snapshot(session)))
}

pub async fn get_schematic(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Schematic>, AppError> {
    let guard = state.store.read();
    let session = guard.get(&id).ok_or(AppError::SessionNotFound)?;
    Ok(Json(projector::project(&session.camera, &session.lighting)))
}

pub async fn patch_camera(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<CameraPatch>,
) -> Result<Json<SessionSnapshot>, AppError> {
    with_session(&state, id, |session| {
        ensure_unlocked(session)?;
        session.patch_camera(&body)?;
        Ok(Json(snapshot(session)))
    })
}

pub async fn patch_lighting(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<LightingPatch>,
) -> Result<Json<SessionSnapshot>, AppError> {
    with_session(&state, id, |session| {
        ensure_unlocked(session)?;
        session.patch_lighting(&body)?;
        Ok(Json(snapshot(session)))
    })
}

pub async fn patch_scene(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<ScenePatch>,
) -> Result<Json<SessionSnapshot>, AppError> {
    with_session(&state, id, |session| {
        ensure_unlocked(session)?;
        session.patch_scene(&body);
        Ok(Json(snapshot(session)))
    })
}

pub async fn patch_options(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<OptionsPatch>,
) -> Result<Json<SessionSnapshot>, AppError> {
    with_session(&state, id, |session| {
        ensure_unlocked(session)?;
        session.patch_options(&body)?;
        Ok(Json(snapshot(session)))
    })
}

pub async fn set_character_count(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<CharacterCountRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    with_session(&state, id, |session| {
        ensure_unlocked(session)?;
        session.set_character_count(&body.count)?;
        Ok(Json(snapshot(session)))
    })
}

pub async fn apply_preset(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<PresetRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    with_session(&state, id, |session| {
        ensure_unlocked(session)?;
        session.apply_preset(&body.preset)?;
        tracing::info!("📷 Session {} applied preset '{}'", id, body.preset);
        Ok(Json(snapshot(session)))
    })
}

pub async fn randomize_camera(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    with_session(&state, id, |session| {
        ensure_unlocked(session)?;
        session.randomize_camera(&mut rand::thread_rng());
        Ok(Json(snapshot(session)))
    })
}

pub async fn randomize_lighting(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    with_session(&state, id, |session| {
        ensure_unlocked(session)?;
        session.randomize_lighting(&mut rand::thread_rng());
        Ok(Json(snapshot(session)))
    })
}

pub async fn set_mode(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<ModeRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    with_session(&state, id, |session| {
        session.workflow.set_mode(body.mode);
        Ok(Json(snapshot(session)))
    })
}

pub async fn upload_image(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<UploadRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    // Accept both raw base64 and data-URL payloads.
    let encoded = match body.data.find("base64,") {
        Some(idx) => &body.data[idx + "base64,".len()..],
        None => body.data.as_str(),
    };
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| AppError::Input(format!("reference image is not valid base64: {e}")))?;
    if decoded.is_empty() {
        return Err(AppError::Input("reference image is empty".into()));
    }

    with_session(&state, id, |session| {
        session.upload_image(Bytes::from(decoded), body.context.clone())?;
        tracing::info!("🖼️ Session {} received a reference image", id);
        Ok(Json(snapshot(session)))
    })
}

pub async fn analyze_session(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    // Claim the single-flight guard and copy the image out under the lock;
    // the network call happens with the store released.
    let image = {
        let mut guard = state.store.write();
        let session = guard.get_mut(&id).ok_or(AppError::SessionNotFound)?;
        session.workflow.begin_analysis(session.reference_image.is_some())?;
        session
            .reference_image
            .clone()
            .ok_or_else(|| AppError::Input("upload a reference image first".into()))?
    };

    tracing::info!("🔍 Session {} analyzing reference image", id);
    let outcome = state.prompts.analyze_image(&image.data, &image.context).await;

    let mut guard = state.store.write();
    let session = guard.get_mut(&id).ok_or(AppError::SessionNotFound)?;
    match outcome {
        Ok(generated) => {
            if let Some(params) = &generated.reconstructed_params {
                session.merge_reconstructed(params);
            }
            session.result = Some(generated);
            session.workflow.analysis_succeeded();
            tracing::info!("✅ Session {} analysis complete", id);
            Ok(Json(snapshot(session)))
        }
        Err(err) => {
            session.workflow.analysis_failed();
            tracing::error!("❌ Session {} analysis failed: {}", id, err);
            Err(err.into())
        }
    }
}

pub async fn generate_session(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let (camera, lighting, scene, options) = {
        let mut guard = state.store.write();
        let session = guard.get_mut(&id).ok_or(AppError::SessionNotFound)?;
        session.workflow.begin_generation()?;
        (
            session.camera.clone(),
            session.lighting.clone(),
            session.scene.clone(),
            session.options.clone(),
        )
    };

    tracing::info!("🎬 Session {} generating cinematic prompt", id);
    let outcome = state.prompts.generate(&camera, &lighting, &scene, &options).await;

    let mut guard = state.store.write();
    let session = guard.get_mut(&id).ok_or(AppError::SessionNotFound)?;
    session.workflow.generation_finished();
    match outcome {
        Ok(generated) => {
            session.result = Some(generated);
            tracing::info!("✅ Session {} prompt generated", id);
            Ok(Json(snapshot(session)))
        }
        Err(err) => {
            // The previous result, if any, stays on screen.
            tracing::error!("❌ Session {} generation failed: {}", id, err);
            Err(err.into())
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionResponse {
    pub suggestions: Vec<String>,
    pub superseded: bool,
}

/// Debounced, supersession-based suggestion fetch. Independent of the
/// analyze/generate guard; only the newest request for a session may apply
/// its result.
pub async fn fetch_suggestions(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<SuggestionRequest>,
) -> Result<Json<SuggestionResponse>, AppError> {
    let seq = with_session(&state, id, |session| Ok(session.next_suggestion_seq()))?;

    tokio::time::sleep(SUGGESTION_DEBOUNCE).await;

    // Superseded during the quiet period: abandon before any network call.
    let still_current = with_session(&state, id, |session| Ok(session.suggestion_is_current(seq)))?;
    if !still_current {
        return Ok(Json(SuggestionResponse { suggestions: Vec::new(), superseded: true }));
    }

    let suggestions = state.prompts.suggest_atmospheres(&body.text).await?;

    let applied =
        with_session(&state, id, |session| Ok(session.apply_suggestions(seq, suggestions.clone())))?;
    Ok(Json(SuggestionResponse { suggestions: if applied { suggestions } else { Vec::new() }, superseded: !applied }))
}

#[derive(Debug, Serialize)]
struct ArrangementTable {
    count: &'static str,
    arrangements: &'static [&'static str],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabResponse {
    f_stops: &'static [&'static str],
    shutter_angles: &'static [&'static str],
    sensor_formats: &'static [&'static str],
    lighting_types: &'static [&'static str],
    lighting_temps: &'static [&'static str],
    themes: &'static [&'static str],
    compositions: &'static [&'static str],
    artist_styles: &'static [&'static str],
    color_grades: &'static [&'static str],
    atmospheres: &'static [&'static str],
    character_counts: &'static [&'static str],
    character_arrangements: Vec<ArrangementTable>,
    camera_presets: &'static [vocab::CameraPreset],
}

pub async fn get_vocab() -> Json<VocabResponse> {
    Json(VocabResponse {
        f_stops: vocab::F_STOPS,
        shutter_angles: vocab::SHUTTER_ANGLES,
        sensor_formats: vocab::SENSOR_FORMATS,
        lighting_types: vocab::LIGHTING_TYPES,
        lighting_temps: vocab::LIGHTING_TEMPS,
        themes: vocab::THEMES,
        compositions: vocab::COMPOSITIONS,
        artist_styles: vocab::ARTIST_STYLES,
        color_grades: vocab::COLOR_GRADES,
        atmospheres: vocab::ATMOSPHERES,
        character_counts: vocab::CHARACTER_COUNTS,
        character_arrangements: vocab::CHARACTER_COUNTS
            .iter()
            .copied()
            .map(|count| ArrangementTable {
                count,
                arrangements: vocab::arrangements_for(count),
            })
            .collect(),
        camera_presets: vocab::CAMERA_PRESETS,
    })
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "cineprompt",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::GeminiError;
    use crate::workflow::{ReverseStage, WorkflowMode};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_result(reconstructed: bool) -> GeneratedResult {
        let mut value = serde_json::json!({
            "json": {
                "camera": {
                    "type": "cinema camera",
                    "lens": "35mm prime",
                    "settings": {"aperture": "f/2.8", "shutter": "180°", "iso": "800", "format": "Super 35"},
                    "position": {"x": 2.0, "y": 1.1, "z": 3.4},
                    "rotation": {"pitch": -15.0, "yaw": 225.0, "roll": 0.0},
                    "description": "medium tracking shot"
                },
                "subject": {"count": "1", "arrangement": "Center Frame", "visuals": "figure", "action": "walking"},
                "lighting": {
                    "setup": "hard key from camera left",
                    "position": {"azimuth": 90.0, "elevation": 30.0},
                    "parameters": {"intensity": "70%", "temperature": "Neon Blue"}
                },
                "artDirection": {"theme": "Sci-Fi", "style": "Ridley Scott", "palette": "Neon Vaporwave"},
                "elements": ["rain", "neon signage"]
            },
            "visualDescription": "A lone figure walks through neon rain."
        });
        if reconstructed {
            value["reconstructedParams"] = serde_json::json!({
                "camera": {"azimuth": 200.0, "focalLength": 35.0, "aperture": "f/2.8"},
                "lighting": {"direction": 90.0, "intensity": 70.0, "temperature": "Neon Blue"},
                "scene": {"characterDescription": "figure in a long coat"},
                "options": {
                    "characterCount": "1",
                    "characterArrangement": "Walking Away",
                    "themes": ["Sci-Fi"],
                    "colors": ["Neon Vaporwave"]
                }
            });
        }
        serde_json::from_value(value).unwrap()
    }

    /// Scripted collaborator: counts calls, optionally fails everything.
    struct ScriptedService {
        fail: bool,
        calls: AtomicUsize,
    }

    impl ScriptedService {
        fn ok() -> Self {
            Self { fail: false, calls: AtomicUsize::new(0) }
        }

        fn failing() -> Self {
            Self { fail: true, calls: AtomicUsize::new(0) }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PromptService for ScriptedService {
        async fn generate(
            &self,
            _camera: &CameraParameters,
            _lighting: &LightingParameters,
            _scene: &SceneDescription,
            _options: &ArtDirectionSelection,
        ) -> Result<GeneratedResult, GeminiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(GeminiError::Http("status=503".into()))
            } else {
                Ok(sample_result(false))
            }
        }

        async fn analyze_image(
            &self,
            _image: &Bytes,
            _context: &str,
        ) -> Result<GeneratedResult, GeminiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(GeminiError::Http("status=503".into()))
            } else {
                Ok(sample_result(true))
            }
        }

        async fn suggest_atmospheres(&self, text: &str) -> Result<Vec<String>, GeminiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(GeminiError::Http("status=503".into()))
            } else {
                Ok(vec![format!("{text} haze")])
            }
        }
    }

    fn state_with(service: Arc<ScriptedService>) -> AppState {
        AppState { store: Arc::default(), prompts: service }
    }

    fn seed_session(state: &AppState, configure: impl FnOnce(&mut Session)) -> Uuid {
        let mut session = Session::new();
        configure(&mut session);
        let id = session.id;
        state.store.write().insert(id, session);
        id
    }

    fn seed_reverse_session_with_image(state: &AppState) -> Uuid {
        seed_session(state, |session| {
            session.workflow.set_mode(WorkflowMode::ReverseEngineer);
            session.upload_image(Bytes::from_static(b"fake-png"), "night market".into()).unwrap();
        })
    }

    #[tokio::test]
    async fn analyze_merges_reconstruction_and_unlocks() {
        let service = Arc::new(ScriptedService::ok());
        let state = state_with(service.clone());
        let id = seed_reverse_session_with_image(&state);

        let snap = analyze_session(Path(id), State(state.clone())).await.unwrap().0;

        assert_eq!(snap.workflow, WorkflowState::ReverseEngineer { stage: ReverseStage::Analyzed });
        assert!(snap.has_analyzed);
        assert!(snap.controls_enabled);
        assert!(!snap.busy);
        assert_eq!(snap.camera.azimuth, 200.0);
        assert_eq!(snap.options.theme, vec!["Sci-Fi".to_string()]);
        assert_eq!(snap.options.character_arrangement, "Walking Away");
        assert!(snap.result.is_some());
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn analyze_without_image_is_rejected_before_the_network() {
        let service = Arc::new(ScriptedService::ok());
        let state = state_with(service.clone());
        let id = seed_session(&state, |session| {
            session.workflow.set_mode(WorkflowMode::ReverseEngineer);
        });

        let err = analyze_session(Path(id), State(state.clone())).await.unwrap_err();

        assert!(matches!(err, AppError::Input(_)));
        assert_eq!(service.calls(), 0);
        let guard = state.store.read();
        let session = guard.get(&id).unwrap();
        assert_eq!(session.workflow.stage(), ReverseStage::AwaitingUpload);
        assert!(!session.workflow.is_busy());
    }

    #[tokio::test]
    async fn failed_analysis_leaves_prior_state_intact() {
        let service = Arc::new(ScriptedService::failing());
        let state = state_with(service);
        let id = seed_reverse_session_with_image(&state);
        let camera_before = state.store.read().get(&id).unwrap().camera.clone();

        let err = analyze_session(Path(id), State(state.clone())).await.unwrap_err();

        assert!(matches!(err, AppError::Service(_)));
        let guard = state.store.read();
        let session = guard.get(&id).unwrap();
        assert_eq!(session.workflow.stage(), ReverseStage::AwaitingAnalysis);
        assert!(!session.workflow.is_busy());
        assert!(!session.workflow.has_analyzed());
        assert_eq!(session.camera, camera_before);
    }

    #[tokio::test]
    async fn failed_generation_keeps_the_previous_result() {
        let service = Arc::new(ScriptedService::failing());
        let state = state_with(service);
        let id = seed_session(&state, |session| {
            session.result = Some(sample_result(false));
        });

        let err = generate_session(Path(id), State(state.clone())).await.unwrap_err();

        assert!(matches!(err, AppError::Service(_)));
        let guard = state.store.read();
        let session = guard.get(&id).unwrap();
        assert!(session.result.is_some());
        assert!(!session.workflow.is_busy());
        assert_eq!(session.workflow.state(), WorkflowState::Direct);
    }

    #[tokio::test]
    async fn generation_replaces_the_result_in_direct_mode() {
        let service = Arc::new(ScriptedService::ok());
        let state = state_with(service);
        let id = seed_session(&state, |_| {});

        let snap = generate_session(Path(id), State(state.clone())).await.unwrap().0;

        assert!(!snap.busy);
        assert_eq!(snap.workflow, WorkflowState::Direct);
        assert_eq!(snap.result.unwrap().json.subject.action, "walking");
    }

    #[tokio::test]
    async fn generate_is_rejected_before_analysis_in_reverse_mode() {
        let service = Arc::new(ScriptedService::ok());
        let state = state_with(service.clone());
        let id = seed_reverse_session_with_image(&state);

        let err = generate_session(Path(id), State(state.clone())).await.unwrap_err();
        assert!(matches!(err, AppError::Input(_)));
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn locked_controls_reject_edits() {
        let service = Arc::new(ScriptedService::ok());
        let state = state_with(service);
        let id = seed_reverse_session_with_image(&state);

        let err = patch_camera(
            Path(id),
            State(state.clone()),
            Json(CameraPatch { azimuth: Some(10.0), ..CameraPatch::default() }),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Input(_)));
        assert_eq!(state.store.read().get(&id).unwrap().camera.azimuth, 45.0);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_suggestion_request_supersedes_older_one() {
        let service = Arc::new(ScriptedService::ok());
        let state = state_with(service.clone());
        let id = seed_session(&state, |_| {});

        let first = tokio::spawn(fetch_suggestions(
            Path(id),
            State(state.clone()),
            Json(SuggestionRequest { text: "neon".into() }),
        ));
        // Let the first request claim its generation before the second lands.
        tokio::task::yield_now().await;
        let second = tokio::spawn(fetch_suggestions(
            Path(id),
            State(state.clone()),
            Json(SuggestionRequest { text: "neon ra".into() }),
        ));

        let first = first.await.unwrap().unwrap().0;
        let second = second.await.unwrap().unwrap().0;

        assert!(first.superseded);
        assert!(first.suggestions.is_empty());
        assert!(!second.superseded);
        assert_eq!(second.suggestions, vec!["neon ra haze".to_string()]);
        // The superseded request never reached the model.
        assert_eq!(service.calls(), 1);
        assert_eq!(
            state.store.read().get(&id).unwrap().atmosphere_suggestions,
            vec!["neon ra haze".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn suggestion_flow_runs_while_generation_is_busy() {
        let service = Arc::new(ScriptedService::ok());
        let state = state_with(service);
        let id = seed_session(&state, |session| {
            // Generation in flight: the single-flight guard is held.
            session.workflow.begin_generation().unwrap();
        });

        let response = fetch_suggestions(
            Path(id),
            State(state.clone()),
            Json(SuggestionRequest { text: "dust storm".into() }),
        )
        .await
        .unwrap()
        .0;

        assert!(!response.superseded);
        assert_eq!(response.suggestions, vec!["dust storm haze".to_string()]);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let state = state_with(Arc::new(ScriptedService::ok()));
        let err = get_session(Path(Uuid::new_v4()), State(state)).await.unwrap_err();
        assert!(matches!(err, AppError::SessionNotFound));
    }
}
