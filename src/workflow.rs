use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowMode {
    #[serde(rename = "direct")]
    Direct,
    #[serde(rename = "reverse")]
    ReverseEngineer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReverseStage {
    AwaitingUpload,
    AwaitingAnalysis,
    Analyzing,
    Analyzed,
}

/// The single current state, derived for reporting so illegal combinations
/// stay unrepresentable to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum WorkflowState {
    Direct,
    ReverseEngineer { stage: ReverseStage },
}

/// Governs the direct-generation and reverse-engineering workflows: which
/// controls are live, which actions are allowed, and the single-flight guard
/// around analyze/generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    mode: WorkflowMode,
    stage: ReverseStage,
    busy: bool,
    has_analyzed: bool,
}

impl Default for Workflow {
    fn default() -> Self {
        Self {
            mode: WorkflowMode::Direct,
            stage: ReverseStage::AwaitingUpload,
            busy: false,
            has_analyzed: false,
        }
    }
}

impl Workflow {
    pub fn state(&self) -> WorkflowState {
        match self.mode {
            WorkflowMode::Direct => WorkflowState::Direct,
            WorkflowMode::ReverseEngineer => WorkflowState::ReverseEngineer { stage: self.stage },
        }
    }

    pub fn mode(&self) -> WorkflowMode {
        self.mode
    }

    pub fn stage(&self) -> ReverseStage {
        self.stage
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn has_analyzed(&self) -> bool {
        self.has_analyzed
    }

    /// Switching modes preserves the reverse sub-state; only new uploads
    /// reset the analysis flag.
    pub fn set_mode(&mut self, mode: WorkflowMode) {
        self.mode = mode;
    }

    /// Editing controls are live in Direct mode and after a completed
    /// analysis; everywhere else the rig is locked until the system has said
    /// what the shot currently is.
    pub fn controls_enabled(&self) -> bool {
        match self.mode {
            WorkflowMode::Direct => true,
            WorkflowMode::ReverseEngineer => self.stage == ReverseStage::Analyzed,
        }
    }

    fn generation_allowed(&self) -> bool {
        match self.mode {
            WorkflowMode::Direct => true,
            WorkflowMode::ReverseEngineer => self.stage == ReverseStage::Analyzed,
        }
    }

    /// Whether a generate action would currently be accepted.
    pub fn can_generate(&self) -> bool {
        !self.busy && self.generation_allowed()
    }

    /// A new reference image arrived: the previous analysis and result no
    /// longer describe it.
    pub fn image_uploaded(&mut self) -> Result<(), AppError> {
        if self.mode != WorkflowMode::ReverseEngineer {
            return Err(AppError::Input(
                "reference images are only accepted in reverse-engineering mode".into(),
            ));
        }
        if self.busy {
            return Err(AppError::Input("another request is still running".into()));
        }
        self.stage = ReverseStage::AwaitingAnalysis;
        self.has_analyzed = false;
        Ok(())
    }

    /// Local preconditions for analyze. Fails synchronously (no network call)
    /// when no image is uploaded; re-analysis from Analyzed is always
    /// permitted.
    pub fn begin_analysis(&mut self, has_image: bool) -> Result<(), AppError> {
        if self.mode != WorkflowMode::ReverseEngineer {
            return Err(AppError::Input("analysis requires reverse-engineering mode".into()));
        }
        if self.busy {
            return Err(AppError::Input("another request is still running".into()));
        }
        if !has_image || self.stage == ReverseStage::AwaitingUpload {
            return Err(AppError::Input("upload a reference image first".into()));
        }
        self.stage = ReverseStage::Analyzing;
        self.busy = true;
        Ok(())
    }

    pub fn analysis_succeeded(&mut self) {
        self.stage = ReverseStage::Analyzed;
        self.has_analyzed = true;
        self.busy = false;
    }

    /// Failure returns to AwaitingAnalysis with everything else untouched;
    /// retry stays available as a fresh user action.
    pub fn analysis_failed(&mut self) {
        self.stage = ReverseStage::AwaitingAnalysis;
        self.busy = false;
    }

    pub fn begin_generation(&mut self) -> Result<(), AppError> {
        if self.busy {
            return Err(AppError::Input("another request is still running".into()));
        }
        if !self.generation_allowed() {
            return Err(AppError::Input(
                "generation is available after the reference image has been analyzed".into(),
            ));
        }
        self.busy = true;
        Ok(())
    }

    /// Generation never changes mode or stage, it only releases the
    /// single-flight guard; the caller decides whether a result replaces the
    /// previous one.
    pub fn generation_finished(&mut self) {
        self.busy = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reverse_with_image() -> Workflow {
        let mut wf = Workflow::default();
        wf.set_mode(WorkflowMode::ReverseEngineer);
        wf.image_uploaded().unwrap();
        wf
    }

    #[test]
    fn starts_direct_with_everything_unlocked() {
        let wf = Workflow::default();
        assert_eq!(wf.state(), WorkflowState::Direct);
        assert!(wf.controls_enabled());
        assert!(wf.can_generate());
    }

    #[test]
    fn analyze_without_image_is_rejected_locally() {
        let mut wf = Workflow::default();
        wf.set_mode(WorkflowMode::ReverseEngineer);

        let err = wf.begin_analysis(false).unwrap_err();
        assert!(matches!(err, AppError::Input(_)));
        assert_eq!(
            wf.state(),
            WorkflowState::ReverseEngineer { stage: ReverseStage::AwaitingUpload }
        );
        assert!(!wf.is_busy());
    }

    #[test]
    fn upload_then_analyze_then_unlock() {
        let mut wf = reverse_with_image();
        assert_eq!(wf.stage(), ReverseStage::AwaitingAnalysis);
        assert!(!wf.controls_enabled());

        wf.begin_analysis(true).unwrap();
        assert_eq!(wf.stage(), ReverseStage::Analyzing);
        assert!(wf.is_busy());
        assert!(!wf.controls_enabled());

        wf.analysis_succeeded();
        assert_eq!(wf.stage(), ReverseStage::Analyzed);
        assert!(wf.has_analyzed());
        assert!(wf.controls_enabled());
        assert!(wf.can_generate());
    }

    #[test]
    fn failed_analysis_returns_to_awaiting_analysis() {
        let mut wf = reverse_with_image();
        wf.begin_analysis(true).unwrap();
        wf.analysis_failed();

        assert_eq!(wf.stage(), ReverseStage::AwaitingAnalysis);
        assert!(!wf.is_busy());
        assert!(!wf.has_analyzed());
    }

    #[test]
    fn failed_reanalysis_keeps_has_analyzed() {
        let mut wf = reverse_with_image();
        wf.begin_analysis(true).unwrap();
        wf.analysis_succeeded();

        wf.begin_analysis(true).unwrap();
        wf.analysis_failed();
        assert!(wf.has_analyzed());
        assert_eq!(wf.stage(), ReverseStage::AwaitingAnalysis);
    }

    #[test]
    fn reanalysis_from_analyzed_is_permitted() {
        let mut wf = reverse_with_image();
        wf.begin_analysis(true).unwrap();
        wf.analysis_succeeded();

        wf.begin_analysis(true).unwrap();
        assert_eq!(wf.stage(), ReverseStage::Analyzing);
    }

    #[test]
    fn mode_switch_preserves_reverse_stage_and_analysis() {
        let mut wf = reverse_with_image();
        wf.begin_analysis(true).unwrap();
        wf.analysis_succeeded();

        wf.set_mode(WorkflowMode::Direct);
        assert_eq!(wf.state(), WorkflowState::Direct);
        assert!(wf.has_analyzed());

        wf.set_mode(WorkflowMode::ReverseEngineer);
        assert_eq!(
            wf.state(),
            WorkflowState::ReverseEngineer { stage: ReverseStage::Analyzed }
        );
    }

    #[test]
    fn new_upload_resets_analysis_state() {
        let mut wf = reverse_with_image();
        wf.begin_analysis(true).unwrap();
        wf.analysis_succeeded();
        assert!(wf.has_analyzed());

        wf.image_uploaded().unwrap();
        assert!(!wf.has_analyzed());
        assert_eq!(wf.stage(), ReverseStage::AwaitingAnalysis);
    }

    #[test]
    fn generate_is_gated_until_analyzed_in_reverse_mode() {
        let mut wf = reverse_with_image();
        assert!(wf.begin_generation().is_err());

        wf.begin_analysis(true).unwrap();
        wf.analysis_succeeded();
        assert!(wf.begin_generation().is_ok());
        wf.generation_finished();
    }

    #[test]
    fn busy_blocks_reentrant_actions() {
        let mut wf = Workflow::default();
        wf.begin_generation().unwrap();

        assert!(matches!(wf.begin_generation(), Err(AppError::Input(_))));

        wf.generation_finished();
        assert!(wf.begin_generation().is_ok());
    }

    #[test]
    fn busy_analysis_blocks_generation() {
        let mut wf = reverse_with_image();
        wf.begin_analysis(true).unwrap();
        assert!(wf.begin_generation().is_err());

        wf.analysis_succeeded();
        assert!(wf.begin_generation().is_ok());
    }

    #[test]
    fn upload_is_rejected_while_busy() {
        let mut wf = reverse_with_image();
        wf.begin_analysis(true).unwrap();
        assert!(wf.image_uploaded().is_err());
        assert_eq!(wf.stage(), ReverseStage::Analyzing);
    }
}
