use super::{StageId, StageStatus};
use crate::error::PipelineError;

/// Validates a stage transition.
///
/// `Failed -> Complete` is the compensation edge: a stage that failed on its
/// primary path completes through its fallback.
pub(crate) fn validate_transition(
    stage: StageId,
    from: StageStatus,
    to: StageStatus,
) -> Result<(), PipelineError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(PipelineError::IllegalTransition { stage, from, to })
    }
}

pub(crate) fn allowed_transitions(from: StageStatus) -> Vec<StageStatus> {
    use StageStatus::*;
    match from {
        Pending => vec![Active],
        Active => vec![Complete, Failed],
        Failed => vec![Complete],
        Complete => vec![],
    }
}

fn allowed(from: StageStatus, to: StageStatus) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use StageStatus::*;

    #[test]
    fn forward_path_is_legal() {
        let stage = StageId::Detect;
        assert!(validate_transition(stage, Pending, Active).is_ok());
        assert!(validate_transition(stage, Active, Complete).is_ok());
        assert!(validate_transition(stage, Active, Failed).is_ok());
        assert!(validate_transition(stage, Failed, Complete).is_ok());
    }

    #[test]
    fn completed_stage_is_terminal() {
        assert!(allowed_transitions(Complete).is_empty());
        let err = validate_transition(StageId::Segment, Complete, Active).unwrap_err();
        assert_eq!(
            err,
            PipelineError::IllegalTransition {
                stage: StageId::Segment,
                from: Complete,
                to: Active,
            }
        );
    }

    #[test]
    fn stages_cannot_skip_activation() {
        assert!(validate_transition(StageId::PlatingAsset, Pending, Complete).is_err());
        assert!(validate_transition(StageId::PlatingAsset, Pending, Failed).is_err());
        assert!(validate_transition(StageId::PlatingAsset, Failed, Active).is_err());
    }
}
