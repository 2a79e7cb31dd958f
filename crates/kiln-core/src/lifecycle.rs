use crate::session::ExportState;
use crate::CoreError;

pub fn validate_transition(from: ExportState, to: ExportState) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (
            ExportState::Exporting,
            ExportState::Finishing | ExportState::Cancelling | ExportState::Interrupted
        ) | (ExportState::Finishing, ExportState::Finished)
            | (ExportState::Cancelling, ExportState::Cancelled)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        assert!(validate_transition(ExportState::Exporting, ExportState::Finishing).is_ok());
        assert!(validate_transition(ExportState::Exporting, ExportState::Cancelling).is_ok());
        assert!(validate_transition(ExportState::Exporting, ExportState::Interrupted).is_ok());
        assert!(validate_transition(ExportState::Finishing, ExportState::Finished).is_ok());
        assert!(validate_transition(ExportState::Cancelling, ExportState::Cancelled).is_ok());
    }

    #[test]
    fn invalid_transitions() {
        assert!(validate_transition(ExportState::Exporting, ExportState::Finished).is_err());
        assert!(validate_transition(ExportState::Exporting, ExportState::Cancelled).is_err());
        assert!(validate_transition(ExportState::Exporting, ExportState::Exporting).is_err());
        assert!(validate_transition(ExportState::Finishing, ExportState::Cancelling).is_err());
        assert!(validate_transition(ExportState::Cancelling, ExportState::Finished).is_err());
        assert!(validate_transition(ExportState::Finishing, ExportState::Interrupted).is_err());
    }

    #[test]
    fn terminal_states_have_no_exits() {
        let all = [
            ExportState::Exporting,
            ExportState::Finishing,
            ExportState::Finished,
            ExportState::Cancelling,
            ExportState::Cancelled,
            ExportState::Interrupted,
        ];
        for from in all.into_iter().filter(|s| s.is_terminal()) {
            for to in all {
                assert!(
                    validate_transition(from, to).is_err(),
                    "{from} -> {to} must be rejected"
                );
            }
        }
    }
}
