use std::fmt;

/// Phase of the conversation for one call.
///
/// Exactly one phase is active at a time. `Responding` and `Speaking` always
/// have an in-flight turn; the others never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    /// No recognition session is open
    #[default]
    Idle,
    /// Recognition is open and nobody is speaking
    Listening,
    /// Confirmed caller speech is being transcribed
    UtteranceCollecting,
    /// Reply tokens are streaming from the generator
    Responding,
    /// Reply audio is streaming from the synthesizer
    Speaking,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnState::Idle => "idle",
            TurnState::Listening => "listening",
            TurnState::UtteranceCollecting => "utterance_collecting",
            TurnState::Responding => "responding",
            TurnState::Speaking => "speaking",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(TurnState::default(), TurnState::Idle);
        assert_eq!(TurnState::UtteranceCollecting.to_string(), "utterance_collecting");
    }
}
