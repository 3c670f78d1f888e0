/// Who holds the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    UserSpeaking,
    AiSpeaking,
}

/// Inputs the transition function understands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineInput {
    /// Level of one captured frame.
    Level(f32),
    /// The silence timer ran out.
    SilenceElapsed,
    /// The transport went away; any turn in progress is over.
    SessionLost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SilenceAction {
    #[default]
    Keep,
    /// Arm the timer unless one is already armed.
    Arm,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub speaking: f32,
    pub interrupt: f32,
}

/// Outcome of one input: the next state plus the side effects that belong to
/// the input itself. Enter/exit hooks are applied separately by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: ConversationState,
    /// Send the frame to the peer.
    pub forward: bool,
    pub silence: SilenceAction,
    /// Tell the peer to abort its response.
    pub abort: bool,
}

impl Transition {
    fn stay(state: ConversationState) -> Self {
        Self {
            next: state,
            forward: false,
            silence: SilenceAction::Keep,
            abort: false,
        }
    }
}

/// The turn-taking table. Pure and total: every state/input pair has an
/// outcome, and inputs no guard accepts (NaN levels, a timer firing outside
/// `UserSpeaking`) leave the state unchanged.
pub fn transition(state: ConversationState, input: EngineInput, thresholds: &Thresholds) -> Transition {
    use ConversationState::*;
    use EngineInput::*;

    match (state, input) {
        (_, SessionLost) => Transition {
            next: Idle,
            silence: SilenceAction::Cancel,
            ..Transition::stay(state)
        },

        (Idle, Level(level)) if level > thresholds.speaking => Transition {
            next: UserSpeaking,
            ..Transition::stay(state)
        },
        (Idle, _) => Transition::stay(state),

        (UserSpeaking, Level(level)) => {
            let silence = if level < thresholds.speaking {
                SilenceAction::Arm
            } else if level >= thresholds.speaking {
                SilenceAction::Cancel
            } else {
                SilenceAction::Keep
            };
            Transition {
                forward: true,
                silence,
                ..Transition::stay(state)
            }
        }
        (UserSpeaking, SilenceElapsed) => Transition {
            next: AiSpeaking,
            ..Transition::stay(state)
        },

        (AiSpeaking, Level(level)) if level > thresholds.interrupt => Transition {
            next: UserSpeaking,
            abort: true,
            ..Transition::stay(state)
        },
        (AiSpeaking, _) => Transition::stay(state),
    }
}
