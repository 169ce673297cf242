pub mod phase;
pub mod stimulus;
pub mod trial;

pub use phase::SessionPhase;
pub use stimulus::{
    Colour, CrmNumber, ParseValueError, ResponseButton, StimulusId, Talker, TalkerGroup,
};
pub use trial::{Feedback, MaskerSpec, TrialSpec, Verdict};
