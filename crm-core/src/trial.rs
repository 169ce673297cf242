use crate::stimulus::{Colour, CrmNumber, ResponseButton, StimulusId, Talker, TalkerGroup};
use serde::{Deserialize, Serialize};

/// A competing phrase played alongside the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskerSpec {
    pub talker: Talker,
    pub callsign: String,
    pub colour: Colour,
    pub number: CrmNumber,
    pub stimulus: StimulusId,
}

/// One row of a trial table.
///
/// All maskers of a trial share `masker_location`. The number of maskers is
/// the length of `maskers`; there is no separate count to drift out of sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSpec {
    pub trial_number: usize,
    pub subject: String,
    pub session_date: String,
    pub hrtf_index: usize,
    pub hrtf_name: String,
    pub talker_group: TalkerGroup,
    pub target_location: f64,
    pub masker_location: f64,
    pub target_talker: Talker,
    pub target_callsign: String,
    pub target_colour: Colour,
    pub target_number: CrmNumber,
    pub target_stimulus: StimulusId,
    pub maskers: Vec<MaskerSpec>,
}

impl TrialSpec {
    pub fn masker_count(&self) -> usize {
        self.maskers.len()
    }

    /// The answer the listener should give.
    pub fn target_button(&self) -> ResponseButton {
        ResponseButton::new(self.target_colour, self.target_number)
    }

    /// Every talker heard in the trial, target first.
    pub fn talkers(&self) -> impl Iterator<Item = Talker> + '_ {
        std::iter::once(self.target_talker).chain(self.maskers.iter().map(|m| m.talker))
    }

    /// Every (colour, number) pair spoken in the trial, target first.
    pub fn spoken_pairs(&self) -> impl Iterator<Item = ResponseButton> + '_ {
        std::iter::once(self.target_button())
            .chain(self.maskers.iter().map(|m| ResponseButton::new(m.colour, m.number)))
    }
}

#[derive(Copy, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    WrongColour,
    WrongNumber,
    WrongBoth,
}

/// Practice feedback for one committed answer. Derived from the trial and the
/// response each time it is asked for.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub verdict: Verdict,
    pub target: ResponseButton,
    pub response: ResponseButton,
}

impl Feedback {
    pub fn judge(target: ResponseButton, response: ResponseButton) -> Self {
        let verdict = match (target.colour == response.colour, target.number == response.number) {
            (true, true) => Verdict::Correct,
            (false, true) => Verdict::WrongColour,
            (true, false) => Verdict::WrongNumber,
            (false, false) => Verdict::WrongBoth,
        };
        Self {
            verdict,
            target,
            response,
        }
    }

    pub fn is_correct(&self) -> bool {
        self.verdict == Verdict::Correct
    }
}
