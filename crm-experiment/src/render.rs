use crm_core::{StimulusId, TrialSpec};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Identifies one render request so its completion can be matched to it.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PlaybackTicket(pub u64);

impl fmt::Display for PlaybackTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A sound source placed around the listener.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourcePlacement {
    /// Azimuth in degrees.
    pub location: f64,
    pub elevation: f64,
    pub stimulus: StimulusId,
}

/// What the renderer needs to play one trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPayload {
    pub trial_number: usize,
    pub target: SourcePlacement,
    pub maskers: Vec<SourcePlacement>,
    pub hrtf: String,
}

impl RenderPayload {
    pub fn from_trial(trial: &TrialSpec) -> Self {
        let place = |location, stimulus: &StimulusId| SourcePlacement {
            location,
            elevation: 0.0,
            stimulus: stimulus.clone(),
        };
        Self {
            trial_number: trial.trial_number,
            target: place(trial.target_location, &trial.target_stimulus),
            maskers: trial
                .maskers
                .iter()
                .map(|m| place(trial.masker_location, &m.stimulus))
                .collect(),
            hrtf: trial.hrtf_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub ticket: PlaybackTicket,
    pub payload: RenderPayload,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer unavailable: {0}")]
    Unavailable(String),
    #[error("renderer rejected stimulus {stimulus}: {reason}")]
    Rejected { stimulus: StimulusId, reason: String },
}

/// The audio back end. `render` starts playback and returns; completion is
/// reported later through `SessionController::playback_complete` with the
/// request's ticket.
pub trait Renderer {
    fn render(&mut self, request: RenderRequest) -> Result<(), RenderError>;
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, request: RenderRequest) -> Result<(), RenderError> {
        (**self).render(request)
    }
}
