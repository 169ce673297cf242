use crm_experiment::{PlaybackTicket, RenderError, RenderRequest, Renderer};
use crm_timing::Clock;
use std::sync::mpsc::Sender;
use std::time::Duration;
use tracing::info;

/// Messages reaching the app's event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Input(String),
    InputClosed,
    PlaybackFinished(PlaybackTicket),
}

/// Stands in for the spatial audio renderer: logs the scene and reports
/// playback finished after the estimated phrase duration.
pub struct SimulatedRenderer<C> {
    events: Sender<AppEvent>,
    clock: C,
    duration: Duration,
}

impl<C: Clock + 'static> SimulatedRenderer<C> {
    pub fn new(events: Sender<AppEvent>, clock: C, duration: Duration) -> Self {
        Self {
            events,
            clock,
            duration,
        }
    }
}

impl<C: Clock + 'static> Renderer for SimulatedRenderer<C> {
    fn render(&mut self, request: RenderRequest) -> Result<(), RenderError> {
        let scene = serde_json::to_string(&request.payload)
            .map_err(|e| RenderError::Unavailable(e.to_string()))?;
        info!(ticket = %request.ticket, %scene, "playing trial");

        let events = self.events.clone();
        let clock = self.clock.clone();
        let duration = self.duration;
        let ticket = request.ticket;
        std::thread::Builder::new()
            .name(format!("playback-{}", ticket.0))
            .spawn(move || {
                clock.sleep(duration);
                // The loop may already have exited.
                let _ = events.send(AppEvent::PlaybackFinished(ticket));
            })
            .map_err(|e| RenderError::Unavailable(e.to_string()))?;
        Ok(())
    }
}
