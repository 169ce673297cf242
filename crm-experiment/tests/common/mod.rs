#![allow(dead_code)]

use crm_core::{Colour, CrmNumber, StimulusId, Talker};
use crm_experiment::{
    ExperimentConfig, RenderError, RenderRequest, Renderer, ResolveError, StimulusResolver,
};
use std::sync::{Arc, Mutex};

/// Resolves every phrase to a readable id.
pub struct NamingResolver;

impl StimulusResolver for NamingResolver {
    fn resolve(
        &self,
        talker: Talker,
        callsign: &str,
        colour: Colour,
        number: CrmNumber,
    ) -> Result<StimulusId, ResolveError> {
        Ok(StimulusId::new(format!(
            "Talker{talker}/{callsign}_{colour}_{}.wav",
            number.word()
        )))
    }
}

/// Keeps every request where the test can see it.
#[derive(Clone, Default)]
pub struct SharedRenderer {
    pub requests: Arc<Mutex<Vec<RenderRequest>>>,
}

impl SharedRenderer {
    pub fn last(&self) -> Option<RenderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Renderer for SharedRenderer {
    fn render(&mut self, request: RenderRequest) -> Result<(), RenderError> {
        self.requests.lock().unwrap().push(request);
        Ok(())
    }
}

pub fn scenario_config() -> ExperimentConfig {
    ExperimentConfig {
        subject: "p01".into(),
        test: "srm".into(),
        repeats: 1,
        target_locations: vec![0.0, 90.0],
        masker_locations: vec![180.0],
        hrtfs: vec!["h0".into()],
        number_of_maskers: 1,
        practice: false,
        ..ExperimentConfig::default()
    }
}
