use crate::config::{ConfigError, PRACTICE_MAX_MASKERS};
use crate::design::{Cell, DesignError, Designer, TrialTable, draw_trial, renumber};
use crate::permute::PermutationSource;
use crate::resolver::StimulusResolver;
use crm_core::TalkerGroup;
use tracing::info;

pub const PRACTICE_TRIALS: usize = 10;

const M: TalkerGroup = TalkerGroup::Male;
const F: TalkerGroup = TalkerGroup::Female;

/// Groups alternate so the listener hears both voices early.
pub const PRACTICE_GROUPS: [TalkerGroup; PRACTICE_TRIALS] = [M, F, M, F, M, F, M, F, M, F];
/// Four unmasked trials, then one masker, then two.
pub const PRACTICE_MASKER_COUNTS: [usize; PRACTICE_TRIALS] = [0, 0, 0, 0, 1, 1, 1, 1, 2, 2];
pub const PRACTICE_MASKER_LOCATIONS: [f64; PRACTICE_TRIALS] =
    [0.0, 0.0, 0.0, 0.0, 180.0, 180.0, 90.0, 0.0, 90.0, 0.0];
pub const PRACTICE_TARGET_LOCATION: f64 = 0.0;

impl<P: PermutationSource, V: StimulusResolver> Designer<P, V> {
    /// The fixed ten-trial practice deck. Talkers and answers are drawn the
    /// same way as in the main table; the order is never shuffled.
    pub fn generate_practice(&mut self) -> Result<TrialTable, DesignError> {
        let config = &self.config;
        config.check_capacity(PRACTICE_MAX_MASKERS)?;
        let hrtf_name = config
            .hrtfs
            .first()
            .ok_or(ConfigError::Empty("hrtfs"))?;

        let mut table = TrialTable::with_capacity(PRACTICE_TRIALS);
        for i in 0..PRACTICE_TRIALS {
            let cell = Cell {
                group: PRACTICE_GROUPS[i],
                masker_count: PRACTICE_MASKER_COUNTS[i],
                target_location: PRACTICE_TARGET_LOCATION,
                masker_location: PRACTICE_MASKER_LOCATIONS[i],
                hrtf_index: 0,
                hrtf_name,
            };
            table.push(draw_trial(
                config,
                &self.session_date,
                &mut self.permutations,
                &self.resolver,
                &cell,
            )?);
        }
        renumber(&mut table);

        info!(trials = table.len(), hrtf = %hrtf_name, "generated practice deck");
        Ok(table)
    }
}
