use crate::config::{ConfigError, ExperimentConfig};
use crate::permute::{PermutationSource, permuted, reorder};
use crate::resolver::{ResolveError, StimulusResolver};
use crm_core::{MaskerSpec, TalkerGroup, TrialSpec};
use thiserror::Error;
use tracing::{debug, info};

pub type TrialTable = Vec<TrialSpec>;

#[derive(Debug, Error)]
pub enum DesignError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    MissingStimulus(#[from] ResolveError),
}

/// Where a session gets its trial tables from.
pub trait DesignSource {
    fn practice_table(&mut self) -> Result<TrialTable, DesignError>;
    fn main_table(&mut self) -> Result<TrialTable, DesignError>;
}

/// The factorial cell a trial is drawn for.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cell<'a> {
    pub group: TalkerGroup,
    pub masker_count: usize,
    pub target_location: f64,
    pub masker_location: f64,
    pub hrtf_index: usize,
    pub hrtf_name: &'a str,
}

/// Builds balanced, randomized trial tables from a validated configuration.
pub struct Designer<P, V> {
    pub(crate) config: ExperimentConfig,
    pub(crate) session_date: String,
    pub(crate) permutations: P,
    pub(crate) resolver: V,
}

impl<P: PermutationSource, V: StimulusResolver> Designer<P, V> {
    pub fn new(
        config: ExperimentConfig,
        session_date: impl Into<String>,
        permutations: P,
        resolver: V,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            session_date: session_date.into(),
            permutations,
            resolver,
        })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// The main table: every (gender group, target location, masker location,
    /// HRTF) cell once per repeat. Each repeat is shuffled on its own, blocks
    /// are concatenated in order, then trials are numbered `0..N`.
    pub fn generate(&mut self) -> Result<TrialTable, DesignError> {
        let config = &self.config;
        config.check_capacity(config.number_of_maskers)?;

        let mut table = TrialTable::with_capacity(config.main_trial_count());
        for block in 0..config.repeats {
            let mut trials = Vec::new();
            for group in TalkerGroup::ALL {
                for &target_location in &config.target_locations {
                    for &masker_location in &config.masker_locations {
                        for (hrtf_index, hrtf_name) in config.hrtfs.iter().enumerate() {
                            let cell = Cell {
                                group,
                                masker_count: config.number_of_maskers,
                                target_location,
                                masker_location,
                                hrtf_index,
                                hrtf_name,
                            };
                            trials.push(draw_trial(
                                config,
                                &self.session_date,
                                &mut self.permutations,
                                &self.resolver,
                                &cell,
                            )?);
                        }
                    }
                }
            }
            let order = self.permutations.permutation(trials.len());
            debug!(block, trials = trials.len(), "block shuffled");
            table.extend(reorder(trials, &order));
        }
        renumber(&mut table);

        info!(trials = table.len(), "generated main trial table");
        Ok(table)
    }
}

impl<P: PermutationSource, V: StimulusResolver> DesignSource for Designer<P, V> {
    fn practice_table(&mut self) -> Result<TrialTable, DesignError> {
        self.generate_practice()
    }

    fn main_table(&mut self) -> Result<TrialTable, DesignError> {
        self.generate()
    }
}

/// Assign `trial_number` densely in table order.
pub fn renumber(table: &mut [TrialSpec]) {
    for (i, trial) in table.iter_mut().enumerate() {
        trial.trial_number = i;
    }
}

/// Draw one trial: talkers from the cell's gender group, colours, numbers and
/// masker call signs each from an independent permutation. Index 0 goes to
/// the target, so no two talkers in a trial share a talker or an answer.
pub(crate) fn draw_trial<P: PermutationSource, V: StimulusResolver>(
    config: &ExperimentConfig,
    session_date: &str,
    permutations: &mut P,
    resolver: &V,
    cell: &Cell<'_>,
) -> Result<TrialSpec, DesignError> {
    config.check_capacity(cell.masker_count)?;

    let talkers = permuted(permutations, config.talkers(cell.group));
    let colours = permuted(permutations, &config.colours);
    let numbers = permuted(permutations, &config.numbers);
    let callsigns = permuted(permutations, &config.crm_callsigns);

    let target_stimulus = resolver.resolve(
        talkers[0],
        &config.target_callsign,
        colours[0],
        numbers[0],
    )?;

    let maskers = (1..=cell.masker_count)
        .map(|i| {
            let callsign = callsigns[i - 1].clone();
            let stimulus = resolver.resolve(talkers[i], &callsign, colours[i], numbers[i])?;
            Ok(MaskerSpec {
                talker: talkers[i],
                callsign,
                colour: colours[i],
                number: numbers[i],
                stimulus,
            })
        })
        .collect::<Result<Vec<_>, ResolveError>>()?;

    Ok(TrialSpec {
        trial_number: 0,
        subject: config.subject.clone(),
        session_date: session_date.to_string(),
        hrtf_index: cell.hrtf_index,
        hrtf_name: cell.hrtf_name.to_string(),
        talker_group: cell.group,
        target_location: cell.target_location,
        masker_location: cell.masker_location,
        target_talker: talkers[0],
        target_callsign: config.target_callsign.clone(),
        target_colour: colours[0],
        target_number: numbers[0],
        target_stimulus,
        maskers,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::permute::RandomPermutations;
    use crm_core::{Colour, CrmNumber, StimulusId, Talker};
    use std::collections::HashSet;

    /// Resolves every phrase to a readable id.
    pub(crate) struct NamingResolver;

    impl StimulusResolver for NamingResolver {
        fn resolve(
            &self,
            talker: Talker,
            callsign: &str,
            colour: Colour,
            number: CrmNumber,
        ) -> Result<StimulusId, ResolveError> {
            Ok(StimulusId::new(format!("T{talker}/{callsign}_{colour}_{number}")))
        }
    }

    /// Has no recordings for one call sign.
    struct MissingCallsign(&'static str);

    impl StimulusResolver for MissingCallsign {
        fn resolve(
            &self,
            talker: Talker,
            callsign: &str,
            colour: Colour,
            number: CrmNumber,
        ) -> Result<StimulusId, ResolveError> {
            if callsign == self.0 {
                return Err(ResolveError {
                    talker,
                    callsign: callsign.to_string(),
                    colour,
                    number,
                    source: None,
                });
            }
            NamingResolver.resolve(talker, callsign, colour, number)
        }
    }

    pub(crate) fn small_config() -> ExperimentConfig {
        ExperimentConfig {
            repeats: 1,
            target_locations: vec![0.0, 90.0],
            masker_locations: vec![180.0],
            hrtfs: vec!["h0".into()],
            number_of_maskers: 1,
            practice: false,
            ..ExperimentConfig::default()
        }
    }

    fn designer(
        config: ExperimentConfig,
        seed: u64,
    ) -> Designer<RandomPermutations<rand::rngs::StdRng>, NamingResolver> {
        Designer::new(
            config,
            "2025-11-19_10-00-00",
            RandomPermutations::seeded(seed),
            NamingResolver,
        )
        .unwrap()
    }

    #[test]
    fn small_design_has_four_single_masker_trials() {
        let table = designer(small_config(), 1).generate().unwrap();
        assert_eq!(table.len(), 4);
        assert!(table.iter().all(|t| t.masker_count() == 1));
        assert!(table.iter().all(|t| t.masker_location == 180.0));
    }

    #[test]
    fn table_size_is_full_factorial() {
        let config = ExperimentConfig {
            repeats: 3,
            target_locations: vec![0.0, 45.0],
            masker_locations: vec![0.0, 90.0, 180.0],
            hrtfs: vec!["a".into(), "b".into()],
            ..small_config()
        };
        let table = designer(config, 5).generate().unwrap();
        assert_eq!(table.len(), 3 * 2 * 2 * 3 * 2);
        let numbers: Vec<usize> = table.iter().map(|t| t.trial_number).collect();
        assert_eq!(numbers, (0..table.len()).collect::<Vec<_>>());
    }

    #[test]
    fn trials_never_repeat_talker_or_answer() {
        let config = ExperimentConfig {
            repeats: 2,
            number_of_maskers: 3,
            ..small_config()
        };
        for trial in designer(config, 11).generate().unwrap() {
            let talkers: HashSet<_> = trial.talkers().collect();
            assert_eq!(talkers.len(), 4);
            let pairs: HashSet<_> = trial.spoken_pairs().collect();
            assert_eq!(pairs.len(), 4);
            assert_eq!(trial.target_callsign, "baron");
            assert!(trial.maskers.iter().all(|m| m.callsign != "baron"));
        }
    }

    #[test]
    fn talkers_stay_within_one_gender_group() {
        let config = small_config();
        for trial in designer(config.clone(), 2).generate().unwrap() {
            let group = config.talkers(trial.talker_group);
            assert!(trial.talkers().all(|t| group.contains(&t)));
        }
    }

    #[test]
    fn blocks_are_shuffled_separately() {
        let config = ExperimentConfig {
            repeats: 4,
            ..small_config()
        };
        let table = designer(config, 9).generate().unwrap();
        for block in table.chunks(4) {
            let mut cells: Vec<_> = block
                .iter()
                .map(|t| (t.talker_group.as_str(), t.target_location as i64))
                .collect();
            cells.sort();
            assert_eq!(cells, vec![("F", 0), ("F", 90), ("M", 0), ("M", 90)]);
        }
    }

    #[test]
    fn same_seed_same_table() {
        let a = designer(small_config(), 1234).generate().unwrap();
        let b = designer(small_config(), 1234).generate().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unresolved_stimulus_is_reported() {
        let mut designer = Designer::new(
            small_config(),
            "today",
            RandomPermutations::seeded(0),
            MissingCallsign("baron"),
        )
        .unwrap();
        let err = designer.generate().unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("no stimulus for talker "), "{message}");
        assert!(message.contains("call sign \"baron\""), "{message}");
        match err {
            DesignError::MissingStimulus(e) => assert_eq!(e.callsign, "baron"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn designer_rejects_invalid_config() {
        let config = ExperimentConfig {
            hrtfs: vec![],
            ..small_config()
        };
        assert!(
            Designer::new(config, "today", RandomPermutations::seeded(0), NamingResolver).is_err()
        );
    }
}
