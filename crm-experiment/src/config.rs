use crm_core::{Colour, CrmNumber, Talker, TalkerGroup};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Maskers used by the last practice trials.
pub const PRACTICE_MAX_MASKERS: usize = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config")]
    Parse(#[from] serde_json::Error),
    #[error("`repeats` must be at least 1")]
    NoRepeats,
    #[error("`{0}` must not be empty")]
    Empty(&'static str),
    #[error(
        "{group:?} talker group has {have} talkers, {need} needed for a target and its maskers"
    )]
    TooFewTalkers {
        group: TalkerGroup,
        have: usize,
        need: usize,
    },
    #[error("`{field}` lists {value} more than once")]
    DuplicateEntry { field: &'static str, value: String },
    #[error("talker {0} is listed in both gender groups")]
    OverlappingTalkers(Talker),
    #[error("{have} masker call signs configured, {need} needed")]
    TooFewCallsigns { have: usize, need: usize },
    #[error("target call sign {0:?} also appears in the masker call signs")]
    TargetCallsignInRoster(String),
    #[error("{have} colours configured, {need} needed so every talker says a different one")]
    TooFewColours { have: usize, need: usize },
    #[error("{have} numbers configured, {need} needed so every talker says a different one")]
    TooFewNumbers { have: usize, need: usize },
    #[error("`sound_duration_estimate_s` must be a positive number of seconds, got {0}")]
    BadSoundDuration(f64),
}

fn default_test() -> String {
    "srm_crm".to_string()
}

fn default_target_callsign() -> String {
    "baron".to_string()
}

fn default_male_talkers() -> Vec<Talker> {
    (0..4).map(Talker).collect()
}

fn default_female_talkers() -> Vec<Talker> {
    (4..8).map(Talker).collect()
}

fn default_colours() -> Vec<Colour> {
    Colour::ALL.to_vec()
}

fn default_numbers() -> Vec<CrmNumber> {
    (1..=7).filter_map(CrmNumber::new).collect()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_stimulus_dir() -> PathBuf {
    PathBuf::from("stimuli")
}

fn default_sound_duration() -> f64 {
    3.0
}

/// Parameters of one listening session, read from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub subject: String,
    #[serde(default = "default_test")]
    pub test: String,
    #[serde(default)]
    pub practice: bool,
    pub repeats: usize,
    pub target_locations: Vec<f64>,
    pub masker_locations: Vec<f64>,
    pub hrtfs: Vec<String>,
    pub number_of_maskers: usize,
    pub crm_callsigns: Vec<String>,
    #[serde(default = "default_target_callsign")]
    pub target_callsign: String,
    #[serde(default = "default_male_talkers")]
    pub male_talkers: Vec<Talker>,
    #[serde(default = "default_female_talkers")]
    pub female_talkers: Vec<Talker>,
    #[serde(default = "default_colours")]
    pub colours: Vec<Colour>,
    #[serde(default = "default_numbers")]
    pub numbers: Vec<CrmNumber>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_stimulus_dir")]
    pub stimulus_dir: PathBuf,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Start the main phase with an empty response log instead of keeping
    /// the practice rows ahead of it.
    #[serde(default)]
    pub clear_log_after_practice: bool,
    #[serde(default = "default_sound_duration")]
    pub sound_duration_estimate_s: f64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            subject: "anonymous".to_string(),
            test: default_test(),
            practice: true,
            repeats: 1,
            target_locations: vec![0.0],
            masker_locations: vec![0.0, 90.0, 180.0],
            hrtfs: vec!["default".to_string()],
            number_of_maskers: 2,
            crm_callsigns: ["arrow", "charlie", "eagle", "hopper", "laker", "ringo", "tiger"]
                .into_iter()
                .map(String::from)
                .collect(),
            target_callsign: default_target_callsign(),
            male_talkers: default_male_talkers(),
            female_talkers: default_female_talkers(),
            colours: default_colours(),
            numbers: default_numbers(),
            data_dir: default_data_dir(),
            stimulus_dir: default_stimulus_dir(),
            seed: None,
            clear_log_after_practice: false,
            sound_duration_estimate_s: default_sound_duration(),
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn talkers(&self, group: TalkerGroup) -> &[Talker] {
        match group {
            TalkerGroup::Male => &self.male_talkers,
            TalkerGroup::Female => &self.female_talkers,
        }
    }

    /// Largest masker count any generated trial will need.
    pub fn max_maskers(&self) -> usize {
        if self.practice {
            self.number_of_maskers.max(PRACTICE_MAX_MASKERS)
        } else {
            self.number_of_maskers
        }
    }

    /// Trials in the main table.
    pub fn main_trial_count(&self) -> usize {
        self.repeats
            * TalkerGroup::ALL.len()
            * self.target_locations.len()
            * self.masker_locations.len()
            * self.hrtfs.len()
    }

    /// `<data_dir>/<test>/<stamp>_<subject>_<test>.csv`
    pub fn log_path(&self, stamp: &str) -> PathBuf {
        self.data_dir
            .join(&self.test)
            .join(format!("{stamp}_{}_{}.csv", self.subject, self.test))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repeats == 0 {
            return Err(ConfigError::NoRepeats);
        }
        if self.target_locations.is_empty() {
            return Err(ConfigError::Empty("target_locations"));
        }
        if self.masker_locations.is_empty() {
            return Err(ConfigError::Empty("masker_locations"));
        }
        if self.hrtfs.is_empty() {
            return Err(ConfigError::Empty("hrtfs"));
        }
        if self.crm_callsigns.iter().any(|c| c == &self.target_callsign) {
            return Err(ConfigError::TargetCallsignInRoster(
                self.target_callsign.clone(),
            ));
        }
        first_duplicate("male_talkers", &self.male_talkers)?;
        first_duplicate("female_talkers", &self.female_talkers)?;
        first_duplicate("colours", &self.colours)?;
        first_duplicate("numbers", &self.numbers)?;
        first_duplicate("crm_callsigns", &self.crm_callsigns)?;
        let males: HashSet<Talker> = self.male_talkers.iter().copied().collect();
        if let Some(&shared) = self.female_talkers.iter().find(|t| males.contains(t)) {
            return Err(ConfigError::OverlappingTalkers(shared));
        }
        if !(self.sound_duration_estimate_s.is_finite() && self.sound_duration_estimate_s > 0.0) {
            return Err(ConfigError::BadSoundDuration(self.sound_duration_estimate_s));
        }
        self.check_capacity(self.max_maskers())
    }

    /// Whether rosters are large enough to draw a target plus `maskers`
    /// distinct talkers, call signs, colours and numbers.
    pub fn check_capacity(&self, maskers: usize) -> Result<(), ConfigError> {
        let need = maskers + 1;
        for group in TalkerGroup::ALL {
            let have = self.talkers(group).len();
            if have < need {
                return Err(ConfigError::TooFewTalkers { group, have, need });
            }
        }
        if self.crm_callsigns.len() < maskers {
            return Err(ConfigError::TooFewCallsigns {
                have: self.crm_callsigns.len(),
                need: maskers,
            });
        }
        if self.colours.len() < need {
            return Err(ConfigError::TooFewColours {
                have: self.colours.len(),
                need,
            });
        }
        if self.numbers.len() < need {
            return Err(ConfigError::TooFewNumbers {
                have: self.numbers.len(),
                need,
            });
        }
        Ok(())
    }
}

/// Rosters are drawn from without replacement, so a repeated entry would let
/// two talkers in one trial share a talker, colour, number or call sign.
fn first_duplicate<T>(field: &'static str, items: &[T]) -> Result<(), ConfigError>
where
    T: Eq + Hash + fmt::Display,
{
    let mut seen = HashSet::new();
    match items.iter().find(|item| !seen.insert(*item)) {
        Some(item) => Err(ConfigError::DuplicateEntry {
            field,
            value: item.to_string(),
        }),
        None => Ok(()),
    }
}
