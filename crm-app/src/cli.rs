use clap::Parser;
use crm_experiment::ExperimentConfig;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "crm",
    about = "Spatial release from masking experiment with the Coordinated Response Measure",
    version
)]
pub struct Args {
    /// Experiment configuration (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Seed for trial randomization; drawn at random and logged when absent.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Participant id, overriding the configuration.
    #[arg(long)]
    pub subject: Option<String>,

    /// Skip the practice deck.
    #[arg(long)]
    pub no_practice: bool,
}

impl Args {
    /// Command-line values win over the file.
    pub fn apply(&self, config: &mut ExperimentConfig) {
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(subject) = &self.subject {
            config.subject = subject.clone();
        }
        if self.no_practice {
            config.practice = false;
        }
    }
}
