pub mod config;
pub mod design;
pub mod log;
pub mod permute;
pub mod practice;
pub mod render;
pub mod resolver;
pub mod session;
pub mod sink;
pub mod state;

pub use config::{ConfigError, ExperimentConfig};
pub use design::{DesignError, DesignSource, Designer, TrialTable};
pub use log::{LogError, ResponseLog, ResponseRecord, Slot};
pub use permute::{PermutationSource, RandomPermutations};
pub use practice::PRACTICE_TRIALS;
pub use render::{
    PlaybackTicket, RenderError, RenderPayload, RenderRequest, Renderer, SourcePlacement,
};
pub use resolver::{DirectoryResolver, ResolveError, StimulusResolver};
pub use session::{SessionState, SessionStatus};
pub use sink::{CsvFileSink, LogSink, PersistError};
pub use state::{SessionController, SessionError, SessionEvent, SubmitOutcome};
