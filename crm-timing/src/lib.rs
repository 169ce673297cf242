mod clock;

pub use clock::{format_stamp, Clock, ManualClock, SystemClock, STAMP_FORMAT};
