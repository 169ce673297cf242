use crm_core::{Colour, CrmNumber, Feedback, ResponseButton, SessionPhase, TrialSpec};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::{self, Write};
use thiserror::Error;

/// One committed answer, with the trial it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub phase: SessionPhase,
    pub trial_index: usize,
    pub trial: TrialSpec,
    pub response_colour: Colour,
    pub response_number: CrmNumber,
    pub response_timestamp: String,
    /// Milliseconds from the end of playback to this answer.
    pub reaction_time_ms: Option<i64>,
}

impl ResponseRecord {
    pub fn response(&self) -> ResponseButton {
        ResponseButton::new(self.response_colour, self.response_number)
    }

    pub fn feedback(&self) -> Feedback {
        Feedback::judge(self.trial.target_button(), self.response())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    #[error("cannot write response row {index}: log has {len} rows")]
    Gap { index: usize, len: usize },
}

#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Appended,
    Replaced,
}

/// Committed responses in presentation order.
///
/// Rows are only ever added at the end or overwritten in place, through
/// [`ResponseLog::append_or_replace`]; the log never has gaps and never shrinks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseLog {
    rows: Vec<ResponseRecord>,
}

const TRIAL_COLUMNS: [&str; 14] = [
    "phase",
    "trial_number",
    "subject",
    "datetime_start",
    "hrtf_index",
    "hrtf_name",
    "target_location",
    "masker_location",
    "target_talker",
    "target_callsign",
    "target_colour",
    "target_number",
    "target_stimulus",
    "masker_count",
];

const MASKER_FIELDS: [&str; 5] = ["talker", "callsign", "colour", "number", "stimulus"];

const RESPONSE_COLUMNS: [&str; 4] = [
    "response_colour",
    "response_number",
    "response_timestamp",
    "reaction_time_ms",
];

impl ResponseLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ResponseRecord> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[ResponseRecord] {
        &self.rows
    }

    /// Append when `index == len`, overwrite when `index < len`.
    pub fn append_or_replace(
        &mut self,
        index: usize,
        record: ResponseRecord,
    ) -> Result<Slot, LogError> {
        let len = self.rows.len();
        if index == len {
            self.rows.push(record);
            Ok(Slot::Appended)
        } else if let Some(row) = self.rows.get_mut(index) {
            *row = record;
            Ok(Slot::Replaced)
        } else {
            Err(LogError::Gap { index, len })
        }
    }

    /// Widest masker list in the log; decides how many masker column groups
    /// the table has.
    pub fn max_maskers(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.trial.masker_count())
            .max()
            .unwrap_or(0)
    }

    pub fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = TRIAL_COLUMNS.iter().map(|c| c.to_string()).collect();
        for m in 1..=self.max_maskers() {
            header.extend(MASKER_FIELDS.iter().map(|f| format!("masker{m}_{f}")));
        }
        header.extend(RESPONSE_COLUMNS.iter().map(|c| c.to_string()));
        header
    }

    /// Write the whole log as CSV, maskers flattened into numbered columns.
    pub fn write_csv<W: Write>(&self, mut out: W) -> io::Result<()> {
        let width = self.max_maskers();
        write_row(&mut out, self.header().iter().map(|h| h.as_str().into()))?;
        for record in &self.rows {
            write_row(&mut out, record_cells(record, width).into_iter())?;
        }
        out.flush()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_csv(&mut buf);
        buf
    }
}

fn record_cells(record: &ResponseRecord, width: usize) -> Vec<Cow<'_, str>> {
    let trial = &record.trial;
    let mut cells: Vec<Cow<'_, str>> = vec![
        record.phase.as_str().into(),
        trial.trial_number.to_string().into(),
        trial.subject.as_str().into(),
        trial.session_date.as_str().into(),
        trial.hrtf_index.to_string().into(),
        trial.hrtf_name.as_str().into(),
        trial.target_location.to_string().into(),
        trial.masker_location.to_string().into(),
        trial.target_talker.to_string().into(),
        trial.target_callsign.as_str().into(),
        trial.target_colour.as_str().into(),
        trial.target_number.to_string().into(),
        trial.target_stimulus.as_str().into(),
        trial.masker_count().to_string().into(),
    ];
    for m in 0..width {
        match trial.maskers.get(m) {
            Some(masker) => cells.extend([
                masker.talker.to_string().into(),
                masker.callsign.as_str().into(),
                masker.colour.as_str().into(),
                masker.number.to_string().into(),
                masker.stimulus.as_str().into(),
            ]),
            None => cells.extend(std::iter::repeat_n(Cow::Borrowed(""), MASKER_FIELDS.len())),
        }
    }
    cells.extend([
        record.response_colour.as_str().into(),
        record.response_number.to_string().into(),
        record.response_timestamp.as_str().into(),
        record
            .reaction_time_ms
            .map(|ms| ms.to_string())
            .unwrap_or_default()
            .into(),
    ]);
    cells
}

fn write_row<'a, W: Write>(
    out: &mut W,
    cells: impl Iterator<Item = Cow<'a, str>>,
) -> io::Result<()> {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            out.write_all(b",")?;
        }
        out.write_all(escape(&cell).as_bytes())?;
    }
    out.write_all(b"\n")
}

fn escape(cell: &str) -> Cow<'_, str> {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\"")).into()
    } else {
        cell.into()
    }
}
