//! Step outcomes and the sink they are reported to

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Result of a single rule evaluation
///
/// `Pass` is never recorded; it exists so rule helpers can return a uniform type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Pass,
    Info,
    Warn,
    Fail,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => write!(f, "PASS"),
            Outcome::Info => write!(f, "INFO"),
            Outcome::Warn => write!(f, "WARN"),
            Outcome::Fail => write!(f, "FAIL"),
        }
    }
}

/// One recorded outcome, tagged with the procedure part and step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub part: u8,
    pub step: u8,
    pub outcome: Outcome,
    /// Clause-prefixed message, e.g. "6.1.3.2.a - ..."
    pub message: String,
}

impl fmt::Display for OutcomeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.outcome, self.message)
    }
}

/// Out-of-band notification that needs operator attention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrgentMessage {
    pub message: String,
    pub title: String,
    pub severity: Outcome,
    pub context: String,
}

/// Receives everything a step produces
///
/// Outcomes are append-only; implementations must keep them in arrival order.
pub trait OutcomeSink: Send + Sync {
    fn add_outcome(&self, part: u8, step: u8, outcome: Outcome, message: &str);

    /// A line of the plain-text results stream
    fn on_result(&self, line: &str);

    /// Progress text, e.g. "Requesting DM5 from Engine #1 (0)"
    fn on_progress(&self, message: &str);

    fn on_urgent_message(&self, message: UrgentMessage);
}

#[derive(Debug, Default)]
struct Recorded {
    outcomes: Vec<OutcomeRecord>,
    results: Vec<String>,
    progress: Vec<String>,
    urgent: Vec<UrgentMessage>,
}

/// In-memory sink that keeps everything it is given
#[derive(Debug, Default)]
pub struct RecordingSink {
    recorded: Mutex<Recorded>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(&self) -> Vec<OutcomeRecord> {
        self.recorded.lock().outcomes.clone()
    }

    /// Messages of all outcomes of the given kind, in order
    pub fn messages(&self, outcome: Outcome) -> Vec<String> {
        self.recorded
            .lock()
            .outcomes
            .iter()
            .filter(|r| r.outcome == outcome)
            .map(|r| r.message.clone())
            .collect()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.recorded.lock().outcomes.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn results(&self) -> Vec<String> {
        self.recorded.lock().results.clone()
    }

    /// The results stream joined with newlines
    pub fn results_text(&self) -> String {
        let recorded = self.recorded.lock();
        let mut text = String::new();
        for line in &recorded.results {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    pub fn progress(&self) -> Vec<String> {
        self.recorded.lock().progress.clone()
    }

    pub fn urgent_messages(&self) -> Vec<UrgentMessage> {
        self.recorded.lock().urgent.clone()
    }
}

impl OutcomeSink for RecordingSink {
    fn add_outcome(&self, part: u8, step: u8, outcome: Outcome, message: &str) {
        if outcome == Outcome::Pass {
            return;
        }
        self.recorded.lock().outcomes.push(OutcomeRecord {
            part,
            step,
            outcome,
            message: message.to_string(),
        });
    }

    fn on_result(&self, line: &str) {
        self.recorded.lock().results.push(line.to_string());
    }

    fn on_progress(&self, message: &str) {
        self.recorded.lock().progress.push(message.to_string());
    }

    fn on_urgent_message(&self, message: UrgentMessage) {
        self.recorded.lock().urgent.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_is_not_recorded() {
        let sink = RecordingSink::new();
        sink.add_outcome(1, 3, Outcome::Pass, "6.1.3.2.a - nothing");
        sink.add_outcome(1, 3, Outcome::Warn, "6.1.3.3.a - something");
        assert_eq!(sink.outcomes().len(), 1);
        assert_eq!(sink.count(Outcome::Warn), 1);
        assert_eq!(sink.outcomes()[0].to_string(), "WARN: 6.1.3.3.a - something");
    }

    #[test]
    fn test_results_text() {
        let sink = RecordingSink::new();
        sink.on_result("Vehicle Composite of DM5:");
        sink.on_result("");
        assert_eq!(sink.results_text(), "Vehicle Composite of DM5:\n\n");
    }

    #[test]
    fn test_outcome_ordering() {
        assert!(Outcome::Fail > Outcome::Warn);
        assert!(Outcome::Warn > Outcome::Info);
    }
}
