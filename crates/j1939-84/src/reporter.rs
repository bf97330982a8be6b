//! Staged outcome reporting
//!
//! Outcomes and result text are staged while a module is being evaluated and
//! only reach the sink on [`StepReporter::commit`]. When a step is cancelled the
//! staged entries of the in-flight module are dropped. A packet written to the
//! results stream counts as reported only once it is committed.

use std::sync::Arc;

use j1939_core::{Outcome, OutcomeRecord, OutcomeSink, Packet, UrgentMessage};
use tracing::debug;

#[derive(Debug, Clone)]
enum Staged {
    Outcome(Outcome, String),
    Result(String),
    Packet(Packet, String),
}

/// Outcome writer for one step
pub struct StepReporter {
    part: u8,
    step: u8,
    sink: Arc<dyn OutcomeSink>,
    staged: Vec<Staged>,
    committed: Vec<OutcomeRecord>,
    reported_packets: Vec<Packet>,
}

impl StepReporter {
    pub fn new(part: u8, step: u8, sink: Arc<dyn OutcomeSink>) -> Self {
        Self {
            part,
            step,
            sink,
            staged: Vec::new(),
            committed: Vec::new(),
            reported_packets: Vec::new(),
        }
    }

    pub fn part(&self) -> u8 {
        self.part
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    /// Stage an outcome; `Pass` is dropped
    pub fn add_outcome(&mut self, outcome: Outcome, message: impl Into<String>) {
        if outcome == Outcome::Pass {
            return;
        }
        self.staged.push(Staged::Outcome(outcome, message.into()));
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.add_outcome(Outcome::Fail, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.add_outcome(Outcome::Warn, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.add_outcome(Outcome::Info, message);
    }

    /// Stage text for the results stream
    pub fn add_result(&mut self, text: impl Into<String>) {
        self.staged.push(Staged::Result(text.into()));
    }

    /// Stage the results-stream text for `packet` unless it is already staged or committed
    pub fn add_packet_result(&mut self, packet: &Packet, text: impl Into<String>) -> bool {
        if self.has_packet(packet) {
            return false;
        }
        self.staged.push(Staged::Packet(packet.clone(), text.into()));
        true
    }

    pub fn has_packet(&self, packet: &Packet) -> bool {
        self.reported_packets.contains(packet)
            || self
                .staged
                .iter()
                .any(|s| matches!(s, Staged::Packet(p, _) if p == packet))
    }

    /// Packets committed to the results stream
    pub fn reported_packets(&self) -> &[Packet] {
        &self.reported_packets
    }

    /// Progress goes straight to the sink
    pub fn progress(&self, message: &str) {
        self.sink.on_progress(message);
    }

    /// Urgent notifications go straight to the sink
    pub fn urgent(&self, message: UrgentMessage) {
        self.sink.on_urgent_message(message);
    }

    /// Whether an outcome with this exact message is staged or committed
    pub fn has_outcome(&self, outcome: Outcome, message: &str) -> bool {
        self.committed
            .iter()
            .any(|r| r.outcome == outcome && r.message == message)
            || self
                .staged
                .iter()
                .any(|s| matches!(s, Staged::Outcome(o, m) if *o == outcome && m == message))
    }

    /// Forward everything staged to the sink, in order
    pub fn commit(&mut self) {
        for entry in self.staged.drain(..) {
            match entry {
                Staged::Outcome(outcome, message) => {
                    self.sink.add_outcome(self.part, self.step, outcome, &message);
                    self.committed.push(OutcomeRecord {
                        part: self.part,
                        step: self.step,
                        outcome,
                        message,
                    });
                }
                Staged::Result(text) => self.sink.on_result(&text),
                Staged::Packet(packet, text) => {
                    self.sink.on_result(&text);
                    self.reported_packets.push(packet);
                }
            }
        }
    }

    /// Drop everything staged since the last commit
    pub fn discard(&mut self) -> usize {
        let dropped = self.staged.len();
        if dropped > 0 {
            debug!(part = self.part, step = self.step, dropped, "Discarding staged outcomes");
        }
        self.staged.clear();
        dropped
    }

    /// Outcomes already forwarded to the sink
    pub fn committed(&self) -> &[OutcomeRecord] {
        &self.committed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use j1939_core::RecordingSink;

    #[test]
    fn test_commit_forwards_in_order() {
        let sink = Arc::new(RecordingSink::new());
        let mut reporter = StepReporter::new(1, 3, sink.clone());
        reporter.warn("6.1.3.3.a - first");
        reporter.add_result("table");
        reporter.fail("6.1.3.2.b - second");
        reporter.add_outcome(Outcome::Pass, "ignored");
        assert!(sink.outcomes().is_empty());

        reporter.commit();
        let outcomes = sink.outcomes();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].message, "6.1.3.3.a - first");
        assert_eq!(outcomes[1].outcome, Outcome::Fail);
        assert_eq!(sink.results(), vec!["table".to_string()]);
        assert_eq!(reporter.committed().len(), 2);
    }

    #[test]
    fn test_discard_drops_staged_only() {
        let sink = Arc::new(RecordingSink::new());
        let mut reporter = StepReporter::new(1, 3, sink.clone());
        reporter.info("6.1.3.4.b - kept");
        reporter.commit();
        reporter.fail("6.1.3.4.a - dropped");
        assert_eq!(reporter.discard(), 1);
        reporter.commit();

        assert_eq!(sink.messages(Outcome::Info), vec!["6.1.3.4.b - kept".to_string()]);
        assert_eq!(sink.count(Outcome::Fail), 0);
    }

    #[test]
    fn test_discarded_packet_can_be_reported_again() {
        let sink = Arc::new(RecordingSink::new());
        let mut reporter = StepReporter::new(1, 26, sink.clone());
        let packet = Packet::new(65253, 0x00, vec![0xFF; 8]);

        assert!(reporter.add_packet_result(&packet, "HOURS"));
        assert!(!reporter.add_packet_result(&packet, "HOURS"));
        assert_eq!(reporter.discard(), 1);
        assert!(!reporter.has_packet(&packet));
        assert!(reporter.reported_packets().is_empty());

        assert!(reporter.add_packet_result(&packet, "HOURS"));
        reporter.commit();
        assert!(!reporter.add_packet_result(&packet, "HOURS"));
        assert_eq!(reporter.reported_packets(), &[packet]);
        assert_eq!(sink.results(), vec!["HOURS".to_string()]);
    }

    #[test]
    fn test_has_outcome() {
        let sink = Arc::new(RecordingSink::new());
        let mut reporter = StepReporter::new(2, 8, sink);
        reporter.warn("a");
        assert!(reporter.has_outcome(Outcome::Warn, "a"));
        reporter.commit();
        assert!(reporter.has_outcome(Outcome::Warn, "a"));
        assert!(!reporter.has_outcome(Outcome::Fail, "a"));
    }
}
