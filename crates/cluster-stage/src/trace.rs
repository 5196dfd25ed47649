//! StageTrace — A recorded sequence of stage events
//!
//! A trace captures the full timeline of a session or a single spin.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::StageEvent;
use crate::stage::{Stage, StageCategory};

/// A complete trace of stage events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTrace {
    /// Unique identifier for this trace
    pub trace_id: String,

    /// All events in emission order
    pub events: Vec<StageEvent>,

    /// When this trace was started
    pub recorded_at: DateTime<Utc>,
}

impl StageTrace {
    /// Create a new empty trace
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            events: Vec::new(),
            recorded_at: Utc::now(),
        }
    }

    /// Add an event to the trace
    pub fn push(&mut self, event: StageEvent) {
        self.events.push(event);
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get total duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => last.timestamp_ms - first.timestamp_ms,
            _ => 0.0,
        }
    }

    /// Get events by category
    pub fn events_by_category(&self, category: StageCategory) -> Vec<&StageEvent> {
        self.events
            .iter()
            .filter(|e| e.stage.category() == category)
            .collect()
    }

    /// Get events by stage type name
    pub fn events_by_type(&self, type_name: &str) -> Vec<&StageEvent> {
        self.events
            .iter()
            .filter(|e| e.stage.type_name() == type_name)
            .collect()
    }

    /// Count events of a stage type
    pub fn count(&self, type_name: &str) -> usize {
        self.events
            .iter()
            .filter(|e| e.stage.type_name() == type_name)
            .count()
    }

    /// Check if trace contains a specific stage type
    pub fn has_stage(&self, type_name: &str) -> bool {
        self.events.iter().any(|e| e.stage.type_name() == type_name)
    }

    /// Events belonging to one spin
    pub fn spin(&self, spin_index: u64) -> Vec<&StageEvent> {
        self.events
            .iter()
            .filter(|e| e.spin_index == spin_index)
            .collect()
    }

    /// Stage type names in order, for sequence assertions
    pub fn type_sequence(&self) -> Vec<&'static str> {
        self.events.iter().map(|e| e.stage.type_name()).collect()
    }

    /// Sum of settled wins across the trace
    pub fn total_settled_win(&self) -> f64 {
        self.events
            .iter()
            .filter_map(|e| match e.stage {
                Stage::SpinSettled { total_win, .. } => Some(total_win),
                _ => None,
            })
            .sum()
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settled(win: f64) -> Stage {
        Stage::SpinSettled {
            total_win: win,
            win_ratio: win,
            tier: None,
        }
    }

    #[test]
    fn test_trace_queries() {
        let mut trace = StageTrace::new("t-1");
        trace.push(StageEvent::new(
            Stage::AutoplayStart {
                remaining: 2,
                free_spins: false,
            },
            0,
            0.0,
        ));
        trace.push(StageEvent::new(settled(1.5), 1, 100.0));
        trace.push(StageEvent::new(settled(0.0), 2, 250.0));

        assert_eq!(trace.len(), 3);
        assert_eq!(trace.count("spin_settled"), 2);
        assert!(trace.has_stage("autoplay_start"));
        assert!(!trace.has_stage("bonus_entered"));
        assert_eq!(trace.spin(2).len(), 1);
        assert_eq!(trace.duration_ms(), 250.0);
        assert!((trace.total_settled_win() - 1.5).abs() < 1e-9);
        assert_eq!(
            trace.type_sequence(),
            vec!["autoplay_start", "spin_settled", "spin_settled"]
        );
    }

    #[test]
    fn test_trace_json() {
        let mut trace = StageTrace::new("t-2");
        trace.push(StageEvent::new(Stage::WinOverlayClosed, 1, 5.0));
        let json = trace.to_json().unwrap();
        let back: StageTrace = serde_json::from_str(&json).unwrap();
        assert_eq!(back.events, trace.events);
    }
}
