// SPDX-License-Identifier: MIT

//! Output channels a filter emits on

use std::collections::BTreeMap;

/// Primary channel: signals that satisfy the conditions
pub const DEFAULT_OUTPUT: &str = "default";

/// Secondary channel: signals that do not
pub const FALSE_OUTPUT: &str = "false";

/// Downstream receiver of emitted batches.
///
/// Only non-empty batches are ever delivered.
pub trait SignalSink<S> {
    fn notify_signals(&mut self, signals: Vec<S>, output: &str);
}

impl<S, F> SignalSink<S> for F
where
    F: FnMut(Vec<S>, &str),
{
    fn notify_signals(&mut self, signals: Vec<S>, output: &str) {
        self(signals, output)
    }
}

/// Sink that records every notification, in order
#[derive(Debug, Clone)]
pub struct CollectingSink<S> {
    notifications: Vec<(String, Vec<S>)>,
}

impl<S> CollectingSink<S> {
    pub fn new() -> Self {
        Self {
            notifications: Vec::new(),
        }
    }

    /// Every `(output, batch)` pair received so far
    pub fn notifications(&self) -> &[(String, Vec<S>)] {
        &self.notifications
    }

    /// Number of notifications received on `output`
    pub fn notification_count(&self, output: &str) -> usize {
        self.notifications
            .iter()
            .filter(|(name, _)| name == output)
            .count()
    }

    /// Signals received on `output`, across all notifications
    pub fn signals(&self, output: &str) -> Vec<&S> {
        self.notifications
            .iter()
            .filter(|(name, _)| name == output)
            .flat_map(|(_, batch)| batch.iter())
            .collect()
    }

    /// Number of signals received on `output`
    pub fn signal_count(&self, output: &str) -> usize {
        self.notifications
            .iter()
            .filter(|(name, _)| name == output)
            .map(|(_, batch)| batch.len())
            .sum()
    }

    /// Signals grouped by output, concatenated in arrival order
    pub fn into_outputs(self) -> BTreeMap<String, Vec<S>> {
        let mut outputs: BTreeMap<String, Vec<S>> = BTreeMap::new();
        for (name, batch) in self.notifications {
            outputs.entry(name).or_default().extend(batch);
        }
        outputs
    }
}

impl<S> Default for CollectingSink<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> SignalSink<S> for CollectingSink<S> {
    fn notify_signals(&mut self, signals: Vec<S>, output: &str) {
        self.notifications.push((output.to_string(), signals));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_counts() {
        let mut sink = CollectingSink::new();
        sink.notify_signals(vec![1, 2], DEFAULT_OUTPUT);
        sink.notify_signals(vec![3], FALSE_OUTPUT);
        sink.notify_signals(vec![4], DEFAULT_OUTPUT);

        assert_eq!(sink.notification_count(DEFAULT_OUTPUT), 2);
        assert_eq!(sink.signal_count(DEFAULT_OUTPUT), 3);
        assert_eq!(sink.signals(FALSE_OUTPUT), vec![&3]);
        assert_eq!(sink.signal_count("other"), 0);
    }

    #[test]
    fn test_into_outputs() {
        let mut sink = CollectingSink::new();
        sink.notify_signals(vec!["a"], DEFAULT_OUTPUT);
        sink.notify_signals(vec!["b"], DEFAULT_OUTPUT);

        let outputs = sink.into_outputs();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[DEFAULT_OUTPUT], vec!["a", "b"]);
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |batch: Vec<i32>, output: &str| seen.push((output.to_string(), batch.len()));
            sink.notify_signals(vec![1, 2, 3], FALSE_OUTPUT);
        }
        assert_eq!(seen, vec![("false".to_string(), 3)]);
    }
}
