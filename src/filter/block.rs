// SPDX-License-Identifier: MIT

//! The filter block: partitions a batch of signals by its conditions
//!
//! Each signal is checked against the compiled conditions in declared order
//! and combined with the configured operator, short-circuiting as soon as the
//! outcome is known. A condition that fails to evaluate counts as `false` and
//! is logged; it never aborts the batch.

use serde::Serialize;

use super::condition_set::{CompiledCondition, ConditionSet};
use super::config::FilterConfig;
use super::output::{SignalSink, DEFAULT_OUTPUT, FALSE_OUTPUT};
use super::policy::CombinationPolicy;
use super::signal::AttributeLookup;
use crate::error::ConfigError;

/// Per-batch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub received: usize,
    pub passed: usize,
    pub failed: usize,
    /// Condition evaluations actually performed (after short-circuiting)
    pub evaluations: usize,
    /// Evaluations that raised an error and were counted as false
    pub evaluation_failures: usize,
}

/// Result of partitioning one batch
#[derive(Debug, Clone)]
pub struct Partition<S> {
    pub passed: Vec<S>,
    pub failed: Vec<S>,
    pub summary: BatchSummary,
}

/// A configured filter, immutable once built
#[derive(Debug, Clone)]
pub struct Filter {
    config: FilterConfig,
    conditions: ConditionSet,
}

impl Filter {
    /// Compile a configuration into a filter
    pub fn new(config: FilterConfig) -> Result<Self, ConfigError> {
        let conditions = ConditionSet::from_defs(&config.conditions)?;
        log::debug!(
            "Filter configured with {} conditions, operator {}",
            conditions.len(),
            config.operator
        );
        Ok(Self { config, conditions })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn operator(&self) -> CombinationPolicy {
        self.config.operator
    }

    pub fn conditions(&self) -> &ConditionSet {
        &self.conditions
    }

    /// Split a batch into (passed, failed), preserving relative order
    pub fn partition<S>(&self, signals: Vec<S>) -> Partition<S>
    where
        S: AttributeLookup,
    {
        let mut summary = BatchSummary {
            received: signals.len(),
            ..BatchSummary::default()
        };

        if self.conditions.is_empty() {
            summary.passed = signals.len();
            return Partition {
                passed: signals,
                failed: Vec::new(),
                summary,
            };
        }

        log::debug!("Filtering on an {} condition", self.operator());
        let mut passed = Vec::new();
        let mut failed = Vec::new();
        for signal in signals {
            if self.check(&signal, &mut summary) {
                passed.push(signal);
            } else {
                failed.push(signal);
            }
        }

        summary.passed = passed.len();
        summary.failed = failed.len();
        Partition {
            passed,
            failed,
            summary,
        }
    }

    /// Partition a batch and emit each non-empty side on its channel.
    ///
    /// Passing signals go to `default`, the rest to `false`.
    pub fn process_signals<S, K>(&self, signals: Vec<S>, sink: &mut K) -> BatchSummary
    where
        S: AttributeLookup,
        K: SignalSink<S> + ?Sized,
    {
        log::debug!("Ready to process {} signals", signals.len());
        let Partition {
            passed,
            failed,
            summary,
        } = self.partition(signals);

        log::debug!("Emitting {} true signals", passed.len());
        if !passed.is_empty() {
            sink.notify_signals(passed, DEFAULT_OUTPUT);
        }

        log::debug!("Emitting {} false signals", failed.len());
        if !failed.is_empty() {
            sink.notify_signals(failed, FALSE_OUTPUT);
        }

        if summary.evaluation_failures > 0 {
            log::warn!(
                "{} condition evaluations failed in a batch of {} signals",
                summary.evaluation_failures,
                summary.received
            );
        }
        summary
    }

    /// Whether one signal passes under the configured operator
    fn check<S>(&self, signal: &S, summary: &mut BatchSummary) -> bool
    where
        S: AttributeLookup,
    {
        let mut evaluated = 0;
        let results = self.conditions.iter().map(|condition| {
            evaluated += 1;
            self.eval_condition(condition, signal, summary)
        });
        let pass = self.operator().combine(results);

        if evaluated < self.conditions.len() {
            log::debug!(
                "Short circuiting {} after {} of {} conditions",
                self.operator(),
                evaluated,
                self.conditions.len()
            );
        }
        summary.evaluations += evaluated;
        pass
    }

    /// Evaluate one condition, turning failure into `false`
    fn eval_condition<S>(
        &self,
        condition: &CompiledCondition,
        signal: &S,
        summary: &mut BatchSummary,
    ) -> bool
    where
        S: AttributeLookup,
    {
        match condition.evaluate(signal) {
            Ok(holds) => holds,
            Err(e) => {
                summary.evaluation_failures += 1;
                log::error!(
                    "Filter condition #{} `{}` evaluation failed: {}",
                    condition.index(),
                    condition.source(),
                    e
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::output::CollectingSink;
    use crate::filter::signal::Signal;
    use serde_json::json;

    fn filter(conditions: &[&str], operator: CombinationPolicy) -> Filter {
        Filter::new(FilterConfig::new(conditions.iter().copied(), operator)).unwrap()
    }

    fn vals(values: &[i64]) -> Vec<Signal> {
        values.iter().map(|v| Signal::empty().with("val", *v)).collect()
    }

    fn val_of(signal: &Signal) -> i64 {
        signal.get("val").and_then(|v| v.as_i64()).unwrap()
    }

    #[test]
    fn test_no_conditions_passes_everything() {
        for operator in [CombinationPolicy::Any, CombinationPolicy::All] {
            let f = filter(&[], operator);
            let signals: Vec<Signal> = (1..=4).map(|i| Signal::new(json!(i))).collect();
            let partition = f.partition(signals.clone());
            assert_eq!(partition.passed, signals);
            assert!(partition.failed.is_empty());
            assert_eq!(partition.summary.evaluations, 0);
        }
    }

    #[test]
    fn test_partition_preserves_order() {
        let f = filter(&["val % 2 == 0"], CombinationPolicy::All);
        let partition = f.partition(vals(&[1, 2, 3, 4, 5, 6]));
        let passed: Vec<_> = partition.passed.iter().map(val_of).collect();
        let failed: Vec<_> = partition.failed.iter().map(val_of).collect();
        assert_eq!(passed, vec![2, 4, 6]);
        assert_eq!(failed, vec![1, 3, 5]);
    }

    #[test]
    fn test_partition_is_complete_and_disjoint() {
        let f = filter(&["val > 2", "val < 8"], CombinationPolicy::All);
        let input: Vec<i64> = (0..10).collect();
        let partition = f.partition(vals(&input));
        assert_eq!(partition.passed.len() + partition.failed.len(), input.len());

        let mut all: Vec<_> = partition
            .passed
            .iter()
            .chain(partition.failed.iter())
            .map(val_of)
            .collect();
        all.sort();
        assert_eq!(all, input);
    }

    #[test]
    fn test_any_short_circuits_on_first_true() {
        let f = filter(&["val % 23 == 0", "val % 52 == 0"], CombinationPolicy::Any);
        let partition = f.partition(vals(&[23 * 52]));
        assert_eq!(partition.passed.len(), 1);
        assert_eq!(partition.summary.evaluations, 1);
    }

    #[test]
    fn test_all_short_circuits_on_first_false() {
        let f = filter(&["val == 52", "missing == 1"], CombinationPolicy::All);
        let partition = f.partition(vals(&[23]));
        assert_eq!(partition.failed.len(), 1);
        assert_eq!(partition.summary.evaluations, 1);
        // The second condition never ran, so its missing attribute never failed
        assert_eq!(partition.summary.evaluation_failures, 0);
    }

    #[test]
    fn test_failure_counts_as_false_only_for_that_condition() {
        let f = filter(&["vals != 23", "val == 23"], CombinationPolicy::Any);
        let partition = f.partition(vals(&[23]));
        assert_eq!(partition.passed.len(), 1);
        assert_eq!(partition.summary.evaluations, 2);
        assert_eq!(partition.summary.evaluation_failures, 1);
    }

    #[test]
    fn test_process_signals_skips_empty_batches() {
        let f = filter(&["val > 0"], CombinationPolicy::All);
        let mut sink = CollectingSink::new();
        let summary = f.process_signals(vals(&[1, 2]), &mut sink);

        assert_eq!(sink.notification_count(DEFAULT_OUTPUT), 1);
        assert_eq!(sink.notification_count(FALSE_OUTPUT), 0);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_process_empty_batch_emits_nothing() {
        let f = filter(&["val > 0"], CombinationPolicy::All);
        let mut sink = CollectingSink::<Signal>::new();
        let summary = f.process_signals(Vec::new(), &mut sink);
        assert!(sink.notifications().is_empty());
        assert_eq!(summary, BatchSummary::default());
    }

    #[test]
    fn test_process_signals_emits_default_then_false() {
        let f = filter(&["val % 2 == 0"], CombinationPolicy::All);
        let mut sink = CollectingSink::new();
        f.process_signals(vals(&[1, 2]), &mut sink);

        let order: Vec<_> = sink.notifications().iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(order, vec![DEFAULT_OUTPUT, FALSE_OUTPUT]);
    }

    #[test]
    fn test_filter_over_raw_json() {
        let f = filter(&["val == 1"], CombinationPolicy::All);
        let partition = f.partition(vec![json!({"val": 1}), json!({"val": 2}), json!(3)]);
        assert_eq!(partition.passed, vec![json!({"val": 1})]);
        assert_eq!(partition.failed.len(), 2);
        assert_eq!(partition.summary.evaluation_failures, 1);
    }

    #[test]
    fn test_hostile_conditions_only_fail_their_record() {
        let f = filter(
            &[
                "val ** val ** val > 0",
                "'x' * 10 ** 18 == ''",
                "re.match('a)|(b', name) is not None",
                "datetime.days(val) > datetime.days(1)",
                "val // 0 == 1",
                "math.sqrt(-1) > 0",
            ],
            CombinationPolicy::Any,
        );
        let signals = vec![
            Signal::empty().with("val", i64::MAX).with("name", "b"),
            Signal::new(json!("scalar")),
        ];
        let partition = f.partition(signals);

        assert_eq!(partition.failed.len(), 2);
        assert_eq!(partition.summary.evaluations, 12);
        assert_eq!(partition.summary.evaluation_failures, 12);
    }

    #[test]
    fn test_new_rejects_malformed_condition() {
        let config = FilterConfig::new(["val == 1", "val === 2"], CombinationPolicy::All);
        assert!(matches!(
            Filter::new(config),
            Err(ConfigError::InvalidCondition { index: 1, .. })
        ));
    }
}
