// SPDX-License-Identifier: MIT

//! Shared, reconfigurable handle to a filter
//!
//! Batches run under a read lock on the current filter. Reconfiguration
//! compiles the new configuration first and then swaps it in under the write
//! lock, so it waits for in-flight batches and a batch never sees a mix of
//! two configurations.

use std::sync::Arc;
use tokio::sync::RwLock;

use super::block::{BatchSummary, Filter};
use super::config::FilterConfig;
use super::output::SignalSink;
use super::signal::AttributeLookup;
use crate::error::ConfigError;

#[derive(Clone)]
pub struct FilterHandle {
    filter: Arc<RwLock<Arc<Filter>>>,
}

impl FilterHandle {
    pub fn new(config: FilterConfig) -> Result<Self, ConfigError> {
        Ok(Self::from_filter(Filter::new(config)?))
    }

    pub fn from_filter(filter: Filter) -> Self {
        Self {
            filter: Arc::new(RwLock::new(Arc::new(filter))),
        }
    }

    /// Process one batch against the configuration current at entry
    pub async fn process<S, K>(&self, signals: Vec<S>, sink: &mut K) -> BatchSummary
    where
        S: AttributeLookup,
        K: SignalSink<S> + ?Sized,
    {
        let filter = self.filter.read().await;
        filter.process_signals(signals, sink)
    }

    /// Replace the configuration.
    ///
    /// On a compile error the previous configuration stays active.
    pub async fn reconfigure(&self, config: FilterConfig) -> Result<(), ConfigError> {
        let compiled = Filter::new(config).map_err(|e| {
            log::error!("Rejected filter reconfiguration: {}", e);
            e
        })?;

        let mut filter = self.filter.write().await;
        *filter = Arc::new(compiled);
        log::info!(
            "Filter reconfigured: {} conditions, operator {}",
            filter.conditions().len(),
            filter.operator()
        );
        Ok(())
    }

    pub async fn config(&self) -> FilterConfig {
        self.filter.read().await.config().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::output::{CollectingSink, DEFAULT_OUTPUT, FALSE_OUTPUT};
    use crate::filter::policy::CombinationPolicy;
    use crate::filter::signal::Signal;

    fn vals(values: impl IntoIterator<Item = i64>) -> Vec<Signal> {
        values
            .into_iter()
            .map(|v| Signal::empty().with("val", v))
            .collect()
    }

    #[tokio::test]
    async fn test_process_uses_current_config() {
        let handle =
            FilterHandle::new(FilterConfig::new(["val > 1"], CombinationPolicy::All)).unwrap();
        let mut sink = CollectingSink::new();
        let summary = handle.process(vals([1, 2, 3]), &mut sink).await;

        assert_eq!(summary.passed, 2);
        assert_eq!(sink.signal_count(DEFAULT_OUTPUT), 2);
        assert_eq!(sink.signal_count(FALSE_OUTPUT), 1);
    }

    #[tokio::test]
    async fn test_reconfigure_swaps_conditions() {
        let handle =
            FilterHandle::new(FilterConfig::new(["val > 1"], CombinationPolicy::All)).unwrap();
        handle
            .reconfigure(FilterConfig::new(["val < 2"], CombinationPolicy::Any))
            .await
            .unwrap();

        let mut sink = CollectingSink::new();
        handle.process(vals([1, 2, 3]), &mut sink).await;
        assert_eq!(sink.signal_count(DEFAULT_OUTPUT), 1);
        assert_eq!(handle.config().await.operator, CombinationPolicy::Any);
    }

    #[tokio::test]
    async fn test_failed_reconfigure_keeps_previous() {
        let original = FilterConfig::new(["val > 1"], CombinationPolicy::All);
        let handle = FilterHandle::new(original.clone()).unwrap();

        let result = handle
            .reconfigure(FilterConfig::new(["val >"], CombinationPolicy::Any))
            .await;
        assert!(matches!(result, Err(ConfigError::InvalidCondition { .. })));
        assert_eq!(handle.config().await, original);
    }

    #[tokio::test]
    async fn test_batches_never_mix_configurations() {
        let handle =
            FilterHandle::new(FilterConfig::new(["val >= 0"], CombinationPolicy::All)).unwrap();

        let mut tasks = Vec::new();
        for i in 0..20 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                if i % 4 == 0 {
                    let condition = if i % 8 == 0 { "val < 0" } else { "val >= 0" };
                    handle
                        .reconfigure(FilterConfig::new([condition], CombinationPolicy::All))
                        .await
                        .unwrap();
                    None
                } else {
                    let mut sink = CollectingSink::new();
                    let summary = handle.process(vals(0..50), &mut sink).await;
                    Some(summary)
                }
            }));
        }

        for task in tasks {
            if let Some(summary) = task.await.unwrap() {
                // Every signal is non-negative, so a batch is all-pass or all-fail
                assert!(summary.passed == 50 || summary.failed == 50);
            }
        }
    }
}
