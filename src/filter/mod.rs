// SPDX-License-Identifier: MIT

pub mod block;
pub mod condition;
pub mod condition_set;
pub mod config;
pub mod handle;
pub mod output;
pub mod policy;
pub mod signal;

pub use block::{BatchSummary, Filter, Partition};
pub use condition_set::{CompiledCondition, ConditionSet};
pub use config::{ConditionDef, ConfigLoader, FilterConfig};
pub use handle::FilterHandle;
pub use output::{CollectingSink, SignalSink, DEFAULT_OUTPUT, FALSE_OUTPUT};
pub use policy::CombinationPolicy;
pub use signal::{AttributeLookup, Signal};
