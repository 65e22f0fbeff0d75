// SPDX-License-Identifier: MIT

//! Signal filter: partitions batches of structured records by a configurable
//! set of boolean conditions combined with ANY or ALL.

pub mod error;
pub mod filter;
pub mod server;
