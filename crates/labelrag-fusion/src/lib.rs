#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Pure rank-fusion math: RRF, MMR diversification, per-label dedup.
//! No I/O; usable independently of the orchestrator.

pub mod dedup;
pub mod mmr;
pub mod rrf;

pub use dedup::cap_per_label;
pub use mmr::{dot, mmr_diversify, MmrCandidate};
pub use rrf::rrf_fuse;
