//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod dispose_bag;

pub(crate) use circular::{check_references, cycle_chains, find_cycles, reject_cycles, ResolvingStack};
pub(crate) use dispose_bag::CleanupBag;
