mod keyed_locks;
mod revision_reconciler;

pub use revision_reconciler::*;

pub(crate) use keyed_locks::*;

#[cfg(test)]
mod keyed_locks_test;
#[cfg(test)]
mod revision_reconciler_test;
