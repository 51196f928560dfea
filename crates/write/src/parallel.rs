//! Barrier-style parallel fan-out over type-states.
//!
//! Cycle transitions touch every type-state independently, so they run on
//! rayon's work-stealing pool (sized to hardware parallelism). The calls
//! block until every unit completes; the first failure aborts the fan-out
//! and surfaces wrapped as [`WriteError::Worker`].

use rayon::prelude::*;

use crate::error::{Result, WriteError};

/// Runs `f` over every item in parallel, propagating the first failure.
pub(crate) fn fan_out<T, F>(items: &mut [T], f: F) -> Result<()>
where
    T: Send,
    F: Fn(&mut T) -> Result<()> + Send + Sync,
{
    items
        .par_iter_mut()
        .try_for_each(f)
        .map_err(|source| WriteError::Worker { source: Box::new(source) })
}
