//! Change-notification listeners for read-side type-states.

use shoal_types::Ordinal;

/// Observer of one type-state's loads.
///
/// Listeners are registered on a type-state and invoked synchronously by the
/// blob reader: `begin_update` before any bytes of a load are applied to the
/// state, ordinal notifications while the load mutates it, and `end_update`
/// once the whole blob has been applied. A rejected blob (for example a
/// delta with a mismatched origin tag) invokes no listener at all.
pub trait TypeStateListener: Send + Sync {
    /// A load affecting this type-state is about to begin.
    fn begin_update(&mut self) {}

    /// The record at `ordinal` became populated.
    fn ordinal_added(&mut self, ordinal: Ordinal) {
        let _ = ordinal;
    }

    /// The record at `ordinal` was removed.
    fn ordinal_removed(&mut self, ordinal: Ordinal) {
        let _ = ordinal;
    }

    /// The load completed.
    fn end_update(&mut self) {}
}
