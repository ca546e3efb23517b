use crate::models::RoundSummary;

/// A one-way subscription to published rounds.
///
/// Observers are metrics, reporting or persistence sinks. They receive each round's
/// summary after settlement has completed and never hold a reference back into the
/// market, so they cannot influence allocation, prices or balances.
///
/// Any `FnMut(&RoundSummary)` is an observer, which makes channel emission a one-liner:
///
/// ```
/// use bazaar_core::{models::RoundSummary, ports::RoundObserver};
/// use std::sync::mpsc;
///
/// let (tx, rx) = mpsc::channel::<RoundSummary>();
/// let mut observer = move |summary: &RoundSummary| {
///     let _ = tx.send(summary.clone());
/// };
/// # fn takes(_: &mut impl RoundObserver) {}
/// # takes(&mut observer);
/// # drop(rx);
/// ```
pub trait RoundObserver {
    /// Called once per round, after the round is fully settled
    fn on_round(&mut self, summary: &RoundSummary);
}

impl<F> RoundObserver for F
where
    F: FnMut(&RoundSummary),
{
    fn on_round(&mut self, summary: &RoundSummary) {
        self(summary)
    }
}
