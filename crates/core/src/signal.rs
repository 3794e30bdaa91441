// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal sets used to configure restart/shutdown triggers.

pub use nix::sys::signal::Signal;

/// A small, order-preserving, de-duplicated set of signals.
///
/// Kept intentionally simple (a `Vec` with a linear `contains`) since the
/// sets configured in practice never exceed a handful of entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalSet(Vec<Signal>);

impl SignalSet {
    pub fn new(signals: impl IntoIterator<Item = Signal>) -> Self {
        let mut set = Vec::new();
        for sig in signals {
            if !set.contains(&sig) {
                set.push(sig);
            }
        }
        Self(set)
    }

    pub fn contains(&self, signal: Signal) -> bool {
        self.0.contains(&signal)
    }

    pub fn iter(&self) -> impl Iterator<Item = Signal> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SignalSet {
    /// Empty by construction; callers should use [`default_restart_signals`]
    /// or [`default_shutdown_signals`] rather than relying on this.
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl FromIterator<Signal> for SignalSet {
    fn from_iter<T: IntoIterator<Item = Signal>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// Default restart trigger set: `{SIGHUP}`.
pub fn default_restart_signals() -> SignalSet {
    SignalSet::new([Signal::SIGHUP])
}

/// Default shutdown trigger set: `{SIGINT, SIGTERM, SIGQUIT}`.
pub fn default_shutdown_signals() -> SignalSet {
    SignalSet::new([Signal::SIGINT, Signal::SIGTERM, Signal::SIGQUIT])
}

/// Default signal sent to the worker to request a graceful stop: `SIGTERM`.
pub fn default_graceful_stop_signal() -> Signal {
    Signal::SIGTERM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedups_and_preserves_order() {
        let set = SignalSet::new([Signal::SIGTERM, Signal::SIGHUP, Signal::SIGTERM]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Signal::SIGTERM, Signal::SIGHUP]);
    }

    #[test]
    fn defaults_match_spec() {
        assert!(default_restart_signals().contains(Signal::SIGHUP));
        let shutdown = default_shutdown_signals();
        assert!(shutdown.contains(Signal::SIGINT));
        assert!(shutdown.contains(Signal::SIGTERM));
        assert!(shutdown.contains(Signal::SIGQUIT));
        assert_eq!(default_graceful_stop_signal(), Signal::SIGTERM);
    }
}
