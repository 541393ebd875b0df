//! Upload progress reporting.
//!
//! A [`ProgressReporter`] is handed to an [`crate::AnalysisService`] for the
//! duration of one call. Percentages are clamped to `0..=100` and only strictly
//! increasing values are forwarded, so the receiving side sees a strictly
//! increasing sequence, even across clones on different threads. The channel
//! closes when the last reporter clone is dropped, i.e. when the service call
//! finishes.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

pub type ProgressReceiver = mpsc::UnboundedReceiver<u8>;

#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<u8>,
    /// Last forwarded value. The send happens under this lock so clones on
    /// different threads cannot enqueue out of order.
    last: Arc<Mutex<Option<u8>>>,
}

/// Create a reporter and the receiver observing it.
pub fn channel() -> (ProgressReporter, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ProgressReporter {
            tx,
            last: Arc::new(Mutex::new(None)),
        },
        rx,
    )
}

impl ProgressReporter {
    /// Reporter whose updates go nowhere.
    pub fn disabled() -> Self {
        channel().0
    }

    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if last.is_some_and(|previous| percent <= previous) {
            return;
        }
        *last = Some(percent);
        // Receiver gone means nobody is watching; the call itself goes on.
        let _ = self.tx.send(percent);
    }

    /// Report `floor(sent * 100 / total)`.
    pub fn report_bytes(&self, sent: u64, total: u64) {
        self.report(percent_of(sent, total));
    }

    /// Last percentage forwarded, if any.
    pub fn last(&self) -> Option<u8> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `floor(sent * 100 / total)`, capped at 100. An empty body counts as complete.
pub fn percent_of(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (u128::from(sent) * 100) / u128::from(total);
    percent.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut ProgressReceiver) -> Vec<u8> {
        let mut values = Vec::new();
        while let Ok(v) = rx.try_recv() {
            values.push(v);
        }
        values
    }

    #[test]
    fn test_reports_only_increasing_values() {
        let (reporter, mut rx) = channel();
        for p in [0, 10, 10, 5, 30, 20, 100, 100] {
            reporter.report(p);
        }
        assert_eq!(drain(&mut rx), vec![0, 10, 30, 100]);
        assert_eq!(reporter.last(), Some(100));
    }

    #[test]
    fn test_values_are_clamped() {
        let (reporter, mut rx) = channel();
        reporter.report(150);
        reporter.report(200);
        assert_eq!(drain(&mut rx), vec![100]);
    }

    #[test]
    fn test_clones_share_ordering() {
        let (reporter, mut rx) = channel();
        let other = reporter.clone();
        reporter.report(40);
        other.report(20);
        other.report(60);
        assert_eq!(drain(&mut rx), vec![40, 60]);
    }

    #[test]
    fn test_channel_closes_when_reporter_dropped() {
        let (reporter, mut rx) = channel();
        reporter.report(10);
        drop(reporter);
        assert_eq!(rx.try_recv(), Ok(10));
        assert_eq!(
            rx.try_recv(),
            Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
        );
    }

    #[test]
    fn test_percent_of_floors() {
        assert_eq!(percent_of(0, 1000), 0);
        assert_eq!(percent_of(999, 1000), 99);
        assert_eq!(percent_of(1000, 1000), 100);
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(5, 0), 100);
        assert_eq!(percent_of(2000, 1000), 100);
    }

    #[test]
    fn test_disabled_reporter_does_not_panic() {
        let reporter = ProgressReporter::disabled();
        reporter.report(50);
        assert_eq!(reporter.last(), Some(50));
    }

    #[test]
    fn test_clones_on_threads_deliver_in_order() {
        let (reporter, mut rx) = channel();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let reporter = reporter.clone();
                std::thread::spawn(move || {
                    for p in 0..=100 {
                        reporter.report(p);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let values = drain(&mut rx);
        assert!(values.windows(2).all(|w| w[0] < w[1]), "{:?}", values);
        assert_eq!(values.last(), Some(&100));
    }
}
