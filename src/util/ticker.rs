use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Runs a callback at a fixed interval on a background thread until stopped
/// or dropped.
pub struct Ticker {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn start<F>(interval: Duration, mut callback: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (stop, rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            loop {
                match rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => callback(),
                    // Stop requested or the owner went away.
                    _ => break,
                }
            }
        });
        Ticker {
            stop: Some(stop),
            handle: Some(handle),
        }
    }

    /// Stop the ticker and wait for an in-flight callback to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Trailing dots of an animated notice: `"    "`, `" .  "`, `" .. "`,
/// `" ..."`, then back to blank.
pub fn next_notice_frame(current: &str) -> &'static str {
    match current {
        "    " => " .  ",
        " .  " => " .. ",
        " .. " => " ...",
        _ => "    ",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_notice_frames_cycle() {
        let mut frame = "    ";
        let mut seen = Vec::new();
        for _ in 0..5 {
            frame = next_notice_frame(frame);
            seen.push(frame);
        }
        assert_eq!(seen, vec![" .  ", " .. ", " ...", "    ", " .  "]);
        assert_eq!(next_notice_frame("garbage"), "    ");
    }

    #[test]
    fn test_ticker_runs_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let ticker = Ticker::start(Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(60));
        ticker.stop();

        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop > 0);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_drop_stops_ticker() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let counter = Arc::clone(&count);
            let _ticker = Ticker::start(Duration::from_millis(5), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            thread::sleep(Duration::from_millis(20));
        }
        let after_drop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), after_drop);
    }
}
