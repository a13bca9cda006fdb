//! Status LED heartbeat.
//!
//! A double blink once a second tells someone looking at the board that the
//! scheduler is still turning over.

use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Something that can be switched on and off.
pub trait StatusLed: Send {
    fn set(&mut self, on: bool);
}

/// LED stand-in for hosts without one.
#[derive(Debug, Default)]
pub struct TracingLed {
    on: bool,
}

impl TracingLed {
    pub fn is_on(&self) -> bool {
        self.on
    }
}

impl StatusLed for TracingLed {
    fn set(&mut self, on: bool) {
        if on != self.on {
            trace!(on, "led");
        }
        self.on = on;
    }
}

/// One heartbeat period: `(led on, hold)`.
pub const PATTERN: [(bool, Duration); 5] = [
    (false, Duration::from_millis(800)),
    (true, Duration::from_millis(50)),
    (false, Duration::from_millis(50)),
    (true, Duration::from_millis(50)),
    (false, Duration::from_millis(50)),
];

/// Blink until cancelled, then leave the LED off and hand it back.
pub async fn run_heartbeat<L: StatusLed>(mut led: L, cancel: CancellationToken) -> L {
    debug!("heartbeat started");
    'outer: loop {
        for (on, hold) in PATTERN {
            led.set(on);
            tokio::select! {
                _ = cancel.cancelled() => break 'outer,
                _ = sleep(hold) => {}
            }
        }
    }
    led.set(false);
    debug!("heartbeat stopped");
    led
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[derive(Clone, Default)]
    struct RecordingLed {
        log: Arc<Mutex<Vec<(bool, Duration)>>>,
        start: Option<Instant>,
    }

    impl StatusLed for RecordingLed {
        fn set(&mut self, on: bool) {
            let start = *self.start.get_or_insert_with(Instant::now);
            self.log.lock().unwrap().push((on, start.elapsed()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn blink_pattern_timing() {
        let led = RecordingLed::default();
        let log = led.log.clone();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_heartbeat(led, cancel.clone()));

        sleep(Duration::from_millis(1990)).await;
        cancel.cancel();
        task.await.unwrap();

        let log = log.lock().unwrap().clone();
        let ms: Vec<(bool, u64)> = log.iter().map(|(on, t)| (*on, t.as_millis() as u64)).collect();
        assert_eq!(
            &ms[..10],
            &[
                (false, 0),
                (true, 800),
                (false, 850),
                (true, 900),
                (false, 950),
                (false, 1000),
                (true, 1800),
                (false, 1850),
                (true, 1900),
                (false, 1950),
            ]
        );
        // Final state is off.
        assert_eq!(log.last().map(|(on, _)| *on), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_on_turns_led_off() {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_heartbeat(TracingLed::default(), cancel.clone()));
        sleep(Duration::from_millis(820)).await;
        cancel.cancel();
        let led = task.await.unwrap();
        assert!(!led.is_on());
    }
}
