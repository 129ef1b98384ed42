use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use alexlink_packet::types::{COLOUR_GREEN, COLOUR_NONE, COLOUR_RED};
use serde::Serialize;

/// Result of a colour-sensor sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Colour {
    Green,
    Red,
    /// The sensor sampled but could not decide.
    Undetermined,
}

impl Colour {
    /// Map a controller colour code. Unknown codes are corrupt reports.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            COLOUR_GREEN => Some(Self::Green),
            COLOUR_RED => Some(Self::Red),
            COLOUR_NONE => Some(Self::Undetermined),
            _ => None,
        }
    }

    /// Byte sent to the network peer in a colour reply.
    pub fn wire_byte(self) -> u8 {
        match self {
            Self::Green => b'g',
            Self::Red => b'r',
            Self::Undetermined => b'n',
        }
    }

    pub fn from_wire_byte(byte: u8) -> Option<Self> {
        match byte {
            b'g' => Some(Self::Green),
            b'r' => Some(Self::Red),
            b'n' => Some(Self::Undetermined),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Red => "red",
            Self::Undetermined => "undetermined",
        }
    }
}

/// Single-value rendezvous between the serial reader and the network worker.
///
/// The reader publishes colour reports; the worker arms the slot before it
/// sends a colour query and then waits, bounded, for the next report. An
/// empty slot means "no answer yet" and never a colour.
#[derive(Debug, Default)]
pub struct ColourSlot {
    value: Mutex<Option<Colour>>,
    ready: Condvar,
}

impl ColourSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear any previous report. Call before issuing a query so a stale
    /// colour cannot answer it.
    pub fn arm(&self) {
        *self.lock() = None;
    }

    /// Store a report and wake a waiting worker.
    pub fn publish(&self, colour: Colour) {
        *self.lock() = Some(colour);
        self.ready.notify_all();
    }

    /// Wait up to `timeout` for a report and take it, leaving the slot empty.
    pub fn wait_take(&self, timeout: Duration) -> Option<Colour> {
        let guard = self.lock();
        let (mut guard, _) = self
            .ready
            .wait_timeout_while(guard, timeout, |value| value.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard.take()
    }

    /// Current value without consuming it.
    pub fn peek(&self) -> Option<Colour> {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Colour>> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    use super::*;

    #[test]
    fn colour_codes_map() {
        assert_eq!(Colour::from_code(COLOUR_GREEN), Some(Colour::Green));
        assert_eq!(Colour::from_code(COLOUR_RED), Some(Colour::Red));
        assert_eq!(Colour::from_code(COLOUR_NONE), Some(Colour::Undetermined));
        assert_eq!(Colour::from_code(77), None);
    }

    #[test]
    fn wire_bytes_roundtrip() {
        for colour in [Colour::Green, Colour::Red, Colour::Undetermined] {
            assert_eq!(Colour::from_wire_byte(colour.wire_byte()), Some(colour));
        }
        assert_eq!(Colour::Green.wire_byte(), b'g');
    }

    #[test]
    fn wait_take_returns_published_value_and_clears() {
        let slot = Arc::new(ColourSlot::new());
        let producer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                slot.publish(Colour::Green);
            })
        };

        assert_eq!(slot.wait_take(Duration::from_secs(5)), Some(Colour::Green));
        assert_eq!(slot.peek(), None);
        producer.join().unwrap();
    }

    #[test]
    fn wait_take_times_out_when_nothing_published() {
        let slot = ColourSlot::new();
        let start = Instant::now();
        assert_eq!(slot.wait_take(Duration::from_millis(50)), None);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn arm_discards_stale_report() {
        let slot = ColourSlot::new();
        slot.publish(Colour::Red);
        slot.arm();
        assert_eq!(slot.wait_take(Duration::from_millis(20)), None);
    }

    #[test]
    fn already_published_value_is_returned_immediately() {
        let slot = ColourSlot::new();
        slot.publish(Colour::Undetermined);
        let start = Instant::now();
        assert_eq!(
            slot.wait_take(Duration::from_secs(5)),
            Some(Colour::Undetermined)
        );
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
