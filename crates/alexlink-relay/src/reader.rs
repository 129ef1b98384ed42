use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use alexlink_packet::{PacketError, PacketReader};
use tracing::{debug, error, info};

use crate::dispatch::Dispatcher;
use crate::error::{RelayError, Result};
use crate::event::{EventSink, RelayEvent};
use crate::lifecycle::{RelayLifecycle, RelayState, ShutdownReason};

/// Outcome of one read attempt on the serial link.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadStep {
    /// A packet or a decode failure produced this event.
    Event(RelayEvent),
    /// The read timed out with nothing complete.
    Idle,
    /// The link is gone; the reader must stop.
    Closed,
}

/// Perpetual read loop over the serial link.
pub struct SerialReader<R> {
    reader: PacketReader<R>,
    dispatcher: Dispatcher,
    events: Box<dyn EventSink>,
    lifecycle: Arc<RelayLifecycle>,
}

impl<R: Read> SerialReader<R> {
    pub fn new(
        inner: R,
        dispatcher: Dispatcher,
        events: Box<dyn EventSink>,
        lifecycle: Arc<RelayLifecycle>,
    ) -> Self {
        Self {
            reader: PacketReader::new(inner),
            dispatcher,
            events,
            lifecycle,
        }
    }

    /// Read until one packet decodes, a decode error is reported, the read
    /// times out, or the link closes. Events go to the sink as well.
    pub fn step(&mut self) -> ReadStep {
        let event = match self.reader.read_packet() {
            Ok(packet) => self.dispatcher.dispatch(&packet),
            Err(PacketError::BadFraming { discarded }) => RelayEvent::BadFraming { discarded },
            Err(PacketError::BadChecksum { expected, actual }) => {
                RelayEvent::BadChecksum { expected, actual }
            }
            Err(PacketError::Io(err))
                if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) =>
            {
                return ReadStep::Idle
            }
            Err(PacketError::ConnectionClosed) => {
                info!("serial link closed");
                return ReadStep::Closed;
            }
            Err(err) => {
                error!(error = %err, "serial read failed");
                return ReadStep::Closed;
            }
        };

        self.events.on_event(&event);
        ReadStep::Event(event)
    }

    /// Loop until the relay stops or the link fails. A failed link starts
    /// draining.
    pub fn run(&mut self) {
        debug!("serial reader started");
        while self.lifecycle.state() != RelayState::Stopped {
            if self.step() == ReadStep::Closed {
                self.lifecycle.begin_draining(ShutdownReason::SerialLost);
                break;
            }
        }
        debug!(buffered = self.reader.buffered(), "serial reader finished");
    }
}

impl<R: Read + Send + 'static> SerialReader<R> {
    /// Run the loop on a dedicated `serial-reader` thread.
    pub fn spawn(mut self) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("serial-reader".to_string())
            .spawn(move || self.run())
            .map_err(|err| RelayError::Thread(format!("serial reader: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};
    use std::sync::{Arc, Mutex};

    use alexlink_packet::types::{COLOUR_GREEN, RESP_OK, RESP_STATUS};
    use alexlink_packet::{encode_packet, Packet, PacketType, PACKET_SIZE};
    use bytes::BytesMut;

    use super::*;
    use crate::colour::{Colour, ColourSlot};

    fn wire(packets: &[Packet]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for packet in packets {
            encode_packet(packet, &mut buf);
        }
        buf.to_vec()
    }

    fn recording() -> (Box<dyn EventSink>, Arc<Mutex<Vec<RelayEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |event: &RelayEvent| seen.lock().expect("lock").push(event.clone())
        };
        (Box::new(sink), seen)
    }

    fn sample_packets() -> Vec<Packet> {
        vec![
            Packet::new(PacketType::Response, RESP_OK),
            Packet::new(PacketType::Message, 0).with_text("ready"),
            Packet::new(PacketType::Colour, COLOUR_GREEN),
            Packet::new(PacketType::Response, RESP_STATUS),
        ]
    }

    #[test]
    fn every_packet_dispatches_in_order_for_any_chunking() {
        let bytes = wire(&sample_packets());
        for chunk in [1, 3, 7, PACKET_SIZE - 1, PACKET_SIZE, PACKET_SIZE + 5, 1000] {
            let (sink, seen) = recording();
            let slot = Arc::new(ColourSlot::new());
            let lifecycle = Arc::new(RelayLifecycle::default());
            let mut reader = SerialReader::new(
                Chunked::new(bytes.clone(), chunk),
                Dispatcher::new(Arc::clone(&slot)),
                sink,
                Arc::clone(&lifecycle),
            );
            reader.run();

            let seen = seen.lock().expect("lock");
            assert_eq!(seen.len(), 4, "chunk size {chunk}");
            assert_eq!(seen[0], RelayEvent::ControllerAck);
            assert_eq!(
                seen[1],
                RelayEvent::Message {
                    text: "ready".to_string()
                }
            );
            assert_eq!(
                seen[2],
                RelayEvent::Colour {
                    colour: Colour::Green
                }
            );
            assert!(matches!(seen[3], RelayEvent::Status(_)));
            assert_eq!(slot.peek(), Some(Colour::Green));
            assert_eq!(lifecycle.state(), RelayState::Draining);
        }
    }

    #[test]
    fn strict_prefix_dispatches_nothing_until_completed() {
        let bytes = wire(&[Packet::new(PacketType::Response, RESP_OK)]);
        let (sink, seen) = recording();
        let mut reader = SerialReader::new(
            Chunked::with_stall(bytes, 40),
            Dispatcher::new(Arc::new(ColourSlot::new())),
            sink,
            Arc::new(RelayLifecycle::default()),
        );

        assert_eq!(reader.step(), ReadStep::Idle);
        assert!(seen.lock().expect("lock").is_empty());
        assert_eq!(reader.step(), ReadStep::Event(RelayEvent::ControllerAck));
        assert_eq!(seen.lock().expect("lock").len(), 1);
    }

    #[test]
    fn bad_checksum_then_valid_packet() {
        let mut bytes = wire(&[Packet::new(PacketType::Message, 0).with_text("x")]);
        bytes[PACKET_SIZE - 4] ^= 0xFF;
        bytes.extend(wire(&[Packet::new(PacketType::Response, RESP_OK)]));

        let (sink, seen) = recording();
        let mut reader = SerialReader::new(
            Cursor::new(bytes),
            Dispatcher::new(Arc::new(ColourSlot::new())),
            sink,
            Arc::new(RelayLifecycle::default()),
        );
        reader.run();

        let seen = seen.lock().expect("lock");
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0], RelayEvent::BadChecksum { .. }));
        assert_eq!(seen[1], RelayEvent::ControllerAck);
    }

    #[test]
    fn garbage_is_reported_as_framing_error() {
        let mut bytes = vec![0x11; 9];
        bytes.extend(wire(&[Packet::new(PacketType::Response, RESP_OK)]));

        let (sink, seen) = recording();
        let mut reader = SerialReader::new(
            Cursor::new(bytes),
            Dispatcher::new(Arc::new(ColourSlot::new())),
            sink,
            Arc::new(RelayLifecycle::default()),
        );
        reader.run();

        let seen = seen.lock().expect("lock");
        assert!(matches!(seen[0], RelayEvent::BadFraming { .. }));
        assert_eq!(seen.last(), Some(&RelayEvent::ControllerAck));
    }

    #[test]
    fn stopped_lifecycle_ends_loop_without_reading() {
        let lifecycle = Arc::new(RelayLifecycle::default());
        lifecycle.finish();
        let (sink, seen) = recording();
        let mut reader = SerialReader::new(
            Cursor::new(wire(&sample_packets())),
            Dispatcher::new(Arc::new(ColourSlot::new())),
            sink,
            lifecycle,
        );
        reader.run();
        assert!(seen.lock().expect("lock").is_empty());
    }

    /// Serves `data` in fixed-size chunks, optionally timing out once after
    /// the first chunk.
    struct Chunked {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
        stall_once: bool,
    }

    impl Chunked {
        fn new(data: Vec<u8>, chunk: usize) -> Self {
            Self {
                data,
                pos: 0,
                chunk,
                stall_once: false,
            }
        }

        fn with_stall(data: Vec<u8>, first: usize) -> Self {
            Self {
                data,
                pos: 0,
                chunk: first,
                stall_once: true,
            }
        }
    }

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.stall_once && self.pos > 0 {
                self.stall_once = false;
                self.chunk = usize::MAX;
                return Err(io::Error::new(ErrorKind::TimedOut, "serial timeout"));
            }
            let n = self.chunk.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
