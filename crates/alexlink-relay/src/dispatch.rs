use std::collections::HashMap;
use std::sync::Arc;

use alexlink_packet::types::{RESP_OK, RESP_STATUS};
use alexlink_packet::{Packet, PacketType};

use crate::colour::{Colour, ColourSlot};
use crate::event::{ControllerFault, RelayEvent, StatusReport};

/// Turns one decoded packet into an event.
pub trait PacketHandler: Send {
    fn handle(&self, packet: &Packet) -> RelayEvent;
}

impl<F> PacketHandler for F
where
    F: Fn(&Packet) -> RelayEvent + Send,
{
    fn handle(&self, packet: &Packet) -> RelayEvent {
        self(packet)
    }
}

/// RESPONSE packets: acks and status reports.
#[derive(Debug, Default)]
pub struct ResponseHandler;

impl PacketHandler for ResponseHandler {
    fn handle(&self, packet: &Packet) -> RelayEvent {
        match packet.code {
            RESP_OK => RelayEvent::ControllerAck,
            RESP_STATUS => RelayEvent::Status(StatusReport::from_params(&packet.params)),
            code => RelayEvent::UnexpectedResponse { code },
        }
    }
}

/// ERROR packets.
#[derive(Debug, Default)]
pub struct ErrorHandler;

impl PacketHandler for ErrorHandler {
    fn handle(&self, packet: &Packet) -> RelayEvent {
        RelayEvent::ControllerFault {
            fault: ControllerFault::from_code(packet.code),
        }
    }
}

/// MESSAGE packets.
#[derive(Debug, Default)]
pub struct MessageHandler;

impl PacketHandler for MessageHandler {
    fn handle(&self, packet: &Packet) -> RelayEvent {
        RelayEvent::Message {
            text: packet.text(),
        }
    }
}

/// COLOUR packets. Valid reports are published to the slot.
#[derive(Debug)]
pub struct ColourHandler {
    slot: Arc<ColourSlot>,
}

impl ColourHandler {
    pub fn new(slot: Arc<ColourSlot>) -> Self {
        Self { slot }
    }
}

impl PacketHandler for ColourHandler {
    fn handle(&self, packet: &Packet) -> RelayEvent {
        match Colour::from_code(packet.code) {
            Some(colour) => {
                self.slot.publish(colour);
                RelayEvent::Colour { colour }
            }
            None => RelayEvent::CorruptedColour { code: packet.code },
        }
    }
}

/// Handler table keyed by packet type.
pub struct Dispatcher {
    handlers: HashMap<PacketType, Box<dyn PacketHandler>>,
}

impl Dispatcher {
    /// Table with the standard handlers. COMMAND and HELLO have none, so
    /// echoed commands are ignored.
    pub fn new(slot: Arc<ColourSlot>) -> Self {
        let mut dispatcher = Self::empty();
        dispatcher.register(PacketType::Response, ResponseHandler);
        dispatcher.register(PacketType::Error, ErrorHandler);
        dispatcher.register(PacketType::Message, MessageHandler);
        dispatcher.register(PacketType::Colour, ColourHandler::new(slot));
        dispatcher
    }

    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Install or replace the handler for `packet_type`.
    pub fn register(&mut self, packet_type: PacketType, handler: impl PacketHandler + 'static) {
        self.handlers.insert(packet_type, Box::new(handler));
    }

    pub fn dispatch(&self, packet: &Packet) -> RelayEvent {
        match self.handlers.get(&packet.packet_type) {
            Some(handler) => handler.handle(packet),
            None => RelayEvent::Ignored {
                packet_type: packet.packet_type.as_u8(),
            },
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&'static str> = self.handlers.keys().map(|t| t.name()).collect();
        types.sort_unstable();
        f.debug_struct("Dispatcher").field("handlers", &types).finish()
    }
}
