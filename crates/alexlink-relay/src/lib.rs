//! Relay core between one network peer and the serially attached controller.
//!
//! Two execution paths share a little state:
//! - the serial reader decodes controller packets and dispatches them through
//!   a handler table, producing [`RelayEvent`]s
//! - the network worker reads 128-byte request frames, translates them into
//!   controller commands, and acknowledges each one
//!
//! Colour queries cross between the two through a [`ColourSlot`]; shutdown is
//! the observable [`RelayLifecycle`] transition `Running -> Draining -> Stopped`.

pub mod colour;
pub mod command;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod net;
pub mod reader;
pub mod relay;
pub mod sink;
pub mod worker;

pub use colour::{Colour, ColourSlot};
pub use command::{translate, HostCommand, Translation};
pub use dispatch::{
    ColourHandler, Dispatcher, ErrorHandler, MessageHandler, PacketHandler, ResponseHandler,
};
pub use error::{RelayError, Result};
pub use event::{log_event, ControllerFault, EventSink, RelayEvent, StatusReport, TracingSink};
pub use lifecycle::{
    HostShutdown, NoHostShutdown, RelayLifecycle, RelayState, ShellShutdown, ShutdownReason,
};
pub use net::{
    ack_frame, colour_frame, NetFrameReader, Reply, Request, NET_MESSAGE_PACKET, NET_RESP_OK,
    REQUEST_FRAME_SIZE,
};
pub use reader::{ReadStep, SerialReader};
pub use relay::{Relay, RelayConfig, Session, SessionSource};
pub use sink::{PacketSink, SerialSender};
pub use worker::{NetworkWorker, SessionEnd, WorkerConfig};
