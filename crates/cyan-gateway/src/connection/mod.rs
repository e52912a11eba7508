//! Gateway connections
//!
//! The WebSocket the session runs over, and the REST transport used to find it.

mod socket;
mod transport;

pub use socket::{open_socket, read_frame, FrameSink, FrameStream, Inbound, WsFrameSink};
pub use reqwest::Method;
pub use transport::{HttpTransport, RestTransport};
