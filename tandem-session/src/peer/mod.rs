mod peer_connection;
mod webrtc_peer;

pub use peer_connection::*;
pub use webrtc_peer::*;
