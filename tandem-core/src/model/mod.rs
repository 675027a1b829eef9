mod candidate;
mod connection;
mod description;
mod ice;
mod media;
mod protocol;
mod request;
mod room;

pub use candidate::{CandidateChange, CandidateDirection, CandidateId, CandidateRecord};
pub use connection::ConnectionState;
pub use description::{SdpType, SessionDescription};
pub use ice::IceServerConfig;
pub use media::{LocalTrack, RemoteTrack, TrackKind};
pub use protocol::{StoreMessage, StoreOp, StoreReply, StoreRequest};
pub use request::{RequestId, SubscriptionId};
pub use room::{RoomId, RoomRecord};
