pub use tandem_core::model::RoomId;
pub use tandem_session::{CallHandle, Coordinator, SessionConfig, SessionState};

pub mod model {
    pub use tandem_core::model::*;
}

pub mod session {
    pub use tandem_session::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use tandem_server::*;
}
