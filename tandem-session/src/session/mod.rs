mod call_handle;
mod call_session;
mod coordinator;
mod session_event;
mod session_state;

pub use call_handle::*;
pub use coordinator::*;
pub use session_state::*;
