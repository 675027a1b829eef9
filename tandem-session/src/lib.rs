pub mod config;
pub mod error;
pub mod media;
pub mod peer;
pub mod session;
pub mod store;

pub use config::*;
pub use error::*;
pub use media::*;
pub use peer::*;
pub use session::*;
pub use store::*;
