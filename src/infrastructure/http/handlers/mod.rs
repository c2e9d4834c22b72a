//! HTTP Handlers

mod kyc;
mod ping;
mod session;

pub use kyc::*;
pub use ping::*;
pub use session::*;
