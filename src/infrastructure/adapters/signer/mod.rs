//! Signer Adapter

mod local_session_signer;

pub use local_session_signer::LocalSessionSigner;
