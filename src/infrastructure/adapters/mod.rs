//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod compressor;
pub mod protector;
pub mod signer;

pub use compressor::*;
pub use protector::*;
pub use signer::*;
