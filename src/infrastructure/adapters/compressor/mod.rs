//! Compressor Adapter - 图片重新编码

mod jpeg_compressor;

pub use jpeg_compressor::JpegCompressor;
