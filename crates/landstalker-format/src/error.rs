//! Codec error types

use thiserror::Error;

/// Error produced by a wire-format codec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("pointer error: {message}")]
    Pointer { message: String },

    #[error("compression error: {message}")]
    Compression { message: String },

    #[error("huffman error: {message}")]
    Huffman { message: String },

    #[error("malformed {asset}: {message}")]
    Malformed { asset: &'static str, message: String },
}

impl CodecError {
    pub fn pointer(message: impl Into<String>) -> Self {
        Self::Pointer {
            message: message.into(),
        }
    }

    pub fn compression(message: impl Into<String>) -> Self {
        Self::Compression {
            message: message.into(),
        }
    }

    pub fn huffman(message: impl Into<String>) -> Self {
        Self::Huffman {
            message: message.into(),
        }
    }

    pub fn malformed(asset: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            asset,
            message: message.into(),
        }
    }
}

pub type CodecResult<T> = Result<T, CodecError>;
