//! Errors raised while reading the image folder.

use std::fmt;

#[derive(Debug)]
pub enum AppError {
    /// Reading or decoding an image file failed
    ImageLoad(String),
    /// Listing the image folder failed
    DirectoryScan(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ImageLoad(msg) => write!(f, "image load error: {}", msg),
            AppError::DirectoryScan(msg) => write!(f, "directory scan error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Opening or sniffing an image file; folder listing builds its own error.
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::ImageLoad(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::ImageLoad(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
