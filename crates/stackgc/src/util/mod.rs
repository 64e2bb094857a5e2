//! Util Module - Shared Utilities

pub mod alignment;

pub use alignment::Alignment;

/// Constants for stackgc
pub mod constants {
    /// 1 Kilobyte
    pub const KB: usize = 1024;
    /// 1 Megabyte
    pub const MB: usize = 1024 * 1024;
    /// 1 Gigabyte
    pub const GB: usize = 1024 * 1024 * 1024;

    /// Size of one candidate address
    pub const WORD_SIZE: usize = std::mem::size_of::<usize>();
}
