#![no_std]

pub mod word;

pub use word::{WordIdx, WordOffset};

/// Size of one heap word in bytes. All block metadata is word-granular.
pub const WORD_SIZE: usize = 4;

/// Alignment guaranteed for every payload pointer handed to a client.
pub const PAYLOAD_ALIGN: usize = 8;

/// Smallest legal block: header + footer + two payload words. Block sizes
/// are always even multiples of a word, so every payload stays 8-aligned.
pub const MIN_BLOCK_WORDS: usize = 4;
