//! I/O blocks are responsible for handling input from and output to external sources,
//! in this case audio files.

#[cfg(feature = "std")]
pub mod file_input;
#[cfg(feature = "std")]
pub mod file_output;
