//! Domain entities for TortoiseShare.
//!
//! Everything here is plain data plus pure functions.  No I/O, no clocks,
//! no threads.

pub mod frame;
pub mod gesture;
pub mod resolution;
pub mod session;
