//! Point-cloud frame sequence playback
//!
//! A [`FrameStore`] yields recorded frames in order; the
//! [`FrameSequencePlayer`] loads them on a background thread at a fixed
//! cadence and swaps the displayed frame node on the presentation thread,
//! looping forever until dismissed.

pub mod player;
pub mod store;

pub use player::{DEFAULT_FRAME_INTERVAL, FRAME_NODE_NAME, FrameCursor, FrameSequencePlayer};
pub use store::{FrameStore, MemorySequenceStore, PlySequenceStore, SequenceError};
