//! Perception products consumed by the mission core
pub mod room_mask;
pub mod segmentation;

pub use room_mask::{extract_mask, RoomMask};
pub use segmentation::LabeledMap;
