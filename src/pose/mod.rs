pub mod landmark;
pub mod payload;

pub use landmark::{Landmark, LandmarkIndex, PoseFrame};
pub use payload::{decode_frame, LandmarkRecord, PosePayload};
