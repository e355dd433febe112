pub mod bone;
pub mod damp;
pub mod ik;
pub mod root;
pub mod stream;

pub use bone::{BoneRetargeter, Joint, DRIVE_TABLE};
pub use damp::{damp_position, damp_rotation, damping_factor, shortest_arc};
pub use ik::{IkGoal, IkGoals, IkSlot, IkTargets, LookAtGoal};
pub use root::{body_forward, RootMotion, RootUpdate};
pub use stream::{blend_frames, FrameFeed, FrameSlot, StreamSmoother};
