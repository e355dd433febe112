pub mod bind;
pub mod binding;
pub mod skeleton;

pub use bind::{cache_bind, BindEntry, BindPose};
pub use binding::{is_extremity_name, BoneRole, RigBinding};
pub use skeleton::{strip_namespace, Bone, BoneId, Rig, Skeleton};
