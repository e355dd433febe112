//! Rig binding errors

use thiserror::Error;

use crate::rig::{BoneId, BoneRole};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("required bone {0:?} is not bound")]
    MissingBone(BoneRole),

    #[error("bone {role:?} (id {bone}) has no parent and cannot be driven")]
    MissingParent { role: BoneRole, bone: BoneId },

    #[error("bone id {0} is bound more than once")]
    DuplicateBone(BoneId),

    #[error("bone id {0} does not exist in the rig")]
    UnknownBone(BoneId),
}
