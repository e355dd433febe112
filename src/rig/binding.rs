use serde::Deserialize;
use std::collections::HashSet;

use super::skeleton::{BoneId, Rig};
use crate::error::BindError;

/// 駆動対象ボーンの役割
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoneRole {
    Hips,
    Spine,
    Neck,
    Head,
    LeftUpperArm,
    LeftLowerArm,
    RightUpperArm,
    RightLowerArm,
    LeftUpperLeg,
    LeftLowerLeg,
    RightUpperLeg,
    RightLowerLeg,
}

impl BoneRole {
    pub const ALL: [BoneRole; 12] = [
        Self::Hips,
        Self::Spine,
        Self::Neck,
        Self::Head,
        Self::LeftUpperArm,
        Self::LeftLowerArm,
        Self::RightUpperArm,
        Self::RightLowerArm,
        Self::LeftUpperLeg,
        Self::LeftLowerLeg,
        Self::RightUpperLeg,
        Self::RightLowerLeg,
    ];

    /// ヒューマノイド標準のボーン名
    pub fn bone_name(self) -> &'static str {
        match self {
            Self::Hips => "Hips",
            Self::Spine => "Spine",
            Self::Neck => "Neck",
            Self::Head => "Head",
            Self::LeftUpperArm => "LeftUpperArm",
            Self::LeftLowerArm => "LeftLowerArm",
            Self::RightUpperArm => "RightUpperArm",
            Self::RightLowerArm => "RightLowerArm",
            Self::LeftUpperLeg => "LeftUpperLeg",
            Self::LeftLowerLeg => "LeftLowerLeg",
            Self::RightUpperLeg => "RightUpperLeg",
            Self::RightLowerLeg => "RightLowerLeg",
        }
    }

    /// ルートとして扱う役割（回転を親空間で駆動しない）
    pub fn is_root(self) -> bool {
        self == Self::Hips
    }
}

const EXTREMITY_KEYWORDS: [&str; 7] = ["thumb", "index", "middle", "ring", "little", "pinky", "toe"];

/// 指・つま先のボーン名か
pub fn is_extremity_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    EXTREMITY_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// 役割 → ボーンの対応表
///
/// 名前の判定はバインド時に一度だけ行い、毎フレームの処理はこの表だけを見る。
#[derive(Debug, Clone)]
pub struct RigBinding {
    bones: Vec<(BoneRole, BoneId)>,
    extremities: Vec<BoneId>,
}

impl RigBinding {
    pub fn new() -> Self {
        Self {
            bones: Vec::new(),
            extremities: Vec::new(),
        }
    }

    pub fn with_bone(mut self, role: BoneRole, bone: BoneId) -> Self {
        self.bones.retain(|(r, _)| *r != role);
        self.bones.push((role, bone));
        self
    }

    pub fn with_extremity(mut self, bone: BoneId) -> Self {
        if !self.extremities.contains(&bone) {
            self.extremities.push(bone);
        }
        self
    }

    /// 標準ヒューマノイド名で役割を割り当て、指・つま先を名前から分類する
    pub fn from_names<R: Rig>(rig: &R) -> Self {
        let mut binding = Self::new();
        for role in BoneRole::ALL {
            if let Some(bone) = rig.find(role.bone_name()) {
                binding = binding.with_bone(role, bone);
            }
        }
        for bone in 0..rig.bone_count() {
            if is_extremity_name(rig.name(bone)) && binding.role_of(bone).is_none() {
                binding = binding.with_extremity(bone);
            }
        }
        binding
    }

    pub fn bone(&self, role: BoneRole) -> Option<BoneId> {
        self.bones.iter().find(|(r, _)| *r == role).map(|(_, b)| *b)
    }

    pub fn role_of(&self, bone: BoneId) -> Option<BoneRole> {
        self.bones.iter().find(|(_, b)| *b == bone).map(|(r, _)| *r)
    }

    pub fn bones(&self) -> impl Iterator<Item = (BoneRole, BoneId)> + '_ {
        self.bones.iter().copied()
    }

    pub fn extremities(&self) -> &[BoneId] {
        &self.extremities
    }

    /// 全役割が揃い、ルート以外は親を持ち、重複がないことを確認する
    pub fn validate<R: Rig>(&self, rig: &R) -> Result<(), BindError> {
        let mut seen = HashSet::new();
        for role in BoneRole::ALL {
            let bone = self.bone(role).ok_or(BindError::MissingBone(role))?;
            if bone >= rig.bone_count() {
                return Err(BindError::UnknownBone(bone));
            }
            if !seen.insert(bone) {
                return Err(BindError::DuplicateBone(bone));
            }
            if !role.is_root() && rig.parent(bone).is_none() {
                return Err(BindError::MissingParent { role, bone });
            }
        }
        for &bone in &self.extremities {
            if bone >= rig.bone_count() {
                return Err(BindError::UnknownBone(bone));
            }
            if !seen.insert(bone) {
                return Err(BindError::DuplicateBone(bone));
            }
        }
        Ok(())
    }
}

impl Default for RigBinding {
    fn default() -> Self {
        Self::new()
    }
}
