use nalgebra::{UnitQuaternion, Vector3};
use std::collections::HashMap;
use tracing::debug;

use super::binding::RigBinding;
use super::skeleton::{BoneId, Rig};
use crate::coords::is_degenerate;
use crate::error::BindError;

/// 1ボーン分の基準姿勢
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BindEntry {
    /// 親空間での基準の向き（単位ベクトル）
    pub aim_parent: Vector3<f32>,
    /// 基準ローカル回転
    pub local_rotation: UnitQuaternion<f32>,
}

/// 親空間での「このボーンが静止時に向いている方向」を求める
///
/// 子があれば子への方向、なければローカル+X軸を基準回転で親空間へ回したもの。
/// 親のないボーンは扱えない。
pub fn cache_bind<R: Rig>(rig: &R, bone: BoneId) -> Option<BindEntry> {
    let parent = rig.parent(bone)?;
    let local_rotation = rig.local_rotation(bone);
    let fallback = local_rotation * Vector3::x();

    let aim_parent = match rig.first_child(bone) {
        Some(child) => {
            let aim_world = rig.world_position(child) - rig.world_position(bone);
            if is_degenerate(&aim_world) {
                fallback
            } else {
                rig.world_rotation(parent).inverse() * aim_world.normalize()
            }
        }
        None => fallback,
    };

    Some(BindEntry {
        aim_parent: aim_parent.normalize(),
        local_rotation,
    })
}

/// バインドポーズのキャッシュ
#[derive(Debug, Clone, Default)]
pub struct BindPose {
    entries: HashMap<BoneId, BindEntry>,
    /// 指・つま先の基準ローカル回転
    rest_rotations: HashMap<BoneId, UnitQuaternion<f32>>,
}

impl BindPose {
    /// 駆動ボーン全てと末端ボーンの基準姿勢を取得する
    ///
    /// 最初のリターゲットより前に一度だけ呼ぶ。
    pub fn capture<R: Rig>(rig: &R, binding: &RigBinding) -> Result<Self, BindError> {
        binding.validate(rig)?;
        let mut pose = Self::default();
        for (role, bone) in binding.bones() {
            if role.is_root() {
                continue;
            }
            let entry = cache_bind(rig, bone).ok_or(BindError::MissingParent { role, bone })?;
            debug!(?role, bone, aim = ?entry.aim_parent, "cached bind entry");
            pose.entries.insert(bone, entry);
        }
        for &bone in binding.extremities() {
            pose.rest_rotations.insert(bone, rig.local_rotation(bone));
        }
        Ok(pose)
    }

    pub fn get(&self, bone: BoneId) -> Option<&BindEntry> {
        self.entries.get(&bone)
    }

    /// キャッシュを引き、無ければその場で取得する
    pub fn entry_or_capture<R: Rig>(&mut self, rig: &R, bone: BoneId) -> Option<BindEntry> {
        if let Some(entry) = self.entries.get(&bone) {
            return Some(*entry);
        }
        let entry = cache_bind(rig, bone)?;
        debug!(bone, "lazily cached bind entry");
        self.entries.insert(bone, entry);
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 末端ボーンを基準回転へ戻す（親の回転による崩れ防止）
    pub fn restore_extremities<R: Rig>(&self, rig: &mut R) {
        for (&bone, &rotation) in &self.rest_rotations {
            rig.set_local_rotation(bone, rotation);
        }
    }
}
