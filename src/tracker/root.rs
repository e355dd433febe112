use nalgebra::{UnitQuaternion, Vector3};

use super::damp::{damp_position, damp_rotation};
use crate::config::RootConfig;
use crate::coords::{is_degenerate, LandmarkSpace};
use crate::pose::{LandmarkIndex, PoseFrame};
use crate::rig::{BoneId, Rig};

/// 左右2点を結ぶ線に垂直な水平方向。どちらか欠けているか一致していれば None
fn perpendicular_forward(
    space: &LandmarkSpace,
    frame: &PoseFrame,
    left: LandmarkIndex,
    right: LandmarkIndex,
) -> Option<Vector3<f32>> {
    let l = space.world_position(frame, left)?;
    let r = space.world_position(frame, right)?;
    let across = r - l;
    if is_degenerate(&across) {
        return None;
    }
    Some(Vector3::y().cross(&across))
}

/// 胴体の正面方向
///
/// 肩線（無ければ腰線）に垂直な方向。外積だけでは前後が決まらないため、
/// `disambiguate` が有効なら肩中心→鼻の向きと逆を向いたときに反転する。
pub fn body_forward(
    space: &LandmarkSpace,
    frame: &PoseFrame,
    yaw_only: bool,
    disambiguate: bool,
) -> Option<Vector3<f32>> {
    let mut forward = perpendicular_forward(
        space,
        frame,
        LandmarkIndex::LeftShoulder,
        LandmarkIndex::RightShoulder,
    )
    .or_else(|| perpendicular_forward(space, frame, LandmarkIndex::LeftHip, LandmarkIndex::RightHip))?;

    if yaw_only {
        forward.y = 0.0;
    }
    if is_degenerate(&forward) {
        return None;
    }
    forward.normalize_mut();

    if disambiguate {
        if let (Some(nose), Some(center)) = (
            space.world_position(frame, LandmarkIndex::Nose),
            space.shoulder_center(frame),
        ) {
            let mut face = nose - center;
            if yaw_only {
                face.y = 0.0;
            }
            if !is_degenerate(&face) && forward.dot(&face) < 0.0 {
                forward = -forward;
            }
        }
    }
    Some(forward)
}

/// ルート（腰）の位置・向きの追従
pub struct RootMotion {
    follow_position: bool,
    follow_rotation: bool,
    yaw_only: bool,
    nose_disambiguation: bool,
    position_rate: f32,
    rotation_rate: f32,
    /// 正規化ランドマークとワールドのスケール差の補正
    amplification: f32,
    /// 計算した向きの前に合成する固定補正
    offset: UnitQuaternion<f32>,
    initial_hip_position: Vector3<f32>,
}

/// 1tickでどちらを更新したか
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RootUpdate {
    pub position: bool,
    pub rotation: bool,
}

impl RootMotion {
    pub fn new(initial_hip_position: Vector3<f32>) -> Self {
        Self::from_config(&RootConfig::default(), initial_hip_position)
    }

    pub fn from_config(config: &RootConfig, initial_hip_position: Vector3<f32>) -> Self {
        Self {
            follow_position: config.follow_position,
            follow_rotation: config.follow_rotation,
            yaw_only: config.yaw_only,
            nose_disambiguation: config.nose_disambiguation,
            position_rate: config.position_rate,
            rotation_rate: config.rotation_rate,
            amplification: config.amplification,
            offset: config.offset(),
            initial_hip_position,
        }
    }

    pub fn initial_hip_position(&self) -> Vector3<f32> {
        self.initial_hip_position
    }

    pub fn position_target(&self, space: &LandmarkSpace, frame: &PoseFrame) -> Option<Vector3<f32>> {
        let hip_center = space.hip_center(frame)?;
        Some(self.initial_hip_position + hip_center * self.amplification)
    }

    pub fn rotation_target(&self, space: &LandmarkSpace, frame: &PoseFrame) -> Option<UnitQuaternion<f32>> {
        let forward = body_forward(space, frame, self.yaw_only, self.nose_disambiguation)?;
        if is_degenerate(&forward.cross(&Vector3::y())) {
            return None;
        }
        Some(self.offset * UnitQuaternion::face_towards(&forward, &Vector3::y()))
    }

    pub fn update<R: Rig>(
        &self,
        rig: &mut R,
        root: BoneId,
        space: &LandmarkSpace,
        frame: &PoseFrame,
        dt: f32,
    ) -> RootUpdate {
        let mut result = RootUpdate::default();

        if self.follow_position {
            if let Some(target) = self.position_target(space, frame) {
                let current = rig.world_position(root);
                rig.set_world_position(root, damp_position(&current, &target, self.position_rate, dt));
                result.position = true;
            }
        }

        if self.follow_rotation {
            if let Some(target) = self.rotation_target(space, frame) {
                let current = rig.world_rotation(root);
                rig.set_world_rotation(root, damp_rotation(&current, &target, self.rotation_rate, dt));
                result.rotation = true;
            }
        }

        result
    }
}
