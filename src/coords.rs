use nalgebra::{Isometry3, Point3, Vector3};

use crate::config::SpaceConfig;
use crate::pose::{Landmark, LandmarkIndex, PoseFrame};

/// これ未満の二乗長は退化（未検出）とみなす
pub const EPSILON_SQ: f32 = 1e-8;

/// 画像座標（左上原点, y下向き）→ アバター座標（y上向き, z前方正）
pub fn landmark_to_world(landmark: &Landmark, scale: f32) -> Vector3<f32> {
    Vector3::new(
        (landmark.x - 0.5) * scale,
        (0.5 - landmark.y) * scale,
        -landmark.z * scale,
    )
}

pub fn is_degenerate(v: &Vector3<f32>) -> bool {
    v.norm_squared() < EPSILON_SQ
}

/// ランドマークのワールド座標化
///
/// アバター原点の姿勢を適用する。原点に一致した点は `zero_is_missing` が有効なら
/// 未検出として扱う（正規化座標 (0.5, 0.5, 0) の実測点もここで落ちる）。
#[derive(Debug, Clone)]
pub struct LandmarkSpace {
    pub scale: f32,
    pub min_visibility: f32,
    pub zero_is_missing: bool,
    pub origin: Isometry3<f32>,
}

impl LandmarkSpace {
    pub fn new(scale: f32) -> Self {
        Self {
            scale,
            min_visibility: 0.0,
            zero_is_missing: true,
            origin: Isometry3::identity(),
        }
    }

    pub fn from_config(config: &SpaceConfig) -> Self {
        Self {
            scale: config.scale,
            min_visibility: config.min_visibility,
            zero_is_missing: config.zero_is_missing,
            origin: Isometry3::identity(),
        }
    }

    pub fn world_position(&self, frame: &PoseFrame, index: LandmarkIndex) -> Option<Vector3<f32>> {
        let landmark = frame.get(index)?;
        if !landmark.is_visible(self.min_visibility) {
            return None;
        }
        let local = landmark_to_world(landmark, self.scale);
        if self.zero_is_missing && is_degenerate(&local) {
            return None;
        }
        Some(self.origin.transform_point(&Point3::from(local)).coords)
    }

    /// 検出済みならワールド座標、未検出ならゼロベクトル
    pub fn world_position_or_zero(&self, frame: &PoseFrame, index: LandmarkIndex) -> Vector3<f32> {
        self.world_position(frame, index).unwrap_or_else(Vector3::zeros)
    }

    /// 2点の中点。どちらか欠けていれば None
    pub fn midpoint(
        &self,
        frame: &PoseFrame,
        a: LandmarkIndex,
        b: LandmarkIndex,
    ) -> Option<Vector3<f32>> {
        let pa = self.world_position(frame, a)?;
        let pb = self.world_position(frame, b)?;
        Some((pa + pb) * 0.5)
    }

    pub fn hip_center(&self, frame: &PoseFrame) -> Option<Vector3<f32>> {
        self.midpoint(frame, LandmarkIndex::LeftHip, LandmarkIndex::RightHip)
    }

    pub fn shoulder_center(&self, frame: &PoseFrame) -> Option<Vector3<f32>> {
        self.midpoint(frame, LandmarkIndex::LeftShoulder, LandmarkIndex::RightShoulder)
    }
}
