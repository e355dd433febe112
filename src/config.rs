use anyhow::{bail, Context, Result};
use nalgebra::UnitQuaternion;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::rig::BoneRole;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub space: SpaceConfig,
    #[serde(default)]
    pub bones: BoneConfig,
    #[serde(default)]
    pub root: RootConfig,
    #[serde(default)]
    pub ik: IkConfig,
}

/// ランドマークストリームの平滑化
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// 前回値の保持率 α (新サンプルは 1-α だけ混ざる)
    #[serde(default = "default_retention")]
    pub retention: f32,
}

/// 正規化座標 → ワールド座標
#[derive(Debug, Clone, Deserialize)]
pub struct SpaceConfig {
    /// ワールドスケール倍率
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// これ未満の可視度は未検出扱い
    #[serde(default)]
    pub min_visibility: f32,
    /// ワールド原点に落ちた点を未検出扱いにする
    #[serde(default = "default_true")]
    pub zero_is_missing: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoneConfig {
    /// 回転追従レート k (大きいほど速い)
    #[serde(default = "default_bone_rate")]
    pub rate: f32,
    /// 全ボーン共通の軸補正 (オイラー角, 度)
    #[serde(default)]
    pub axis_offset: [f32; 3],
    /// ボーンごとの軸補正 (オイラー角, 度)
    #[serde(default)]
    pub axis_offsets: HashMap<BoneRole, [f32; 3]>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RootConfig {
    #[serde(default = "default_true")]
    pub follow_position: bool,
    #[serde(default = "default_true")]
    pub follow_rotation: bool,
    /// 鉛直軸まわりの回転のみ
    #[serde(default = "default_true")]
    pub yaw_only: bool,
    /// 鼻の位置で前後を判定
    #[serde(default = "default_true")]
    pub nose_disambiguation: bool,
    #[serde(default = "default_root_rate")]
    pub position_rate: f32,
    #[serde(default = "default_root_rate")]
    pub rotation_rate: f32,
    /// 腰移動量の増幅率
    #[serde(default = "default_amplification")]
    pub amplification: f32,
    /// ルート回転の固定補正 (オイラー角, 度)
    #[serde(default)]
    pub rotation_offset: [f32; 3],
}

#[derive(Debug, Clone, Deserialize)]
pub struct IkConfig {
    #[serde(default = "default_ik_rate")]
    pub rate: f32,
    /// 初期注視点の頭からの距離（メートル）
    #[serde(default = "default_look_distance")]
    pub look_distance: f32,
}

fn default_retention() -> f32 { 0.8 }
fn default_scale() -> f32 { 2.0 }
fn default_true() -> bool { true }
fn default_bone_rate() -> f32 { 10.0 }
fn default_root_rate() -> f32 { 5.0 }
fn default_amplification() -> f32 { 1.0 }
fn default_ik_rate() -> f32 { 10.0 }
fn default_look_distance() -> f32 { 1.0 }

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            retention: default_retention(),
        }
    }
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            min_visibility: 0.0,
            zero_is_missing: default_true(),
        }
    }
}

impl Default for BoneConfig {
    fn default() -> Self {
        Self {
            rate: default_bone_rate(),
            axis_offset: [0.0; 3],
            axis_offsets: HashMap::new(),
        }
    }
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            follow_position: true,
            follow_rotation: true,
            yaw_only: true,
            nose_disambiguation: true,
            position_rate: default_root_rate(),
            rotation_rate: default_root_rate(),
            amplification: default_amplification(),
            rotation_offset: [0.0; 3],
        }
    }
}

impl Default for IkConfig {
    fn default() -> Self {
        Self {
            rate: default_ik_rate(),
            look_distance: default_look_distance(),
        }
    }
}

/// オイラー角（度, XYZ）からクォータニオン
pub fn euler_degrees(angles: [f32; 3]) -> UnitQuaternion<f32> {
    UnitQuaternion::from_euler_angles(
        angles[0].to_radians(),
        angles[1].to_radians(),
        angles[2].to_radians(),
    )
}

impl BoneConfig {
    pub fn global_offset(&self) -> UnitQuaternion<f32> {
        euler_degrees(self.axis_offset)
    }

    pub fn role_offset(&self, role: BoneRole) -> Option<UnitQuaternion<f32>> {
        self.axis_offsets.get(&role).map(|a| euler_degrees(*a))
    }
}

impl RootConfig {
    pub fn offset(&self) -> UnitQuaternion<f32> {
        euler_degrees(self.rotation_offset)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// 読み込みに失敗したらデフォルト設定
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{:#}; using default config", e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let retention = self.stream.retention;
        if !(0.0..=1.0).contains(&retention) {
            bail!("stream.retention must be within [0, 1], got {}", retention);
        }
        let non_negative = [
            ("space.scale", self.space.scale),
            ("bones.rate", self.bones.rate),
            ("root.position_rate", self.root.position_rate),
            ("root.rotation_rate", self.root.rotation_rate),
            ("ik.rate", self.ik.rate),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                bail!("{} must be finite and non-negative, got {}", name, value);
            }
        }
        if !self.root.amplification.is_finite() {
            bail!("root.amplification must be finite");
        }
        Ok(())
    }
}
