use nalgebra::{UnitQuaternion, Vector3};

use super::damp::damp_position;
use crate::config::IkConfig;
use crate::coords::LandmarkSpace;
use crate::pose::{LandmarkIndex, PoseFrame};
use crate::rig::{BoneRole, Rig, RigBinding};

/// IKゴールの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IkSlot {
    LeftHand,
    RightHand,
    LeftFoot,
    RightFoot,
    LookAt,
}

impl IkSlot {
    pub const ALL: [IkSlot; 5] = [
        Self::LeftHand,
        Self::RightHand,
        Self::LeftFoot,
        Self::RightFoot,
        Self::LookAt,
    ];

    /// 目標位置のランドマーク（手足は左右反転）
    pub fn landmark(self) -> LandmarkIndex {
        match self {
            Self::LeftHand => LandmarkIndex::RightWrist,
            Self::RightHand => LandmarkIndex::LeftWrist,
            Self::LeftFoot => LandmarkIndex::RightAnkle,
            Self::RightFoot => LandmarkIndex::LeftAnkle,
            Self::LookAt => LandmarkIndex::Nose,
        }
    }

    /// 末端の1つ手前のボーン
    fn limb(self) -> Option<BoneRole> {
        match self {
            Self::LeftHand => Some(BoneRole::LeftLowerArm),
            Self::RightHand => Some(BoneRole::RightLowerArm),
            Self::LeftFoot => Some(BoneRole::LeftLowerLeg),
            Self::RightFoot => Some(BoneRole::RightLowerLeg),
            Self::LookAt => None,
        }
    }
}

/// 手足のIKゴール（外部IKソルバへ渡す）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkGoal {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub position_weight: f32,
    pub rotation_weight: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAtGoal {
    pub position: Vector3<f32>,
    pub weight: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkGoals {
    pub left_hand: IkGoal,
    pub right_hand: IkGoal,
    pub left_foot: IkGoal,
    pub right_foot: IkGoal,
    pub look_at: LookAtGoal,
}

/// 5つのIK目標位置を個別に平滑化する
pub struct IkTargets {
    rate: f32,
    positions: [Vector3<f32>; 5],
}

impl IkTargets {
    /// 初回フレームで飛ばないよう、現在の手足位置と頭の前方の点で初期化する
    pub fn from_rig<R: Rig>(rig: &R, binding: &RigBinding, config: &IkConfig) -> Self {
        let positions = IkSlot::ALL.map(|slot| match slot.limb() {
            Some(role) => binding
                .bone(role)
                .map(|limb| {
                    let effector = rig.first_child(limb).unwrap_or(limb);
                    rig.world_position(effector)
                })
                .unwrap_or_else(Vector3::zeros),
            None => binding
                .bone(BoneRole::Head)
                .map(|head| {
                    rig.world_position(head)
                        + rig.world_rotation(head) * Vector3::z() * config.look_distance
                })
                .unwrap_or_else(Vector3::zeros),
        });
        Self {
            rate: config.rate,
            positions,
        }
    }

    pub fn position(&self, slot: IkSlot) -> Vector3<f32> {
        self.positions[slot as usize]
    }

    /// 検出済みの目標だけ近づける。未検出の目標は前回値を保持
    pub fn update(&mut self, space: &LandmarkSpace, frame: &PoseFrame, dt: f32) -> usize {
        let mut updated = 0;
        for slot in IkSlot::ALL {
            if let Some(target) = space.world_position(frame, slot.landmark()) {
                let current = &mut self.positions[slot as usize];
                *current = damp_position(current, &target, self.rate, dt);
                updated += 1;
            }
        }
        updated
    }

    /// 重み1のIKゴール。手足の回転は対応する下腕・下腿のワールド回転
    pub fn goals<R: Rig>(&self, rig: &R, binding: &RigBinding) -> IkGoals {
        let limb_goal = |slot: IkSlot| IkGoal {
            position: self.position(slot),
            rotation: slot
                .limb()
                .and_then(|role| binding.bone(role))
                .map(|bone| rig.world_rotation(bone))
                .unwrap_or_else(UnitQuaternion::identity),
            position_weight: 1.0,
            rotation_weight: 1.0,
        };
        IkGoals {
            left_hand: limb_goal(IkSlot::LeftHand),
            right_hand: limb_goal(IkSlot::RightHand),
            left_foot: limb_goal(IkSlot::LeftFoot),
            right_foot: limb_goal(IkSlot::RightFoot),
            look_at: LookAtGoal {
                position: self.position(IkSlot::LookAt),
                weight: 1.0,
            },
        }
    }
}
