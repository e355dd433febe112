use nalgebra::{UnitQuaternion, Vector3};
use std::collections::HashMap;
use tracing::trace;

use super::damp::{damp_rotation, shortest_arc};
use crate::config::BoneConfig;
use crate::coords::{is_degenerate, LandmarkSpace};
use crate::pose::{LandmarkIndex, PoseFrame};
use crate::rig::{BindPose, BoneId, BoneRole, Rig, RigBinding};

/// ボーンの始点・終点になる関節
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joint {
    Landmark(LandmarkIndex),
    HipCenter,
    ShoulderCenter,
}

impl Joint {
    pub fn resolve(self, space: &LandmarkSpace, frame: &PoseFrame) -> Option<Vector3<f32>> {
        match self {
            Joint::Landmark(index) => space.world_position(frame, index),
            Joint::HipCenter => space.hip_center(frame),
            Joint::ShoulderCenter => space.shoulder_center(frame),
        }
    }
}

/// ボーン → (始点, 終点)。親ボーンが先
///
/// 腕・脚は左右反転: アバターの左腕はカメラ映像の右側ランドマークで動かす。
pub const DRIVE_TABLE: [(BoneRole, Joint, Joint); 11] = {
    use LandmarkIndex::*;
    [
        (BoneRole::Spine, Joint::HipCenter, Joint::ShoulderCenter),
        (BoneRole::Neck, Joint::ShoulderCenter, Joint::Landmark(Nose)),
        (BoneRole::Head, Joint::ShoulderCenter, Joint::Landmark(Nose)),
        (BoneRole::LeftUpperArm, Joint::Landmark(RightShoulder), Joint::Landmark(RightElbow)),
        (BoneRole::LeftLowerArm, Joint::Landmark(RightElbow), Joint::Landmark(RightWrist)),
        (BoneRole::RightUpperArm, Joint::Landmark(LeftShoulder), Joint::Landmark(LeftElbow)),
        (BoneRole::RightLowerArm, Joint::Landmark(LeftElbow), Joint::Landmark(LeftWrist)),
        (BoneRole::LeftUpperLeg, Joint::Landmark(RightHip), Joint::Landmark(RightKnee)),
        (BoneRole::LeftLowerLeg, Joint::Landmark(RightKnee), Joint::Landmark(RightAnkle)),
        (BoneRole::RightUpperLeg, Joint::Landmark(LeftHip), Joint::Landmark(LeftKnee)),
        (BoneRole::RightLowerLeg, Joint::Landmark(LeftKnee), Joint::Landmark(LeftAnkle)),
    ]
};

/// 2点の方向からボーンのローカル回転を決める（エイム・リターゲット）
pub struct BoneRetargeter {
    rate: f32,
    global_offset: UnitQuaternion<f32>,
    role_offsets: HashMap<BoneRole, UnitQuaternion<f32>>,
}

impl BoneRetargeter {
    pub fn new(rate: f32) -> Self {
        Self {
            rate,
            global_offset: UnitQuaternion::identity(),
            role_offsets: HashMap::new(),
        }
    }

    pub fn from_config(config: &BoneConfig) -> Self {
        let role_offsets = config
            .axis_offsets
            .keys()
            .filter_map(|&role| config.role_offset(role).map(|q| (role, q)))
            .collect();
        Self {
            rate: config.rate,
            global_offset: config.global_offset(),
            role_offsets,
        }
    }

    pub fn with_global_offset(mut self, offset: UnitQuaternion<f32>) -> Self {
        self.global_offset = offset;
        self
    }

    pub fn with_role_offset(mut self, role: BoneRole, offset: UnitQuaternion<f32>) -> Self {
        self.role_offsets.insert(role, offset);
        self
    }

    /// 平滑化前の目標ローカル回転
    ///
    /// 始点・終点のどちらかが欠けている、または一致している場合は None。
    pub fn desired_rotation<R: Rig>(
        &self,
        rig: &R,
        bind: &mut BindPose,
        bone: BoneId,
        role: Option<BoneRole>,
        start: Option<Vector3<f32>>,
        end: Option<Vector3<f32>>,
    ) -> Option<UnitQuaternion<f32>> {
        let (start, end) = (start?, end?);
        let delta = end - start;
        if is_degenerate(&delta) {
            return None;
        }
        let parent = rig.parent(bone)?;
        let target_parent = rig.world_rotation(parent).inverse() * delta.normalize();
        let entry = bind.entry_or_capture(rig, bone)?;

        let delta_parent = shortest_arc(&entry.aim_parent, &target_parent);
        let mut desired = delta_parent * entry.local_rotation * self.global_offset;
        if let Some(offset) = role.and_then(|r| self.role_offsets.get(&r)) {
            desired *= *offset;
        }
        Some(desired)
    }

    /// 目標回転へ指数平滑で近づける。更新しなかった場合は false
    #[allow(clippy::too_many_arguments)]
    pub fn aim<R: Rig>(
        &self,
        rig: &mut R,
        bind: &mut BindPose,
        bone: BoneId,
        role: Option<BoneRole>,
        start: Option<Vector3<f32>>,
        end: Option<Vector3<f32>>,
        dt: f32,
    ) -> bool {
        let Some(desired) = self.desired_rotation(rig, bind, bone, role, start, end) else {
            return false;
        };
        let current = rig.local_rotation(bone);
        rig.set_local_rotation(bone, damp_rotation(&current, &desired, self.rate, dt));
        true
    }

    /// 対応表の全ボーンを更新し、更新できた本数を返す
    pub fn update<R: Rig>(
        &self,
        rig: &mut R,
        bind: &mut BindPose,
        binding: &RigBinding,
        space: &LandmarkSpace,
        frame: &PoseFrame,
        dt: f32,
    ) -> usize {
        let mut updated = 0;
        for (role, start, end) in DRIVE_TABLE {
            let Some(bone) = binding.bone(role) else {
                continue;
            };
            let start = start.resolve(space, frame);
            let end = end.resolve(space, frame);
            if self.aim(rig, bind, bone, Some(role), start, end, dt) {
                updated += 1;
            } else {
                trace!(?role, "bone held");
            }
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Landmark;
    use crate::rig::Skeleton;
    use std::f32::consts::FRAC_PI_2;

    fn approx_eq_v(a: &Vector3<f32>, b: &Vector3<f32>, eps: f32) -> bool {
        (a - b).norm() < eps
    }

    fn setup() -> (Skeleton, RigBinding, BindPose) {
        let s = Skeleton::humanoid();
        let binding = RigBinding::from_names(&s);
        let bind = BindPose::capture(&s, &binding).unwrap();
        (s, binding, bind)
    }

    #[test]
    fn test_rest_direction_reproduces_bind_rotation() {
        let mut s = Skeleton::humanoid();
        let binding = RigBinding::from_names(&s);
        let upper = binding.bone(BoneRole::LeftUpperArm).unwrap();
        let spine = binding.bone(BoneRole::Spine).unwrap();
        let rest = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.3);
        s.set_local_rotation(upper, rest);
        let mut bind = BindPose::capture(&s, &binding).unwrap();

        // 親を回しても、親空間で同じ向きを与えれば基準回転に戻る
        s.set_local_rotation(spine, UnitQuaternion::from_euler_angles(0.2, 0.5, -0.1));
        let aim_parent = bind.get(upper).unwrap().aim_parent;
        let world_dir = s.world_rotation(spine) * aim_parent;
        let start = Vector3::new(0.3, 1.0, 0.2);
        let retargeter = BoneRetargeter::new(10.0);
        let desired = retargeter
            .desired_rotation(&s, &mut bind, upper, Some(BoneRole::LeftUpperArm), Some(start), Some(start + world_dir * 0.4))
            .unwrap();
        assert!(desired.angle_to(&rest) < 1e-4);
    }

    #[test]
    fn test_desired_rotation_points_bone() {
        let (s, binding, mut bind) = setup();
        let upper = binding.bone(BoneRole::LeftUpperArm).unwrap();
        let retargeter = BoneRetargeter::new(10.0);
        // 腕を真下へ
        let start = Vector3::new(-0.2, 1.45, 0.0);
        let end = Vector3::new(-0.2, 1.0, 0.0);
        let desired = retargeter
            .desired_rotation(&s, &mut bind, upper, None, Some(start), Some(end))
            .unwrap();
        let aim = desired * Vector3::new(-1.0, 0.0, 0.0);
        assert!(approx_eq_v(&aim, &Vector3::new(0.0, -1.0, 0.0), 1e-5));
    }

    #[test]
    fn test_offsets_right_multiplied() {
        let (s, binding, mut bind) = setup();
        let upper = binding.bone(BoneRole::LeftUpperArm).unwrap();
        let global = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2);
        let per_bone = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.4);
        let plain = BoneRetargeter::new(10.0);
        let corrected = BoneRetargeter::new(10.0)
            .with_global_offset(global)
            .with_role_offset(BoneRole::LeftUpperArm, per_bone);
        let start = Some(Vector3::new(0.0, 1.4, 0.0));
        let end = Some(Vector3::new(-0.3, 1.2, 0.1));
        let a = plain
            .desired_rotation(&s, &mut bind, upper, Some(BoneRole::LeftUpperArm), start, end)
            .unwrap();
        let b = corrected
            .desired_rotation(&s, &mut bind, upper, Some(BoneRole::LeftUpperArm), start, end)
            .unwrap();
        assert!(b.angle_to(&(a * global * per_bone)) < 1e-5);
    }

    #[test]
    fn test_missing_or_coincident_holds() {
        let (mut s, binding, mut bind) = setup();
        let upper = binding.bone(BoneRole::LeftUpperArm).unwrap();
        let before = UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3);
        s.set_local_rotation(upper, before);
        let r = BoneRetargeter::new(10.0);
        let p = Vector3::new(0.1, 1.2, 0.0);
        assert!(!r.aim(&mut s, &mut bind, upper, None, None, Some(p), 0.016));
        assert!(!r.aim(&mut s, &mut bind, upper, None, Some(p), None, 0.016));
        assert!(!r.aim(&mut s, &mut bind, upper, None, Some(p), Some(p), 0.016));
        assert_eq!(s.local_rotation(upper), before);
    }

    #[test]
    fn test_aim_smooths_toward_target() {
        let (mut s, binding, mut bind) = setup();
        let lower = binding.bone(BoneRole::RightLowerArm).unwrap();
        let r = BoneRetargeter::new(5.0);
        let start = Some(Vector3::new(0.5, 1.45, 0.0));
        let end = Some(Vector3::new(0.5, 1.75, 0.0));
        let desired = r.desired_rotation(&s, &mut bind, lower, None, start, end).unwrap();
        let initial_err = s.local_rotation(lower).angle_to(&desired);
        assert!(r.aim(&mut s, &mut bind, lower, None, start, end, 0.05));
        let err = s.local_rotation(lower).angle_to(&desired);
        assert!(err < initial_err && err > 0.0);
        for _ in 0..200 {
            r.aim(&mut s, &mut bind, lower, None, start, end, 0.05);
        }
        assert!(s.local_rotation(lower).angle_to(&desired) < 1e-3);
    }

    #[test]
    fn test_update_uses_mirrored_landmarks() {
        let (mut s, binding, mut bind) = setup();
        let space = LandmarkSpace::new(1.0);
        let mut frame = PoseFrame::default();
        // 映像右側の肩→肘だけ与える（真下）
        frame.set(LandmarkIndex::RightShoulder, Some(Landmark::new(0.3, 0.3, 0.0, 1.0)));
        frame.set(LandmarkIndex::RightElbow, Some(Landmark::new(0.3, 0.6, 0.0, 1.0)));
        let left_upper = binding.bone(BoneRole::LeftUpperArm).unwrap();
        let right_upper = binding.bone(BoneRole::RightUpperArm).unwrap();
        let r = BoneRetargeter::new(1000.0);
        let updated = r.update(&mut s, &mut bind, &binding, &space, &frame, 1.0);
        assert_eq!(updated, 1);
        assert_ne!(s.local_rotation(left_upper), UnitQuaternion::identity());
        assert_eq!(s.local_rotation(right_upper), UnitQuaternion::identity());
    }

    #[test]
    fn test_drive_table_covers_non_root_roles() {
        for role in BoneRole::ALL {
            let driven = DRIVE_TABLE.iter().any(|(r, _, _)| *r == role);
            assert_eq!(driven, !role.is_root(), "{:?}", role);
        }
    }
}
