use nalgebra::{Isometry3, Vector3};
use tracing::{debug, info};

use crate::config::Config;
use crate::coords::LandmarkSpace;
use crate::error::BindError;
use crate::pose::{LandmarkIndex, PoseFrame};
use crate::rig::{BindPose, BoneId, BoneRole, Rig, RigBinding};
use crate::tracker::{BoneRetargeter, IkGoals, IkTargets, RootMotion, RootUpdate};

/// 1tickの結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// フレームがあったか
    pub frame: bool,
    pub root: RootUpdate,
    pub bones_updated: usize,
    pub ik_updated: usize,
    pub goals: IkGoals,
}

/// リターゲットの全体制御
///
/// 1tickの順序: ルート → 各ボーン → 指・つま先のバインド復元 → IK目標。
pub struct Retargeter {
    binding: RigBinding,
    bind: BindPose,
    root_bone: BoneId,
    space: LandmarkSpace,
    root: RootMotion,
    bones: BoneRetargeter,
    ik: IkTargets,
}

impl Retargeter {
    /// バインドフェーズ。初回tickの前に全ボーンのバインド姿勢を確定させる
    pub fn bind<R: Rig>(rig: &R, binding: RigBinding, config: &Config) -> Result<Self, BindError> {
        let bind = BindPose::capture(rig, &binding)?;
        let root_bone = binding
            .bone(BoneRole::Hips)
            .ok_or(BindError::MissingBone(BoneRole::Hips))?;
        let initial_hip = rig.world_position(root_bone);
        let ik = IkTargets::from_rig(rig, &binding, &config.ik);

        info!(
            bones = bind.len(),
            extremities = binding.extremities().len(),
            "Rig bound (hips at {:.3}, {:.3}, {:.3})",
            initial_hip.x,
            initial_hip.y,
            initial_hip.z
        );

        Ok(Self {
            binding,
            bind,
            root_bone,
            space: LandmarkSpace::from_config(&config.space),
            root: RootMotion::from_config(&config.root, initial_hip),
            bones: BoneRetargeter::from_config(&config.bones),
            ik,
        })
    }

    /// アバター原点の姿勢（ランドマーク座標に適用される）
    pub fn set_origin(&mut self, origin: Isometry3<f32>) {
        self.space.origin = origin;
    }

    pub fn space(&self) -> &LandmarkSpace {
        &self.space
    }

    pub fn binding(&self) -> &RigBinding {
        &self.binding
    }

    /// 平滑化済みフレーム上のランドマークのワールド座標。未検出なら None
    pub fn world_position(&self, frame: &PoseFrame, index: LandmarkIndex) -> Option<Vector3<f32>> {
        self.space.world_position(frame, index)
    }

    /// 現在保持しているIKゴール
    pub fn goals<R: Rig>(&self, rig: &R) -> IkGoals {
        self.ik.goals(rig, &self.binding)
    }

    /// 1tick分のリターゲット
    ///
    /// フレームが無ければリグには触れず、保持中のIKゴールを返す。
    pub fn tick<R: Rig>(&mut self, rig: &mut R, frame: Option<&PoseFrame>, dt: f32) -> TickReport {
        let Some(frame) = frame else {
            return TickReport {
                frame: false,
                root: RootUpdate::default(),
                bones_updated: 0,
                ik_updated: 0,
                goals: self.goals(&*rig),
            };
        };

        let root = self.root.update(rig, self.root_bone, &self.space, frame, dt);
        let bones_updated = self
            .bones
            .update(rig, &mut self.bind, &self.binding, &self.space, frame, dt);
        self.bind.restore_extremities(rig);
        let ik_updated = self.ik.update(&self.space, frame, dt);

        debug!(
            detected = frame.detected_count(),
            bones_updated,
            ik_updated,
            root_position = root.position,
            root_rotation = root.rotation,
            "tick"
        );

        TickReport {
            frame: true,
            root,
            bones_updated,
            ik_updated,
            goals: self.goals(&*rig),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Landmark;
    use crate::rig::Skeleton;
    use nalgebra::UnitQuaternion;

    const DT: f32 = 1.0 / 60.0;

    fn set(frame: &mut PoseFrame, index: LandmarkIndex, x: f32, y: f32, z: f32) {
        frame.set(index, Some(Landmark::new(x, y, z, 1.0)));
    }

    /// カメラ映像上の直立Tポーズ（左右反転済み映像なので右側ランドマークが画像左）
    ///
    /// 鼻は肩中心の真上。
    fn t_pose_frame() -> PoseFrame {
        use LandmarkIndex::*;
        let mut f = PoseFrame::default();
        set(&mut f, Nose, 0.5, 0.2, 0.0);
        set(&mut f, RightShoulder, 0.4, 0.3, 0.0);
        set(&mut f, LeftShoulder, 0.6, 0.3, 0.0);
        set(&mut f, RightElbow, 0.3, 0.3, 0.0);
        set(&mut f, LeftElbow, 0.7, 0.3, 0.0);
        set(&mut f, RightWrist, 0.2, 0.3, 0.0);
        set(&mut f, LeftWrist, 0.8, 0.3, 0.0);
        set(&mut f, RightHip, 0.45, 0.55, 0.0);
        set(&mut f, LeftHip, 0.55, 0.55, 0.0);
        set(&mut f, RightKnee, 0.45, 0.75, 0.0);
        set(&mut f, LeftKnee, 0.55, 0.75, 0.0);
        set(&mut f, RightAnkle, 0.45, 0.95, 0.0);
        set(&mut f, LeftAnkle, 0.55, 0.95, 0.0);
        f
    }

    fn setup() -> (Skeleton, Retargeter) {
        let s = Skeleton::humanoid();
        let binding = RigBinding::from_names(&s);
        let engine = Retargeter::bind(&s, binding, &Config::default()).unwrap();
        (s, engine)
    }

    fn snapshot(s: &Skeleton) -> Vec<(UnitQuaternion<f32>, Vector3<f32>)> {
        (0..s.bone_count())
            .map(|b| (s.local_rotation(b), s.world_position(b)))
            .collect()
    }

    #[test]
    fn test_bind_requires_hips() {
        let s = Skeleton::humanoid();
        let binding = RigBinding::from_names(&s);
        let mut partial = RigBinding::new();
        for (role, bone) in binding.bones() {
            if role != BoneRole::Hips {
                partial = partial.with_bone(role, bone);
            }
        }
        assert!(Retargeter::bind(&s, partial, &Config::default()).is_err());
    }

    #[test]
    fn test_no_frame_is_noop() {
        let (mut s, mut engine) = setup();
        let before = snapshot(&s);
        let goals_before = engine.goals(&s);
        for _ in 0..100 {
            let report = engine.tick(&mut s, None, DT);
            assert!(!report.frame);
            assert_eq!(report.goals, goals_before);
        }
        assert_eq!(snapshot(&s), before);
    }

    #[test]
    fn test_empty_frame_holds_pose() {
        let (mut s, mut engine) = setup();
        for _ in 0..30 {
            engine.tick(&mut s, Some(&t_pose_frame()), DT);
        }
        let before = snapshot(&s);
        let report = engine.tick(&mut s, Some(&PoseFrame::default()), DT);
        assert_eq!(report.bones_updated, 0);
        assert_eq!(report.ik_updated, 0);
        assert_eq!(report.root, RootUpdate::default());
        assert_eq!(snapshot(&s), before);
    }

    #[test]
    fn test_full_frame_drives_everything() {
        let (mut s, mut engine) = setup();
        let report = engine.tick(&mut s, Some(&t_pose_frame()), DT);
        assert!(report.frame);
        assert_eq!(report.bones_updated, 11);
        assert_eq!(report.ik_updated, 5);
        assert!(report.root.position && report.root.rotation);
    }

    #[test]
    fn test_t_pose_keeps_limbs_at_rest() {
        let (mut s, mut engine) = setup();
        for _ in 0..600 {
            engine.tick(&mut s, Some(&t_pose_frame()), DT);
        }
        for name in [
            "Spine",
            "Neck",
            "Head",
            "LeftUpperArm",
            "LeftLowerArm",
            "RightUpperArm",
            "RightLowerArm",
            "LeftUpperLeg",
            "RightLowerLeg",
        ] {
            let bone = s.find(name).unwrap();
            let angle = s.local_rotation(bone).angle();
            assert!(angle < 0.01, "{} rotated by {} rad", name, angle);
        }
        // 正面（+Z）を向いたまま
        let hips = s.find("Hips").unwrap();
        assert!(s.world_rotation(hips).angle() < 0.01);
    }

    #[test]
    fn test_root_follows_hip_center() {
        let (mut s, mut engine) = setup();
        let hips = s.find("Hips").unwrap();
        let initial = s.world_position(hips);
        for _ in 0..600 {
            engine.tick(&mut s, Some(&t_pose_frame()), DT);
        }
        // 腰中心は画像上 y=0.55 → scale 2.0 で -0.1
        let expected = initial + Vector3::new(0.0, -0.1, 0.0);
        assert!((s.world_position(hips) - expected).norm() < 1e-3);
    }

    #[test]
    fn test_extremities_stay_at_bind() {
        let (mut s, mut engine) = setup();
        let finger = s.find("LeftIndexProximal").unwrap();
        let rest = s.local_rotation(finger);
        s.set_local_rotation(finger, UnitQuaternion::from_euler_angles(0.3, 0.0, 0.0));
        engine.tick(&mut s, Some(&t_pose_frame()), DT);
        assert_eq!(s.local_rotation(finger), rest);
    }

    #[test]
    fn test_same_input_same_output() {
        let (mut a, mut engine_a) = setup();
        let (mut b, mut engine_b) = setup();
        let frame = t_pose_frame();
        for _ in 0..5 {
            let ra = engine_a.tick(&mut a, Some(&frame), DT);
            let rb = engine_b.tick(&mut b, Some(&frame), DT);
            assert_eq!(ra, rb);
        }
        assert_eq!(snapshot(&a), snapshot(&b));
    }

    #[test]
    fn test_world_position_query() {
        let (_, engine) = setup();
        let frame = t_pose_frame();
        let nose = engine.world_position(&frame, LandmarkIndex::Nose).unwrap();
        assert!((nose - Vector3::new(0.0, 0.6, 0.0)).norm() < 1e-5);
        assert!(engine.world_position(&frame, LandmarkIndex::LeftEar).is_none());
    }
}
