use nalgebra::{UnitQuaternion, Vector3};

pub type BoneId = usize;

/// ホスト側ボーン階層へのアクセス
///
/// エンジンはボーンの寿命を持たず、ローカル回転とルートのワールド姿勢だけを書き換える。
pub trait Rig {
    fn bone_count(&self) -> usize;
    fn name(&self, bone: BoneId) -> &str;
    fn parent(&self, bone: BoneId) -> Option<BoneId>;
    fn first_child(&self, bone: BoneId) -> Option<BoneId>;

    fn local_rotation(&self, bone: BoneId) -> UnitQuaternion<f32>;
    fn set_local_rotation(&mut self, bone: BoneId, rotation: UnitQuaternion<f32>);

    fn world_position(&self, bone: BoneId) -> Vector3<f32>;
    fn world_rotation(&self, bone: BoneId) -> UnitQuaternion<f32>;
    fn set_world_position(&mut self, bone: BoneId, position: Vector3<f32>);
    fn set_world_rotation(&mut self, bone: BoneId, rotation: UnitQuaternion<f32>);

    /// 名前でボーンを探す（バインド時のみ使用）
    ///
    /// 大文字小文字は区別しない。完全一致が無ければ `mixamorig:Hips` のような
    /// 名前空間付きの名前も末尾で一致させる。
    fn find(&self, name: &str) -> Option<BoneId> {
        (0..self.bone_count())
            .find(|&b| self.name(b).eq_ignore_ascii_case(name))
            .or_else(|| {
                (0..self.bone_count())
                    .find(|&b| strip_namespace(self.name(b)).eq_ignore_ascii_case(name))
            })
    }
}

/// `prefix:Name` や `Armature|Name` の名前空間を外す
pub fn strip_namespace(name: &str) -> &str {
    name.rsplit([':', '|']).next().unwrap_or(name)
}

#[derive(Debug, Clone)]
pub struct Bone {
    pub name: String,
    pub parent: Option<BoneId>,
    pub children: Vec<BoneId>,
    /// 親空間での位置
    pub local_position: Vector3<f32>,
    pub local_rotation: UnitQuaternion<f32>,
}

/// スケールなしの単純なボーン階層
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
}

impl Skeleton {
    pub fn new() -> Self {
        Self { bones: Vec::new() }
    }

    /// ボーンを追加。親は先に追加されている必要がある
    pub fn add_bone(
        &mut self,
        name: &str,
        parent: Option<BoneId>,
        local_position: Vector3<f32>,
    ) -> BoneId {
        let id = self.bones.len();
        self.bones.push(Bone {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            local_position,
            local_rotation: UnitQuaternion::identity(),
        });
        if let Some(p) = parent {
            self.bones[p].children.push(id);
        }
        id
    }

    pub fn bone(&self, bone: BoneId) -> &Bone {
        &self.bones[bone]
    }

    fn parent_world(&self, bone: BoneId) -> (Vector3<f32>, UnitQuaternion<f32>) {
        match self.bones[bone].parent {
            Some(p) => (self.world_position(p), self.world_rotation(p)),
            None => (Vector3::zeros(), UnitQuaternion::identity()),
        }
    }

    /// Tポーズの参照ヒューマノイド（+Z正面、左は-X側）
    pub fn humanoid() -> Self {
        let mut s = Self::new();
        let hips = s.add_bone("Hips", None, Vector3::new(0.0, 1.0, 0.0));
        let spine = s.add_bone("Spine", Some(hips), Vector3::new(0.0, 0.1, 0.0));
        let neck = s.add_bone("Neck", Some(spine), Vector3::new(0.0, 0.4, 0.0));
        let head = s.add_bone("Head", Some(neck), Vector3::new(0.0, 0.1, 0.0));
        s.add_bone("HeadTop", Some(head), Vector3::new(0.0, 0.15, 0.0));

        for (side, sign) in [("Left", -1.0f32), ("Right", 1.0)] {
            let upper = s.add_bone(
                &format!("{side}UpperArm"),
                Some(spine),
                Vector3::new(0.18 * sign, 0.35, 0.0),
            );
            let lower = s.add_bone(
                &format!("{side}LowerArm"),
                Some(upper),
                Vector3::new(0.28 * sign, 0.0, 0.0),
            );
            let hand = s.add_bone(
                &format!("{side}Hand"),
                Some(lower),
                Vector3::new(0.25 * sign, 0.0, 0.0),
            );
            s.add_bone(
                &format!("{side}IndexProximal"),
                Some(hand),
                Vector3::new(0.08 * sign, 0.0, 0.0),
            );
        }

        for (side, sign) in [("Left", -1.0f32), ("Right", 1.0)] {
            let upper = s.add_bone(
                &format!("{side}UpperLeg"),
                Some(hips),
                Vector3::new(0.1 * sign, -0.05, 0.0),
            );
            let lower = s.add_bone(
                &format!("{side}LowerLeg"),
                Some(upper),
                Vector3::new(0.0, -0.42, 0.0),
            );
            let foot = s.add_bone(
                &format!("{side}Foot"),
                Some(lower),
                Vector3::new(0.0, -0.42, 0.0),
            );
            s.add_bone(
                &format!("{side}Toes"),
                Some(foot),
                Vector3::new(0.0, -0.05, 0.12),
            );
        }
        s
    }
}

impl Rig for Skeleton {
    fn bone_count(&self) -> usize {
        self.bones.len()
    }

    fn name(&self, bone: BoneId) -> &str {
        &self.bones[bone].name
    }

    fn parent(&self, bone: BoneId) -> Option<BoneId> {
        self.bones[bone].parent
    }

    fn first_child(&self, bone: BoneId) -> Option<BoneId> {
        self.bones[bone].children.first().copied()
    }

    fn local_rotation(&self, bone: BoneId) -> UnitQuaternion<f32> {
        self.bones[bone].local_rotation
    }

    fn set_local_rotation(&mut self, bone: BoneId, rotation: UnitQuaternion<f32>) {
        self.bones[bone].local_rotation = rotation;
    }

    fn world_position(&self, bone: BoneId) -> Vector3<f32> {
        let b = &self.bones[bone];
        match b.parent {
            Some(p) => self.world_position(p) + self.world_rotation(p) * b.local_position,
            None => b.local_position,
        }
    }

    fn world_rotation(&self, bone: BoneId) -> UnitQuaternion<f32> {
        let b = &self.bones[bone];
        match b.parent {
            Some(p) => self.world_rotation(p) * b.local_rotation,
            None => b.local_rotation,
        }
    }

    fn set_world_position(&mut self, bone: BoneId, position: Vector3<f32>) {
        let (parent_pos, parent_rot) = self.parent_world(bone);
        self.bones[bone].local_position = parent_rot.inverse() * (position - parent_pos);
    }

    fn set_world_rotation(&mut self, bone: BoneId, rotation: UnitQuaternion<f32>) {
        let (_, parent_rot) = self.parent_world(bone);
        self.bones[bone].local_rotation = parent_rot.inverse() * rotation;
    }
}
