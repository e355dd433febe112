/// MediaPipe Pose の 33 ランドマークインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum LandmarkIndex {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl LandmarkIndex {
    pub const COUNT: usize = 33;

    const ALL: [LandmarkIndex; Self::COUNT] = [
        Self::Nose,
        Self::LeftEyeInner,
        Self::LeftEye,
        Self::LeftEyeOuter,
        Self::RightEyeInner,
        Self::RightEye,
        Self::RightEyeOuter,
        Self::LeftEar,
        Self::RightEar,
        Self::MouthLeft,
        Self::MouthRight,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftPinky,
        Self::RightPinky,
        Self::LeftIndex,
        Self::RightIndex,
        Self::LeftThumb,
        Self::RightThumb,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::LeftHeel,
        Self::RightHeel,
        Self::LeftFootIndex,
        Self::RightFootIndex,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// 単一ランドマーク
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    /// 正規化されたX座標 (0.0〜1.0, 左上原点)
    pub x: f32,
    /// 正規化されたY座標 (0.0〜1.0, 下向き正)
    pub y: f32,
    /// 腰中心基準の相対深度
    pub z: f32,
    /// 可視度 (0.0〜1.0)
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }

    /// 可視度が閾値以上か
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility >= threshold
    }

    /// 成分ごとの線形補間 (x, y, z, visibility)
    pub fn lerp(&self, other: &Landmark, t: f32) -> Landmark {
        Landmark {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
            visibility: self.visibility + (other.visibility - self.visibility) * t,
        }
    }
}

/// 1観測分のランドマークフレーム
///
/// 未検出のランドマークは配列から除かれず `None` になる。
#[derive(Debug, Clone, PartialEq)]
pub struct PoseFrame {
    /// 送信側の時刻（秒）
    pub timestamp: f64,
    pub image_width: u32,
    pub image_height: u32,
    /// 左右ヒップのz平均
    pub mid_hip_z: f32,
    /// 送信側のfps推定値
    pub fps: f32,
    pub landmarks: [Option<Landmark>; LandmarkIndex::COUNT],
}

impl PoseFrame {
    pub fn new(landmarks: [Option<Landmark>; LandmarkIndex::COUNT]) -> Self {
        Self {
            timestamp: 0.0,
            image_width: 0,
            image_height: 0,
            mid_hip_z: 0.0,
            fps: 0.0,
            landmarks,
        }
    }

    pub fn get(&self, index: LandmarkIndex) -> Option<&Landmark> {
        self.landmarks[index as usize].as_ref()
    }

    pub fn set(&mut self, index: LandmarkIndex, landmark: Option<Landmark>) {
        self.landmarks[index as usize] = landmark;
    }

    /// 検出済みランドマーク数
    pub fn detected_count(&self) -> usize {
        self.landmarks.iter().filter(|l| l.is_some()).count()
    }
}

impl Default for PoseFrame {
    fn default() -> Self {
        Self::new([None; LandmarkIndex::COUNT])
    }
}
