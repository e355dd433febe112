use std::sync::{Arc, Mutex};

use crate::config::StreamConfig;
use crate::pose::PoseFrame;

/// ランドマークフレームのブレンド
///
/// 両方に存在するランドマークは lerp(prev, new, 1-α)。新フレームにしか無いものはそのまま採用し、
/// 新フレームで欠けたものは欠けたままにする。メタデータは新フレームの値で置き換える。
pub fn blend_frames(state: &PoseFrame, incoming: &PoseFrame, retention: f32) -> PoseFrame {
    let t = 1.0 - retention;
    let mut blended = incoming.clone();
    for (out, prev) in blended.landmarks.iter_mut().zip(state.landmarks.iter()) {
        if let (Some(new), Some(prev)) = (out.as_ref(), prev.as_ref()) {
            *out = Some(prev.lerp(new, t));
        }
    }
    blended
}

/// EMAベースのランドマークストリーム平滑化
///
/// 受信メッセージごとに1回ブレンドする（描画フレーム時間ではない）。
pub struct StreamSmoother {
    retention: f32,
    state: Option<PoseFrame>,
}

impl StreamSmoother {
    pub fn new(retention: f32) -> Self {
        Self {
            retention: retention.clamp(0.0, 1.0),
            state: None,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(config.retention)
    }

    pub fn smooth(&mut self, incoming: &PoseFrame) -> &PoseFrame {
        let next = match self.state.take() {
            Some(prev) => blend_frames(&prev, incoming, self.retention),
            None => incoming.clone(),
        };
        self.state.insert(next)
    }
}

/// 受信側と描画tick側の受け渡しスロット
///
/// 書き込みはフレーム全体の差し替えのみ。読み手は途中状態を見ない。
#[derive(Clone, Default)]
pub struct FrameSlot {
    latest: Arc<Mutex<Option<Arc<PoseFrame>>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: PoseFrame) {
        let frame = Arc::new(frame);
        let mut guard = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(frame);
    }

    pub fn snapshot(&self) -> Option<Arc<PoseFrame>> {
        self.latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// 受信経路側: 手元のコピーでブレンドしてからスロットへ公開する
pub struct FrameFeed {
    smoother: StreamSmoother,
    slot: FrameSlot,
}

impl FrameFeed {
    pub fn new(smoother: StreamSmoother, slot: FrameSlot) -> Self {
        Self { smoother, slot }
    }

    pub fn push(&mut self, frame: &PoseFrame) {
        let smoothed = self.smoother.smooth(frame).clone();
        self.slot.publish(smoothed);
    }

    pub fn slot(&self) -> &FrameSlot {
        &self.slot
    }
}
