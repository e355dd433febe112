use nalgebra::{UnitQuaternion, Vector3};

use crate::coords::is_degenerate;

/// 指数平滑の補間係数 t = 1 - e^(-k·Δt)
///
/// フレームレートに依存しない。rate が大きいほど追従が速い。
pub fn damping_factor(rate: f32, dt: f32) -> f32 {
    if dt <= 0.0 || rate <= 0.0 {
        return 0.0;
    }
    1.0 - (-rate * dt).exp()
}

pub fn damp_position(current: &Vector3<f32>, target: &Vector3<f32>, rate: f32, dt: f32) -> Vector3<f32> {
    current.lerp(target, damping_factor(rate, dt))
}

pub fn damp_rotation(
    current: &UnitQuaternion<f32>,
    target: &UnitQuaternion<f32>,
    rate: f32,
    dt: f32,
) -> UnitQuaternion<f32> {
    let t = damping_factor(rate, dt);
    if t <= 0.0 {
        return *current;
    }
    // slerp は最短経路。ほぼ一致している場合は target をそのまま使う
    current.try_slerp(target, t, 1.0e-6).unwrap_or(*target)
}

/// from を to へ移す最小回転（両方単位ベクトル）
///
/// 真逆の場合は from に垂直な任意軸まわりの180度回転。
pub fn shortest_arc(from: &Vector3<f32>, to: &Vector3<f32>) -> UnitQuaternion<f32> {
    if let Some(q) = UnitQuaternion::rotation_between(from, to) {
        return q;
    }
    let mut axis = from.cross(&Vector3::x());
    if is_degenerate(&axis) {
        axis = from.cross(&Vector3::y());
    }
    UnitQuaternion::from_axis_angle(&nalgebra::Unit::new_normalize(axis), std::f32::consts::PI)
}
