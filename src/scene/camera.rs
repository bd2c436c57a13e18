//! Scene camera and the orbit / free-look controller driving it.

use std::f32::consts::{PI, TAU};

use crate::util::{look_at, Mat4, ProjectionKind, Vec3};

const MIN_DISTANCE: f32 = 0.5;
const MAX_DISTANCE: f32 = 50.0;
const DEFAULT_DISTANCE: f32 = 5.0;
/// Free-look pitch limit, just short of straight up/down.
const MAX_LOOK_PITCH: f32 = 89.0 * PI / 180.0;

/// Eye, target, up and projection type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: ProjectionKind,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            projection: ProjectionKind::Perspective,
        }
    }
}

impl Camera {
    pub fn look_at(&mut self, eye: Vec3, center: Vec3, up: Vec3) {
        self.position = eye;
        self.target = center;
        self.up = up;
    }

    /// World -> view matrix.
    pub fn view(&self) -> Mat4 {
        look_at(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix(self.position, self.target)
    }

    /// Unit viewing direction, `-Z` when eye and target coincide.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position)
            .try_normalize()
            .unwrap_or(Vec3::NEG_Z)
    }

    /// Right and true-up vectors of the viewing frame.
    pub fn basis(&self) -> (Vec3, Vec3) {
        let forward = self.forward();
        let right = forward
            .cross(self.up)
            .try_normalize()
            .unwrap_or(Vec3::X);
        let up = right.cross(forward).normalize();
        (right, up)
    }

    /// Translate eye and target together; `direction` is (right, up, forward).
    pub fn translate_local(&mut self, direction: Vec3, speed: f32) {
        let (right, up) = self.basis();
        let movement = right * direction.x + up * direction.y + self.forward() * direction.z;
        self.position += movement * speed;
        self.target += movement * speed;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraMode {
    #[default]
    Orbit,
    FreeLook,
}

/// Interactive camera control.
///
/// In orbit mode the eye position is derived every update from
/// `pivot + distance * (cos p sin y, sin p, cos p cos y)`, so repeated orbiting
/// never drifts. Free-look edits the camera directly; the spherical parameters
/// are re-derived from the eye-to-target vector when orbit mode is re-entered.
#[derive(Debug, Clone)]
pub struct CameraController {
    mode: CameraMode,
    pivot: Vec3,
    distance: f32,
    yaw: f32,
    pitch: f32,
    pub orbit_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub move_speed: f32,
    pub look_speed: f32,
}

impl Default for CameraController {
    fn default() -> Self {
        Self {
            mode: CameraMode::Orbit,
            pivot: Vec3::ZERO,
            distance: DEFAULT_DISTANCE,
            yaw: 0.0,
            pitch: 0.0,
            orbit_speed: 0.05,
            zoom_speed: 0.5,
            pan_speed: 0.05,
            move_speed: 0.1,
            look_speed: 0.03,
        }
    }
}

impl CameraController {
    /// Orbit controller around the camera's current target.
    pub fn new(camera: &Camera) -> Self {
        let mut ctl = Self::default();
        ctl.sync_from_camera(camera);
        ctl
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn pivot(&self) -> Vec3 {
        self.pivot
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Re-derive pivot, distance, yaw and pitch from the camera.
    pub fn sync_from_camera(&mut self, camera: &Camera) {
        let offset = camera.position - camera.target;
        self.pivot = camera.target;
        let len = offset.length();
        // Unclamped: only zoom enforces the distance range.
        self.distance = if len.is_finite() && len > f32::EPSILON {
            len
        } else {
            MIN_DISTANCE
        };
        if len.is_finite() && len > f32::EPSILON {
            self.yaw = wrap_yaw(offset.x.atan2(offset.z));
            self.pitch = (offset.y / len).clamp(-1.0, 1.0).asin();
        } else {
            self.yaw = 0.0;
            self.pitch = 0.0;
        }
    }

    /// Switch modes. Entering orbit resynchronizes from the camera and
    /// leaving it keeps eye and target where they are.
    pub fn set_mode(&mut self, mode: CameraMode, camera: &mut Camera) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        if mode == CameraMode::Orbit {
            self.sync_from_camera(camera);
            self.update_camera(camera);
        }
        tracing::debug!("camera mode {:?}", mode);
    }

    pub fn toggle_mode(&mut self, camera: &mut Camera) {
        let next = match self.mode {
            CameraMode::Orbit => CameraMode::FreeLook,
            CameraMode::FreeLook => CameraMode::Orbit,
        };
        self.set_mode(next, camera);
    }

    /// Orbit-mode rotation around the pivot. Ignored in free-look.
    pub fn orbit(&mut self, d_yaw: f32, d_pitch: f32, camera: &mut Camera) {
        if self.mode != CameraMode::Orbit {
            return;
        }
        self.yaw = wrap_yaw(self.yaw + d_yaw * self.orbit_speed);
        self.pitch = wrap_pitch(self.pitch + d_pitch * self.orbit_speed);
        self.update_camera(camera);
    }

    /// Rotate the eye around the pivot by raw angles in radians, ignoring
    /// `orbit_speed`. Free-look cameras are resynchronized first and left
    /// in orbit mode.
    pub fn orbit_by_angle(&mut self, yaw: f32, pitch: f32, camera: &mut Camera) {
        self.set_mode(CameraMode::Orbit, camera);
        self.yaw = wrap_yaw(self.yaw + yaw);
        self.pitch = wrap_pitch(self.pitch + pitch);
        self.update_camera(camera);
    }

    /// Orbit: change distance (clamped). Free-look: dolly along the view.
    pub fn zoom(&mut self, amount: f32, camera: &mut Camera) {
        match self.mode {
            CameraMode::Orbit => {
                self.distance =
                    (self.distance - amount * self.zoom_speed).clamp(MIN_DISTANCE, MAX_DISTANCE);
                self.update_camera(camera);
            }
            CameraMode::FreeLook => {
                camera.translate_local(Vec3::new(0.0, 0.0, amount), self.zoom_speed);
            }
        }
    }

    /// Move in the view plane. Orbit mode drags the pivot along.
    pub fn pan(&mut self, dx: f32, dy: f32, camera: &mut Camera) {
        let (right, up) = camera.basis();
        let delta = (right * dx + up * dy) * self.pan_speed;
        match self.mode {
            CameraMode::Orbit => {
                self.pivot += delta;
                self.update_camera(camera);
            }
            CameraMode::FreeLook => {
                camera.position += delta;
                camera.target += delta;
            }
        }
    }

    /// Free-look translation; `direction` is (right, up, forward).
    pub fn move_local(&mut self, direction: Vec3, camera: &mut Camera) {
        if self.mode == CameraMode::FreeLook {
            camera.translate_local(direction, self.move_speed);
        }
    }

    /// Free-look rotation of the target around the eye.
    pub fn look(&mut self, d_yaw: f32, d_pitch: f32, camera: &mut Camera) {
        if self.mode != CameraMode::FreeLook {
            return;
        }
        let dir = camera.target - camera.position;
        let len = dir.length().max(f32::EPSILON);
        let yaw = dir.x.atan2(dir.z) + d_yaw * self.look_speed;
        let pitch = ((dir.y / len).clamp(-1.0, 1.0).asin() + d_pitch * self.look_speed)
            .clamp(-MAX_LOOK_PITCH, MAX_LOOK_PITCH);
        camera.target = camera.position + spherical(yaw, pitch) * len;
    }

    /// Recompute the eye from the spherical parameters (orbit mode only).
    pub fn update_camera(&self, camera: &mut Camera) {
        if self.mode != CameraMode::Orbit {
            return;
        }
        camera.target = self.pivot;
        camera.position = self.pivot + spherical(self.yaw, self.pitch) * self.distance;
    }

    /// Back to an orbit around the origin at the default distance.
    pub fn reset(&mut self, camera: &mut Camera) {
        self.mode = CameraMode::Orbit;
        self.pivot = Vec3::ZERO;
        self.distance = DEFAULT_DISTANCE;
        self.yaw = 0.0;
        self.pitch = 0.0;
        camera.up = Vec3::Y;
        self.update_camera(camera);
    }
}

/// Unit vector for yaw around +Y (0 = +Z) and pitch toward +Y.
#[inline]
fn spherical(yaw: f32, pitch: f32) -> Vec3 {
    let (sp, cp) = pitch.sin_cos();
    let (sy, cy) = yaw.sin_cos();
    Vec3::new(cp * sy, sp, cp * cy)
}

#[inline]
fn wrap_yaw(yaw: f32) -> f32 {
    yaw.rem_euclid(TAU)
}

#[inline]
fn wrap_pitch(pitch: f32) -> f32 {
    if pitch > PI {
        pitch - TAU
    } else if pitch < -PI {
        pitch + TAU
    } else {
        pitch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    fn camera_at(eye: Vec3, target: Vec3) -> Camera {
        Camera {
            position: eye,
            target,
            ..Default::default()
        }
    }

    #[test]
    fn test_orbit_free_look_parity() {
        let eye = Vec3::new(3.0, 2.0, -4.0);
        let target = Vec3::new(0.5, 0.0, 1.0);
        let mut cam = camera_at(eye, target);
        let mut ctl = CameraController::new(&cam);

        ctl.set_mode(CameraMode::FreeLook, &mut cam);
        assert_eq!(cam.position, eye);
        assert_eq!(cam.target, target);

        ctl.set_mode(CameraMode::Orbit, &mut cam);
        assert!(approx(cam.position, eye), "{:?} != {:?}", cam.position, eye);
        assert!(approx(cam.target, target));
    }

    #[test]
    fn test_orbit_free_look_parity_far_eye() {
        let eye = Vec3::new(0.0, 10.0, 80.0);
        let mut cam = camera_at(eye, Vec3::ZERO);
        let mut ctl = CameraController::new(&cam);
        assert!(ctl.distance() > MAX_DISTANCE);

        ctl.toggle_mode(&mut cam);
        ctl.toggle_mode(&mut cam);
        assert_eq!(ctl.mode(), CameraMode::Orbit);
        assert!(approx(cam.position, eye), "{:?} != {:?}", cam.position, eye);
        assert_eq!(cam.target, Vec3::ZERO);
    }

    #[test]
    fn test_orbit_free_look_parity_near_eye() {
        let eye = Vec3::new(0.0, 0.0, 0.2);
        let mut cam = camera_at(eye, Vec3::ZERO);
        let mut ctl = CameraController::new(&cam);
        ctl.set_mode(CameraMode::FreeLook, &mut cam);
        ctl.set_mode(CameraMode::Orbit, &mut cam);
        assert!((ctl.distance() - 0.2).abs() < 1e-6);
        assert!(approx(cam.position, eye), "{:?} != {:?}", cam.position, eye);

        // Zoom still enforces the range.
        ctl.zoom(0.0, &mut cam);
        assert_eq!(ctl.distance(), MIN_DISTANCE);
    }

    #[test]
    fn test_sync_from_coincident_eye_is_finite() {
        let mut cam = camera_at(Vec3::ONE, Vec3::ONE);
        let mut ctl = CameraController::new(&cam);
        assert_eq!(ctl.distance(), MIN_DISTANCE);
        ctl.update_camera(&mut cam);
        assert!(cam.position.is_finite());
    }

    #[test]
    fn test_free_look_move_then_orbit_has_no_jump() {
        let mut cam = Camera::default();
        let mut ctl = CameraController::new(&cam);
        ctl.toggle_mode(&mut cam);
        ctl.move_local(Vec3::new(1.0, 0.5, 0.0), &mut cam);
        ctl.look(5.0, 2.0, &mut cam);
        let (eye, target) = (cam.position, cam.target);
        ctl.toggle_mode(&mut cam);
        assert_eq!(ctl.mode(), CameraMode::Orbit);
        assert!(approx(cam.position, eye));
        assert!(approx(cam.target, target));
    }

    #[test]
    fn test_orbit_keeps_distance() {
        let mut cam = Camera::default();
        let mut ctl = CameraController::new(&cam);
        for _ in 0..500 {
            ctl.orbit(1.3, 0.7, &mut cam);
        }
        assert!((cam.position.distance(cam.target) - 3.0).abs() < 1e-4);
        assert!((0.0..TAU).contains(&ctl.yaw()));
        assert!((-PI..=PI).contains(&ctl.pitch()));
    }

    #[test]
    fn test_orbit_by_angle_ignores_speed() {
        let mut cam = Camera::default();
        let mut ctl = CameraController::new(&cam);
        ctl.orbit_speed = 0.0;
        ctl.orbit_by_angle(PI / 2.0, 0.0, &mut cam);
        assert!(approx(cam.position, Vec3::new(3.0, 0.0, 0.0)), "{:?}", cam.position);

        ctl.set_mode(CameraMode::FreeLook, &mut cam);
        ctl.orbit_by_angle(PI / 2.0, 0.0, &mut cam);
        assert_eq!(ctl.mode(), CameraMode::Orbit);
        assert!(approx(cam.position, Vec3::new(0.0, 0.0, -3.0)), "{:?}", cam.position);
    }

    #[test]
    fn test_zoom_clamped() {
        let mut cam = Camera::default();
        let mut ctl = CameraController::new(&cam);
        ctl.zoom(1000.0, &mut cam);
        assert_eq!(ctl.distance(), MIN_DISTANCE);
        ctl.zoom(-1000.0, &mut cam);
        assert_eq!(ctl.distance(), MAX_DISTANCE);
        assert!((cam.position.distance(cam.target) - MAX_DISTANCE).abs() < 1e-3);
    }

    #[test]
    fn test_free_look_zoom_moves_both() {
        let mut cam = Camera::default();
        let mut ctl = CameraController::new(&cam);
        ctl.set_mode(CameraMode::FreeLook, &mut cam);
        let gap = cam.target - cam.position;
        ctl.zoom(1.0, &mut cam);
        assert!(approx(cam.target - cam.position, gap));
        assert!(cam.position.z < 3.0);
    }

    #[test]
    fn test_pan_moves_pivot() {
        let mut cam = Camera::default();
        let mut ctl = CameraController::new(&cam);
        ctl.pan(10.0, 0.0, &mut cam);
        assert!(ctl.pivot().x > 0.0);
        assert!(approx(cam.target, ctl.pivot()));
    }

    #[test]
    fn test_reset() {
        let mut cam = camera_at(Vec3::new(9.0, 9.0, 9.0), Vec3::ONE);
        let mut ctl = CameraController::new(&cam);
        ctl.set_mode(CameraMode::FreeLook, &mut cam);
        ctl.reset(&mut cam);
        assert_eq!(ctl.mode(), CameraMode::Orbit);
        assert!(approx(cam.position, Vec3::new(0.0, 0.0, 5.0)));
        assert_eq!(cam.target, Vec3::ZERO);
    }

    #[test]
    fn test_look_clamps_pitch() {
        let mut cam = Camera::default();
        let mut ctl = CameraController::new(&cam);
        ctl.set_mode(CameraMode::FreeLook, &mut cam);
        ctl.look(0.0, 1000.0, &mut cam);
        let dir = cam.forward();
        assert!(dir.y < 1.0 && dir.y > 0.99);
        assert!(cam.view().to_cols_array().iter().all(|v| v.is_finite()));
    }
}
