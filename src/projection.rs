//! Projection planning
//!
//! Maps the fused orientation and a diagonal field of view onto one camera
//! (mono) or two cameras sharing the same orientation (VR split view). The
//! camera sits at the centre of the panorama sphere.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::config::clamp_fov;
use crate::orientation::Orientation;

/// Default near clipping plane
pub const DEFAULT_NEAR: f32 = 0.1;
/// Default far clipping plane
pub const DEFAULT_FAR: f32 = 100.0;

/// Viewport size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Pixel rectangle within the viewport (origin top-left)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewportRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ViewportRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rect covering a whole viewport
    pub fn full(viewport: Viewport) -> Self {
        Self::new(0, 0, viewport.width, viewport.height)
    }

    /// Width / height, or 1.0 for a degenerate rect
    pub fn aspect(&self) -> f32 {
        if self.width == 0 || self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// How a VR viewport is divided between the two eyes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitAxis {
    /// Portrait: first eye on top, second below
    TopBottom,
    /// Landscape: first eye left, second right
    LeftRight,
}

impl SplitAxis {
    /// Split axis for the given device orientation
    pub fn for_portrait(portrait: bool) -> Self {
        if portrait {
            SplitAxis::TopBottom
        } else {
            SplitAxis::LeftRight
        }
    }

    /// Divide a viewport into two halves; the second half takes any odd pixel
    pub fn split(&self, viewport: Viewport) -> (ViewportRect, ViewportRect) {
        match self {
            SplitAxis::TopBottom => {
                let first = viewport.height / 2;
                (
                    ViewportRect::new(0, 0, viewport.width, first),
                    ViewportRect::new(0, first, viewport.width, viewport.height - first),
                )
            }
            SplitAxis::LeftRight => {
                let first = viewport.width / 2;
                (
                    ViewportRect::new(0, 0, first, viewport.height),
                    ViewportRect::new(first, 0, viewport.width - first, viewport.height),
                )
            }
        }
    }
}

/// Convert a diagonal fov to (horizontal, vertical) fov for an aspect ratio.
///
/// All angles are radians.
pub fn diagonal_to_axes(diagonal: f32, aspect: f32) -> (f32, f32) {
    let aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };
    let half_diag = (diagonal * 0.5).tan();
    let half_v = half_diag / (1.0 + aspect * aspect).sqrt();
    let half_h = aspect * half_v;
    (2.0 * half_h.atan(), 2.0 * half_v.atan())
}

/// GPU uniform block for one eye
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ProjectionUniform {
    pub view_proj: [[f32; 4]; 4],
    pub look_dir: [f32; 3],
    pub _padding: f32,
}

/// Camera transform for one eye
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeProjection {
    /// World-to-camera rotation
    pub view: Mat4,
    /// Perspective projection
    pub projection: Mat4,
    /// Diagonal fov in degrees (after clamping)
    pub fov_diagonal: f32,
    /// Horizontal fov in radians
    pub fov_horizontal: f32,
    /// Vertical fov in radians
    pub fov_vertical: f32,
    /// Region of the viewport this eye draws into
    pub rect: ViewportRect,
    /// Direction the camera looks along
    pub look_dir: Vec3,
}

impl EyeProjection {
    /// Combined view-projection matrix
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Pack into a uniform block
    pub fn uniform(&self) -> ProjectionUniform {
        ProjectionUniform {
            view_proj: self.view_projection().to_cols_array_2d(),
            look_dir: self.look_dir.to_array(),
            _padding: 0.0,
        }
    }
}

/// Output of one planning pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectionResult {
    /// Single camera over the full viewport
    Mono(EyeProjection),
    /// Two cameras sharing one orientation, each on half the viewport
    Split {
        axis: SplitAxis,
        first: EyeProjection,
        second: EyeProjection,
    },
}

impl ProjectionResult {
    /// Eye projections in draw order
    pub fn eyes(&self) -> Vec<&EyeProjection> {
        match self {
            ProjectionResult::Mono(eye) => vec![eye],
            ProjectionResult::Split { first, second, .. } => vec![first, second],
        }
    }

    /// Split axis, if this is a VR layout
    pub fn split_axis(&self) -> Option<SplitAxis> {
        match self {
            ProjectionResult::Mono(_) => None,
            ProjectionResult::Split { axis, .. } => Some(*axis),
        }
    }

    pub fn is_split(&self) -> bool {
        matches!(self, ProjectionResult::Split { .. })
    }
}

/// Builds projections from orientation and view settings
#[derive(Debug, Clone, Copy)]
pub struct ProjectionPlanner {
    near: f32,
    far: f32,
}

impl Default for ProjectionPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_NEAR, DEFAULT_FAR)
    }
}

impl ProjectionPlanner {
    /// Create a planner with the given clip planes.
    ///
    /// Invalid planes fall back to the defaults.
    pub fn new(near: f32, far: f32) -> Self {
        if near.is_finite() && far.is_finite() && near > 0.0 && far > near {
            Self { near, far }
        } else {
            tracing::warn!("ProjectionPlanner: invalid clip planes {}..{}, using defaults", near, far);
            Self {
                near: DEFAULT_NEAR,
                far: DEFAULT_FAR,
            }
        }
    }

    /// Plan the projection(s) for one frame
    pub fn project(
        &self,
        orientation: Orientation,
        fov: f32,
        vr_mode_enabled: bool,
        orientation_portrait: bool,
        viewport: Viewport,
    ) -> ProjectionResult {
        let fov = clamp_fov(fov);
        if vr_mode_enabled {
            let axis = SplitAxis::for_portrait(orientation_portrait);
            let (first_rect, second_rect) = axis.split(viewport);
            ProjectionResult::Split {
                axis,
                first: self.eye(orientation, fov, first_rect),
                second: self.eye(orientation, fov, second_rect),
            }
        } else {
            ProjectionResult::Mono(self.eye(orientation, fov, ViewportRect::full(viewport)))
        }
    }

    fn eye(&self, orientation: Orientation, fov: f32, rect: ViewportRect) -> EyeProjection {
        let aspect = rect.aspect();
        let (fov_horizontal, fov_vertical) = diagonal_to_axes(fov.to_radians(), aspect);
        let rotation = orientation.to_quat();
        EyeProjection {
            view: Mat4::from_quat(rotation.inverse()),
            projection: Mat4::perspective_rh(fov_vertical, aspect, self.near, self.far),
            fov_diagonal: fov,
            fov_horizontal,
            fov_vertical,
            rect,
            look_dir: rotation * Vec3::NEG_Z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_vr_portrait_splits_top_bottom() {
        let planner = ProjectionPlanner::default();
        let result = planner.project(Orientation::default(), 90.0, true, true, Viewport::new(1000, 2000));
        let ProjectionResult::Split { axis, first, second } = result else {
            panic!("expected split projection");
        };
        assert_eq!(axis, SplitAxis::TopBottom);
        assert_eq!(first.rect, ViewportRect::new(0, 0, 1000, 1000));
        assert_eq!(second.rect, ViewportRect::new(0, 1000, 1000, 1000));
        assert_eq!(first.view, second.view);
        assert_eq!(result.eyes().len(), 2);
    }

    #[test]
    fn test_vr_landscape_splits_left_right() {
        let planner = ProjectionPlanner::default();
        let result = planner.project(Orientation::default(), 90.0, true, false, Viewport::new(1921, 1080));
        let ProjectionResult::Split { axis, first, second } = result else {
            panic!("expected split projection");
        };
        assert_eq!(axis, SplitAxis::LeftRight);
        assert_eq!(first.rect, ViewportRect::new(0, 0, 960, 1080));
        assert_eq!(second.rect, ViewportRect::new(960, 0, 961, 1080));
    }

    #[test]
    fn test_mono_uses_full_viewport() {
        let planner = ProjectionPlanner::default();
        let result = planner.project(Orientation::default(), 90.0, false, true, Viewport::new(640, 480));
        assert!(!result.is_split());
        assert_eq!(result.split_axis(), None);
        assert_eq!(result.eyes()[0].rect, ViewportRect::new(0, 0, 640, 480));
    }

    #[test]
    fn test_fov_is_clamped() {
        let planner = ProjectionPlanner::default();
        let viewport = Viewport::new(800, 600);
        for (input, expected) in [(10.0, 60.0), (500.0, 120.0), (-90.0, 60.0), (100.0, 100.0)] {
            let result = planner.project(Orientation::default(), input, false, false, viewport);
            assert_eq!(result.eyes()[0].fov_diagonal, expected);
        }
    }

    #[test]
    fn test_diagonal_fov_conversion() {
        // Square viewport: both axes equal, narrower than the diagonal
        let (h, v) = diagonal_to_axes(90f32.to_radians(), 1.0);
        assert!((h - v).abs() < 1e-6);
        assert!(h < 90f32.to_radians());
        let expected = 2.0 * (1.0f32 / 2f32.sqrt()).atan();
        assert!((v - expected).abs() < 1e-5);

        // Recombining the axes gives back the diagonal
        let (h, v) = diagonal_to_axes(100f32.to_radians(), 16.0 / 9.0);
        assert!(h > v);
        let diag = 2.0 * ((h * 0.5).tan().powi(2) + (v * 0.5).tan().powi(2)).sqrt().atan();
        assert!((diag - 100f32.to_radians()).abs() < 1e-4);
    }

    #[test]
    fn test_view_follows_orientation() {
        let planner = ProjectionPlanner::default();
        let orientation = Orientation::new(0.8, 0.3, 0.0);
        let result = planner.project(orientation, 90.0, false, false, Viewport::new(100, 100));
        let eye = result.eyes()[0];
        // The look direction maps to the camera's forward axis
        let forward = eye.view * Vec4::from((eye.look_dir, 0.0));
        assert!((forward.truncate() - Vec3::NEG_Z).length() < 1e-4);
        assert!((eye.look_dir - orientation.look_direction()).length() < 1e-5);
    }

    #[test]
    fn test_degenerate_viewport() {
        let planner = ProjectionPlanner::default();
        let result = planner.project(Orientation::default(), 90.0, true, true, Viewport::new(0, 0));
        for eye in result.eyes() {
            assert_eq!(eye.rect.width, 0);
            assert!(eye.projection.is_finite());
        }
    }

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<ProjectionUniform>(), 80);
        let planner = ProjectionPlanner::default();
        let result = planner.project(Orientation::default(), 90.0, false, false, Viewport::new(10, 10));
        let uniform = result.eyes()[0].uniform();
        assert_eq!(bytemuck::bytes_of(&uniform).len(), 80);
    }

    #[test]
    fn test_invalid_clip_planes_fall_back() {
        let planner = ProjectionPlanner::new(5.0, 1.0);
        assert_eq!(planner.near, DEFAULT_NEAR);
        assert_eq!(planner.far, DEFAULT_FAR);
    }
}
