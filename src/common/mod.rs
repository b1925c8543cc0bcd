//! Common utilities and types for the wet cleaning robot

use nalgebra::{Point2, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// A planar pose (x, y, theta) in some map frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    pub position: Point2<f64>,
    pub theta: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose2D {
            position: Point2::new(x, y),
            theta,
        }
    }

    /// Pose at `position` facing along the x axis
    pub fn at(position: Point2<f64>) -> Self {
        Pose2D {
            position,
            theta: 0.0,
        }
    }

    /// Orientation as a normalized quaternion about the z axis
    pub fn orientation(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_euler_angles(0.0, 0.0, self.theta)
    }

    pub fn is_finite(&self) -> bool {
        self.position.x.is_finite() && self.position.y.is_finite() && self.theta.is_finite()
    }
}

/// Footprint of the cleaning tool relative to the robot frame.
///
/// Always exactly four corners of a rectangle, ordered so that corners 0 and 2
/// are diagonal and corners 0 and 1 share an x coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldOfView(pub [Point2<f64>; 4]);

impl FieldOfView {
    pub fn new(corners: [(f64, f64); 4]) -> Self {
        FieldOfView(corners.map(|(x, y)| Point2::new(x, y)))
    }

    pub fn corners(&self) -> &[Point2<f64>; 4] {
        &self.0
    }

    /// Offset of the coverage circle from the robot frame origin.
    ///
    /// x is the midpoint of corners 0 and 2, y the midpoint of corners 0 and 1,
    /// z is always zero.
    pub fn coverage_offset(&self) -> Vector3<f64> {
        let [c0, c1, c2, _] = self.0;
        Vector3::new(0.5 * (c0.x + c2.x), 0.5 * (c0.y + c1.y), 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|p| p.x.is_finite() && p.y.is_finite())
    }
}

/// Tolerances handed to the motion controller when following a path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathTolerances {
    pub path: f64,
    pub goal_position: f64,
    pub goal_angle: f64,
}

impl PathTolerances {
    /// Coverage path following
    pub const PATH_FOLLOW: PathTolerances = PathTolerances {
        path: 0.2,
        goal_position: 0.5,
        goal_angle: std::f64::consts::FRAC_PI_2,
    };

    /// Wall following pass after the coverage path
    pub const WALL_FOLLOW: PathTolerances = PathTolerances {
        path: 0.2,
        goal_position: 0.4,
        goal_angle: std::f64::consts::PI,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_offset_uses_corner_midpoints() {
        let fov = FieldOfView::new([(0.04, 0.136), (0.04, -0.364), (0.54, -0.364), (0.54, 0.136)]);
        let offset = fov.coverage_offset();
        assert!((offset.x - 0.29).abs() < 1e-9);
        assert!((offset.y + 0.114).abs() < 1e-9);
        assert_eq!(offset.z, 0.0);
    }

    #[test]
    fn orientation_is_normalized() {
        let pose = Pose2D::new(1.0, 2.0, 0.0);
        let q = pose.orientation();
        assert!((q.into_inner().norm() - 1.0).abs() < 1e-12);
        assert!((q.w - 1.0).abs() < 1e-12);
    }
}
