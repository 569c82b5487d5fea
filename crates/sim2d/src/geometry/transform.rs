//! Rigid 2D transform (rotation followed by translation).

use glam::{Mat2, Vec2};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform2 {
    pub translation: Vec2,
    /// Rotation angle in radians, counter-clockwise.
    pub orientation: f32,
}

impl Transform2 {
    pub const IDENTITY: Self = Self {
        translation: Vec2::ZERO,
        orientation: 0.0,
    };

    pub fn new(translation: Vec2, orientation: f32) -> Self {
        Self {
            translation,
            orientation,
        }
    }

    pub fn from_translation(translation: Vec2) -> Self {
        Self::new(translation, 0.0)
    }

    #[inline]
    fn rotation(&self) -> Mat2 {
        Mat2::from_angle(self.orientation)
    }

    /// World point to local frame.
    #[inline]
    pub fn to_local(&self, point: Vec2) -> Vec2 {
        self.rotation().transpose() * (point - self.translation)
    }

    /// World direction to local frame.
    #[inline]
    pub fn to_local_direction(&self, dir: Vec2) -> Vec2 {
        self.rotation().transpose() * dir
    }

    /// Local point to world frame.
    #[inline]
    pub fn to_world(&self, point: Vec2) -> Vec2 {
        self.rotation() * point + self.translation
    }

    /// Local direction to world frame.
    #[inline]
    pub fn to_world_direction(&self, dir: Vec2) -> Vec2 {
        self.rotation() * dir
    }
}

impl Default for Transform2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}
