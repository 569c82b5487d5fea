//! Serde utilities for glam types.

use glam::Vec2;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Serde proxy for Vec2
#[derive(Serialize, Deserialize)]
pub struct Vec2Def {
    pub x: f32,
    pub y: f32,
}

impl From<Vec2> for Vec2Def {
    fn from(v: Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<Vec2Def> for Vec2 {
    fn from(def: Vec2Def) -> Self {
        Vec2::new(def.x, def.y)
    }
}

pub fn serialize_vec2<S>(v: &Vec2, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    Vec2Def::from(*v).serialize(s)
}

pub fn deserialize_vec2<'de, D>(d: D) -> Result<Vec2, D::Error>
where
    D: Deserializer<'de>,
{
    Vec2Def::deserialize(d).map(Vec2::from)
}

/// Module form for `#[serde(with = "crate::serde_utils::vec2")]`.
pub mod vec2 {
    pub use super::deserialize_vec2 as deserialize;
    pub use super::serialize_vec2 as serialize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "vec2")]
        v: Vec2,
    }

    #[test]
    fn test_vec2_json_shape() {
        let json = serde_json::to_string(&Holder {
            v: Vec2::new(1.5, -2.0),
        })
        .unwrap();
        assert_eq!(json, r#"{"v":{"x":1.5,"y":-2.0}}"#);

        let back: Holder = serde_json::from_str(&json).unwrap();
        assert_eq!(back.v, Vec2::new(1.5, -2.0));
    }
}
