//! Surfaces and colliders used for boundary conditions and emission regions.

pub mod collider;
pub mod surface;
pub mod surface_set;
pub mod transform;

pub use collider::{Collider2, RigidBodyCollider2, RigidBodyCollider2Builder};
pub use surface::{Box2, Plane2, Sphere2, Surface2};
pub use surface_set::ImplicitSurfaceSet2;
pub use transform::Transform2;
