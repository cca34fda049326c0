mod core;
mod shape;

pub use self::core::{BBox2, Point2, Tolerance, Transform2, Vec2, angle_approx_eq, normalize_angle};
pub use self::shape::{Layer, Shape};
