pub mod hit;

pub use hit::{GroupHit, HitContext, MeasuredSizes, groups_at, hit_test_groups};
