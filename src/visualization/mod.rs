#[cfg(feature = "viewer")]
pub mod replay2d;
