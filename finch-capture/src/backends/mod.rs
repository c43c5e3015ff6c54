pub mod mock;

#[cfg(feature = "backend-v4l2")]
pub mod v4l2;
