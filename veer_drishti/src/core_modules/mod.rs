pub mod detection;
pub mod detector;
pub mod frame;
pub mod frame_source;
pub mod motion_regions;
