pub mod effects;
pub mod frame;
pub mod motion;
pub mod noise;
pub mod partition;
pub mod selector;
pub mod utils;
