pub mod background;
pub mod calibration;
pub mod config;
pub mod consts;
pub mod controller;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod hardware;
pub mod io;
pub mod metrics;
pub mod motion;
pub mod record;
pub mod segmentation;
pub mod stats;
