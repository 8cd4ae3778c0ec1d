//! Per-axis smoothing filters
//!
//! `kalman` holds the scalar Kalman filter used on every tracked angle,
//! `low_pass` the first-order filter applied to the Cartesian tilt triple.

pub mod kalman;
pub mod low_pass;

pub use kalman::{AngleFilter, Kalman1D};
pub use low_pass::LowPassFilter;
