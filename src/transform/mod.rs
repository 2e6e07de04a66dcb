//! Data transformations: min-max scaling and rolling-window statistics.

pub mod scale;
pub mod window;

pub use scale::{normalize, MinMaxScaler, ScaleResult};
pub use window::{rolling_max, rolling_mean, rolling_min, rolling_std, rolling_var};
