pub mod checksum;
pub mod code128;
pub mod framer;
pub mod symbology;

pub use checksum::{compress_upca, expand_upce, is_valid_mod10, mod10_check_digit, validate_upce};
pub use code128::Code128Subset;
pub use framer::{DrainLines, FramerConfig, LineFramer};
pub use symbology::{AimIdentifier, detect, split_aim_prefix, validate, validate_str};
