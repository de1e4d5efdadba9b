pub mod array;
pub mod config;
pub mod context;
pub mod convolution;
pub mod device_vec;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod host_executor;
pub mod io;
pub mod scan;
pub mod shaders;
pub mod wgpu_executor;

pub use self::array::*;
pub use self::config::*;
pub use self::context::*;
pub use self::convolution::*;
pub use self::device_vec::*;
pub use self::error::{Error, Result};
pub use self::executor::*;
pub use self::host_executor::*;
pub use self::scan::*;
pub use self::wgpu_executor::*;
