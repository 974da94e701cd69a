pub mod context;
pub mod package;
pub mod settings;

pub use context::*;
pub use package::*;
pub use settings::*;
