mod file;
mod page_manager;

pub use file::*;
pub use page_manager::*;
