mod meta_page;
mod page;

pub use meta_page::*;
pub use page::*;
