//! chromiumoxide による PageAdapter 実装

mod page;
mod scripts;

pub use page::ChromiumPage;
