//! portfolio-tags: Category vocabulary and tag synchronization.
//!
//! Every portfolio project is classified by an ordered list of tag ids drawn
//! from a vocabulary the admin maintains. The first tag doubles as the
//! project's primary `category`. Tags that fall out of the vocabulary are
//! dropped quietly; a project is never left without a category.

pub mod category;
pub mod sync;
pub mod vocabulary;

pub use category::*;
pub use sync::*;
pub use vocabulary::*;
