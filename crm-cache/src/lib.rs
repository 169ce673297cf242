mod listing;

pub use listing::{Atom, cached_listing};
