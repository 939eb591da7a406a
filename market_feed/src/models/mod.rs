pub mod listing;
pub mod preview;

pub use listing::{MarketListing, total_supply};
pub use preview::MarketPreview;
