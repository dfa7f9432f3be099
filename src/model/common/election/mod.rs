mod dates;
mod state;

pub use dates::ElectionDates;
pub use state::ElectionStatus;
