mod desc;
mod progress;
mod results;
mod spec;

pub use desc::ElectionDescription;
pub use progress::{ElectionProgress, RoleProgress};
pub use results::{
    CandidateTally, ResultDetail, ResultSummary, RoleResult, RoleWinner, Turnout, Winner,
};
pub use spec::{ActiveChange, ElectionSpec, ElectionUpdate, StatusChange};
