mod rights;
mod token;

pub use rights::{Admin, Member, Overseer, Rights};
pub use token::{AuthToken, Claims, AUTH_TOKEN_COOKIE};
