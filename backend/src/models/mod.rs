pub mod ride_request;
pub mod share;
pub mod user;

pub use ride_request::RideRequest;
pub use share::{NewShare, Share};
pub use user::{NewUser, User};
