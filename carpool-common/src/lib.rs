//! Carpool Common Types
//!
//! Shared types used by the backend and by API clients.

pub mod api;
pub mod status;

pub use api::{
    CreateTripRequest, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
    RequestRideRequest, SearchRidesQuery, SeatCount, UpdateRequestStatusRequest,
    UpdateUserStatusRequest,
};
pub use status::{Gender, ParseStatusError, RequestStatus, Role, VerificationStatus};
