//! External collaborators and supporting services: payment gateways,
//! message delivery, file storage, credential hashing.

pub mod credentials;
pub mod media;
pub mod notify;
pub mod otp;
pub mod payments;
