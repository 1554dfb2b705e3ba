//! Persisted entity types, one module per collection.

pub mod appointment;
pub mod doctor;
pub mod enums;
pub mod lab;
pub mod otp;
pub mod prescription;
pub mod registration;
pub mod user;

pub use appointment::Appointment;
pub use doctor::{Doctor, DoctorService};
pub use enums::{RegistrationStatus, Role};
pub use lab::Lab;
pub use otp::PhoneOtp;
pub use prescription::Prescription;
pub use registration::DoctorRegistration;
pub use user::User;
