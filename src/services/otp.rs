//! One-time code generation.

use rand::Rng;

/// Validity window for email OTP challenges (registration/login).
pub const EMAIL_OTP_EXPIRY_MINUTES: i64 = 10;

/// Generate a 6-digit numeric code.
pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    n.to_string()
}
