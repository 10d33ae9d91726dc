use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};

/// Length of opaque reset/verification tokens (~285 bits of entropy).
pub const OPAQUE_TOKEN_LEN: usize = 48;

/// Random single-use token for password reset and email verification.
/// Carries no claims; the database row is the source of truth.
pub fn generate_opaque_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(OPAQUE_TOKEN_LEN)
        .map(char::from)
        .collect()
}
