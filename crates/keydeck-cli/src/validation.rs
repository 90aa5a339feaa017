//! Checks on user-supplied secrets before they are stored

use keydeck_core::ProviderProfile;

/// Secrets shorter than this are almost certainly truncated pastes
pub const MIN_SECRET_LEN: usize = 10;

/// Reject secrets that cannot belong to `profile`
pub fn check_secret(profile: &ProviderProfile, secret: &str) -> Result<(), String> {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return Err("API key cannot be empty".to_string());
    }
    if trimmed.len() != secret.len() {
        return Err("API key has leading or trailing whitespace".to_string());
    }
    if secret.chars().any(char::is_whitespace) {
        return Err("API key contains whitespace".to_string());
    }
    if let Some(prefix) = profile.secret_prefix {
        if !secret.starts_with(prefix) {
            return Err(format!(
                "{} keys start with '{}'",
                profile.display_name, prefix
            ));
        }
    }
    if secret.len() < MIN_SECRET_LEN {
        return Err(format!(
            "API key seems too short for {} (minimum {} characters)",
            profile.display_name, MIN_SECRET_LEN
        ));
    }
    Ok(())
}
