/// Credential presentation parsing
///
/// `Authorization: <Marker> <value>`. A missing header, a missing or different
/// marker, and an empty value are all the same outcome: nothing presented.

use crate::error::AuthError;

const BEARER: &str = "Bearer";

/// Extract the opaque value presented under `marker`
fn extract_credential<'a>(header: Option<&'a str>, marker: &str) -> Result<&'a str, AuthError> {
    let value = header
        .and_then(|h| h.strip_prefix(marker))
        .and_then(|rest| rest.strip_prefix(' '))
        .map(str::trim)
        .unwrap_or_default();

    if value.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(value)
}

/// Value of a `Bearer` presentation (access or refresh token)
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    extract_credential(header, BEARER)
}
