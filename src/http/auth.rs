//! Header construction for outbound requests: Basic credentials for the
//! directory and the source-system marker both services expect.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};

pub const SOURCE_SYSTEM_HEADER: &str = "X-Source-System";

pub(crate) fn build_default_headers(source_system: &str, accept: &'static str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(source_system.trim())
        .context("failed to build X-Source-System header")?;
    headers.insert(SOURCE_SYSTEM_HEADER, value);
    headers.insert(ACCEPT, HeaderValue::from_static(accept));
    Ok(headers)
}

/// Adds a Basic `Authorization` header when both user and password are present.
pub(crate) fn apply_basic_auth(headers: &mut HeaderMap, user: &str, password: &str) -> Result<()> {
    if user.is_empty() || password.is_empty() {
        return Ok(());
    }

    let credentials = format!("{user}:{password}");
    let encoded = BASE64_STANDARD.encode(credentials);
    let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))
        .context("failed to build Authorization header")?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);
    Ok(())
}
