//! Local input checks run before any request is sent.

use crate::{MastodonError, Result};

/// Hard character limit the service enforces on status text.
pub const MAX_STATUS_CHARS: usize = 500;

pub fn validate_status_text(text: &str) -> Result<()> {
    if text.is_empty() {
        return Err(MastodonError::InvalidInput(
            "Status text cannot be empty".to_owned(),
        ));
    }
    // Counted in chars, the service counts characters rather than bytes.
    if text.chars().count() > MAX_STATUS_CHARS {
        return Err(MastodonError::InvalidInput(format!(
            "Status text exceeds the {MAX_STATUS_CHARS} character limit"
        )));
    }
    Ok(())
}

pub fn validate_post_id(post_id: &str) -> Result<()> {
    if post_id.trim().is_empty() {
        return Err(MastodonError::InvalidInput(
            "Post ID cannot be empty".to_owned(),
        ));
    }
    // Dot segments would be resolved away and retarget the request.
    if matches!(post_id, "." | "..") {
        return Err(MastodonError::InvalidInput(format!(
            "Post ID {post_id} is not a valid identifier"
        )));
    }
    Ok(())
}
