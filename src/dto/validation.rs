//! Validation helpers for inbound protocol payloads.

use validator::ValidationError;

/// Longest accepted display or room name.
const MAX_NAME_LENGTH: usize = 64;

/// Validates that a display name is non-blank and reasonably sized.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("name_blank");
        err.message = Some("Name must not be blank".into());
        return Err(err);
    }
    if trimmed.len() > MAX_NAME_LENGTH {
        let mut err = ValidationError::new("name_length");
        err.message = Some(
            format!("Name must be at most {MAX_NAME_LENGTH} characters").into(),
        );
        return Err(err);
    }
    Ok(())
}

/// Validates a quiz topic: non-blank, bounded length.
pub fn validate_topic(topic: &str) -> Result<(), ValidationError> {
    let trimmed = topic.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("topic_blank");
        err.message = Some("Topic must not be blank".into());
        return Err(err);
    }
    if trimmed.len() > MAX_NAME_LENGTH {
        let mut err = ValidationError::new("topic_length");
        err.message = Some(
            format!("Topic must be at most {MAX_NAME_LENGTH} characters").into(),
        );
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_display_name() {
        assert!(validate_display_name("alice").is_ok());
        assert!(validate_display_name("  Bot_42  ").is_ok());
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_topic() {
        assert!(validate_topic("NBA").is_ok());
        assert!(validate_topic(" 90s movies ").is_ok());
        assert!(validate_topic("\t").is_err());
        assert!(validate_topic(&"t".repeat(100)).is_err());
    }
}
