//! Prompt extraction from raw group or direct text.

/// Prompt used when the user only woke the bot without asking anything.
pub const DEFAULT_GREETING_PROMPT: &str =
    "The user only called you with no specific question. Please greet them briefly and invite them to ask.";

/// Strips every `@<bot_name>` mention and a leading wake word, then trims.
/// Returns [`DEFAULT_GREETING_PROMPT`] when nothing is left.
pub fn extract_prompt(text: &str, bot_name: &str, wake_word: &str) -> String {
    let without_mention = if bot_name.is_empty() {
        text.to_string()
    } else {
        text.replace(&format!("@{}", bot_name), "")
    };
    let trimmed = without_mention.trim();
    let prompt = if wake_word.is_empty() {
        trimmed
    } else {
        trimmed.strip_prefix(wake_word).unwrap_or(trimmed).trim()
    };

    if prompt.is_empty() {
        DEFAULT_GREETING_PROMPT.to_string()
    } else {
        prompt.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_mention_anywhere() {
        assert_eq!(
            extract_prompt("hey @cosmos what time is it", "cosmos", "cosmos"),
            "hey  what time is it"
        );
        assert_eq!(extract_prompt("@cosmos\u{2005}weather?", "cosmos", "cosmos"), "weather?");
    }

    #[test]
    fn test_strips_leading_wake_word() {
        assert_eq!(extract_prompt("cosmos hello", "cosmos", "cosmos"), "hello");
        assert_eq!(extract_prompt("hi bot, status", "cosmos", "hi bot,"), "status");
        // Only a leading wake word is stripped.
        assert_eq!(
            extract_prompt("ask cosmos later", "cosmos", "cosmos"),
            "ask cosmos later"
        );
    }

    #[test]
    fn test_empty_prompt_becomes_greeting() {
        assert_eq!(extract_prompt("@cosmos", "cosmos", "cosmos"), DEFAULT_GREETING_PROMPT);
        assert_eq!(extract_prompt("  cosmos  ", "cosmos", "cosmos"), DEFAULT_GREETING_PROMPT);
        assert_eq!(extract_prompt("", "cosmos", "cosmos"), DEFAULT_GREETING_PROMPT);
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(extract_prompt("what is rust?", "cosmos", "cosmos"), "what is rust?");
    }
}
