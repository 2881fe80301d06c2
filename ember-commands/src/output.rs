//! Decides how one executed result reaches the channel.

use ember_engine::Value;

/// How much rendered text may go out as a single inline reply.
pub const INLINE_LIMIT: usize = 1900;

/// Reduced page size leaving room for the interface footer.
pub const PAGINATED_MAX_SIZE: usize = 1985;

const TOKEN_PLACEHOLDER: &str = "[token omitted]";

/// What to do with one result value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultDisplay {
    /// Nothing to show (`None` results).
    Skip,
    /// Send the rendered code block directly.
    Inline(String),
    /// Too large for one message: route through a paginator interface.
    Paginated(String),
}

/// Plan the display of a result value.
///
/// Strings are shown raw, everything else through its repr; the bot token is
/// scrubbed before any size decision is made.
pub fn plan_result_display(value: &Value, token: &str) -> ResultDisplay {
    if matches!(value, Value::None) {
        return ResultDisplay::Skip;
    }

    let text = match value {
        Value::Str(s) => s.clone(),
        other => other.repr_str(),
    };
    let text = redact(&text, token);

    if text.chars().count() <= INLINE_LIMIT {
        let body = if text.trim().is_empty() {
            // a visibly empty reply still needs a body
            "\u{200b}".to_owned()
        } else {
            text
        };
        return ResultDisplay::Inline(format!("```py\n{body}\n```"));
    }

    ResultDisplay::Paginated(text)
}

/// Replace the bot token wherever it appears in outgoing text.
pub fn redact(text: &str, token: &str) -> String {
    if token.is_empty() {
        return text.to_owned();
    }

    text.replace(token, TOKEN_PLACEHOLDER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_results_are_skipped() {
        assert_eq!(plan_result_display(&Value::None, ""), ResultDisplay::Skip);
    }

    #[test]
    fn strings_go_out_raw_and_values_as_repr() {
        let ResultDisplay::Inline(text) =
            plan_result_display(&Value::Str("hello".to_owned()), "")
        else {
            panic!("expected inline");
        };
        assert_eq!(text, "```py\nhello\n```");

        let ResultDisplay::Inline(text) = plan_result_display(&Value::Int(6), "") else {
            panic!("expected inline");
        };
        assert_eq!(text, "```py\n6\n```");
    }

    #[test]
    fn blank_output_becomes_a_zero_width_space() {
        let ResultDisplay::Inline(text) =
            plan_result_display(&Value::Str("   ".to_owned()), "")
        else {
            panic!("expected inline");
        };

        assert_eq!(text, "```py\n\u{200b}\n```");
    }

    #[test]
    fn inline_limit_is_respected_at_the_boundary() {
        let at_limit = "x".repeat(INLINE_LIMIT);
        assert!(matches!(
            plan_result_display(&Value::Str(at_limit), ""),
            ResultDisplay::Inline(_)
        ));

        let over_limit = "x".repeat(INLINE_LIMIT + 1);
        assert!(matches!(
            plan_result_display(&Value::Str(over_limit), ""),
            ResultDisplay::Paginated(_)
        ));
    }

    #[test]
    fn the_token_is_scrubbed_before_sending() {
        let value = Value::Str("my token is hunter2, honest".to_owned());

        let ResultDisplay::Inline(text) = plan_result_display(&value, "hunter2") else {
            panic!("expected inline");
        };

        assert!(!text.contains("hunter2"));
        assert!(text.contains("[token omitted]"));
    }
}
