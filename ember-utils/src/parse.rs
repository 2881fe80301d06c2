/// A code block argument: optional language tag plus the inner source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codeblock {
    pub language: Option<String>,
    pub content: String,
}

/// Whether a message body looks like a fenced or inline code block.
pub fn is_codeblock(content: &str) -> bool {
    let trimmed = content.trim();
    trimmed.len() >= 2 && trimmed.starts_with('`') && trimmed.ends_with('`')
}

/// Strip code fences (and a leading language tag) from a snippet argument.
///
/// Plain text without backticks passes through unchanged.
pub fn codeblock_converter(argument: &str) -> Codeblock {
    let trimmed = argument.trim();

    if let Some(inner) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    {
        if let Some((first_line, body)) = inner.split_once('\n')
            && is_language_tag(first_line)
        {
            return Codeblock {
                language: Some(first_line.trim().to_owned()),
                content: body.trim_matches('\n').to_owned(),
            };
        }

        return Codeblock {
            language: None,
            content: inner.trim_matches('\n').to_owned(),
        };
    }

    if let Some(inner) = trimmed
        .strip_prefix('`')
        .and_then(|rest| rest.strip_suffix('`'))
    {
        return Codeblock {
            language: None,
            content: inner.to_owned(),
        };
    }

    Codeblock {
        language: None,
        content: trimmed.to_owned(),
    }
}

fn is_language_tag(line: &str) -> bool {
    let tag = line.trim();
    !tag.is_empty()
        && tag
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '+' || ch == '-' || ch == '_')
}
