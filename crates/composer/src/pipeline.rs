//! The composition pipeline: preprocess, artifact stripping, sentence
//! formatting.

/// Substituted whenever the pipeline is handed nothing usable: empty text,
/// a bare "none"/"null", or text that is nothing but artifacts.
pub const NO_RESPONSE_DATA: &str = "I'm sorry, I couldn't find any response data for your \
                                    request. Please try rephrasing your question.";

/// Role-prefix tokens stripped from model output, longest first so that
/// "Answer:" never strands a leading "Final ".
const ARTIFACT_TOKENS: &[&str] = &[
    "Final Answer:",
    "Assistant:",
    "Response:",
    "Output:",
    "Answer:",
    "System:",
    "Human:",
    "User:",
    "AI:",
];

/// Compose raw handler text into a displayable answer.
///
/// Stages run in order: whitespace preprocessing, artifact stripping,
/// sentence formatting. Each stage is idempotent on its own output and
/// none of them can fail, so the whole pipeline always returns readable
/// text.
#[must_use]
pub fn compose(raw: &str) -> String {
    let text = preprocess(raw);
    let text = strip_artifacts(&text);
    let text = if text.is_empty() {
        NO_RESPONSE_DATA.to_string()
    } else {
        text
    };
    let composed = format_sentences(&text);
    tracing::debug!(
        input_len = raw.len(),
        output_len = composed.len(),
        "composed response"
    );
    composed.trim().to_string()
}

/// Stage 1: collapse whitespace runs to single spaces and trim. Empty text
/// and the literal placeholders "none"/"null" become [`NO_RESPONSE_DATA`].
fn preprocess(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty()
        || collapsed.eq_ignore_ascii_case("none")
        || collapsed.eq_ignore_ascii_case("null")
    {
        return NO_RESPONSE_DATA.to_string();
    }
    collapsed
}

/// Stage 2: drop role-prefix tokens, surrounding quotes, and blank lines.
fn strip_artifacts(text: &str) -> String {
    // Removing one token can splice a new one together out of its
    // neighbors, so strip to a fixpoint.
    let mut cleaned = strip_role_tokens(text);
    loop {
        let next = strip_role_tokens(&cleaned);
        if next == cleaned {
            break;
        }
        cleaned = next;
    }

    let cleaned = cleaned.trim().trim_matches(['"', '\'']);

    let lines: Vec<&str> = cleaned
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    lines.join("\n").trim().to_string()
}

/// Remove every case-insensitive occurrence of the artifact tokens.
fn strip_role_tokens(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    'scan: while i < text.len() {
        let rest = &text[i..];
        for token in ARTIFACT_TOKENS {
            if rest.len() >= token.len()
                && rest.as_bytes()[..token.len()].eq_ignore_ascii_case(token.as_bytes())
            {
                i += token.len();
                continue 'scan;
            }
        }
        let Some(ch) = rest.chars().next() else { break };
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// Stage 3: segment into sentences word by word, capitalize and terminate
/// each, then normalize spacing and doubled periods.
///
/// A word longer than one character ending in `.`, `!` or `?` closes a
/// sentence; any trailing words form a final sentence.
fn format_sentences(text: &str) -> String {
    let mut sentences: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for word in text.split_whitespace() {
        current.push(word);
        if word.chars().count() > 1 && word.ends_with(['.', '!', '?']) {
            sentences.push(current.join(" "));
            current.clear();
        }
    }
    if !current.is_empty() {
        sentences.push(current.join(" "));
    }

    let formatted: Vec<String> = sentences
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            let mut sentence = capitalize_first(s);
            if !sentence.ends_with(['.', '!', '?']) {
                sentence.push('.');
            }
            sentence
        })
        .collect();

    let joined = formatted.join(" ");
    let mut out = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    while out.contains("..") {
        out = out.replace("..", ".");
    }
    out
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => {
            let mut out = String::with_capacity(s.len());
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
            out
        },
        None => String::new(),
    }
}
