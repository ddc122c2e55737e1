use std::borrow::Cow;

use crate::config::Profile;
use crate::error::ParseError;
use crate::types::{ActionPhrase, IncomingCommand};

// Longest entity we bother decoding, e.g. `#1114111`.
const MAX_ENTITY_LEN: usize = 10;

const NAMED_ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{a0}'),
    ("iexcl", '¡'),
    ("cent", '¢'),
    ("pound", '£'),
    ("euro", '€'),
    ("yen", '¥'),
    ("sect", '§'),
    ("copy", '©'),
    ("reg", '®'),
    ("trade", '™'),
    ("deg", '°'),
    ("plusmn", '±'),
    ("micro", 'µ'),
    ("para", '¶'),
    ("middot", '·'),
    ("laquo", '«'),
    ("raquo", '»'),
    ("iquest", '¿'),
    ("times", '×'),
    ("divide", '÷'),
    ("frac12", '½'),
    ("frac14", '¼'),
    ("frac34", '¾'),
    ("ndash", '–'),
    ("mdash", '—'),
    ("lsquo", '‘'),
    ("rsquo", '’'),
    ("sbquo", '‚'),
    ("ldquo", '“'),
    ("rdquo", '”'),
    ("bdquo", '„'),
    ("bull", '•'),
    ("hellip", '…'),
    ("prime", '′'),
    ("larr", '←'),
    ("rarr", '→'),
    ("uarr", '↑'),
    ("darr", '↓'),
    ("harr", '↔'),
    ("ne", '≠'),
    ("le", '≤'),
    ("ge", '≥'),
    ("infin", '∞'),
    ("check", '✓'),
    ("Agrave", 'À'),
    ("Aacute", 'Á'),
    ("Acirc", 'Â'),
    ("Atilde", 'Ã'),
    ("Auml", 'Ä'),
    ("Aring", 'Å'),
    ("AElig", 'Æ'),
    ("Ccedil", 'Ç'),
    ("Egrave", 'È'),
    ("Eacute", 'É'),
    ("Ecirc", 'Ê'),
    ("Euml", 'Ë'),
    ("Iacute", 'Í'),
    ("Ntilde", 'Ñ'),
    ("Oacute", 'Ó'),
    ("Ouml", 'Ö'),
    ("Oslash", 'Ø'),
    ("Uacute", 'Ú'),
    ("Uuml", 'Ü'),
    ("szlig", 'ß'),
    ("agrave", 'à'),
    ("aacute", 'á'),
    ("acirc", 'â'),
    ("atilde", 'ã'),
    ("auml", 'ä'),
    ("aring", 'å'),
    ("aelig", 'æ'),
    ("ccedil", 'ç'),
    ("egrave", 'è'),
    ("eacute", 'é'),
    ("ecirc", 'ê'),
    ("euml", 'ë'),
    ("igrave", 'ì'),
    ("iacute", 'í'),
    ("icirc", 'î'),
    ("iuml", 'ï'),
    ("ntilde", 'ñ'),
    ("ograve", 'ò'),
    ("oacute", 'ó'),
    ("ocirc", 'ô'),
    ("otilde", 'õ'),
    ("ouml", 'ö'),
    ("oslash", 'ø'),
    ("ugrave", 'ù'),
    ("uacute", 'ú'),
    ("ucirc", 'û'),
    ("uuml", 'ü'),
    ("yacute", 'ý'),
    ("yuml", 'ÿ'),
];

/// Parses a form-encoded webhook body. Repeated keys keep their first value.
pub fn parse_command(body: &str, profile: Profile) -> Result<IncomingCommand, ParseError> {
    let params: Vec<(String, String)> = serde_urlencoded::from_str(body)?;
    let param = |key: &str| {
        params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
    };
    let required = |key: &'static str| param(key).ok_or(ParseError::MalformedRequest(key));

    let token = required("token")?;
    let channel_id = required("channel_id")?;
    let user_name = required("user_name")?;
    let channel_name = param("channel_name").unwrap_or_default();
    let raw_text = param("text").unwrap_or_default();

    let (command, user_id, text) = match profile {
        Profile::SlashCommand => {
            let text = unescape_html(&raw_text).trim().to_string();
            (required("command")?, Some(required("user_id")?), text)
        }
        Profile::TriggerWord => {
            let trigger_word = required("trigger_word")?;
            let unescaped = unescape_html(&raw_text);
            let text = strip_trigger_word(unescaped.trim(), &trigger_word).to_string();
            (trigger_word, param("user_id"), text)
        }
    };

    let (action_phrase, action_body) = split_action(&text, profile.known_phrases());

    Ok(IncomingCommand {
        command,
        text,
        token,
        user_name,
        user_id,
        channel_id,
        channel_name,
        action_phrase,
        action_body,
    })
}

/// The first word is the action phrase when it is known; the remaining words
/// are rejoined with single spaces.
pub fn split_action(text: &str, known: &[ActionPhrase]) -> (Option<ActionPhrase>, Option<String>) {
    let mut words = text.split_whitespace();
    match words.next().and_then(|word| ActionPhrase::from_keyword(word, known)) {
        Some(phrase) => (Some(phrase), Some(words.collect::<Vec<_>>().join(" "))),
        None => (None, None),
    }
}

/// Strips a leading trigger word only when it stands as a whole word.
fn strip_trigger_word<'a>(text: &'a str, trigger_word: &str) -> &'a str {
    if trigger_word.is_empty() {
        return text;
    }
    match text.strip_prefix(trigger_word) {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim_start(),
        _ => text,
    }
}

/// Decodes named and numeric HTML entities. Slack escapes `&`, `<` and `>` in
/// message text; anything unrecognised is left untouched.
pub fn unescape_html(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        result.push_str(&rest[..start]);
        let tail = &rest[start..];

        let decoded = tail
            .find(';')
            .filter(|end| *end <= MAX_ENTITY_LEN + 1)
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));

        match decoded {
            Some((c, end)) => {
                result.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                result.push('&');
                rest = &tail[1..];
            }
        }
    }

    result.push_str(rest);
    Cow::Owned(result)
}

fn decode_entity(entity: &str) -> Option<char> {
    let Some(code) = entity.strip_prefix('#') else {
        return NAMED_ENTITIES
            .iter()
            .find(|(name, _)| *name == entity)
            .map(|(_, c)| *c);
    };

    let (digits, radix) = match code.strip_prefix(['x', 'X']) {
        Some(hex) => (hex, 16),
        None => (code, 10),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }

    // NUL, surrogates and out-of-range code points become U+FFFD.
    let decoded = u32::from_str_radix(digits, radix)
        .ok()
        .filter(|value| *value != 0)
        .and_then(char::from_u32)
        .unwrap_or(char::REPLACEMENT_CHARACTER);
    Some(decoded)
}
