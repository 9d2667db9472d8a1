//! HTML entity decoding and markup stripping.
//!
//! Episode descriptions arrive as HTML, sometimes entity-encoded once more on
//! top (`&lt;p&gt;` instead of `<p>`, `&amp;ntilde;` instead of `&ntilde;`).
//! [`normalize`] peels those layers off until the text stops changing.

use lazy_static::lazy_static;
use regex::Regex;

/// Upper bound on decode passes performed by [`normalize`].
const MAX_NORMALIZE_PASSES: usize = 4;

/// Longest entity name we try to match, `&` and `;` excluded.
const MAX_ENTITY_LEN: usize = 10;

lazy_static! {
    // Tags that end a visual line: closing block elements and line breaks.
    static ref BLOCK_BOUNDARY_TAG: Regex =
        Regex::new(r"(?i)</(?:p|div|li|h[1-6]|tr|blockquote)\s*>|<br\s*/?\s*>").unwrap();

    // Anything that looks like a start tag, end tag, comment or doctype.
    static ref ANY_TAG: Regex = Regex::new(r"(?s)<!--.*?-->|</?[a-zA-Z!][^<>]*>").unwrap();

    // Tags uncovered by decoding an entity-encoded layer. Restricted to HTML
    // element names with well-formed attributes, so literal text such as
    // `<Untitled>` survives the later passes.
    static ref HTML_TAG: Regex = Regex::new(
        r#"(?is)<!--.*?-->|</?(?:a|b|i|u|em|strong|span|font|small|big|sup|sub|p|br|hr|div|li|ul|ol|h[1-6]|img|blockquote|table|tbody|thead|tr|td|th|center)(?:\s+[a-z][a-z0-9:-]*\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'<>]+))*\s*/?>"#
    )
    .unwrap();

    // Two-character escape sequences left behind by double-escaping feeds.
    static ref LITERAL_LINE_ESCAPE: Regex = Regex::new(r"(?:\\r)?\\n|\\r").unwrap();
}

/// Decodes numeric (`&#39;`, `&#x27;`) and common named HTML entities.
///
/// Unknown or malformed entities are left untouched. Text without any
/// entity is returned unchanged.
pub fn decode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];

        match decode_entity_at(candidate) {
            Some((decoded, consumed)) => {
                out.push(decoded);
                rest = &candidate[consumed..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Attempts to decode the entity at the start of `s` (which begins with `&`).
///
/// Returns the decoded character and the number of bytes consumed.
fn decode_entity_at(s: &str) -> Option<(char, usize)> {
    let semicolon = s[1..]
        .char_indices()
        .take(MAX_ENTITY_LEN + 1)
        .find(|(_, c)| *c == ';')
        .map(|(i, _)| i + 1)?;
    let body = &s[1..semicolon];

    let decoded = if let Some(numeric) = body.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        char::from_u32(code)?
    } else {
        named_entity(body)?
    };

    Some((decoded, semicolon + 1))
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "iexcl" => '¡',
        "iquest" => '¿',
        "laquo" => '«',
        "raquo" => '»',
        "ordf" => 'ª',
        "ordm" => 'º',
        "middot" => '·',
        "ndash" => '–',
        "mdash" => '—',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "hellip" => '…',
        "aacute" => 'á',
        "eacute" => 'é',
        "iacute" => 'í',
        "oacute" => 'ó',
        "uacute" => 'ú',
        "Aacute" => 'Á',
        "Eacute" => 'É',
        "Iacute" => 'Í',
        "Oacute" => 'Ó',
        "Uacute" => 'Ú',
        "agrave" => 'à',
        "egrave" => 'è',
        "igrave" => 'ì',
        "ograve" => 'ò',
        "ugrave" => 'ù',
        "Agrave" => 'À',
        "Egrave" => 'È',
        "Ograve" => 'Ò',
        "auml" => 'ä',
        "euml" => 'ë',
        "iuml" => 'ï',
        "ouml" => 'ö',
        "uuml" => 'ü',
        "Auml" => 'Ä',
        "Ouml" => 'Ö',
        "Uuml" => 'Ü',
        "acirc" => 'â',
        "ecirc" => 'ê',
        "ocirc" => 'ô',
        "ntilde" => 'ñ',
        "Ntilde" => 'Ñ',
        "ccedil" => 'ç',
        "Ccedil" => 'Ç',
        "szlig" => 'ß',
        _ => return None,
    };
    Some(c)
}

/// Removes markup while keeping one visual line per output line.
///
/// Block boundaries (`</p>`, `</div>`, `<br>`, ...) and literal `\n` escape
/// sequences become newlines first, then every remaining tag is dropped.
/// Entities are not decoded here.
pub fn strip_markup(html: &str) -> String {
    strip_tags(html, &ANY_TAG)
}

fn strip_tags(html: &str, tags: &Regex) -> String {
    let separated = LITERAL_LINE_ESCAPE.replace_all(html, "\n");
    let separated = BLOCK_BOUNDARY_TAG.replace_all(&separated, "\n");
    tags.replace_all(&separated, "").into_owned()
}

/// Runs separator insertion, tag stripping and entity decoding, repeating the
/// pipeline while each pass still uncovers markup or entities.
///
/// After the first pass only real HTML elements are stripped: angle brackets
/// that came out of a single `&lt;`/`&gt;` layer are kept as text.
pub fn normalize(raw: &str) -> String {
    let mut text = raw.to_string();
    for pass in 0..MAX_NORMALIZE_PASSES {
        let tags: &Regex = if pass == 0 { &ANY_TAG } else { &HTML_TAG };
        let next = decode(&strip_tags(&text, tags));
        if next == text {
            break;
        }
        text = next;
    }
    text
}
