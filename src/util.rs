//! Small string and decoding helpers shared across modules.

use std::borrow::Cow;

/// Decode bytes to a string, handling various encodings.
///
/// This function:
/// 1. First tries UTF-8 (handles BOM automatically via encoding_rs)
/// 2. If malformed, tries the hint encoding (from `<?xml encoding="..."?>`)
/// 3. Falls back to Windows-1252
///
/// Uses `Cow<str>` to avoid allocation when the input is valid UTF-8.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    // Try UTF-8 first (handles BOM automatically)
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Extract the encoding label from an XML declaration, if any.
///
/// Only the first 100 bytes are inspected.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let check_len = bytes.len().min(100);
    let prefix = &bytes[..check_len];

    let xml_start = prefix.windows(5).position(|w| w == b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    let quote = *after_enc.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value_end = after_enc[1..].iter().position(|&b| b == quote)? + 1;
    std::str::from_utf8(&after_enc[1..value_end]).ok()
}

/// Whether `token` can be used as an identifier prefix.
///
/// Prefixes become part of ids, attribute references and member names,
/// so they are restricted to word characters.
pub fn is_valid_prefix_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Produce the "next" file name after `filename`.
///
/// A trailing run of digits in the stem is incremented
/// (`Spread_ub6.xml` becomes `Spread_ub7.xml`, `myfile-299` becomes
/// `myfile-300`); otherwise the last character is bumped, with `z`
/// and `Z` rolling over to `za` and `Za`.
pub fn increment_filename(filename: &str) -> String {
    let (dir, base) = match filename.rfind('/') {
        Some(i) => filename.split_at(i + 1),
        None => ("", filename),
    };
    let (stem, ext) = match base.rfind('.') {
        Some(i) if i > 0 => base.split_at(i),
        _ => (base, ""),
    };

    let digits_start = stem
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);

    let new_stem = match digits_start {
        Some(i) => {
            let (head, digits) = stem.split_at(i);
            match digits.parse::<u128>() {
                Ok(n) => format!("{head}{}", n + 1),
                Err(_) => format!("{stem}1"),
            }
        }
        None => bump_last_char(stem),
    };

    format!("{dir}{new_stem}{ext}")
}

fn bump_last_char(stem: &str) -> String {
    let mut chars: Vec<char> = stem.chars().collect();
    match chars.pop() {
        None => "a".to_string(),
        Some('z') => format!("{}za", chars.iter().collect::<String>()),
        Some('Z') => format!("{}Za", chars.iter().collect::<String>()),
        Some(c) => {
            let next = char::from_u32(c as u32 + 1).unwrap_or('a');
            chars.push(next);
            chars.into_iter().collect()
        }
    }
}

/// Where a freshly created structure element sits relative to its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPosition {
    Sibling,
    Child,
}

/// Derive a new `XMLElement` id from an existing one.
///
/// Structure ids follow the `d…i<N>` numbering the host application uses:
/// a sibling of `di3i4i10` is `di3i4i11`, a child of `di3i4` is `di3i4i1`.
pub fn increment_xmltag_id(id: &str, position: IdPosition) -> String {
    match position {
        IdPosition::Child => format!("{id}i1"),
        IdPosition::Sibling => match split_xmltag_counter(id) {
            Some((head, n)) => format!("{head}{}", n + 1),
            None => format!("{id}i1"),
        },
    }
}

/// Split `di3i4i10` into (`di3i4i`, 10).
fn split_xmltag_counter(id: &str) -> Option<(&str, u64)> {
    let d = id.find('d')?;
    let i = id.rfind('i')?;
    if i < d {
        return None;
    }
    let digits = &id[i + 1..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n = digits.parse().ok()?;
    Some((&id[..=i], n))
}
