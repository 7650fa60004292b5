use std::collections::BTreeMap;

use nom::bytes::complete::take_while1;
use nom::character::complete::char;
use nom::combinator::all_consuming;
use nom::sequence::delimited;
use nom::IResult;

use crate::error::{Error, Result};
use crate::schema::{HeaderKind, Opcode};

/// One header block as written in the source, before nesting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeBlock {
    pub kind: HeaderKind,
    pub opcodes: BTreeMap<Opcode, String>,
    /// Line of the header marker (1-based)
    pub line: usize,
}

/// Split SFZ text into a flat sequence of header blocks
///
/// # SFZ Syntax
///
/// ```text
/// // full-line comment
/// <group> lovel=0 hivel=63
/// <region> sample=Grand Piano C4.wav key=c4   // inline comment
/// ```
///
/// A header is a `<name>` token. Everything up to the next header belongs to
/// it as `opcode=value` pairs. Values may contain spaces and `=`: an `=` only
/// starts a new opcode when the text between the preceding whitespace and the
/// `=` is a valid opcode name.
///
/// Lines starting with `#` (`#define`, `#include`) are not supported and are
/// skipped. Blocks with a header this converter does not know (`<master>`,
/// `<curve>`, `<effect>`, ...) are skipped with their opcodes.
///
/// # Errors
///
/// Returns [`Error::Parse`] with the line and column of the offending text
/// when a `<` does not form a valid header, when opcodes appear before the
/// first header, or when a block contains text that is not an opcode.
pub fn lex(content: &str) -> Result<Vec<AttributeBlock>> {
    let cleaned = strip_comments(content);
    let headers = find_headers(&cleaned)?;

    let first_header = headers.first().map(|h| h.start).unwrap_or(cleaned.len());
    if let Some(offset) = first_non_whitespace(&cleaned[..first_header]) {
        return Err(parse_error(&cleaned, offset, "opcodes outside of any header"));
    }

    let mut blocks = Vec::new();
    for (index, header) in headers.iter().enumerate() {
        let body_end = headers
            .get(index + 1)
            .map(|next| next.start)
            .unwrap_or(cleaned.len());
        let opcodes = split_opcodes(&cleaned, header.end, body_end)?;

        match HeaderKind::from_header(header.name) {
            Some(kind) => blocks.push(AttributeBlock {
                kind,
                opcodes,
                line: position(&cleaned, header.start).0,
            }),
            None => log::warn!(
                "Skipping unsupported header <{}> with {} opcodes",
                header.name,
                opcodes.len()
            ),
        }
    }

    log::debug!("Lexed {} blocks", blocks.len());
    Ok(blocks)
}

/// Lex raw bytes, replacing invalid UTF-8 sequences instead of failing.
pub fn lex_bytes(content: &[u8]) -> Result<Vec<AttributeBlock>> {
    lex(&String::from_utf8_lossy(content))
}

struct HeaderMarker<'a> {
    name: &'a str,
    start: usize,
    end: usize,
}

fn header_name(input: &str) -> IResult<&str, &str> {
    delimited(
        char('<'),
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        char('>'),
    )(input)
}

fn is_opcode_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '#'
}

fn is_opcode_name(text: &str) -> bool {
    all_consuming(take_while1::<_, _, nom::error::Error<&str>>(is_opcode_char))(text).is_ok()
}

/// Blank out comment lines and directives, cut inline comments.
///
/// Line structure and columns are preserved so error positions still point
/// into the original text.
fn strip_comments(content: &str) -> String {
    let mut cleaned = String::with_capacity(content.len());

    for (index, line) in content.lines().enumerate() {
        if index > 0 {
            cleaned.push('\n');
        }

        let trimmed = line.trim_start();
        if trimmed.starts_with("//") {
            continue;
        }
        if trimmed.starts_with('#') {
            log::warn!(
                "Skipping unsupported directive on line {}: {}",
                index + 1,
                trimmed
            );
            continue;
        }

        let mut cut = line.len();
        let mut previous: Option<char> = None;
        for (offset, c) in line.char_indices() {
            if c == '/'
                && line[offset..].starts_with("//")
                && previous.map_or(true, char::is_whitespace)
            {
                cut = offset;
                break;
            }
            previous = Some(c);
        }
        cleaned.push_str(&line[..cut]);
    }

    cleaned
}

fn find_headers(text: &str) -> Result<Vec<HeaderMarker<'_>>> {
    let mut headers = Vec::new();
    let mut previous: Option<char> = None;
    let mut skip_until = 0;

    for (offset, c) in text.char_indices() {
        if offset < skip_until {
            previous = Some(c);
            continue;
        }
        let at_token_start = previous.map_or(true, |p| p.is_whitespace() || p == '>');
        if c == '<' && at_token_start {
            match header_name(&text[offset..]) {
                Ok((rest, name)) => {
                    let end = text.len() - rest.len();
                    headers.push(HeaderMarker {
                        name,
                        start: offset,
                        end,
                    });
                    skip_until = end;
                }
                Err(_) => return Err(parse_error(text, offset, "malformed header")),
            }
        }
        previous = Some(c);
    }

    Ok(headers)
}

/// Parse the `opcode=value` pairs in `text[start..end]`.
fn split_opcodes(text: &str, start: usize, end: usize) -> Result<BTreeMap<Opcode, String>> {
    let body = &text[start..end];

    // (name start, '=' position) of every real opcode boundary
    let mut boundaries: Vec<(usize, usize)> = Vec::new();
    for (eq, _) in body.match_indices('=') {
        let name_start = body[..eq]
            .rfind(char::is_whitespace)
            .map(|ws| ws + body[ws..].chars().next().map_or(1, char::len_utf8))
            .unwrap_or(0);
        if is_opcode_name(&body[name_start..eq]) {
            boundaries.push((name_start, eq));
        }
    }

    let first_name = boundaries.first().map(|b| b.0).unwrap_or(body.len());
    if let Some(offset) = first_non_whitespace(&body[..first_name]) {
        return Err(parse_error(text, start + offset, "expected opcode=value"));
    }

    let mut opcodes = BTreeMap::new();
    for (index, (name_start, eq)) in boundaries.iter().enumerate() {
        let value_end = boundaries
            .get(index + 1)
            .map(|next| next.0)
            .unwrap_or(body.len());
        let name = &body[*name_start..*eq];
        let value = body[eq + 1..value_end].trim();

        if let Some(previous) = opcodes.insert(Opcode::parse(name), value.to_string()) {
            log::debug!("Opcode {} repeated in block, '{}' replaced", name, previous);
        }
    }

    Ok(opcodes)
}

fn first_non_whitespace(text: &str) -> Option<usize> {
    text.char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(offset, _)| offset)
}

/// 1-based line and column of a byte offset.
fn position(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|n| n + 1).unwrap_or(0);
    let column = text[line_start..offset].chars().count() + 1;
    (line, column)
}

fn parse_error(text: &str, offset: usize, message: &str) -> Error {
    let (line, column) = position(text, offset);
    let snippet: String = text[offset..]
        .chars()
        .take_while(|c| *c != '\n')
        .take(24)
        .collect();
    Error::Parse {
        line,
        column,
        message: format!("{} near '{}'", message, snippet.trim_end()),
    }
}
