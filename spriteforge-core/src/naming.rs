//! Frame Naming Convention - `Character_AnimName_###`
//!
//! The index block is optional. Digits glued to the animation name stay part
//! of the name, but still count as the frame index for ordering.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Name '{name}' does not match Character_AnimName[_###]: {reason}")]
pub struct NotMatched {
    pub name: String,
    pub reason: &'static str,
}

impl NotMatched {
    fn new(name: &str, reason: &'static str) -> Self {
        Self { name: name.to_string(), reason }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedName {
    pub character: String,
    pub animation: String,
    pub frame_index: i32,
}

/// Decompose a frame name into `(character, animation, frame_index)`.
pub fn parse(name: &str) -> Result<ParsedName, NotMatched> {
    let first_underscore = match name.find('_') {
        Some(0) | None => return Err(NotMatched::new(name, "no character prefix")),
        Some(i) => i,
    };

    let character = name[..first_underscore].trim();
    if character.is_empty() {
        return Err(NotMatched::new(name, "empty character"));
    }

    let remainder = &name[first_underscore + 1..];
    let digits_start = trailing_digits_start(name);

    let animation = if digits_start < name.len() {
        // '_' and ASCII digits are single bytes, so byte offsets are char boundaries.
        match name[..digits_start].rfind('_') {
            Some(sep) if sep > first_underscore => &name[first_underscore + 1..sep],
            _ => remainder,
        }
    } else {
        remainder
    };

    let animation = animation.trim();
    if animation.is_empty() {
        return Err(NotMatched::new(name, "empty animation name"));
    }

    Ok(ParsedName {
        character: character.to_string(),
        animation: animation.to_string(),
        frame_index: frame_index(name),
    })
}

/// Parse only the character prefix. Used by reports, which count frames
/// even when the animation part is malformed.
pub fn parse_character(name: &str) -> Option<&str> {
    match name.find('_') {
        Some(0) | None => None,
        Some(i) => Some(name[..i].trim()).filter(|c| !c.is_empty()),
    }
}

/// Trailing digit run as an integer; 0 when absent or out of range.
pub fn frame_index(name: &str) -> i32 {
    name[trailing_digits_start(name)..].parse().unwrap_or(0)
}

fn trailing_digits_start(name: &str) -> usize {
    let bytes = name.as_bytes();
    let mut start = bytes.len();
    while start > 0 && bytes[start - 1].is_ascii_digit() {
        start -= 1;
    }
    start
}

/// Inverse of [`parse`] for names without `_` in either part.
pub fn format_frame_name(character: &str, animation: &str, index: Option<i32>) -> String {
    match index {
        Some(i) => format!("{}_{}_{}", character, animation, i),
        None => format!("{}_{}", character, animation),
    }
}

/// Replace characters that cannot appear in a file name, and spaces, with `_`.
pub fn sanitize_file_part(s: &str) -> String {
    s.chars()
        .map(|ch| match ch {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | ' ' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
