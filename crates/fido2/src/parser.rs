//! Line-oriented parsing of the tool's human readable output
//!
//! Every format assumption about `fido2-token` text lives here so that a
//! change in the tool's output only needs changes in this module.

use std::str::Lines;

/// Separator between an attribute name and its value
pub const KEY_VALUE_SEPARATOR: &str = ": ";

/// Lazy iterator over the `key: value` pairs of a block of text
///
/// Splits on the first separator only. Non-empty lines without a separator
/// come back as `(line, "")`; empty lines are skipped.
#[derive(Debug, Clone)]
pub struct KeyValueLines<'a> {
    lines: Lines<'a>,
}

impl<'a> Iterator for KeyValueLines<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            return Some(split_key_value(line));
        }
    }
}

/// Iterate the `key: value` pairs of `text`
pub fn key_value_lines(text: &str) -> KeyValueLines<'_> {
    KeyValueLines {
        lines: text.lines(),
    }
}

/// Split one line on the first `": "`
pub fn split_key_value(line: &str) -> (&str, &str) {
    line.split_once(KEY_VALUE_SEPARATOR).unwrap_or((line, ""))
}

/// Value of a trailing `= value` on a line, as used by the domain listing
pub fn trailing_assignment(line: &str) -> Option<&str> {
    let line = line.trim_end_matches('\r');
    let (_, value) = line.split_once("= ")?;
    (!value.is_empty()).then_some(value)
}

/// Parse an attribute value as a count; anything non-numeric is `None`
pub fn parse_count(value: &str) -> Option<i64> {
    value.trim().parse().ok()
}

/// Find the `minpinlen: N` line in `text`
///
/// Only a line whose key is exactly `minpinlen` counts, so that
/// `maxrpids in minpinlen: 0` is not mistaken for the policy value. Space
/// after the colon is optional.
pub fn find_min_pin_length(text: &str) -> Option<u32> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim() == "minpinlen")
        .and_then(|(_, value)| {
            let digits: String = value
                .trim_start()
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            digits.parse().ok()
        })
}
