use std::str::FromStr;

use crate::error::{MessageParseError, ProtocolError};

use super::nom_parser::ParsedMessage;
use super::types::{Message, Tag};

fn unescape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn parse_tags_string(tags: &str) -> Vec<Tag> {
    tags.split(';')
        .filter(|s| !s.is_empty())
        .map(|tag| match tag.split_once('=') {
            Some((key, value)) => Tag(key.to_owned(), Some(unescape_tag_value(value))),
            None => Tag(tag.to_owned(), None),
        })
        .collect()
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Message, Self::Err> {
        let line = s.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(ProtocolError::invalid(s, MessageParseError::EmptyMessage));
        }

        let parsed = ParsedMessage::parse(line).map_err(|failure| {
            ProtocolError::invalid(
                s,
                MessageParseError::ParseContext {
                    position: failure.position,
                    context: format!("{:?}", failure.kind),
                },
            )
        })?;

        let tags = parsed.tags.map(parse_tags_string);
        Message::with_tags(tags, parsed.prefix, parsed.command, parsed.params.to_vec())
            .map_err(|cause| ProtocolError::invalid(s, cause))
    }
}
