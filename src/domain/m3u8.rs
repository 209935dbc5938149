//! Line-level M3U8 model.
//!
//! A playlist is kept as an ordered list of lines, each classified as blank,
//! comment, tag or URI reference. Parsing is lossless for everything the
//! relay does not touch, so `parse` followed by `to_string` reproduces the
//! input apart from line endings, which are normalised to `\n`.

use std::fmt;

/// Marker every HLS playlist starts with.
pub const EXTM3U: &str = "#EXTM3U";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Empty or whitespace-only line, kept as written.
    Blank(String),
    /// `#` line that is not an `#EXT` tag.
    Comment(String),
    Tag(Tag),
    /// Playlist or segment reference.
    Uri(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Tag name without the leading `#`, e.g. `EXT-X-MAP`.
    pub name: String,
    pub value: TagValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    None,
    /// Value kept verbatim (`#EXTINF:6.000,` and friends).
    Raw(String),
    /// Attribute list of a tag that carries a `URI="..."` attribute.
    Attributes(Vec<Attribute>),
}

/// One `NAME=value` entry of an attribute list. `value` is stored raw,
/// quotes included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

impl Attribute {
    /// Unquoted content of a quoted-string value.
    pub fn quoted_value(&self) -> Option<&str> {
        let value = self.value.as_deref()?;
        if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            Some(&value[1..value.len() - 1])
        } else {
            None
        }
    }

    pub fn set_quoted_value(&mut self, value: &str) {
        self.value = Some(format!("\"{}\"", value));
    }
}

impl Tag {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        match &self.value {
            TagValue::Attributes(attrs) => attrs.iter().find(|a| a.name == name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub lines: Vec<Line>,
    trailing_newline: bool,
}

impl Playlist {
    pub fn parse(text: &str) -> Self {
        let lines = text
            .lines()
            .map(|line| parse_line(line.strip_suffix('\r').unwrap_or(line)))
            .collect();
        Self {
            lines,
            trailing_newline: text.ends_with('\n'),
        }
    }

    /// Rewrite every URI reference: bare URI lines and the `URI` attribute
    /// of tags. Everything else passes through untouched.
    pub fn rewrite_uris<F>(&mut self, mut rewrite: F)
    where
        F: FnMut(&str) -> String,
    {
        for line in &mut self.lines {
            match line {
                Line::Uri(uri) => *uri = rewrite(uri),
                Line::Tag(Tag {
                    value: TagValue::Attributes(attrs),
                    ..
                }) => {
                    for attr in attrs.iter_mut().filter(|a| a.name == "URI") {
                        if let Some(current) = attr.quoted_value().map(str::to_string) {
                            attr.set_quoted_value(&rewrite(&current));
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

impl fmt::Display for Playlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", line)?;
        }
        if self.trailing_newline {
            f.write_str("\n")?;
        }
        Ok(())
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Blank(raw) | Line::Comment(raw) | Line::Uri(raw) => f.write_str(raw),
            Line::Tag(tag) => write!(f, "{}", tag),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.name)?;
        match &self.value {
            TagValue::None => Ok(()),
            TagValue::Raw(raw) => write!(f, ":{}", raw),
            TagValue::Attributes(attrs) => {
                f.write_str(":")?;
                for (i, attr) in attrs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    f.write_str(&attr.name)?;
                    if let Some(value) = &attr.value {
                        write!(f, "={}", value)?;
                    }
                }
                Ok(())
            }
        }
    }
}

fn parse_line(line: &str) -> Line {
    if line.trim().is_empty() {
        return Line::Blank(line.to_string());
    }
    if let Some(body) = line.strip_prefix("#EXT") {
        return Line::Tag(parse_tag(&format!("EXT{}", body)));
    }
    if line.starts_with('#') {
        return Line::Comment(line.to_string());
    }
    Line::Uri(line.trim().to_string())
}

fn parse_tag(body: &str) -> Tag {
    let Some((name, value)) = body.split_once(':') else {
        return Tag {
            name: body.to_string(),
            value: TagValue::None,
        };
    };

    let value = if value.contains("URI=\"") {
        TagValue::Attributes(parse_attributes(value))
    } else {
        TagValue::Raw(value.to_string())
    };

    Tag {
        name: name.to_string(),
        value,
    }
}

/// Split an attribute list on commas that sit outside quoted strings.
fn parse_attributes(list: &str) -> Vec<Attribute> {
    let mut attrs = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;

    for (i, c) in list.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                attrs.push(parse_attribute(&list[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    attrs.push(parse_attribute(&list[start..]));
    attrs
}

fn parse_attribute(entry: &str) -> Attribute {
    match entry.split_once('=') {
        Some((name, value)) => Attribute {
            name: name.to_string(),
            value: Some(value.to_string()),
        },
        None => Attribute {
            name: entry.to_string(),
            value: None,
        },
    }
}
