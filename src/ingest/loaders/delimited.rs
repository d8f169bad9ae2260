use super::Loader;
use crate::error::{ColdlistError, Result};
use crate::ingest::table::RawTable;

/// Field separator used for every line of a delimited file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Comma,
    Semicolon,
    Tab,
}

impl Delimiter {
    pub fn as_char(self) -> char {
        match self {
            Delimiter::Comma => ',',
            Delimiter::Semicolon => ';',
            Delimiter::Tab => '\t',
        }
    }

    /// Pick the delimiter from raw character counts in the header line.
    ///
    /// Quotes are not considered. Tab wins ties when present, semicolon must
    /// strictly outnumber commas, comma is the default.
    pub fn detect(first_line: &str) -> Self {
        let count = |needle: char| first_line.chars().filter(|&c| c == needle).count();
        let tabs = count('\t');
        let commas = count(',');
        let semicolons = count(';');

        if tabs > 0 && tabs >= commas && tabs >= semicolons {
            Delimiter::Tab
        } else if semicolons > commas {
            Delimiter::Semicolon
        } else {
            Delimiter::Comma
        }
    }
}

/// Split one line into trimmed fields.
///
/// `"` toggles the quoted state; `""` inside a quoted span is a literal quote.
/// The delimiter only separates fields outside quoted spans.
pub fn split_line(line: &str, delimiter: Delimiter) -> Vec<String> {
    let delimiter = delimiter.as_char();
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '"' {
            if in_quotes && chars.peek() == Some(&'"') {
                chars.next();
                current.push('"');
            } else {
                in_quotes = !in_quotes;
            }
        } else if c == delimiter && !in_quotes {
            fields.push(finish_field(&current));
            current.clear();
        } else {
            current.push(c);
        }
    }
    fields.push(finish_field(&current));

    fields
}

fn finish_field(raw: &str) -> String {
    let unquoted = raw.strip_prefix('"').unwrap_or(raw);
    let unquoted = unquoted.strip_suffix('"').unwrap_or(unquoted);
    unquoted.trim().to_string()
}

/// Decode UTF-8 text and normalize `\r\n` and lone `\r` to `\n`.
fn decode_text(bytes: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ColdlistError::UnreadableFile(format!("file is not valid UTF-8 text: {}", e)))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    Ok(text.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Parse delimited text (CSV, semicolon-separated, TSV) into a table
pub fn parse_delimited(text: &str) -> RawTable {
    let mut lines = text.split('\n').filter(|line| !line.trim().is_empty()).peekable();

    let delimiter = match lines.peek() {
        Some(first) => Delimiter::detect(first),
        None => return RawTable::empty(),
    };
    log::debug!("Detected delimiter {:?}", delimiter.as_char());

    RawTable::from_grid(lines.map(|line| split_line(line, delimiter)))
}

/// Loader for delimited text; also the fallback for unknown extensions
pub struct DelimitedLoader;

impl Loader for DelimitedLoader {
    fn can_load(&self, extension: &str) -> bool {
        matches!(extension, "csv" | "tsv" | "txt")
    }

    fn load(&self, bytes: &[u8], _file_name: &str) -> Result<RawTable> {
        let text = decode_text(bytes)?;
        Ok(parse_delimited(&text))
    }
}
