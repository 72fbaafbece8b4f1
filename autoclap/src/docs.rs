//! Help text extraction from Google-style doc strings
//!
//! ```text
//! Add two numbers.
//!
//! Args:
//!     left: The first operand
//!     right (int): The second operand, which may span
//!         several lines
//! ```

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

static SECTION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^\s*(Args|Arguments|Parameters|Params|Returns|Return|Raises|Yields",
        r"|Examples?|Notes?|Attributes):\s*$",
    ))
    .expect("section header regex is valid")
});

static PARAMETER_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\s*)\*{0,2}(\w+)\s*(?:\([^)]*\))?\s*:\s*(.*)$")
        .expect("parameter entry regex is valid")
});

/// Description and per-parameter help parsed from a doc string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocString {
    pub description: Option<String>,
    pub parameters: IndexMap<String, String>,
}

#[derive(PartialEq)]
enum Section {
    Description,
    Parameters,
    Other,
}

impl DocString {
    pub fn parse(text: &str) -> Self {
        let mut description: Vec<&str> = Vec::new();
        let mut parameters: IndexMap<String, String> = IndexMap::new();
        let mut section = Section::Description;
        let mut entry_indent: Option<usize> = None;
        let mut current: Option<String> = None;

        for line in text.lines() {
            if let Some(header) = SECTION_HEADER.captures(line) {
                section = match &header[1] {
                    "Args" | "Arguments" | "Parameters" | "Params" => Section::Parameters,
                    _ => Section::Other,
                };
                entry_indent = None;
                current = None;
                continue;
            }
            match section {
                Section::Description => description.push(line.trim()),
                Section::Other => {}
                Section::Parameters => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let indent = line.len() - line.trim_start().len();
                    let is_entry = entry_indent.map_or(true, |expected| indent <= expected);
                    match PARAMETER_ENTRY.captures(line) {
                        Some(entry) if is_entry => {
                            entry_indent = Some(indent);
                            let name = entry[2].to_string();
                            parameters.insert(name.clone(), entry[3].trim().to_string());
                            current = Some(name);
                        }
                        _ => {
                            let help = current.as_ref().and_then(|n| parameters.get_mut(n));
                            if let Some(help) = help {
                                if !help.is_empty() {
                                    help.push(' ');
                                }
                                help.push_str(line.trim());
                            }
                        }
                    }
                }
            }
        }

        let description = description.join("\n").trim().to_string();
        Self {
            description: (!description.is_empty()).then_some(description),
            parameters,
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_google_style() {
        let doc = DocString::parse(
            "Process some files.\n\n\
             Longer explanation.\n\n\
             Args:\n    \
                 path: The input file\n    \
                 count (int): How many times to\n        \
                     repeat the work\n    \
                 **kwargs: Extra options\n\n\
             Returns:\n    \
                 value: Nothing useful\n",
        );
        assert_eq!(
            doc.description.as_deref(),
            Some("Process some files.\n\nLonger explanation.")
        );
        assert_eq!(doc.parameter("path"), Some("The input file"));
        assert_eq!(doc.parameter("count"), Some("How many times to repeat the work"));
        assert_eq!(doc.parameter("kwargs"), Some("Extra options"));
        assert_eq!(doc.parameter("value"), None);
    }

    #[test]
    fn test_parse_without_sections() {
        let doc = DocString::parse("Just a summary.");
        assert_eq!(doc.description.as_deref(), Some("Just a summary."));
        assert!(doc.parameters.is_empty());
        assert_eq!(DocString::parse("").description, None);
    }
}
