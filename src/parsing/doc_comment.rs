// Doc-comment section parser (spec §4.4 "Doc-comment sections").

const SECTION_NAMES: &[&str] = &[
    "Authors", "Bugs", "Date", "Deprecated", "Examples", "History", "License", "Params",
    "Returns", "See_Also", "Standards", "Throws", "Version", "Note", "Warning",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocComment {
    pub summary: String,
    pub sections: Vec<(String, String)>,
    pub examples: Vec<String>,
}

impl ParsedDocComment {
    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }
}

fn section_header(line: &str) -> Option<&'static str> {
    for name in SECTION_NAMES {
        if let Some(rest) = line.strip_prefix(name) {
            if rest.starts_with(':') {
                return Some(name);
            }
        }
    }
    None
}

/// Parse a raw doc comment into a summary, named sections, and `---`
/// delimited code examples.
pub fn parse(raw: &str) -> ParsedDocComment {
    let mut summary_lines = Vec::new();
    let mut sections: Vec<(String, Vec<String>)> = Vec::new();
    let mut current: Option<usize> = None;

    for line in raw.lines() {
        if let Some(name) = section_header(line.trim_start()) {
            let content_start = line.trim_start().find(':').map(|i| i + 1).unwrap_or(line.len());
            let first_line = line.trim_start()[content_start..].trim_start().to_string();
            sections.push((name.to_string(), if first_line.is_empty() { Vec::new() } else { vec![first_line] }));
            current = Some(sections.len() - 1);
            continue;
        }
        match current {
            Some(idx) => sections[idx].1.push(line.to_string()),
            None => summary_lines.push(line.to_string()),
        }
    }

    let sections: Vec<(String, String)> = sections
        .into_iter()
        .map(|(name, lines)| (name, lines.join("\n").trim().to_string()))
        .collect();

    let examples = extract_examples(raw);

    ParsedDocComment {
        summary: summary_lines.join("\n").trim().to_string(),
        sections,
        examples,
    }
}

/// Every complete `---` ... `---` block is a captured example; an
/// unterminated trailing block is captured too (spec §4.4).
fn extract_examples(raw: &str) -> Vec<String> {
    let mut examples = Vec::new();
    let mut lines = raw.lines().peekable();
    let mut current: Option<Vec<&str>> = None;

    for line in raw.lines() {
        let _ = &mut lines;
        if line.trim() == "---" {
            match current.take() {
                Some(body) => examples.push(body.join("\n")),
                None => current = Some(Vec::new()),
            }
        } else if let Some(body) = current.as_mut() {
            body.push(line);
        }
    }
    if let Some(body) = current {
        if !body.is_empty() {
            examples.push(body.join("\n"));
        }
    }
    examples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_is_text_before_first_section() {
        let raw = "Adds two numbers together.\nParams: a, b\nThe operands.";
        let parsed = parse(raw);
        assert_eq!(parsed.summary, "Adds two numbers together.");
        assert_eq!(parsed.section("Params").unwrap(), "a, b\nThe operands.");
    }

    #[test]
    fn recognizes_all_named_sections() {
        let raw = SECTION_NAMES
            .iter()
            .map(|n| format!("{n}: value for {n}"))
            .collect::<Vec<_>>()
            .join("\n");
        let parsed = parse(&raw);
        for name in SECTION_NAMES {
            assert_eq!(parsed.section(name).unwrap(), format!("value for {name}"));
        }
    }

    #[test]
    fn does_not_treat_mid_word_colon_as_section_header() {
        let raw = "See the Notebook: it has details.";
        let parsed = parse(raw);
        assert!(parsed.sections.is_empty());
        assert_eq!(parsed.summary, raw);
    }

    #[test]
    fn captures_complete_example_blocks() {
        let raw = "Summary line.\n---\nwriteln(\"hi\");\n---\nMore text.";
        let parsed = parse(raw);
        assert_eq!(parsed.examples, vec!["writeln(\"hi\");".to_string()]);
    }

    #[test]
    fn captures_unterminated_trailing_example_block() {
        let raw = "---\nauto x = 1;\nauto y = 2;";
        let parsed = parse(raw);
        assert_eq!(parsed.examples, vec!["auto x = 1;\nauto y = 2;".to_string()]);
    }
}
