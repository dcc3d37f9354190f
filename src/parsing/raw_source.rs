// Raw-source fallback extraction (spec §4.4 "Raw-source fallback"), used
// when a package's compile-and-dump step failed for a source file.

use once_cell::sync::Lazy;
use regex::Regex;

static IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"import\s+([A-Za-z_][A-Za-z0-9_.]*)(?:\s*:\s*[^;]+)?\s*;").unwrap());

/// Find every `unittest { ... }` block via balanced-brace matching over the
/// raw file text and return each block's body (without the outer braces).
pub fn extract_unittest_blocks(source: &str) -> Vec<String> {
    let bytes: Vec<char> = source.chars().collect();
    let mut blocks = Vec::new();
    let mut i = 0;
    while let Some(rel) = find_unittest_keyword(&bytes[i..]) {
        let kw_start = i + rel;
        let mut j = kw_start + "unittest".len();
        while j < bytes.len() && bytes[j].is_whitespace() {
            j += 1;
        }
        if j >= bytes.len() || bytes[j] != '{' {
            i = kw_start + "unittest".len();
            continue;
        }
        let body_start = j + 1;
        if let Some(body_end) = find_matching_brace(&bytes, j) {
            let body: String = bytes[body_start..body_end].iter().collect();
            blocks.push(body.trim().to_string());
            i = body_end + 1;
        } else {
            break;
        }
    }
    blocks
}

fn find_unittest_keyword(chars: &[char]) -> Option<usize> {
    let s: String = chars.iter().collect();
    let mut search_from = 0;
    loop {
        let idx = s[search_from..].find("unittest")?;
        let abs = search_from + idx;
        let before_ok = abs == 0 || !s.as_bytes()[abs - 1].is_ascii_alphanumeric();
        let after = abs + "unittest".len();
        let after_ok = after >= s.len() || !s.as_bytes().get(after).map(|b| b.is_ascii_alphanumeric()).unwrap_or(false);
        if before_ok && after_ok {
            return Some(abs);
        }
        search_from = abs + 1;
        if search_from >= s.len() {
            return None;
        }
    }
}

/// Given the index of an opening `{`, find the index of its matching `}`.
fn find_matching_brace(chars: &[char], open_idx: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (offset, &c) in chars[open_idx..].iter().enumerate() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open_idx + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Scan `import <dotted>(:...)?;` statements for required import paths.
pub fn scan_imports(source: &str) -> Vec<String> {
    IMPORT_RE
        .captures_iter(source)
        .map(|c| c[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_single_unittest_block() {
        let src = "int add(int a, int b) { return a + b; }\nunittest {\n    assert(add(1, 2) == 3);\n}\n";
        let blocks = extract_unittest_blocks(src);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].contains("assert(add(1, 2) == 3);"));
    }

    #[test]
    fn extracts_multiple_unittest_blocks_with_nested_braces() {
        let src = "unittest {\n    if (true) { assert(1 == 1); }\n}\nunittest {\n    assert(2 == 2);\n}\n";
        let blocks = extract_unittest_blocks(src);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("if (true)"));
    }

    #[test]
    fn ignores_identifiers_containing_unittest_as_substring() {
        let src = "auto myUnittestHelper = 1;\n";
        assert!(extract_unittest_blocks(src).is_empty());
    }

    #[test]
    fn scans_plain_and_selective_imports() {
        let src = "import std.algorithm;\nimport std.stdio : writeln, writefln;\n";
        let imports = scan_imports(src);
        assert_eq!(imports, vec!["std.algorithm".to_string(), "std.stdio".to_string()]);
    }
}
