// Recursive-descent decoder for compiler-internal mangled type strings
// ("deco", spec §4.4). Returns an empty string on any malformed suffix
// rather than panicking (Design Notes §9).

/// Decode a single deco string into a readable type name.
pub fn decode(deco: &str) -> String {
    let chars: Vec<char> = deco.chars().collect();
    let mut pos = 0;
    let decoded = decode_type(&chars, &mut pos);
    normalize_alias(&decoded)
}

/// Scan a function's deco for `@safe`/`@nogc`/`nothrow`/`pure` function
/// attribute markers, stopping at the parameter/return-type separator `Z`.
pub fn decode_function_attributes(deco: &str) -> FunctionAttrs {
    let chars: Vec<char> = deco.chars().collect();
    let mut attrs = FunctionAttrs::default();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == 'Z' {
            break;
        }
        if chars[i] == 'N' && i + 1 < chars.len() {
            match chars[i + 1] {
                'a' => attrs.is_pure = true,
                'b' => attrs.is_nothrow = true,
                'f' => attrs.is_safe = true,
                'e' => attrs.is_trusted = true,
                'i' => attrs.is_nogc = true,
                _ => {}
            }
            i += 2;
            continue;
        }
        i += 1;
    }
    attrs
}

/// Locate the final top-level `Z` in a function deco and decode what
/// follows it as the return type.
pub fn decode_return_type(deco: &str) -> String {
    match deco.rfind('Z') {
        Some(byte_idx) => decode(&deco[byte_idx + 1..]),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionAttrs {
    pub is_safe: bool,
    pub is_trusted: bool,
    pub is_nogc: bool,
    pub is_nothrow: bool,
    pub is_pure: bool,
}

fn decode_type(chars: &[char], pos: &mut usize) -> String {
    if *pos >= chars.len() {
        return String::new();
    }
    let c = chars[*pos];
    match c {
        'v' => { *pos += 1; "void".into() }
        'i' => { *pos += 1; "int".into() }
        'k' => { *pos += 1; "uint".into() }
        'l' => { *pos += 1; "long".into() }
        'm' => { *pos += 1; "ulong".into() }
        'f' => { *pos += 1; "float".into() }
        'd' => { *pos += 1; "double".into() }
        'e' => { *pos += 1; "real".into() }
        'b' => { *pos += 1; "bool".into() }
        'a' => { *pos += 1; "char".into() }
        'u' => { *pos += 1; "wchar".into() }
        'w' => { *pos += 1; "dchar".into() }
        'g' => { *pos += 1; "byte".into() }
        'h' => { *pos += 1; "ubyte".into() }
        's' => { *pos += 1; "short".into() }
        't' => { *pos += 1; "ushort".into() }
        'n' => { *pos += 1; "typeof(null)".into() }
        'A' => {
            *pos += 1;
            let inner = decode_type(chars, pos);
            if inner.is_empty() { String::new() } else { format!("{inner}[]") }
        }
        'G' => {
            *pos += 1;
            let len = read_digits(chars, pos);
            let inner = decode_type(chars, pos);
            if inner.is_empty() {
                String::new()
            } else {
                format!("{inner}[{len}]")
            }
        }
        'H' => {
            *pos += 1;
            // value-then-key order per spec
            let value = decode_type(chars, pos);
            let key = decode_type(chars, pos);
            if value.is_empty() || key.is_empty() {
                String::new()
            } else {
                format!("{value}[{key}]")
            }
        }
        'P' => {
            *pos += 1;
            let inner = decode_type(chars, pos);
            if inner.is_empty() { String::new() } else { format!("{inner}*") }
        }
        'x' => {
            *pos += 1;
            let inner = decode_type(chars, pos);
            if inner.is_empty() { String::new() } else { format!("const({inner})") }
        }
        'y' => {
            *pos += 1;
            let inner = decode_type(chars, pos);
            if inner.is_empty() { String::new() } else { format!("immutable({inner})") }
        }
        'O' => {
            *pos += 1;
            let inner = decode_type(chars, pos);
            if inner.is_empty() { String::new() } else { format!("shared({inner})") }
        }
        'N' if chars.get(*pos + 1) == Some(&'g') => {
            *pos += 2;
            let inner = decode_type(chars, pos);
            if inner.is_empty() { String::new() } else { format!("inout({inner})") }
        }
        'E' | 'S' | 'C' | 'I' => {
            *pos += 1;
            decode_qualified_name(chars, pos)
        }
        _ => String::new(),
    }
}

/// Decode an `<len><name>` run and return only the final dotted component.
fn decode_qualified_name(chars: &[char], pos: &mut usize) -> String {
    let mut last = String::new();
    while *pos < chars.len() && chars[*pos].is_ascii_digit() {
        let len = read_digits(chars, pos);
        if len == 0 || *pos + len > chars.len() {
            break;
        }
        last = chars[*pos..*pos + len].iter().collect();
        *pos += len;
    }
    last
}

fn read_digits(chars: &[char], pos: &mut usize) -> usize {
    let start = *pos;
    while *pos < chars.len() && chars[*pos].is_ascii_digit() {
        *pos += 1;
    }
    chars[start..*pos].iter().collect::<String>().parse().unwrap_or(0)
}

fn normalize_alias(decoded: &str) -> String {
    match decoded {
        "immutable(char)[]" => "string".into(),
        "immutable(wchar)[]" => "wstring".into(),
        "immutable(dchar)[]" => "dstring".into(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_primitives() {
        assert_eq!(decode("i"), "int");
        assert_eq!(decode("b"), "bool");
        assert_eq!(decode("d"), "double");
    }

    #[test]
    fn decodes_dynamic_array_of_primitive() {
        assert_eq!(decode("Ai"), "int[]");
    }

    #[test]
    fn decodes_static_array() {
        assert_eq!(decode("G4i"), "int[4]");
    }

    #[test]
    fn decodes_pointer() {
        assert_eq!(decode("Pi"), "int*");
    }

    #[test]
    fn decodes_qualifiers() {
        assert_eq!(decode("xi"), "const(int)");
        assert_eq!(decode("yi"), "immutable(int)");
        assert_eq!(decode("Oi"), "shared(int)");
    }

    #[test]
    fn normalizes_string_aliases() {
        assert_eq!(decode("yAa"), "string");
    }

    #[test]
    fn decodes_qualified_name_to_final_component() {
        // E<len>name: E7MyClass -> "MyClass"
        assert_eq!(decode("E7MyClass"), "MyClass");
    }

    #[test]
    fn malformed_deco_yields_empty_string_not_panic() {
        assert_eq!(decode("A"), "");
        assert_eq!(decode(""), "");
        assert_eq!(decode("G"), "");
        assert_eq!(decode("zzz"), "");
    }

    #[test]
    fn function_attrs_stop_at_z_separator() {
        let attrs = decode_function_attributes("FNaNbNiZv");
        assert!(attrs.is_pure && attrs.is_nothrow && attrs.is_nogc);
        assert!(!attrs.is_safe);
    }

    #[test]
    fn return_type_decodes_suffix_after_final_z() {
        assert_eq!(decode_return_type("FiZb"), "bool");
    }
}
