// Compiler AST-dump parser (spec §4.4, Phases A/B/C).
//
// The dump is a JSON array of top-level module elements. Each module has
// `name`, an optional `comment` (doc comment), and `members[]`. A malformed
// member is skipped with a logged warning (spec §4.4 "Error handling");
// the caller treats a top-level shape failure as a parse error for the
// whole package.

use serde_json::Value;
use tracing::warn;

use super::deco;
use super::doc_comment::{self, ParsedDocComment};
use crate::error::{CoreError, CoreResult};
use crate::types::TypeKind;

#[derive(Debug, Clone, Default)]
pub struct ParsedFunction {
    pub name: String,
    pub line: i64,
    pub file: String,
    pub return_type: String,
    pub parameters: Vec<String>,
    pub is_safe: bool,
    pub is_trusted: bool,
    pub is_nogc: bool,
    pub is_nothrow: bool,
    pub is_pure: bool,
    pub is_template: bool,
    pub doc: ParsedDocComment,
    pub signature: String,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedTypeDecl {
    pub name: String,
    pub kind: TypeKind,
    pub line: i64,
    pub file: String,
    pub doc: ParsedDocComment,
    pub base_classes: Vec<String>,
    pub interfaces: Vec<String>,
    pub methods: Vec<ParsedFunction>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnittestEntry {
    pub line: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedModule {
    pub name: String,
    pub doc: ParsedDocComment,
    pub functions: Vec<ParsedFunction>,
    pub types: Vec<ParsedTypeDecl>,
    /// `(unittest line, unittest doc)` pairs not yet attached to a
    /// declaration; filled in during phase C.
    pub unittest_entries: Vec<(i64, ParsedDocComment)>,
}

pub fn parse_ast_dump(raw_json: &str) -> CoreResult<Vec<ParsedModule>> {
    let value: Value = serde_json::from_str(raw_json)
        .map_err(|e| CoreError::Parse { detail: format!("invalid AST dump JSON: {e}") })?;
    let modules_json = value.as_array().ok_or_else(|| CoreError::Parse {
        detail: "AST dump top level must be an array of modules".into(),
    })?;

    let mut modules = Vec::with_capacity(modules_json.len());
    for module_value in modules_json {
        match parse_module(module_value) {
            Some(m) => modules.push(m),
            None => warn!("skipping malformed module element in AST dump"),
        }
    }
    Ok(modules)
}

fn parse_module(value: &Value) -> Option<ParsedModule> {
    let name = value.get("name")?.as_str()?.to_string();
    let comment = value.get("comment").and_then(Value::as_str).unwrap_or("");
    let doc = doc_comment::parse(comment);

    let mut module = ParsedModule {
        name,
        doc,
        functions: Vec::new(),
        types: Vec::new(),
        unittest_entries: Vec::new(),
    };

    let members = value.get("members").and_then(Value::as_array).cloned().unwrap_or_default();
    for member in &members {
        dispatch_member(member, &mut module);
    }

    associate_unittests(&mut module);
    Some(module)
}

fn dispatch_member(member: &Value, module: &mut ParsedModule) {
    let Some(kind) = member.get("kind").and_then(Value::as_str) else {
        warn!("skipping member with missing kind");
        return;
    };

    match kind {
        "function" => {
            let Some(name) = member.get("name").and_then(Value::as_str) else {
                warn!("skipping function member with missing name");
                return;
            };
            if name.starts_with("__unittest") {
                let line = member.get("line").and_then(Value::as_i64).unwrap_or(0);
                let doc = doc_comment::parse(member.get("comment").and_then(Value::as_str).unwrap_or(""));
                module.unittest_entries.push((line, doc));
                return;
            }
            match parse_function(member) {
                Some(f) => module.functions.push(f),
                None => warn!(name, "skipping malformed function member"),
            }
        }
        "class" | "struct" | "interface" | "enum" => match parse_type(member, kind) {
            Some(t) => module.types.push(t),
            None => warn!(kind, "skipping malformed type member"),
        },
        other => warn!(kind = other, "skipping member of unrecognized kind"),
    }
}

fn parse_function(member: &Value) -> Option<ParsedFunction> {
    let name = member.get("name")?.as_str()?.to_string();
    let line = member.get("line").and_then(Value::as_i64).unwrap_or(0);
    let file = member.get("file").and_then(Value::as_str).unwrap_or("").to_string();
    let is_template = member.get("isTemplate").and_then(Value::as_bool).unwrap_or(false);

    let mut return_type = member
        .get("returnType")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default();
    if return_type.is_empty() {
        if let Some(type_field) = member.get("type").and_then(Value::as_str) {
            return_type = type_field.split_whitespace().next().unwrap_or_default().to_string();
        }
    }

    let param_values = member.get("parameters").and_then(Value::as_array).cloned().unwrap_or_default();
    let mut parameters = Vec::with_capacity(param_values.len());
    for param in &param_values {
        parameters.push(parse_parameter(param));
    }

    let function_deco = member.get("deco").and_then(Value::as_str).unwrap_or("");

    if return_type.is_empty() && !function_deco.is_empty() {
        return_type = deco::decode_return_type(function_deco);
    }

    let mut attrs = deco::FunctionAttrs::default();
    let attr_strings: Vec<&str> = member
        .get("attributes")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if attr_strings.is_empty() {
        if !function_deco.is_empty() {
            attrs = deco::decode_function_attributes(function_deco);
        }
    } else {
        for a in attr_strings {
            match a {
                "@safe" => attrs.is_safe = true,
                "@trusted" => attrs.is_trusted = true,
                "@nogc" => attrs.is_nogc = true,
                "nothrow" => attrs.is_nothrow = true,
                "pure" => attrs.is_pure = true,
                _ => {}
            }
        }
    }

    let doc = doc_comment::parse(member.get("comment").and_then(Value::as_str).unwrap_or(""));
    let signature = build_signature(&return_type, &name, &parameters, attrs);

    Some(ParsedFunction {
        name,
        line,
        file,
        return_type,
        parameters,
        is_safe: attrs.is_safe,
        is_trusted: attrs.is_trusted,
        is_nogc: attrs.is_nogc,
        is_nothrow: attrs.is_nothrow,
        is_pure: attrs.is_pure,
        is_template,
        doc,
        signature,
    })
}

/// Build a `"type name"` string for one parameter, enriching a name-only
/// entry (no space separator) via `originalType` then `deco` decoding
/// (spec §4.4 Phase B enrichment chain).
fn parse_parameter(param: &Value) -> String {
    let declared = param.get("type").and_then(Value::as_str).unwrap_or("").to_string();
    let name = param.get("name").and_then(Value::as_str).unwrap_or("").to_string();

    if declared.contains(' ') || (!declared.is_empty() && !name.is_empty()) {
        return format!("{declared} {name}").trim().to_string();
    }

    if let Some(original) = param.get("originalType").and_then(Value::as_str) {
        if !original.is_empty() {
            return format!("{original} {name}").trim().to_string();
        }
    }

    if let Some(param_deco) = param.get("deco").and_then(Value::as_str) {
        let decoded = deco::decode(param_deco);
        if !decoded.is_empty() {
            return format!("{decoded} {name}").trim().to_string();
        }
    }

    format!("{declared} {name}").trim().to_string()
}

fn parse_type(member: &Value, kind_str: &str) -> Option<ParsedTypeDecl> {
    let name = member.get("name")?.as_str()?.to_string();
    let kind = match kind_str {
        "class" => TypeKind::Class,
        "struct" => TypeKind::Struct,
        "interface" => TypeKind::Interface,
        "enum" => TypeKind::Enum,
        _ => return None,
    };
    let line = member.get("line").and_then(Value::as_i64).unwrap_or(0);
    let file = member.get("file").and_then(Value::as_str).unwrap_or("").to_string();
    let doc = doc_comment::parse(member.get("comment").and_then(Value::as_str).unwrap_or(""));
    let base_classes = member
        .get("base")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(|s| vec![s.to_string()])
        .unwrap_or_default();
    let interfaces = member
        .get("interfaces")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    let mut methods = Vec::new();
    if let Some(nested) = member.get("members").and_then(Value::as_array) {
        for nested_member in nested {
            if nested_member.get("kind").and_then(Value::as_str) == Some("function") {
                if let Some(f) = parse_function(nested_member) {
                    methods.push(f);
                }
            }
        }
    }

    Some(ParsedTypeDecl {
        name,
        kind,
        line,
        file,
        doc,
        base_classes,
        interfaces,
        methods,
    })
}

fn build_signature(return_type: &str, name: &str, parameters: &[String], attrs: deco::FunctionAttrs) -> String {
    let mut sig = format!("{return_type} {name}({params})", params = parameters.join(", "));
    let mut flags = Vec::new();
    if attrs.is_safe {
        flags.push("@safe");
    }
    if attrs.is_nogc {
        flags.push("@nogc");
    }
    if attrs.is_nothrow {
        flags.push("nothrow");
    }
    if attrs.is_pure {
        flags.push("pure");
    }
    if !flags.is_empty() {
        sig.push(' ');
        sig.push_str(&flags.join(" "));
    }
    sig
}

/// Phase C: attach each unittest entry to the nearest preceding declaration
/// (function or type) by line number within the module.
fn associate_unittests(module: &mut ParsedModule) {
    if module.unittest_entries.is_empty() {
        return;
    }

    #[derive(Clone, Copy)]
    enum DeclRef {
        Function(usize),
        Type(usize),
    }

    let mut decls: Vec<(i64, DeclRef)> = module
        .functions
        .iter()
        .enumerate()
        .map(|(i, f)| (f.line, DeclRef::Function(i)))
        .chain(module.types.iter().enumerate().map(|(i, t)| (t.line, DeclRef::Type(i))))
        .collect();
    decls.sort_by_key(|(line, _)| *line);

    let mut remaining = Vec::new();
    for (ut_line, ut_doc) in module.unittest_entries.drain(..) {
        let nearest = decls.iter().rev().find(|(line, _)| *line <= ut_line);
        match nearest {
            Some((_, decl_ref)) => match decl_ref {
                DeclRef::Function(i) => {
                    if !ut_doc.examples.is_empty() || !ut_doc.summary.is_empty() {
                        module.functions[*i].doc.examples.extend(ut_doc.examples.clone());
                    }
                }
                DeclRef::Type(i) => {
                    if !ut_doc.examples.is_empty() || !ut_doc.summary.is_empty() {
                        module.types[*i].doc.examples.extend(ut_doc.examples.clone());
                    }
                }
            },
            None => remaining.push((ut_line, ut_doc)),
        }
    }
    module.unittest_entries = remaining;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_simple_function_with_explicit_attributes() {
        let dump = json!([{
            "name": "mathutil",
            "comment": "math helpers",
            "members": [{
                "kind": "function",
                "name": "add",
                "line": 10,
                "file": "mathutil.d",
                "returnType": "int",
                "parameters": [
                    {"type": "int", "name": "a"},
                    {"type": "int", "name": "b"}
                ],
                "attributes": ["@safe", "@nogc", "pure", "nothrow"],
                "comment": "Adds two numbers."
            }]
        }]);
        let modules = parse_ast_dump(&dump.to_string()).unwrap();
        assert_eq!(modules.len(), 1);
        let f = &modules[0].functions[0];
        assert_eq!(f.name, "add");
        assert!(f.is_safe && f.is_nogc && f.is_pure && f.is_nothrow);
        assert_eq!(f.signature, "int add(int a, int b) @safe @nogc nothrow pure");
    }

    #[test]
    fn enriches_missing_parameter_type_via_deco() {
        let dump = json!([{
            "name": "m",
            "members": [{
                "kind": "function",
                "name": "f",
                "line": 1,
                "returnType": "void",
                "parameters": [{"name": "x", "deco": "i"}]
            }]
        }]);
        let modules = parse_ast_dump(&dump.to_string()).unwrap();
        assert_eq!(modules[0].functions[0].parameters, vec!["int x".to_string()]);
    }

    #[test]
    fn derives_return_type_from_function_deco_when_missing() {
        let dump = json!([{
            "name": "m",
            "members": [{
                "kind": "function",
                "name": "f",
                "line": 1,
                "deco": "FiZb"
            }]
        }]);
        let modules = parse_ast_dump(&dump.to_string()).unwrap();
        assert_eq!(modules[0].functions[0].return_type, "bool");
    }

    #[test]
    fn classifies_type_members_and_parses_nested_methods() {
        let dump = json!([{
            "name": "containers",
            "members": [{
                "kind": "struct",
                "name": "Stack",
                "line": 5,
                "members": [{"kind": "function", "name": "push", "line": 6, "returnType": "void"}]
            }]
        }]);
        let modules = parse_ast_dump(&dump.to_string()).unwrap();
        let t = &modules[0].types[0];
        assert_eq!(t.name, "Stack");
        assert_eq!(t.kind, TypeKind::Struct);
        assert_eq!(t.methods.len(), 1);
    }

    #[test]
    fn unittest_attaches_to_nearest_preceding_declaration() {
        let dump = json!([{
            "name": "m",
            "members": [
                {"kind": "function", "name": "add", "line": 10, "returnType": "int"},
                {"kind": "function", "name": "__unittest_L20_C1", "line": 20, "comment": "---\nassert(add(1,2)==3);\n---"}
            ]
        }]);
        let modules = parse_ast_dump(&dump.to_string()).unwrap();
        assert!(modules[0].unittest_entries.is_empty());
        assert_eq!(modules[0].functions[0].doc.examples, vec!["assert(add(1,2)==3);".to_string()]);
    }

    #[test]
    fn malformed_member_is_skipped_not_fatal() {
        let dump = json!([{
            "name": "m",
            "members": [
                {"kind": "function"},
                {"kind": "function", "name": "ok", "line": 1, "returnType": "void"}
            ]
        }]);
        let modules = parse_ast_dump(&dump.to_string()).unwrap();
        assert_eq!(modules[0].functions.len(), 1);
        assert_eq!(modules[0].functions[0].name, "ok");
    }

    #[test]
    fn non_array_top_level_is_a_parse_error() {
        let result = parse_ast_dump("{}");
        assert!(result.is_err());
    }
}
