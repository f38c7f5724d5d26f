//! Static fact extraction from a Python syntax tree.
//!
//! One traversal over the parse tree; each recognized node contributes one
//! short literal fact to the line where it starts. Node kinds outside the
//! recognized set contribute nothing, which is not an error.

use crate::core::FactMap;
use anyhow::{Context, Result};
use tree_sitter::{Node, Parser};

/// Parse `source` as Python and return the per-line fact map.
///
/// Malformed source is fatal; there is no partial-fact mode.
pub fn extract_facts(source: &str) -> Result<FactMap> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .context("Failed to set Python language")?;
    let tree = parser
        .parse(source, None)
        .context("Failed to parse Python source")?;
    let root = tree.root_node();
    if root.has_error() {
        anyhow::bail!("Python parse error: source contains invalid syntax");
    }

    let mut facts = FactMap::new();
    visit_node(root, source, &mut facts);
    Ok(facts)
}

fn visit_node(node: Node, source: &str, facts: &mut FactMap) {
    if let Some(fact) = fact_for_node(node, source) {
        let line = node.start_position().row + 1;
        facts.entry(line).or_default().push(fact);
    }
    for child in node.children(&mut node.walk()) {
        visit_node(child, source, facts);
    }
}

fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("...")
}

fn field_text<'a>(node: Node, field: &str, source: &'a str) -> Option<&'a str> {
    node.child_by_field_name(field).map(|n| node_text(n, source))
}

fn fact_for_node(node: Node, source: &str) -> Option<String> {
    match node.kind() {
        "assignment" => {
            // a chain like `a = b = 1` nests assignments on the right; only
            // the outermost node reports, with the targets comma-joined
            if node.parent().is_some_and(|p| p.kind() == "assignment") {
                return None;
            }
            let mut targets = vec![field_text(node, "left", source)?];
            // bare annotations (`x: int`) carry no right-hand side and no fact
            let mut value = node.child_by_field_name("right")?;
            while value.kind() == "assignment" {
                targets.push(field_text(value, "left", source)?);
                value = value.child_by_field_name("right")?;
            }
            Some(format!(
                "assign: {} = {}",
                targets.join(", "),
                node_text(value, source)
            ))
        }
        "augmented_assignment" => {
            let target = field_text(node, "left", source)?;
            let operator = field_text(node, "operator", source)?;
            let value = field_text(node, "right", source)?;
            Some(format!("augassign: {target} {operator} {value}"))
        }
        "call" => {
            let callee = field_text(node, "function", source).unwrap_or("call");
            Some(format!("call: {callee}(...)"))
        }
        "return_statement" => {
            let value = node
                .named_child(0)
                .map(|n| node_text(n, source))
                .unwrap_or("None");
            Some(format!("return: {value}"))
        }
        // an elif is its own conditional, anchored at the elif line
        "if_statement" | "elif_clause" => {
            let test = field_text(node, "condition", source)?;
            Some(format!("branch-if: {test}"))
        }
        "for_statement" => {
            let target = field_text(node, "left", source)?;
            let iterable = field_text(node, "right", source)?;
            Some(format!("loop-for: {target} in {iterable}"))
        }
        "while_statement" => Some("loop-while: condition".to_string()),
        "import_statement" => Some(format!("import: {}", imported_names(node, source))),
        "import_from_statement" => {
            let module = field_text(node, "module_name", source).unwrap_or(".");
            Some(format!(
                "from {} import {}",
                module,
                imported_names(node, source)
            ))
        }
        "with_statement" => Some("with: context manager".to_string()),
        "function_definition" => {
            let name = field_text(node, "name", source)?;
            let params = parameter_names(node, source).join(", ");
            Some(format!("def: {name}({params})"))
        }
        "class_definition" => {
            let name = field_text(node, "name", source)?;
            Some(format!("class: {name}"))
        }
        _ => None,
    }
}

/// Comma-joined imported names, without aliases.
fn imported_names(node: Node, source: &str) -> String {
    let mut cursor = node.walk();
    let names: Vec<&str> = node
        .children_by_field_name("name", &mut cursor)
        .map(|n| match n.kind() {
            "aliased_import" => field_text(n, "name", source).unwrap_or_else(|| node_text(n, source)),
            _ => node_text(n, source),
        })
        .collect();
    if names.is_empty() {
        let mut cursor = node.walk();
        if node
            .children(&mut cursor)
            .any(|c| c.kind() == "wildcard_import")
        {
            return "*".to_string();
        }
    }
    names.join(", ")
}

/// Plain parameter names of a function definition; splat and keyword-only
/// separators are skipped.
fn parameter_names(node: Node, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let Some(params) = node.child_by_field_name("parameters") else {
        return names;
    };
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        match param.kind() {
            "identifier" => names.push(node_text(param, source).to_string()),
            "typed_parameter" => {
                if let Some(id) = param.named_child(0) {
                    if id.kind() == "identifier" {
                        names.push(node_text(id, source).to_string());
                    }
                }
            }
            "default_parameter" | "typed_default_parameter" => {
                if let Some(name) = field_text(param, "name", source) {
                    names.push(name.to_string());
                }
            }
            _ => {}
        }
    }
    names
}
