//! Prompt templating.
//!
//! Templates use mustache-style tags:
//!
//! ```text
//! Source {{source.number}}{{#source.accredit}} ({{source.accredit}}){{/source.accredit}}
//! {{#sources}}- {{accredit}}: {{text}}
//! {{/sources}}{{^instructions}}No editor instructions.{{/instructions}}
//! ```
//!
//! `{{path}}` substitutes a value looked up by dotted path, `{{#name}}`
//! renders its body when the value is truthy (once per item for arrays, with
//! the item pushed as context and reachable as `{{.}}`), `{{^name}}` renders
//! when it is falsy and `{{! ... }}` is a comment. A placeholder that cannot
//! be resolved is an error, never literal output.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unresolved placeholder {{{{{0}}}}}")]
    Unresolved(String),

    #[error("unclosed tag at byte {0}")]
    UnclosedTag(usize),

    #[error("section '{0}' is never closed")]
    UnclosedSection(String),

    #[error("unexpected closing tag '{0}'")]
    UnexpectedClose(String),
}

impl From<TemplateError> for nd_core::Error {
    fn from(err: TemplateError) -> Self {
        nd_core::Error::Template(err.to_string())
    }
}

#[derive(Debug, PartialEq)]
enum Node<'a> {
    Text(&'a str),
    Var(&'a str),
    Section {
        name: &'a str,
        inverted: bool,
        body: Vec<Node<'a>>,
    },
}

fn parse(src: &str) -> Result<Vec<Node<'_>>, TemplateError> {
    let mut open: Vec<(&str, bool, Vec<Node<'_>>)> = Vec::new();
    let mut current = Vec::new();
    let mut rest = src;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            current.push(Node::Text(&rest[..start]));
        }
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or(TemplateError::UnclosedTag(offset + start))?;
        let tag = after[..end].trim();

        if let Some(name) = tag.strip_prefix('#') {
            open.push((name.trim(), false, std::mem::take(&mut current)));
        } else if let Some(name) = tag.strip_prefix('^') {
            open.push((name.trim(), true, std::mem::take(&mut current)));
        } else if let Some(name) = tag.strip_prefix('/') {
            let name = name.trim();
            match open.pop() {
                Some((opened, inverted, parent)) if opened == name => {
                    let body = std::mem::replace(&mut current, parent);
                    current.push(Node::Section { name, inverted, body });
                }
                _ => return Err(TemplateError::UnexpectedClose(name.to_string())),
            }
        } else if !tag.starts_with('!') {
            current.push(Node::Var(tag));
        }

        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }
    if !rest.is_empty() {
        current.push(Node::Text(rest));
    }
    if let Some((name, _, _)) = open.pop() {
        return Err(TemplateError::UnclosedSection(name.to_string()));
    }
    Ok(current)
}

fn lookup<'v>(stack: &[&'v Value], path: &str) -> Option<&'v Value> {
    if path == "." {
        return stack.last().copied();
    }
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut value = stack
        .iter()
        .rev()
        .find_map(|ctx| ctx.as_object().and_then(|obj| obj.get(first)))?;
    for segment in segments {
        value = match value {
            Value::Object(obj) => obj.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(value)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(obj) => !obj.is_empty(),
    }
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(stringify)
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}

fn render_nodes<'v>(
    nodes: &[Node<'_>],
    stack: &mut Vec<&'v Value>,
    out: &mut String,
) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var(path) => {
                let value = lookup(stack, path)
                    .and_then(stringify)
                    .ok_or_else(|| TemplateError::Unresolved(path.to_string()))?;
                out.push_str(&value);
            }
            Node::Section { name, inverted, body } => {
                let value = lookup(stack, name);
                let truthy = value.map_or(false, is_truthy);
                match (value, *inverted) {
                    (_, true) if !truthy => render_nodes(body, stack, out)?,
                    (Some(value), false) if truthy => match value {
                        Value::Array(items) => {
                            for item in items {
                                stack.push(item);
                                let result = render_nodes(body, stack, out);
                                stack.pop();
                                result?;
                            }
                        }
                        Value::Object(_) => {
                            stack.push(value);
                            let result = render_nodes(body, stack, out);
                            stack.pop();
                            result?;
                        }
                        _ => render_nodes(body, stack, out)?,
                    },
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

/// Renders `template` against `data`.
pub fn render(template: &str, data: &Value) -> Result<String, TemplateError> {
    let nodes = parse(template)?;
    let mut out = String::with_capacity(template.len());
    let mut stack = vec![data];
    render_nodes(&nodes, &mut stack, &mut out)?;
    Ok(out)
}

/// Checks that a template parses, without rendering it.
pub fn validate(template: &str) -> Result<(), TemplateError> {
    parse(template).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dot_path_substitution() {
        let out = render("Hello {{a.b}}!", &json!({"a": {"b": "x"}})).unwrap();
        assert_eq!(out, "Hello x!");
    }

    #[test]
    fn test_conditional_block() {
        let template = "start{{#flag}} T{{/flag}} end";
        assert_eq!(render(template, &json!({"flag": false})).unwrap(), "start end");
        assert_eq!(render(template, &json!({"flag": true})).unwrap(), "start T end");
        assert_eq!(render(template, &json!({})).unwrap(), "start end");
    }

    #[test]
    fn test_inverted_block() {
        let template = "{{^instructions}}none{{/instructions}}{{#instructions}}{{instructions}}{{/instructions}}";
        assert_eq!(render(template, &json!({"instructions": ""})).unwrap(), "none");
        assert_eq!(render(template, &json!({"instructions": "be brief"})).unwrap(), "be brief");
    }

    #[test]
    fn test_array_section_iterates_with_parent_fallback() {
        let template = "{{#sources}}[{{number}} {{accredit}} {{mode}}]{{/sources}}";
        let data = json!({
            "mode": "agg",
            "sources": [{"number": 1, "accredit": "AP"}, {"number": 2, "accredit": "BBC"}]
        });
        assert_eq!(render(template, &data).unwrap(), "[1 AP agg][2 BBC agg]");

        let items = render("{{#blobs}}- {{.}}\n{{/blobs}}", &json!({"blobs": ["a", "b"]})).unwrap();
        assert_eq!(items, "- a\n- b\n");
    }

    #[test]
    fn test_unresolved_placeholder_is_an_error() {
        let err = render("Hi {{missing.field}}", &json!({"missing": {}})).unwrap_err();
        assert_eq!(err, TemplateError::Unresolved("missing.field".to_string()));
        assert_eq!(err.to_string(), "unresolved placeholder {{missing.field}}");

        assert!(render("{{nothing}}", &json!({"nothing": null})).is_err());
    }

    #[test]
    fn test_unresolved_inside_skipped_section_is_fine() {
        let out = render("{{#flag}}{{missing}}{{/flag}}ok", &json!({"flag": false})).unwrap();
        assert_eq!(out, "ok");
    }

    #[test]
    fn test_malformed_templates() {
        assert_eq!(render("{{open", &json!({})).unwrap_err(), TemplateError::UnclosedTag(0));
        assert!(matches!(render("{{#a}}x", &json!({})), Err(TemplateError::UnclosedSection(_))));
        assert!(matches!(render("{{#a}}x{{/b}}", &json!({})), Err(TemplateError::UnexpectedClose(_))));
        assert!(matches!(render("x{{/b}}", &json!({})), Err(TemplateError::UnexpectedClose(_))));
    }

    #[test]
    fn test_scalars_and_comments() {
        let out = render("{{! note }}{{n}} {{ok}} {{list}}", &json!({"n": 3, "ok": true, "list": ["a", "b"]})).unwrap();
        assert_eq!(out, "3 true a\nb");
    }
}
