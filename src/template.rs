//! Command rendering
//!
//! Each command-line argument is a small mustache-style template rendered
//! against one parameter record. Supported tags:
//!
//! * `{{name}}`, `{{{name}}}` and `{{&name}}` substitute a value (never escaped)
//! * `{{a.b.c}}` walks nested objects, `{{list.0}}` indexes lists, `{{.}}` is the current value
//! * `{{#name}}...{{/name}}` renders once per list item or once for any other truthy value
//! * `{{^name}}...{{/name}}` renders when the value is missing or falsy
//! * `{{! comment }}` renders nothing

use log::trace;
use serde_json::Value;
use thiserror::Error;

use crate::error::{Result, RunnerError};
use crate::source::ParameterRecord;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const TRIPLE_CLOSE: &str = "}}}";

/// Errors raised while parsing a template
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed tag at byte {0}")]
    UnclosedTag(usize),

    #[error("empty tag at byte {0}")]
    EmptyTag(usize),

    #[error("invalid name '{0}'")]
    InvalidName(String),

    #[error("section '{0}' is never closed")]
    UnclosedSection(String),

    #[error("section '{open}' closed by '{close}'")]
    MismatchedSection { open: String, close: String },

    #[error("close of section '{0}' that was never opened")]
    UnexpectedClose(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Variable(Vec<String>),
    Section {
        path: Vec<String>,
        inverted: bool,
        children: Vec<Node>,
    },
}

enum Tag<'a> {
    Comment,
    Variable(&'a str),
    Open { name: &'a str, inverted: bool },
    Close(&'a str),
}

struct OpenSection {
    name: String,
    inverted: bool,
    children: Vec<Node>,
}

/// A parsed template for a single argument
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Parse a template string
    pub fn parse(source: &str) -> std::result::Result<Self, TemplateError> {
        let mut root = Vec::new();
        let mut open: Vec<OpenSection> = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find(OPEN) {
            push_text(current(&mut root, &mut open), &rest[..start]);

            let tag_offset = offset + start;
            let after = &rest[start + OPEN.len()..];
            let (tag, consumed) = match after.strip_prefix('{') {
                Some(inner) => {
                    let end = inner
                        .find(TRIPLE_CLOSE)
                        .ok_or(TemplateError::UnclosedTag(tag_offset))?;
                    (Tag::Variable(inner[..end].trim()), 1 + end + TRIPLE_CLOSE.len())
                }
                None => {
                    let end = after
                        .find(CLOSE)
                        .ok_or(TemplateError::UnclosedTag(tag_offset))?;
                    (classify(&after[..end]), end + CLOSE.len())
                }
            };

            match tag {
                Tag::Comment => {}
                Tag::Variable(name) => {
                    let path = parse_path(name, tag_offset)?;
                    current(&mut root, &mut open).push(Node::Variable(path));
                }
                Tag::Open { name, inverted } => {
                    parse_path(name, tag_offset)?;
                    open.push(OpenSection {
                        name: name.to_string(),
                        inverted,
                        children: Vec::new(),
                    });
                }
                Tag::Close(name) => {
                    let section = open
                        .pop()
                        .ok_or_else(|| TemplateError::UnexpectedClose(name.to_string()))?;
                    if section.name != name {
                        return Err(TemplateError::MismatchedSection {
                            open: section.name,
                            close: name.to_string(),
                        });
                    }
                    let path = parse_path(&section.name, tag_offset)?;
                    current(&mut root, &mut open).push(Node::Section {
                        path,
                        inverted: section.inverted,
                        children: section.children,
                    });
                }
            }

            rest = &after[consumed..];
            offset = tag_offset + OPEN.len() + consumed;
        }

        if let Some(section) = open.pop() {
            return Err(TemplateError::UnclosedSection(section.name));
        }

        push_text(&mut root, rest);

        Ok(Self { nodes: root })
    }

    /// Render the template against a record
    pub fn render(&self, record: &ParameterRecord) -> String {
        let mut out = String::new();
        let mut stack = vec![record];
        render_nodes(&self.nodes, &mut stack, &mut out);
        out
    }
}

/// The ordered list of argument templates making up one command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandTemplate {
    templates: Vec<Template>,
}

impl CommandTemplate {
    /// Parse every argument; the first is the program name
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        if args.is_empty() {
            return Err(RunnerError::Config("no command given".to_string()));
        }

        let templates = args
            .iter()
            .enumerate()
            .map(|(i, arg)| {
                Template::parse(arg.as_ref()).map_err(|e| {
                    RunnerError::Template(format!("argument {} ({:?}): {}", i + 1, arg.as_ref(), e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { templates })
    }

    /// Render each argument independently
    pub fn render(&self, record: &ParameterRecord) -> Vec<String> {
        let argv: Vec<String> = self.templates.iter().map(|t| t.render(record)).collect();
        trace!("Rendered command: {:?}", argv);
        argv
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn current<'a>(root: &'a mut Vec<Node>, open: &'a mut [OpenSection]) -> &'a mut Vec<Node> {
    match open.last_mut() {
        Some(section) => &mut section.children,
        None => root,
    }
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    match nodes.last_mut() {
        Some(Node::Text(existing)) => existing.push_str(text),
        _ => nodes.push(Node::Text(text.to_string())),
    }
}

fn classify(body: &str) -> Tag<'_> {
    let body = body.trim();
    match body.chars().next() {
        Some('!') => Tag::Comment,
        Some('#') => Tag::Open {
            name: body[1..].trim(),
            inverted: false,
        },
        Some('^') => Tag::Open {
            name: body[1..].trim(),
            inverted: true,
        },
        Some('/') => Tag::Close(body[1..].trim()),
        Some('&') => Tag::Variable(body[1..].trim()),
        _ => Tag::Variable(body),
    }
}

fn parse_path(name: &str, offset: usize) -> std::result::Result<Vec<String>, TemplateError> {
    if name.is_empty() {
        return Err(TemplateError::EmptyTag(offset));
    }
    if name == "." {
        return Ok(Vec::new());
    }

    let path: Vec<String> = name.split('.').map(str::to_string).collect();
    if path.iter().any(|segment| segment.is_empty() || segment.contains(char::is_whitespace)) {
        return Err(TemplateError::InvalidName(name.to_string()));
    }
    Ok(path)
}

fn render_nodes<'v>(nodes: &[Node], stack: &mut Vec<&'v Value>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Variable(path) => {
                if let Some(value) = lookup(stack, path) {
                    write_value(value, out);
                }
            }
            Node::Section {
                path,
                inverted,
                children,
            } => {
                let value = lookup(stack, path);
                if *inverted {
                    if !is_truthy(value) {
                        render_nodes(children, stack, out);
                    }
                    continue;
                }

                match value {
                    Some(Value::Array(items)) => {
                        for item in items {
                            stack.push(item);
                            render_nodes(children, stack, out);
                            stack.pop();
                        }
                    }
                    Some(value) if is_truthy(Some(value)) => {
                        stack.push(value);
                        render_nodes(children, stack, out);
                        stack.pop();
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Resolve a dotted path, searching the context stack innermost first for the head
fn lookup<'v>(stack: &[&'v Value], path: &[String]) -> Option<&'v Value> {
    let Some((head, tail)) = path.split_first() else {
        return stack.last().copied();
    };

    let base = stack.iter().rev().copied().find_map(|ctx| child(ctx, head))?;
    tail.iter().try_fold(base, |value, key| child(value, key))
}

fn child<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    match value {
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => value.get(key),
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Number(_)) | Some(Value::Object(_)) => true,
    }
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Array(_) | Value::Object(_) => out.push_str(&value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(template: &str, record: Value) -> String {
        Template::parse(template).unwrap().render(&record)
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(render("echo", json!({})), "echo");
        assert_eq!(render("", json!({})), "");
    }

    #[test]
    fn test_variables() {
        let record = json!({"name": "alice", "n": 3, "ok": true, "none": null});
        assert_eq!(render("{{name}}", record.clone()), "alice");
        assert_eq!(render("--name={{ name }}", record.clone()), "--name=alice");
        assert_eq!(render("{{n}}-{{ok}}-{{none}}", record.clone()), "3-true-");
        assert_eq!(render("{{{name}}}{{&name}}", record), "alicealice");
    }

    #[test]
    fn test_missing_is_empty() {
        assert_eq!(render("[{{missing}}]", json!({"name": "x"})), "[]");
        assert_eq!(render("[{{a.b.c}}]", json!({"a": {"b": 1}})), "[]");
    }

    #[test]
    fn test_dotted_and_indexed() {
        let record = json!({"user": {"name": "bob"}, "files": ["a.txt", "b.txt"]});
        assert_eq!(render("{{user.name}}", record.clone()), "bob");
        assert_eq!(render("{{files.1}}", record), "b.txt");
    }

    #[test]
    fn test_no_html_escaping() {
        assert_eq!(render("{{q}}", json!({"q": "<a & b>"})), "<a & b>");
    }

    #[test]
    fn test_compound_values_as_json() {
        assert_eq!(render("{{v}}", json!({"v": [1, 2]})), "[1,2]");
        assert_eq!(render("{{v}}", json!({"v": {"k": "x"}})), r#"{"k":"x"}"#);
    }

    #[test]
    fn test_sections() {
        let record = json!({
            "verbose": true,
            "quiet": false,
            "items": ["a", "b"],
            "opts": {"level": 2}
        });
        assert_eq!(render("{{#verbose}}-v{{/verbose}}", record.clone()), "-v");
        assert_eq!(render("{{#quiet}}-q{{/quiet}}", record.clone()), "");
        assert_eq!(render("{{#items}}<{{.}}>{{/items}}", record.clone()), "<a><b>");
        assert_eq!(render("{{#opts}}{{level}}{{/opts}}", record.clone()), "2");
        assert_eq!(render("{{^quiet}}loud{{/quiet}}", record.clone()), "loud");
        assert_eq!(render("{{^missing}}default{{/missing}}", record), "default");
    }

    #[test]
    fn test_section_context_falls_back_to_outer() {
        let record = json!({"prefix": "p", "items": [{"id": 1}, {"id": 2}]});
        assert_eq!(render("{{#items}}{{prefix}}{{id}} {{/items}}", record), "p1 p2 ");
    }

    #[test]
    fn test_comments() {
        assert_eq!(render("a{{! ignored }}b", json!({})), "ab");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Template::parse("{{name"), Err(TemplateError::UnclosedTag(0)));
        assert_eq!(Template::parse("x{{{name}}"), Err(TemplateError::UnclosedTag(1)));
        assert_eq!(Template::parse("{{ }}"), Err(TemplateError::EmptyTag(0)));
        assert_eq!(
            Template::parse("{{a..b}}"),
            Err(TemplateError::InvalidName("a..b".to_string()))
        );
        assert_eq!(
            Template::parse("{{#a}}x"),
            Err(TemplateError::UnclosedSection("a".to_string()))
        );
        assert_eq!(
            Template::parse("{{#a}}x{{/b}}"),
            Err(TemplateError::MismatchedSection {
                open: "a".to_string(),
                close: "b".to_string()
            })
        );
        assert_eq!(Template::parse("{{/a}}"), Err(TemplateError::UnexpectedClose("a".to_string())));
    }

    #[test]
    fn test_command_template() {
        let command = CommandTemplate::parse(&["echo", "{{name}}"]).unwrap();
        assert_eq!(command.len(), 2);
        assert_eq!(command.render(&json!({"name": "alice"})), vec!["echo", "alice"]);
    }

    #[test]
    fn test_command_template_rejects_empty() {
        let args: [&str; 0] = [];
        assert!(matches!(CommandTemplate::parse(&args), Err(RunnerError::Config(_))));
    }

    #[test]
    fn test_command_template_reports_bad_argument() {
        let err = CommandTemplate::parse(&["echo", "{{oops"]).unwrap_err();
        match err {
            RunnerError::Template(msg) => assert!(msg.starts_with("argument 2")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
