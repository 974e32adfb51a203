//! Minimal section-based HTML templating.
//!
//! A template is parsed once into a tree of [`Node`]s:
//!
//! - `{{ path }}` placeholders, resolved against the render [`Context`];
//! - `{% for item in list %}…{% endfor %}` repeat sections;
//! - `{% if name %}…{% endif %}` conditional sections.
//!
//! Sections nest. A marker that cannot be paired (an `if` that is never closed,
//! a stray `endfor`) stays in the output as literal text and does not affect the
//! surrounding sections.

use std::collections::BTreeMap;
use tracing::debug;

/// The report template shipped with the crate.
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/email.html");

/// A value bound in a [`Context`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    List(Vec<Context>),
}

impl Value {
    fn is_truthy(&self) -> bool {
        match self {
            Value::Text(text) => !text.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }
}

/// Named values available to a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), Value::Text(value.into()));
        self
    }

    /// Bind `key` only when `value` is present; absent keys are falsy.
    pub fn optional_text(self, key: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.text(key, value),
            None => self,
        }
    }

    pub fn list(mut self, key: &str, items: Vec<Context>) -> Self {
        self.values.insert(key.to_string(), Value::List(items));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

/// Parsed template node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Placeholder { path: String, raw: String },
    Repeat { var: String, source: String, body: Vec<Node> },
    Conditional { name: String, body: Vec<Node> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    nodes: Vec<Node>,
}

enum Token<'a> {
    Text(&'a str),
    Placeholder { raw: &'a str, path: &'a str },
    For { raw: &'a str, var: &'a str, source: &'a str },
    EndFor { raw: &'a str },
    If { raw: &'a str, name: &'a str },
    EndIf { raw: &'a str },
}

enum Opener {
    Root,
    For { raw: String, var: String, source: String },
    If { raw: String, name: String },
}

struct Frame {
    opener: Opener,
    nodes: Vec<Node>,
}

impl Frame {
    fn new(opener: Opener) -> Self {
        Self { opener, nodes: Vec::new() }
    }

    /// Turn a frame into a finished node, or, when it was never closed, into its
    /// literal opening marker followed by its children.
    fn close(self) -> Vec<Node> {
        match self.opener {
            Opener::Root => self.nodes,
            Opener::For { var, source, .. } => {
                vec![Node::Repeat { var, source, body: self.nodes }]
            }
            Opener::If { name, .. } => vec![Node::Conditional { name, body: self.nodes }],
        }
    }

    fn unclosed(self) -> Vec<Node> {
        let raw = match self.opener {
            Opener::Root => return self.nodes,
            Opener::For { raw, .. } | Opener::If { raw, .. } => raw,
        };
        debug!(marker = %raw, "unclosed template section left as text");

        let mut nodes = vec![Node::Text(raw)];
        nodes.extend(self.nodes);
        nodes
    }
}

impl Template {
    /// Parse template text. Never fails; malformed markers become text.
    pub fn parse(source: &str) -> Self {
        let mut stack = vec![Frame::new(Opener::Root)];

        for token in tokenize(source) {
            match token {
                Token::Text(text) => push_node(&mut stack, Node::Text(text.to_string())),
                Token::Placeholder { raw, path } => push_node(
                    &mut stack,
                    Node::Placeholder { path: path.to_string(), raw: raw.to_string() },
                ),
                Token::For { raw, var, source } => stack.push(Frame::new(Opener::For {
                    raw: raw.to_string(),
                    var: var.to_string(),
                    source: source.to_string(),
                })),
                Token::If { raw, name } => stack.push(Frame::new(Opener::If {
                    raw: raw.to_string(),
                    name: name.to_string(),
                })),
                Token::EndFor { raw } => {
                    close_section(&mut stack, raw, |o| matches!(o, Opener::For { .. }))
                }
                Token::EndIf { raw } => {
                    close_section(&mut stack, raw, |o| matches!(o, Opener::If { .. }))
                }
            }
        }

        while stack.len() > 1 {
            if let Some(frame) = stack.pop() {
                let nodes = frame.unclosed();
                extend_top(&mut stack, nodes);
            }
        }

        let nodes = stack.pop().map(Frame::close).unwrap_or_default();
        Self { nodes: merge_text(nodes) }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn render(&self, context: &Context) -> String {
        let mut out = String::new();
        render_nodes(&self.nodes, &Scope::root(context), &mut out);
        out
    }
}

/// Parse and render in one step.
pub fn render(template_text: &str, context: &Context) -> String {
    Template::parse(template_text).render(context)
}

/// Styling class for a comfort score.
pub fn comfort_class(score: u8) -> &'static str {
    match score {
        0..=5 => "low",
        6..=7 => "medium",
        _ => "high",
    }
}

fn push_node(stack: &mut [Frame], node: Node) {
    if let Some(top) = stack.last_mut() {
        top.nodes.push(node);
    }
}

fn extend_top(stack: &mut [Frame], nodes: Vec<Node>) {
    if let Some(top) = stack.last_mut() {
        top.nodes.extend(nodes);
    }
}

/// Close the nearest open section accepted by `is_match`. Sections opened after
/// it were never closed and fall back to text. With no match, the closing
/// marker itself is text.
fn close_section(stack: &mut Vec<Frame>, raw: &str, is_match: impl Fn(&Opener) -> bool) {
    let Some(index) = stack.iter().rposition(|frame| is_match(&frame.opener)) else {
        debug!(marker = %raw, "unmatched closing marker left as text");
        push_node(stack, Node::Text(raw.to_string()));
        return;
    };

    while stack.len() > index + 1 {
        if let Some(frame) = stack.pop() {
            let nodes = frame.unclosed();
            extend_top(stack, nodes);
        }
    }

    if let Some(frame) = stack.pop() {
        let nodes = frame.close();
        extend_top(stack, nodes);
    }
}

fn merge_text(nodes: Vec<Node>) -> Vec<Node> {
    let mut merged: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        let node = match node {
            Node::Repeat { var, source, body } => {
                Node::Repeat { var, source, body: merge_text(body) }
            }
            Node::Conditional { name, body } => Node::Conditional { name, body: merge_text(body) },
            other => other,
        };

        match (merged.last_mut(), node) {
            (Some(Node::Text(prev)), Node::Text(next)) => prev.push_str(&next),
            (_, node) => merged.push(node),
        }
    }
    merged
}

fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = source;

    while !rest.is_empty() {
        let next_tag = [rest.find("{{"), rest.find("{%")].into_iter().flatten().min();

        let Some(start) = next_tag else {
            tokens.push(Token::Text(rest));
            break;
        };

        if start > 0 {
            tokens.push(Token::Text(&rest[..start]));
        }
        let tail = &rest[start..];
        let close = if tail.starts_with("{{") { "}}" } else { "%}" };

        let Some(end) = tail[2..].find(close).map(|i| i + 2 + close.len()) else {
            // no terminator: the opener is plain text
            tokens.push(Token::Text(&tail[..2]));
            rest = &tail[2..];
            continue;
        };

        let raw = &tail[..end];
        let inner = raw[2..raw.len() - 2].trim();
        tokens.push(classify(raw, inner, close == "}}"));
        rest = &tail[end..];
    }

    tokens
}

fn classify<'a>(raw: &'a str, inner: &'a str, is_placeholder: bool) -> Token<'a> {
    if is_placeholder {
        return if inner.is_empty() {
            Token::Text(raw)
        } else {
            Token::Placeholder { raw, path: inner }
        };
    }

    let words: Vec<&str> = inner.split_whitespace().collect();
    match words.as_slice() {
        ["for", var, "in", source] => Token::For { raw, var, source },
        ["endfor"] => Token::EndFor { raw },
        ["if", name] => Token::If { raw, name },
        ["endif"] => Token::EndIf { raw },
        _ => Token::Text(raw),
    }
}

/// Variable lookup chain. A loop scope answers `var.field` from the current item
/// and defers everything else to its parent.
struct Scope<'a> {
    var: Option<&'a str>,
    frame: &'a Context,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    fn root(frame: &'a Context) -> Self {
        Self { var: None, frame, parent: None }
    }

    fn lookup(&self, path: &str) -> Option<&'a Value> {
        let local = match self.var {
            None => self.frame.get(path),
            Some(var) => path
                .strip_prefix(var)
                .and_then(|rest| rest.strip_prefix('.'))
                .and_then(|field| self.frame.get(field)),
        };

        local.or_else(|| self.parent.and_then(|parent| parent.lookup(path)))
    }
}

fn render_nodes(nodes: &[Node], scope: &Scope<'_>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Placeholder { path, raw } => match scope.lookup(path) {
                Some(Value::Text(text)) => out.push_str(&escape_html(text)),
                _ => {
                    debug!(placeholder = %path, "unresolved placeholder left as is");
                    out.push_str(raw);
                }
            },
            Node::Repeat { var, source, body } => {
                if let Some(Value::List(items)) = scope.lookup(source) {
                    for item in items {
                        let child = Scope { var: Some(var), frame: item, parent: Some(scope) };
                        render_nodes(body, &child, out);
                    }
                }
            }
            Node::Conditional { name, body } => {
                if scope.lookup(name).is_some_and(Value::is_truthy) {
                    render_nodes(body, scope, out);
                }
            }
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
