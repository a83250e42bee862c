use crate::attr::{Attr, AttrId, Parent};
use crate::context::Context;
use crate::error::{Result, TycoError};
use crate::source::SourceLocation;
use crate::utils;
use regex::Regex;
use std::collections::VecDeque;
use std::sync::LazyLock;

static TEMPLATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([\w.]+)\}").expect("static regex"));

/// Where a placeholder path is currently standing during resolution.
#[derive(Debug, Clone, Copy)]
enum Node {
    Globals,
    Attr(AttrId),
}

/// Template-rendering phase: substitutes `{dotted.path}` placeholders in
/// every non-literal string value, then decodes escape sequences. Values
/// are processed in registration order; a placeholder sees the target's
/// rendering as it stands at that moment.
pub(crate) fn render_templates(context: &mut Context) -> Result<()> {
    for root in context.all_roots() {
        render_subtree(context, root)?;
    }
    Ok(())
}

fn render_subtree(context: &mut Context, id: AttrId) -> Result<()> {
    match context.arena.get(id) {
        Attr::Value(_) => render_value(context, id),
        Attr::Array(a) => {
            let items = a.items.clone();
            for item in items {
                render_subtree(context, item)?;
            }
            Ok(())
        }
        Attr::Instance(i) => {
            let fields: Vec<AttrId> = i.fields.values().copied().collect();
            for field in fields {
                render_subtree(context, field)?;
            }
            Ok(())
        }
        // Targets are registered instances and render as their own roots.
        Attr::Reference(_) => Ok(()),
    }
}

fn render_value(context: &mut Context, id: AttrId) -> Result<()> {
    let Attr::Value(value) = context.arena.get(id) else {
        unreachable!("render_value called on non-value");
    };
    if value.facets.type_name.as_deref() != Some("str") || value.literal_str {
        return Ok(());
    }
    let Some(crate::attr::Rendered::Str(current)) = value.rendered.clone() else {
        return Ok(());
    };
    let parent = value.parent;
    let location = value.location.clone();

    let mut out = String::new();
    let mut last = 0;
    for caps in TEMPLATE_REGEX.captures_iter(&current) {
        let whole = caps.get(0).expect("match");
        out.push_str(&current[last..whole.start()]);
        let path = caps.get(1).expect("group").as_str();
        out.push_str(&resolve_placeholder(context, parent, path, &location)?);
        last = whole.end();
    }
    out.push_str(&current[last..]);

    // Escape decoding happens after substitution so replacements take part
    // in continuation removal, and runs even when there were no placeholders.
    let result = utils::substitute_escape_sequences(&out);
    let Attr::Value(value) = context.arena.get_mut(id) else {
        unreachable!();
    };
    value.rendered = Some(crate::attr::Rendered::Str(result));
    Ok(())
}

fn resolve_placeholder(
    context: &Context,
    parent: Option<Parent>,
    path: &str,
    location: &Option<SourceLocation>,
) -> Result<String> {
    let mut node = parent.map(|p| match p {
        Parent::Globals => Node::Globals,
        Parent::Attr(id) => Node::Attr(id),
    });

    // Leading extra dots climb the enclosing instance chain: `..x` is one
    // level up from the default scope, `...x` two, and so on.
    let mut var = path;
    if var.starts_with("..") {
        var = &var[1..];
        while let Some(rest) = var.strip_prefix('.') {
            node = climb(context, node);
            if node.is_none() {
                return Err(TycoError::template(
                    format!("traversing parents hit base instance for {{{path}}}"),
                    location.clone(),
                ));
            }
            var = rest;
        }
    }

    let mut queue: VecDeque<String> = var
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if queue.is_empty() {
        return Err(TycoError::template(
            format!("empty template content in {{{path}}}"),
            location.clone(),
        ));
    }

    // Dotted field names are written literally, so a failed lookup merges
    // the next segment back in and retries before giving up.
    let mut progressed = false;
    while let Some(attr) = queue.front().cloned() {
        if let Some(next) = node.and_then(|n| lookup(context, n, &attr)) {
            node = Some(Node::Attr(next));
            queue.pop_front();
            progressed = true;
            continue;
        }
        if !progressed && attr == "global" {
            node = Some(Node::Globals);
            queue.pop_front();
            progressed = true;
            continue;
        }
        if queue.len() > 1 {
            let first = queue.pop_front().expect("non-empty");
            let second = queue.pop_front().expect("len checked");
            queue.push_front(format!("{first}.{second}"));
            continue;
        }
        return Err(TycoError::template(
            format!("cannot access attribute {attr} in {{{path}}}"),
            location.clone(),
        ));
    }

    let Some(Node::Attr(target)) = node else {
        return Err(TycoError::template(
            format!("can not templatize objects other than strings or numbers: {{{path}}}"),
            location.clone(),
        ));
    };
    let text = match context.arena.get(target) {
        Attr::Value(v) => v.rendered.as_ref().and_then(|r| r.as_template_text()),
        _ => None,
    };
    text.ok_or_else(|| {
        TycoError::template(
            format!("can not templatize objects other than strings or numbers: {{{path}}}"),
            location.clone(),
        )
    })
}

fn climb(context: &Context, node: Option<Node>) -> Option<Node> {
    match node {
        Some(Node::Attr(id)) => match context.arena.get(id) {
            Attr::Instance(inst) => inst.parent.map(|p| match p {
                Parent::Globals => Node::Globals,
                Parent::Attr(a) => Node::Attr(a),
            }),
            _ => None,
        },
        _ => None,
    }
}

fn lookup(context: &Context, node: Node, name: &str) -> Option<AttrId> {
    match node {
        Node::Globals => context.global(name),
        Node::Attr(id) => context.arena.field(id, name),
    }
}
