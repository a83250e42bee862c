use crate::attr::AttrId;
use crate::context::{Context, IncludeDefaults};
use crate::error::{Result, TycoError};
use crate::schema::FieldSchema;
use crate::source::{split_into_lines, SourceLine, SourceLocation};
use crate::utils;
use indexmap::IndexMap;
use log::debug;
use regex::Regex;
use std::collections::VecDeque;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::LazyLock;

// Identifier: a word that does not start with a digit.
const IDENT: &str = r"[A-Za-z_]\w*";

static INCLUDE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#include\s+(\S.*)$").expect("static regex"));

static GLOBAL_SCHEMA_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^([?])?({IDENT})(\[\])?\s+({IDENT})\s*:")).expect("static regex")
});

static STRUCT_BLOCK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^({IDENT}):")).expect("static regex"));

static STRUCT_SCHEMA_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^[ \t]+([*?])?({IDENT})(\[\])?\s+({IDENT})\s*:")).expect("static regex")
});

static STRUCT_DEFAULTS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^[ \t]+({IDENT})\s*:")).expect("static regex"));

static STRUCT_INSTANCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-").expect("static regex"));

static IDENTIFIER_COLON_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^({IDENT})\s*:\s*")).expect("static regex"));

static INLINE_CALL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)\(").expect("static regex"));

static MISSING_COLON_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+\w+\s+\w+$").expect("static regex"));

const EOL: char = '\n';

struct LoadedAttr {
    attr: AttrId,
    delim: char,
}

/// Structural scanner for one source file (or string). Lines live in a
/// deque; consuming a prefix of the current line pushes the remainder back,
/// so value scanning and block scanning share one cursor.
pub(crate) struct Lexer<'a> {
    context: &'a mut Context,
    lines: VecDeque<SourceLine>,
    path: Option<PathBuf>,
    /// Body-level default templates declared by this file (or merged from
    /// its includes), keyed by struct name then field name.
    defaults: IncludeDefaults,
}

/// Lexes a whole file into the context. Files are processed once: a repeat
/// load (typically via `#include`) replays only the captured defaults.
pub(crate) fn process_path(context: &mut Context, file_path: &Path) -> Result<IncludeDefaults> {
    let key = normalize_path(file_path);
    if let Some(cached) = context.include_cache.get(&key) {
        debug!("already processed {}, replaying defaults", key.display());
        return Ok(cached.clone());
    }
    if !key.is_file() {
        return Err(TycoError::io(format!(
            "can only load a path that is a regular file: {}",
            key.display()
        )));
    }
    let content = fs::read_to_string(&key)
        .map_err(|e| TycoError::io(format!("cannot read file {}: {e}", key.display())))?;

    debug!("lexing {}", key.display());
    let file_name: Arc<str> = Arc::from(key.to_string_lossy().as_ref());
    let mut lexer = Lexer {
        context,
        lines: split_into_lines(&content, Some(file_name)).into(),
        path: Some(key.clone()),
        defaults: IncludeDefaults::new(),
    };
    lexer.process()?;
    let defaults = lexer.defaults;
    context.include_cache.insert(key, defaults.clone());
    Ok(defaults)
}

/// Lexes in-memory source text into the context.
pub(crate) fn process_source(context: &mut Context, content: &str, name: Option<&str>) -> Result<()> {
    let mut lexer = Lexer {
        context,
        lines: split_into_lines(content, name.map(Arc::from)).into(),
        path: None,
        defaults: IncludeDefaults::new(),
    };
    lexer.process()
}

impl<'a> Lexer<'a> {
    /// Top-level dispatch: includes, global declarations, struct blocks.
    /// Anything else that isn't blank or a comment is malformatted.
    fn process(&mut self) -> Result<()> {
        while let Some(line_entry) = self.pop() {
            let line = line_entry.text.clone();
            let location = line_entry.location.clone();

            if let Some(caps) = INCLUDE_REGEX.captures(rstrip(&line)) {
                let raw_path = caps[1].trim().to_string();
                self.process_include(&raw_path, &location)?;
                continue;
            }

            if let Some(caps) = GLOBAL_SCHEMA_REGEX.captures(&line) {
                let end = caps.get(0).expect("match").end();
                let nullable = caps.get(1).is_some();
                let type_name = caps[2].to_string();
                let array = caps.get(3).is_some();
                let name = caps[4].to_string();
                self.load_global(&line_entry, end, &type_name, &name, nullable, array)?;
                continue;
            }

            if let Some(caps) = STRUCT_BLOCK_REGEX.captures(&line) {
                let type_name = caps[1].to_string();
                if self.context.struct_def(&type_name).is_none() {
                    self.context.add_struct(&type_name, Some(location.clone()));
                    self.load_schema(&type_name, &location)?;
                }
                self.load_defaults_and_instances(&type_name)?;
                continue;
            }

            if utils::strip_comments(&line, Some(&location))?.is_empty() {
                continue;
            }

            return Err(TycoError::syntax("malformatted config file", Some(location)));
        }
        Ok(())
    }

    fn process_include(&mut self, raw_path: &str, location: &SourceLocation) -> Result<()> {
        let mut include_path = PathBuf::from(raw_path);
        if !include_path.is_absolute() {
            let base = self
                .path
                .as_ref()
                .and_then(|p| p.parent().map(Path::to_path_buf))
                .or_else(|| std::env::current_dir().ok())
                .unwrap_or_default();
            include_path = base.join(include_path);
        }
        debug!("including {}", include_path.display());
        let included = process_path(self.context, &include_path)?;
        for (struct_name, table) in included {
            if self.defaults.contains_key(&struct_name) {
                return Err(TycoError::schema(
                    format!("duplicate struct defaults for {struct_name}"),
                    Some(location.clone()),
                ));
            }
            self.defaults.insert(struct_name, table);
        }
        Ok(())
    }

    fn load_global(
        &mut self,
        line_entry: &SourceLine,
        match_end: usize,
        type_name: &str,
        name: &str,
        nullable: bool,
        array: bool,
    ) -> Result<()> {
        let value_slice = line_entry.slice_from(match_end).trim_leading();
        if value_slice.text.trim().is_empty() {
            return Err(TycoError::syntax(
                "must provide a value when setting globals",
                Some(value_slice.location),
            ));
        }
        self.push_front(value_slice);
        let loaded = self.load_attr(&[EOL], &[], Some(name.to_string()))?;
        self.context.arena.apply_schema_info(
            loaded.attr,
            Some(type_name),
            Some(name),
            Some(nullable),
            Some(array),
        )?;
        self.context.add_global(name, loaded.attr)?;
        Ok(())
    }

    /// Consumes the indented field declarations following a new struct
    /// block header. Stops at the first line that is not a declaration,
    /// leaving it for the defaults/instance stage.
    fn load_schema(&mut self, type_name: &str, block_location: &SourceLocation) -> Result<()> {
        if self.defaults.contains_key(type_name) {
            return Err(TycoError::schema(
                format!("duplicate defaults for struct {type_name}"),
                Some(block_location.clone()),
            ));
        }
        self.defaults.insert(type_name.to_string(), IndexMap::new());

        loop {
            let Some(peek) = self.peek().cloned() else {
                break;
            };
            // Include directives end the schema block; the top-level
            // dispatch handles them.
            if peek.text.starts_with("#include ") {
                break;
            }
            let content = utils::strip_comments(&peek.text, Some(&peek.location))?;
            if content.is_empty() {
                self.pop();
                continue;
            }

            let Some((end, option, field_type, is_array, field_name)) =
                STRUCT_SCHEMA_REGEX.captures(&peek.text).map(|c| {
                    (
                        c.get(0).expect("match").end(),
                        c.get(1).map(|m| m.as_str().to_string()),
                        c[2].to_string(),
                        c.get(3).is_some(),
                        c[4].to_string(),
                    )
                })
            else {
                if MISSING_COLON_REGEX.is_match(&content) {
                    return Err(TycoError::schema(
                        format!("schema attribute missing trailing colon: {}", content.trim()),
                        Some(peek.location),
                    ));
                }
                break;
            };
            let Some(line_entry) = self.pop() else {
                break;
            };
            let is_nullable = option.as_deref() == Some("?");
            let is_primary = option.as_deref() == Some("*");

            let field = FieldSchema {
                type_name: field_type,
                is_primary,
                is_nullable,
                is_array,
                default: None,
            };
            if let Some(def) = self.context.structs.get_mut(type_name) {
                def.add_field(&field_name, field, Some(line_entry.location.clone()))?;
            }

            let default_slice = line_entry.slice_from(end).trim_leading();
            let remainder =
                utils::strip_comments(&default_slice.text, Some(&default_slice.location))?;
            if !remainder.is_empty() {
                self.push_front(default_slice);
                let loaded = self.load_attr(&[EOL], &[], Some(field_name.clone()))?;
                if let Some(def) = self.context.structs.get_mut(type_name) {
                    if let Some(field) = def.fields.get_mut(&field_name) {
                        field.default = Some(loaded.attr);
                    }
                }
            }
        }
        Ok(())
    }

    /// Body of a struct block after its schema: local default overrides
    /// (`name: value`), default clears (`name:`), and `-` instance lines.
    fn load_defaults_and_instances(&mut self, type_name: &str) -> Result<()> {
        loop {
            let Some(peek) = self.peek().cloned() else {
                break;
            };
            if peek.text.starts_with("#include ") {
                break;
            }
            let content = utils::strip_comments(&peek.text, Some(&peek.location))?;
            if content.is_empty() {
                self.pop();
                continue;
            }
            if !peek.text.starts_with(' ')
                && !peek.text.starts_with('\t')
                && !STRUCT_INSTANCE_REGEX.is_match(&peek.text)
            {
                break;
            }
            if STRUCT_SCHEMA_REGEX.is_match(&peek.text) {
                return Err(TycoError::schema(
                    "cannot add schema attributes after initial construction",
                    Some(peek.location),
                ));
            }

            if let Some(caps) = STRUCT_DEFAULTS_REGEX.captures(&peek.text) {
                let end = caps.get(0).expect("match").end();
                let field_name = caps[1].to_string();
                let Some(line_entry) = self.pop() else {
                    break;
                };
                let has_field = self
                    .context
                    .struct_def(type_name)
                    .map(|def| def.fields.contains_key(&field_name))
                    .unwrap_or(false);
                if !has_field {
                    return Err(TycoError::binding(
                        format!("setting invalid default of {field_name} for {type_name}"),
                        Some(line_entry.location.clone()),
                    ));
                }
                let default_slice = line_entry.slice_from(end).trim_leading();
                let remainder =
                    utils::strip_comments(&default_slice.text, Some(&default_slice.location))?;
                if !remainder.is_empty() {
                    self.push_front(default_slice);
                    let loaded = self.load_attr(&[EOL], &[], Some(field_name.clone()))?;
                    self.defaults
                        .entry(type_name.to_string())
                        .or_default()
                        .insert(field_name, loaded.attr);
                } else {
                    // An empty remainder clears the local override; a
                    // schema-level default, if any, takes effect again.
                    self.defaults
                        .entry(type_name.to_string())
                        .or_default()
                        .shift_remove(&field_name);
                }
                continue;
            }

            if let Some(m) = STRUCT_INSTANCE_REGEX.find(&peek.text) {
                let Some(line_entry) = self.pop() else {
                    break;
                };
                let location = line_entry.location.clone();
                let remainder = line_entry.slice_from(m.end()).trim_leading();
                self.push_front(remainder);

                let mut args: Vec<AttrId> = Vec::new();
                loop {
                    let Some(inst_entry) = self.peek().cloned() else {
                        break;
                    };
                    let inst_content =
                        utils::strip_comments(&inst_entry.text, Some(&inst_entry.location))?;
                    if inst_content.is_empty() {
                        self.pop();
                        break;
                    }
                    // A lone backslash continues the argument list on the
                    // next line.
                    if inst_content.trim_start() == "\\" {
                        self.pop();
                        if let Some(next) = self.peek() {
                            let trimmed = next.trim_leading();
                            self.replace_current(trimmed);
                        }
                        continue;
                    }
                    let loaded = self.load_attr(&[',', EOL], &[], None)?;
                    args.push(loaded.attr);
                    if loaded.delim == EOL {
                        break;
                    }
                }

                let local = self.defaults.get(type_name).cloned();
                let instance =
                    self.context
                        .create_instance(type_name, args, local.as_ref(), Some(location))?;
                self.context.add_instance(type_name, instance);
                continue;
            }

            break;
        }
        Ok(())
    }

    /// Parses the next value attribute off the line deque. `good` are the
    /// delimiters that may legally terminate it; everything else from the
    /// bracket/comma set (plus `extra_bad`) aborts with a syntax error.
    fn load_attr(
        &mut self,
        good: &[char],
        extra_bad: &[char],
        attr_name: Option<String>,
    ) -> Result<LoadedAttr> {
        let mut bad: Vec<char> = ['(', ')', '[', ']', ',']
            .into_iter()
            .chain(extra_bad.iter().copied())
            .filter(|c| !good.contains(c))
            .collect();
        bad.dedup();
        self.load_attr_with(good, &bad, attr_name)
    }

    fn load_attr_with(
        &mut self,
        good: &[char],
        bad: &[char],
        attr_name: Option<String>,
    ) -> Result<LoadedAttr> {
        let Some(current_entry) = self.peek().cloned() else {
            return Err(TycoError::syntax("no content found", None));
        };
        let current_entry = current_entry.trim_leading();
        self.replace_current(current_entry.clone());
        let current = current_entry.text.clone();
        let location = current_entry.location.clone();

        // `name: value` keyword form: remember the name and re-parse the
        // remainder as the value.
        if let Some(caps) = IDENTIFIER_COLON_REGEX.captures(&current) {
            if attr_name.is_some() {
                return Err(TycoError::syntax(
                    format!("colon found inside content, wrap string in quotes: {}", &caps[1]),
                    Some(location),
                ));
            }
            let name = caps[1].to_string();
            let remainder = current_entry.slice_from(caps.get(0).expect("match").end());
            self.replace_current(remainder);
            return self.load_attr_with(good, bad, Some(name));
        }

        let Some(first) = current.chars().next() else {
            return Err(TycoError::syntax(
                "unexpected empty line when parsing attribute",
                Some(location),
            ));
        };

        let loaded = if first == '[' {
            self.replace_current(current_entry.slice_from(1));
            let items = self.load_array(']')?;
            let attr = self.context.arena.alloc_array(items, Some(location));
            let delim = self.strip_next_delim(good)?;
            LoadedAttr { attr, delim }
        } else if first.is_alphanumeric() || first == '_' {
            if let Some(caps) = INLINE_CALL_REGEX.captures(&current) {
                let type_name = caps[1].to_string();
                self.replace_current(current_entry.slice_from(caps.get(0).expect("match").end()));
                let call_args = self.load_array(')')?;
                // A call on a known struct without primary keys builds an
                // inline instance; any other call is a deferred reference.
                // Dispatch is sensitive to declaration order on purpose.
                let keyless = self
                    .context
                    .struct_def(&type_name)
                    .map(|def| !def.has_primary_keys())
                    .unwrap_or(false);
                let attr = if keyless {
                    let local = self.defaults.get(&type_name).cloned();
                    self.context.create_instance(
                        &type_name,
                        call_args,
                        local.as_ref(),
                        Some(location),
                    )?
                } else {
                    self.context
                        .arena
                        .alloc_reference(type_name, call_args, Some(location))
                };
                let delim = self.strip_next_delim(good)?;
                LoadedAttr { attr, delim }
            } else {
                self.strip_next_attr_and_delim(good, bad)?
            }
        } else if first == '"' || first == '\'' {
            let triple: String = std::iter::repeat(first).take(3).collect();
            let raw = if current.starts_with(&triple) {
                self.load_triple_string(first, &location)?
            } else {
                self.load_single_string(first, &location)?
            };
            let attr = self.context.arena.alloc_value(raw, Some(location));
            let delim = self.strip_next_delim(good)?;
            LoadedAttr { attr, delim }
        } else {
            self.strip_next_attr_and_delim(good, bad)?
        };

        if let Some(name) = attr_name {
            self.context.arena.set_attr_name(loaded.attr, &name);
        }
        Ok(loaded)
    }

    /// Comma-separated items up to `closing`. Used for both `[...]` arrays
    /// and `(...)` call argument lists.
    fn load_array(&mut self, closing: char) -> Result<Vec<AttrId>> {
        let good = [closing, ','];
        let extra_bad = if closing == ']' { [')'] } else { [']'] };
        let mut items = Vec::new();

        loop {
            let Some(peek) = self.peek().cloned() else {
                return Err(TycoError::syntax(format!("could not find {closing}"), None));
            };
            if utils::strip_comments(&peek.text, Some(&peek.location))?.is_empty() {
                self.pop();
                continue;
            }
            if peek.text.starts_with(closing) {
                self.replace_current(peek.slice_from(1));
                break;
            }
            let loaded = self.load_attr(&good, &extra_bad, None)?;
            items.push(loaded.attr);
            if loaded.delim == closing {
                break;
            }
        }
        Ok(items)
    }

    /// Multiline string: everything up to the matching triple quote, quotes
    /// included. Basic (`"""`) bodies support trailing-backslash line
    /// continuation; the closer may absorb up to two extra quote chars.
    fn load_triple_string(&mut self, quote: char, start: &SourceLocation) -> Result<String> {
        let triple: String = std::iter::repeat(quote).take(3).collect();
        let is_literal = quote == '\'';
        let mut search_from = 3;
        let mut contents: Vec<String> = Vec::new();

        loop {
            let Some(line_entry) = self.pop() else {
                return Err(TycoError::syntax("unclosed triple quote", Some(start.clone())));
            };
            let line = line_entry.text.clone();

            if let Some(rel) = line.get(search_from..).and_then(|s| s.find(&triple)) {
                let end_idx = search_from + rel + 3;
                let mut content = line[..end_idx].to_string();
                let mut remainder = line_entry.slice_from(end_idx);
                for _ in 0..2 {
                    if remainder.text.starts_with(quote) {
                        content.push(quote);
                        remainder = remainder.slice_from(1);
                    } else {
                        break;
                    }
                }
                if !remainder.text.is_empty() {
                    self.push_front(remainder);
                }
                contents.push(content);
                break;
            }

            if !is_literal && line.ends_with("\\\n") {
                contents.push(line[..line.len().saturating_sub(2)].to_string());
                while let Some(next) = self.peek() {
                    let trimmed = next.trim_leading();
                    if trimmed.text.is_empty() {
                        self.pop();
                    } else {
                        self.replace_current(trimmed);
                        break;
                    }
                }
            } else {
                contents.push(line);
            }
            search_from = 0;
        }

        let joined = contents.concat();
        if let Some(bad) = joined.chars().find(|c| utils::is_illegal_multiline_char(*c)) {
            return Err(TycoError::syntax(
                format!("invalid characters found in multiline string: {bad:?}"),
                Some(start.clone()),
            ));
        }
        Ok(joined)
    }

    /// Single-line string, quotes included in the returned raw text. Basic
    /// (`"`) strings honor backslash-escaped closing quotes.
    fn load_single_string(&mut self, quote: char, start: &SourceLocation) -> Result<String> {
        let is_literal = quote == '\'';
        let Some(line_entry) = self.pop() else {
            return Err(TycoError::syntax(
                format!("unclosed single-line string for {quote}"),
                Some(start.clone()),
            ));
        };
        let line = line_entry.text.clone();

        let mut search_from = 1;
        loop {
            let Some(rel) = line.get(search_from..).and_then(|s| s.find(quote)) else {
                return Err(TycoError::syntax(
                    format!("unclosed single-line string for {quote}: {}", rstrip(&line)),
                    Some(start.clone()),
                ));
            };
            let end = search_from + rel;
            if !is_literal && line.as_bytes()[end - 1] == b'\\' {
                search_from = end + 1;
                continue;
            }

            let content = &line[..end + 1];
            if let Some(bad) = content.chars().find(|c| utils::is_illegal_str_char(*c)) {
                return Err(TycoError::syntax(
                    format!("invalid characters found in string: {bad:?}"),
                    Some(start.clone()),
                ));
            }
            let remainder = line_entry.slice_from(end + 1);
            if !remainder.text.is_empty() {
                self.push_front(remainder);
            }
            return Ok(content.to_string());
        }
    }

    /// Scans the current line for the earliest delimiter, taking the text
    /// before it as one bare value. End-of-line counts as a delimiter at
    /// the comment boundary (or the line's end).
    fn strip_next_attr_and_delim(&mut self, good: &[char], bad: &[char]) -> Result<LoadedAttr> {
        let Some(current_entry) = self.peek().cloned() else {
            return Err(TycoError::syntax("unexpected end of input", None));
        };
        let current = current_entry.text.clone();
        let base_location = current_entry.location.clone();

        let search_space = match current.find('#') {
            Some(idx) => &current[..idx],
            None => current.as_str(),
        };

        let mut best: Option<(usize, char)> = None;
        for delim in good.iter().chain(bad.iter()).copied() {
            let idx = if delim == EOL {
                Some(search_space.len())
            } else {
                search_space.find(delim)
            };
            if let Some(idx) = idx {
                if best.map(|(b, _)| idx < b).unwrap_or(true) {
                    best = Some((idx, delim));
                }
            }
        }

        let Some((best_index, best_delim)) = best else {
            return Err(TycoError::syntax(
                format!("should have found a delimiter in: {}", rstrip(&current)),
                Some(base_location),
            ));
        };
        if bad.contains(&best_delim) {
            return Err(TycoError::syntax(
                format!("bad delimiter encountered: {best_delim:?}"),
                Some(base_location.advance(best_index)),
            ));
        }

        let raw_text = &search_space[..best_index];
        let leading = raw_text.len() - raw_text.trim_start().len();
        let text = raw_text.trim().to_string();
        let value_location = base_location.advance(leading);
        let attr = self.context.arena.alloc_value(text, Some(value_location));

        if best_delim == EOL {
            self.pop();
        } else {
            self.replace_current(current_entry.slice_from(best_index + 1));
        }
        Ok(LoadedAttr { attr, delim: best_delim })
    }

    /// After a bracketed or quoted value, the next character must be one of
    /// the allowed delimiters (or a comment/blank tail when EOL is allowed).
    fn strip_next_delim(&mut self, good: &[char]) -> Result<char> {
        let Some(current_entry) = self.peek().cloned() else {
            return Err(TycoError::syntax(
                "unexpected end of input looking for a delimiter",
                None,
            ));
        };
        let current = current_entry.text.clone();
        for delim in good.iter().copied() {
            if current.starts_with(delim) {
                self.replace_current(current_entry.slice_from(delim.len_utf8()));
                return Ok(delim);
            }
        }
        if good.contains(&EOL)
            && utils::strip_comments(&current, Some(&current_entry.location))?.is_empty()
        {
            self.pop();
            return Ok(EOL);
        }
        Err(TycoError::syntax(
            format!("should have found a delimiter, got: {}", rstrip(&current)),
            Some(current_entry.location),
        ))
    }

    fn pop(&mut self) -> Option<SourceLine> {
        self.lines.pop_front()
    }

    fn peek(&self) -> Option<&SourceLine> {
        self.lines.front()
    }

    fn push_front(&mut self, line: SourceLine) {
        self.lines.push_front(line);
    }

    fn replace_current(&mut self, line: SourceLine) {
        self.lines.pop_front();
        self.lines.push_front(line);
    }
}

fn rstrip(value: &str) -> &str {
    value.trim_end_matches([' ', '\t', '\r', '\n'])
}

/// Lexical path normalization: resolves `.` and `..` components without
/// touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::{Attr, Rendered};

    fn lex(source: &str) -> Context {
        let mut context = Context::new();
        process_source(&mut context, source, None).expect("source should lex");
        context
    }

    #[test]
    fn global_scalar_is_registered_unrendered() {
        let context = lex("int port: 8080\n");
        let id = context.global("port").expect("port registered");
        match context.arena.get(id) {
            Attr::Value(v) => {
                assert_eq!(v.raw, "8080");
                assert_eq!(v.facets.type_name.as_deref(), Some("int"));
                assert!(v.rendered.is_none());
            }
            other => panic!("expected value, got {other:?}"),
        }
    }

    #[test]
    fn struct_block_collects_schema_and_instances() {
        let context = lex("Dog:\n  *str name:\n  int legs: 4\n  - Rex\n  - Fido, legs: 3\n");
        let def = context.struct_def("Dog").expect("Dog declared");
        assert_eq!(def.primary_keys, vec!["name"]);
        assert_eq!(def.instances.len(), 2);
        assert!(def.fields["legs"].default.is_some());
    }

    #[test]
    fn missing_trailing_colon_is_schema_error() {
        let mut context = Context::new();
        let err = process_source(&mut context, "Dog:\n  str name\n", None).unwrap_err();
        assert!(matches!(err, TycoError::Schema(_)));
        assert!(err.message().contains("missing trailing colon"));
    }

    #[test]
    fn bad_delimiter_in_bare_value_fails() {
        let mut context = Context::new();
        let err = process_source(&mut context, "str greeting: hello, world\n", None).unwrap_err();
        assert!(matches!(err, TycoError::Syntax(_)));
        assert!(err.message().contains("bad delimiter"));
    }

    #[test]
    fn unknown_call_parses_as_reference() {
        let context = lex("Owner:\n  *str name:\n  Dog pet:\n  - Ann, Dog(Rex)\n");
        let def = context.struct_def("Owner").expect("Owner declared");
        let instance = def.instances[0];
        let pet = match context.arena.get(instance) {
            Attr::Instance(inst) => inst.fields["pet"],
            other => panic!("expected instance, got {other:?}"),
        };
        assert!(matches!(context.arena.get(pet), Attr::Reference(_)));
    }

    #[test]
    fn keyless_struct_call_builds_inline_instance() {
        let source =
            "Point:\n  int x:\n  int y:\n\nOrigin:\n  *str name:\n  Point at:\n  - zero, Point(0, 0)\n";
        let context = lex(source);
        let def = context.struct_def("Origin").expect("Origin declared");
        let instance = def.instances[0];
        let at = match context.arena.get(instance) {
            Attr::Instance(inst) => inst.fields["at"],
            other => panic!("expected instance, got {other:?}"),
        };
        assert!(matches!(context.arena.get(at), Attr::Instance(_)));
    }

    #[test]
    fn schema_after_instances_rejected() {
        let mut context = Context::new();
        let source = "Dog:\n  *str name:\n  - Rex\n\nDog:\n  int legs:\n";
        let err = process_source(&mut context, source, None).unwrap_err();
        assert!(err.message().contains("after initial construction"));
    }

    #[test]
    fn cleared_default_falls_back_to_schema_level() {
        let source = "Dog:\n  *str name:\n  int legs: 4\n  legs: 3\n  - Rex\n  legs:\n  - Fido\n";
        let mut context = lex(source);
        context.render_content().expect("render");
        let legs_of = |ctx: &Context, idx: usize| {
            let def = ctx.struct_def("Dog").unwrap();
            match ctx.arena.get(def.instances[idx]) {
                Attr::Instance(inst) => ctx.arena.rendered(inst.fields["legs"]).cloned(),
                _ => None,
            }
        };
        assert_eq!(legs_of(&context, 0), Some(Rendered::Int(3)));
        assert_eq!(legs_of(&context, 1), Some(Rendered::Int(4)));
    }

    #[test]
    fn instance_line_continuation() {
        let source = "Dog:\n  *str name:\n  int legs:\n  - Rex, \\\n    4\n";
        let context = lex(source);
        let def = context.struct_def("Dog").expect("Dog declared");
        assert_eq!(def.instances.len(), 1);
    }
}
