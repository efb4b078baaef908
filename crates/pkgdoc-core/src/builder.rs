//! Documentation builder contract and the default Go source scanner.
//!
//! Service adapters hand a [`BuildInput`] to a [`DocBuilder`]. The builder is a
//! pure function of its input: errors it returns are [`Error::Build`] and never
//! transport failures.
//!
//! [`GoSourceBuilder`] is a line-oriented scanner rather than a full parser. It
//! understands comments, string literals and bracket nesting well enough to
//! find the package clause, imports and exported top-level declarations.

use crate::source::SourceFile;
use crate::types::{FileRef, Func, Package, Type, Value};
use crate::{Error, Result};
use chrono::Utc;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

/// Everything a builder needs to produce a [`Package`].
#[derive(Debug, Clone, Default)]
pub struct BuildInput {
    pub import_path: String,
    pub project_root: String,
    pub project_name: String,
    pub project_url: String,
    /// Version token reported by the service, without the format prefix.
    pub etag: String,
    /// Fragment placed between a file's browse URL and a line number,
    /// e.g. `#L` for `https://github.com/u/r/blob/master/x.go#L12`.
    pub line_anchor: &'static str,
    pub files: Vec<SourceFile>,
}

/// Turns fetched source files into a documentation record.
pub trait DocBuilder: Send + Sync {
    /// Build the record. Must not perform I/O.
    fn build(&self, input: BuildInput) -> Result<Package>;
}

/// Default builder scanning Go source text.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoSourceBuilder;

impl DocBuilder for GoSourceBuilder {
    fn build(&self, input: BuildInput) -> Result<Package> {
        let mut files = input.files;
        files.sort_by(|a, b| a.name.cmp(&b.name));

        let mut pkg = Package {
            import_path: input.import_path,
            project_root: input.project_root,
            project_name: input.project_name,
            project_url: input.project_url,
            etag: input.etag,
            updated: Utc::now(),
            ..Package::default()
        };

        let mut clause: Option<(String, String)> = None;
        let mut docs: Vec<(bool, String)> = Vec::new();
        let mut imports = BTreeSet::new();
        let mut test_imports = BTreeSet::new();
        let mut funcs = Vec::new();
        let mut errors = BTreeSet::new();

        for file in &files {
            pkg.files.push(FileRef {
                name: file.name.clone(),
                url: file.browse_url.clone(),
            });

            let scan = scan_file(file, input.line_anchor);
            if file.name.ends_with("_test.go") {
                test_imports.extend(scan.imports.into_iter().map(|(_, path)| path));
                continue;
            }

            let Some(name) = scan.package else {
                return Err(Error::Build(format!("{}: expected 'package'", file.name)));
            };
            match &clause {
                Some((existing, first)) if *existing != name => {
                    return Err(Error::Build(format!(
                        "multiple packages {existing} ({first}) and {name} ({})",
                        file.name
                    )));
                },
                Some(_) => {},
                None => clause = Some((name, file.name.clone())),
            }

            if !scan.package_doc.is_empty() {
                docs.push((file.name == "doc.go", scan.package_doc));
            }
            imports.extend(scan.imports.into_iter().map(|(_, path)| path));
            pkg.consts.extend(scan.consts);
            pkg.vars.extend(scan.vars);
            pkg.types.extend(scan.types);
            funcs.extend(scan.funcs);
            errors.extend(scan.errors);
        }

        let Some((name, _)) = clause else {
            return Ok(pkg);
        };
        pkg.is_cmd = name == "main";
        pkg.name = name;

        // doc.go wins; otherwise the first file carrying a package comment.
        docs.sort_by_key(|(is_doc_go, _)| !is_doc_go);
        pkg.doc = docs.into_iter().next().map(|(_, doc)| doc).unwrap_or_default();
        pkg.synopsis = synopsis(&pkg.doc);

        attach_funcs(&mut pkg, funcs);

        test_imports.retain(|path| !imports.contains(path) && *path != pkg.import_path);
        pkg.imports = imports.into_iter().collect();
        pkg.test_imports = test_imports.into_iter().collect();
        pkg.errors = errors.into_iter().collect();
        Ok(pkg)
    }
}

/// First sentence of the first paragraph of `doc`, whitespace collapsed.
///
/// Copyright and authorship notices yield an empty synopsis.
pub fn synopsis(doc: &str) -> String {
    let paragraph = doc.split("\n\n").next().unwrap_or_default();
    let text = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");
    let sentence = text.find(". ").map_or(text.as_str(), |i| &text[..=i]);

    let lower = sentence.to_lowercase();
    if ["copyright", "all rights", "author"]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
    {
        return String::new();
    }
    sentence.to_string()
}

struct FuncDecl {
    func: Func,
    result: String,
}

fn attach_funcs(pkg: &mut Package, funcs: Vec<FuncDecl>) {
    pkg.types.sort_by(|a, b| a.name.cmp(&b.name));
    let index: BTreeMap<String, usize> = pkg
        .types
        .iter()
        .enumerate()
        .map(|(i, t)| (t.name.clone(), i))
        .collect();

    for decl in funcs {
        if !decl.func.recv.is_empty() {
            // Methods of unexported types are not documented.
            if let Some(&i) = index.get(&decl.func.recv) {
                pkg.types[i].methods.push(decl.func);
            }
        } else if let Some(&i) = index.get(&decl.result) {
            pkg.types[i].funcs.push(decl.func);
        } else {
            pkg.funcs.push(decl.func);
        }
    }

    pkg.funcs.sort_by(|a, b| a.name.cmp(&b.name));
    for t in &mut pkg.types {
        t.funcs.sort_by(|a, b| a.name.cmp(&b.name));
        t.methods.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

#[derive(Default)]
struct FileScan {
    package: Option<String>,
    package_doc: String,
    imports: Vec<(Option<String>, String)>,
    consts: Vec<Value>,
    vars: Vec<Value>,
    types: Vec<Type>,
    funcs: Vec<FuncDecl>,
    errors: Vec<String>,
}

struct Line<'a> {
    raw: &'a str,
    code: String,
    comment: Option<String>,
    delta: i32,
}

struct Spec<'a> {
    line: usize,
    raw: Vec<&'a str>,
    code: String,
    doc: String,
}

fn scan_file(file: &SourceFile, anchor: &str) -> FileScan {
    let text = file.text();
    let lines = lex(&text);
    let url = |line: usize| format!("{}{}{}", file.browse_url, anchor, line + 1);

    let mut scan = FileScan::default();
    let mut doc: Vec<String> = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let head = lines[i].code.trim();
        if head.is_empty() {
            match &lines[i].comment {
                Some(comment) => doc.push(comment_text(comment)),
                None => doc.clear(),
            }
            i += 1;
            continue;
        }

        let start = i;
        let mut depth = 0;
        loop {
            depth += lines[i].delta;
            i += 1;
            if depth <= 0 || i >= lines.len() {
                break;
            }
        }
        let decl = &lines[start..i];
        let doc_text = std::mem::take(&mut doc).join("\n").trim().to_string();
        let keyword = head
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or_default();

        match keyword {
            "package" if scan.package.is_none() => {
                scan.package = head.split_whitespace().nth(1).map(str::to_string);
                scan.package_doc = doc_text;
            },
            "import" => scan.imports.extend(import_specs(decl)),
            "func" => {
                let code = join_code(decl);
                if let Some(func) = parse_func(func_header(&code)) {
                    if is_exported(&func.func.name) {
                        scan.funcs.push(FuncDecl {
                            func: Func {
                                doc: doc_text,
                                url: url(start),
                                ..func.func
                            },
                            result: func.result,
                        });
                    }
                }
            },
            "const" | "var" | "type" => {
                let (grouped, specs) = split_specs(decl, keyword, start);
                let raw = join_raw(decl);
                if keyword == "type" {
                    for spec in specs.into_iter().filter(|s| is_exported(first_ident(&s.code))) {
                        scan.types.push(Type {
                            name: first_ident(&spec.code).to_string(),
                            decl: if grouped {
                                format!("type {}", spec.raw.join("\n").trim())
                            } else {
                                raw.clone()
                            },
                            doc: if spec.doc.is_empty() { doc_text.clone() } else { spec.doc },
                            url: url(spec.line),
                            ..Type::default()
                        });
                    }
                } else {
                    let names: Vec<String> = specs
                        .iter()
                        .flat_map(|s| value_names(&s.code))
                        .filter(|n| is_exported(n))
                        .collect();
                    if !names.is_empty() {
                        let value = Value {
                            names,
                            decl: raw,
                            doc: doc_text,
                            url: url(start),
                        };
                        if keyword == "const" {
                            scan.consts.push(value);
                        } else {
                            scan.vars.push(value);
                        }
                    }
                }
            },
            _ => {},
        }
    }

    scan.errors = vet(&file.name, &scan.imports, &lines);
    scan
}

fn lex(text: &str) -> Vec<Line<'_>> {
    let mut in_block = false;
    let mut in_raw = false;
    text.lines()
        .map(|raw| lex_line(raw, &mut in_block, &mut in_raw))
        .collect()
}

fn lex_line<'a>(raw: &'a str, in_block: &mut bool, in_raw: &mut bool) -> Line<'a> {
    let mut code = String::new();
    let mut comment: Option<String> = None;
    let mut delta = 0;
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if *in_block {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                *in_block = false;
            } else {
                comment.get_or_insert_with(String::new).push(c);
            }
            continue;
        }
        if *in_raw {
            code.push(c);
            if c == '`' {
                *in_raw = false;
            }
            continue;
        }
        match c {
            '/' if chars.peek() == Some(&'/') => {
                chars.next();
                comment.get_or_insert_with(String::new).extend(chars.by_ref());
                break;
            },
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                *in_block = true;
                comment.get_or_insert_with(String::new);
            },
            '"' | '\'' => {
                code.push(c);
                while let Some(s) = chars.next() {
                    code.push(s);
                    if s == '\\' {
                        if let Some(escaped) = chars.next() {
                            code.push(escaped);
                        }
                    } else if s == c {
                        break;
                    }
                }
            },
            '`' => {
                code.push(c);
                *in_raw = true;
            },
            '{' | '(' | '[' => {
                delta += 1;
                code.push(c);
            },
            '}' | ')' | ']' => {
                delta -= 1;
                code.push(c);
            },
            _ => code.push(c),
        }
    }

    if *in_block && comment.is_none() {
        comment = Some(String::new());
    }
    Line {
        raw,
        code,
        comment,
        delta,
    }
}

fn comment_text(comment: &str) -> String {
    let text = comment.strip_prefix(' ').unwrap_or(comment);
    text.trim_end().to_string()
}

fn join_code(lines: &[Line<'_>]) -> String {
    lines
        .iter()
        .map(|l| l.code.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

fn join_raw(lines: &[Line<'_>]) -> String {
    lines
        .iter()
        .map(|l| l.raw)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

fn first_ident(code: &str) -> &str {
    let code = code.trim_start();
    let end = code
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(code.len());
    &code[..end]
}

/// Split a `const`, `var` or `type` declaration into its specs.
///
/// Returns whether the declaration is parenthesized. Spec line numbers are
/// file-relative, offset by `start`.
fn split_specs<'a>(decl: &[Line<'a>], keyword: &str, start: usize) -> (bool, Vec<Spec<'a>>) {
    let first = decl[0].code.trim()[keyword.len()..].trim_start();
    if !first.starts_with('(') {
        let spec = Spec {
            line: start,
            raw: decl.iter().map(|l| l.raw).collect(),
            code: first.to_string(),
            doc: String::new(),
        };
        return (false, vec![spec]);
    }

    let mut specs: Vec<Spec<'a>> = Vec::new();
    let mut doc: Vec<String> = Vec::new();
    let mut depth = decl[0].delta;
    for (offset, line) in decl.iter().enumerate().skip(1) {
        let line_depth = depth;
        depth += line.delta;
        let code = line.code.trim();
        if code.is_empty() {
            match &line.comment {
                Some(comment) if line_depth == 1 => doc.push(comment_text(comment)),
                None => doc.clear(),
                Some(_) => {},
            }
            continue;
        }
        if line_depth == 1 && !code.starts_with(')') {
            specs.push(Spec {
                line: start + offset,
                raw: vec![line.raw],
                code: code.to_string(),
                doc: std::mem::take(&mut doc).join("\n").trim().to_string(),
            });
        } else if line_depth > 1 {
            if let Some(spec) = specs.last_mut() {
                spec.raw.push(line.raw);
                spec.code.push('\n');
                spec.code.push_str(code);
            }
        }
    }
    (true, specs)
}

fn value_names(code: &str) -> Vec<String> {
    let head = code.split('=').next().unwrap_or_default();
    head.split(',')
        .filter_map(|part| part.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// Import spec: optional alias (`f`, `_`, `.`) followed by a quoted path.
#[allow(clippy::unwrap_used)]
static IMPORT_SPEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*\(?\s*([A-Za-z_][A-Za-z0-9_]*|\.)?\s*"([^"]+)""#).unwrap()
});

fn import_specs(decl: &[Line<'_>]) -> Vec<(Option<String>, String)> {
    decl.iter()
        .enumerate()
        .filter_map(|(i, line)| {
            let code = line.code.trim_start();
            let code = if i == 0 {
                code.strip_prefix("import").unwrap_or(code)
            } else {
                code
            };
            IMPORT_SPEC.captures(code).map(|caps| {
                (
                    caps.get(1).map(|m| m.as_str().to_string()),
                    caps[2].to_string(),
                )
            })
        })
        .collect()
}

/// Function header: everything before the body's opening brace.
fn func_header(code: &str) -> &str {
    let mut depth = 0i32;
    for (i, c) in code.char_indices() {
        match c {
            '{' if depth == 0 => {
                let before = code[..i].trim_end();
                if before.ends_with("interface") || before.ends_with("struct") {
                    depth += 1;
                } else {
                    return before;
                }
            },
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {},
        }
    }
    code.trim_end()
}

fn matching_close(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            },
            _ => {},
        }
    }
    None
}

fn parse_func(header: &str) -> Option<FuncDecl> {
    let rest = header.strip_prefix("func")?.trim_start();
    let (recv, rest) = if rest.starts_with('(') {
        let close = matching_close(rest)?;
        let recv_type = rest[1..close]
            .split_whitespace()
            .last()
            .unwrap_or_default()
            .trim_start_matches('*');
        let recv_type = recv_type.split('[').next().unwrap_or_default();
        (recv_type.to_string(), rest[close + 1..].trim_start())
    } else {
        (String::new(), rest)
    };

    let name = first_ident(rest);
    if name.is_empty() {
        return None;
    }
    let mut after = &rest[name.len()..];
    if after.starts_with('[') {
        after = &after[matching_close(after)? + 1..];
    }
    let params_end = matching_close(after)?;
    let results = after[params_end + 1..].trim().trim_start_matches('(');
    let result = results
        .split(',')
        .next()
        .and_then(|segment| segment.split_whitespace().last())
        .unwrap_or_default()
        .trim_end_matches(')')
        .trim_start_matches('*');

    Some(FuncDecl {
        func: Func {
            name: name.to_string(),
            recv,
            decl: header.to_string(),
            ..Func::default()
        },
        result: result.to_string(),
    })
}

/// Standard library names removed before Go 1, keyed by import path.
const DEPRECATED_EXPORTS: &[(&str, &[&str])] = &[
    ("bytes", &["Add"]),
    ("crypto/aes", &["Cipher"]),
    ("crypto/hmac", &["NewSHA1", "NewSHA256"]),
    ("crypto/rand", &["Seed"]),
    ("encoding/json", &["MarshalForHTML"]),
    ("encoding/xml", &["Marshaler", "NewParser", "Parser"]),
    ("html", &["NewTokenizer", "Parse"]),
    ("image", &["Color", "NRGBAColor", "RGBAColor"]),
    ("io", &["Copyn"]),
    ("log", &["Exitf"]),
    ("math", &["Fabs", "Fmax", "Fmod"]),
    (
        "os",
        &["Envs", "Error", "Getenverror", "NewError", "Time", "UnixSignal", "Wait"],
    ),
    ("reflect", &["MapValue", "Typeof"]),
    ("runtime", &["UpdateMemStats"]),
    (
        "strconv",
        &[
            "Atob", "Atof32", "Atof64", "AtofN", "Atoi64", "Atoui", "Atoui64", "Btoui64", "Ftoa64",
            "Itoa64", "Uitoa", "Uitoa64",
        ],
    ),
    (
        "time",
        &[
            "LocalTime",
            "Nanoseconds",
            "NanosecondsToLocalTime",
            "Seconds",
            "SecondsToLocalTime",
            "SecondsToUTC",
        ],
    ),
    ("unicode/utf8", &["NewString"]),
];

/// Report uses of standard library names that no longer exist.
fn vet(file_name: &str, imports: &[(Option<String>, String)], lines: &[Line<'_>]) -> Vec<String> {
    let mut errors = Vec::new();
    for (alias, path) in imports {
        let Some((_, names)) = DEPRECATED_EXPORTS.iter().find(|(p, _)| *p == path.as_str()) else {
            continue;
        };
        let local = alias
            .clone()
            .unwrap_or_else(|| path.rsplit('/').next().unwrap_or(path).to_string());
        if local == "_" || local == "." {
            continue;
        }
        let pattern = format!(
            r"\b{}\.({})\b",
            regex::escape(&local),
            names.iter().map(|n| regex::escape(n)).collect::<Vec<_>>().join("|")
        );
        let Ok(re) = Regex::new(&pattern) else {
            continue;
        };
        for (i, line) in lines.iter().enumerate() {
            for caps in re.captures_iter(&line.code) {
                errors.push(format!(
                    "{path:?}.{} not found ({file_name}:{})",
                    &caps[1],
                    i + 1
                ));
            }
        }
    }
    errors
}
