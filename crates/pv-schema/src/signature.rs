//! Parameter-name extraction from signature text.
//!
//! Used only as a fallback when an argument is declared without an
//! explicit name. Anything that does not look like a parameter list yields
//! an empty vector, and every fallback name then becomes `arg<N>`.

/// Ordered parameter names of the first parameter list in `source`.
///
/// Receivers (`self`, `&self`, `&'a mut self`, `self: Arc<Self>`) are
/// skipped. Destructuring or otherwise non-identifier patterns become
/// `arg<N>` where `N` is the zero-based position.
pub fn param_names(source: &str) -> Vec<String> {
    let cleaned = strip_comments(source);
    let Some(list) = parameter_list(&cleaned) else {
        return Vec::new();
    };

    split_top_level(list)
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter(|p| !is_receiver(p))
        .enumerate()
        .map(|(position, param)| {
            binding_name(param).unwrap_or_else(|| format!("arg{position}"))
        })
        .collect()
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        let next = chars.peek().copied();
        match (c, next) {
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Contents between the first `(` and its matching `)`.
fn parameter_list(source: &str) -> Option<&str> {
    let open = source.find('(')?;
    let mut depth = 0usize;
    for (offset, c) in source[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&source[open + 1..open + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut prev = '\0';
    for (i, c) in list.char_indices() {
        match c {
            '(' | '[' | '{' | '<' => depth += 1,
            // `->` inside an `Fn(..) -> T` bound is not a closing bracket
            '>' if prev == '-' => {}
            ')' | ']' | '}' | '>' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        prev = c;
    }
    parts.push(&list[start..]);
    parts
}

fn is_receiver(param: &str) -> bool {
    let pattern = param.split(':').next().unwrap_or(param).trim();
    let pattern = pattern.trim_start_matches('&').trim_start();
    let pattern = match pattern.strip_prefix('\'') {
        Some(rest) => rest
            .split_once(char::is_whitespace)
            .map(|(_, tail)| tail.trim_start())
            .unwrap_or(""),
        None => pattern,
    };
    let pattern = pattern.strip_prefix("mut ").unwrap_or(pattern).trim();
    pattern == "self"
}

fn binding_name(param: &str) -> Option<String> {
    let end = param.find(|c: char| c == ':' || c == '=').unwrap_or(param.len());
    let mut pattern = param[..end].trim();
    for prefix in ["ref ", "mut "] {
        pattern = pattern.strip_prefix(prefix).unwrap_or(pattern).trim_start();
    }
    is_identifier(pattern).then(|| pattern.to_string())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    s != "_" && chars.all(|c| c == '_' || c.is_alphanumeric())
}
