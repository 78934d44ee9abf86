//! Inline `style` attribute editing.
//!
//! Declarations are split on `;` only outside parentheses and quotes, so
//! values such as `url(data:image/jpeg;base64,...)` stay intact.

/// Split a style attribute into `(property, value)` pairs.
pub(super) fn parse_declarations(style: &str) -> Vec<(String, String)> {
    let mut declarations = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in style.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                push_declaration(&style[start..i], &mut declarations);
                start = i + 1;
            }
            _ => {}
        }
    }
    push_declaration(&style[start..], &mut declarations);
    declarations
}

fn push_declaration(raw: &str, declarations: &mut Vec<(String, String)>) {
    if let Some((property, value)) = raw.split_once(':') {
        let property = property.trim();
        if !property.is_empty() {
            declarations.push((property.to_ascii_lowercase(), value.trim().to_string()));
        }
    }
}

/// Return `style` with `property` set to `value`, in place if already declared.
pub(super) fn set_declaration(style: &str, property: &str, value: &str) -> String {
    let mut declarations = parse_declarations(style);
    let property = property.to_ascii_lowercase();
    match declarations.iter_mut().find(|(p, _)| *p == property) {
        Some(existing) => existing.1 = value.to_string(),
        None => declarations.push((property, value.to_string())),
    }
    declarations
        .iter()
        .map(|(p, v)| format!("{p}: {v};"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic() {
        assert_eq!(
            parse_declarations("color: red; margin:0"),
            vec![
                ("color".to_string(), "red".to_string()),
                ("margin".to_string(), "0".to_string())
            ]
        );
    }

    #[test]
    fn semicolons_inside_url_are_kept() {
        let decls = parse_declarations("background-image: url(data:image/jpeg;base64,AA==); top: 0");
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].1, "url(data:image/jpeg;base64,AA==)");
    }

    #[test]
    fn semicolons_inside_quotes_are_kept() {
        let decls = parse_declarations(r#"font-family: "a;b", serif"#);
        assert_eq!(decls, vec![("font-family".to_string(), r#""a;b", serif"#.to_string())]);
    }

    #[test]
    fn set_appends_then_replaces() {
        let style = set_declaration("", "padding-top", "50%");
        assert_eq!(style, "padding-top: 50%;");
        let style = set_declaration(&style, "color", "red");
        assert_eq!(style, "padding-top: 50%; color: red;");
        let style = set_declaration(&style, "PADDING-TOP", "10%");
        assert_eq!(style, "padding-top: 10%; color: red;");
    }

    #[test]
    fn garbage_is_dropped() {
        assert!(parse_declarations(";;  ; nonsense").is_empty());
    }
}
