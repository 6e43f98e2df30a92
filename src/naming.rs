//! Identifier case conversion and reserved-word handling for generated code.

/// Convert `HTMLCanvasElement` or `getContext` to `html_canvas_element` / `get_context`.
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == ' ' || c == '.' {
            if !result.ends_with('_') && !result.is_empty() {
                result.push('_');
            }
            continue;
        }
        if c.is_uppercase() {
            let prev = if i > 0 { Some(chars[i - 1]) } else { None };
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                // Acronym end: the `E` in `HTMLElement`
                Some(p) if p.is_uppercase() => next.map_or(false, |n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !result.ends_with('_') {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Convert `ease-in-out`, `fill_rule` or `fillRule` to `EaseInOut` / `FillRule`.
pub fn to_pascal_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut upper = true;
    for c in s.chars() {
        if !c.is_ascii_alphanumeric() {
            upper = true;
            continue;
        }
        if upper {
            result.extend(c.to_uppercase());
            upper = false;
        } else {
            result.push(c);
        }
    }
    result
}

/// Convert to `lowerCamelCase`.
pub fn to_camel_case(s: &str) -> String {
    let pascal = to_pascal_case(s);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whether `name` is a plain identifier in the declaration dialect.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn is_cpp_keyword(name: &str) -> bool {
    matches!(
        name,
        "alignas" | "alignof" | "and" | "asm" | "auto" | "bool" | "break" | "case" | "catch"
            | "char" | "class" | "const" | "constexpr" | "continue" | "default" | "delete"
            | "do" | "double" | "else" | "enum" | "explicit" | "export" | "extern" | "false"
            | "float" | "for" | "friend" | "goto" | "if" | "inline" | "int" | "long"
            | "mutable" | "namespace" | "new" | "noexcept" | "not" | "nullptr" | "operator"
            | "or" | "private" | "protected" | "public" | "register" | "return" | "short"
            | "signed" | "sizeof" | "static" | "struct" | "switch" | "template" | "this"
            | "throw" | "true" | "try" | "typedef" | "typeid" | "typename" | "union"
            | "unsigned" | "using" | "virtual" | "void" | "volatile" | "while" | "xor"
    )
}

fn is_dart_keyword(name: &str) -> bool {
    matches!(
        name,
        "abstract" | "as" | "assert" | "async" | "await" | "break" | "case" | "catch"
            | "class" | "const" | "continue" | "default" | "do" | "dynamic" | "else"
            | "enum" | "extends" | "external" | "factory" | "false" | "final" | "finally"
            | "for" | "get" | "if" | "implements" | "import" | "in" | "interface" | "is"
            | "late" | "library" | "mixin" | "new" | "null" | "operator" | "part"
            | "required" | "rethrow" | "return" | "set" | "static" | "super" | "switch"
            | "this" | "throw" | "true" | "try" | "typedef" | "var" | "void" | "while"
            | "with" | "yield"
    )
}

/// Escape a C/C++ identifier by appending `_`.
pub fn escape_cpp(name: &str) -> String {
    if is_cpp_keyword(name) {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}

/// Escape a Dart identifier by appending `_`.
pub fn escape_dart(name: &str) -> String {
    if is_dart_keyword(name) {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("getContext"), "get_context");
        assert_eq!(to_snake_case("HTMLCanvasElement"), "html_canvas_element");
        assert_eq!(to_snake_case("Node"), "node");
        assert_eq!(to_snake_case("DOMMatrix2D"), "dom_matrix2_d");
        assert_eq!(to_snake_case("fill-rule"), "fill_rule");
    }

    #[test]
    fn test_pascal_and_camel_case() {
        assert_eq!(to_pascal_case("ease-in-out"), "EaseInOut");
        assert_eq!(to_pascal_case("fillRule"), "FillRule");
        assert_eq!(to_camel_case("ease-in-out"), "easeInOut");
        assert_eq!(to_camel_case(""), "");
    }

    #[test]
    fn test_identifier() {
        assert!(is_identifier("removeNode"));
        assert!(is_identifier("$x"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape_cpp("delete"), "delete_");
        assert_eq!(escape_cpp("remove"), "remove");
        assert_eq!(escape_dart("default"), "default_");
        assert_eq!(escape_dart("bar"), "bar");
    }
}
