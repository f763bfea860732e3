//! Literal-syntax translation.
//!
//! Domains are authored in Python tuple style (`[('a', '=', True)]`) or as
//! JSON arrays (`[["a", "=", true]]`). This pass rewrites the former into
//! the latter so a single reader handles both:
//!
//! - single-quoted strings become JSON strings
//! - `(` / `)` become `[` / `]`
//! - whole-word `True` / `False` / `None` become `true` / `false` / `null`
//! - a trailing comma before a closing bracket is dropped (`('a',)`)
//!
//! String contents are never rewritten.

/// Translate a Python-style domain into JSON array syntax.
pub fn translate(expression: &str) -> String {
    let chars: Vec<char> = expression.chars().collect();
    let mut out = String::with_capacity(expression.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                i = copy_string(&chars, i, &mut out);
            }
            '(' | '[' => {
                out.push('[');
                i += 1;
            }
            ')' | ']' => {
                drop_trailing_comma(&mut out);
                out.push(']');
                i += 1;
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    other => other,
                });
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Copy the string literal starting at `start` as a JSON string.
///
/// Returns the index just past the closing quote. An unterminated literal is
/// copied through untouched so the reader reports it.
fn copy_string(chars: &[char], start: usize, out: &mut String) -> usize {
    let quote = chars[start];
    let mut content = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                let escaped = chars[i + 1];
                i += 2;
                match escaped {
                    'n' => content.push('\n'),
                    't' => content.push('\t'),
                    'r' => content.push('\r'),
                    'b' => content.push('\u{8}'),
                    'f' => content.push('\u{c}'),
                    '0' => content.push('\0'),
                    'u' if i + 4 <= chars.len() => {
                        let hex: String = chars[i..i + 4].iter().collect();
                        match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                            Some(ch) => {
                                content.push(ch);
                                i += 4;
                            }
                            None => {
                                content.push('\\');
                                content.push('u');
                            }
                        }
                    }
                    '\\' | '\'' | '"' | '/' => content.push(escaped),
                    other => {
                        content.push('\\');
                        content.push(other);
                    }
                }
            }
            ch if ch == quote => {
                push_json_string(&content, out);
                return i + 1;
            }
            ch => {
                content.push(ch);
                i += 1;
            }
        }
    }

    out.extend(&chars[start..]);
    chars.len()
}

fn push_json_string(content: &str, out: &mut String) {
    out.push('"');
    for ch in content.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn drop_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_python_tuples() {
        assert_eq!(
            translate("[('status', '=', 'draft')]"),
            r#"[["status", "=", "draft"]]"#
        );
    }

    #[test]
    fn translates_keywords_whole_word_only() {
        assert_eq!(
            translate("[('a','=',True),('b','=',None),('Trueish','=',False)]"),
            r#"[["a","=",true],["b","=",null],["Trueish","=",false]]"#
        );
        assert_eq!(translate("[('x','=',TrueValue)]"), r#"[["x","=",TrueValue]]"#);
    }

    #[test]
    fn leaves_string_contents_alone() {
        assert_eq!(
            translate("[('name','like','(None)')]"),
            r#"[["name","like","(None)"]]"#
        );
        assert_eq!(
            translate(r#"[('quote','=','say "hi"')]"#),
            r#"[["quote","=","say \"hi\""]]"#
        );
    }

    #[test]
    fn unescapes_single_quotes() {
        assert_eq!(translate(r"[('n','=','it\'s')]"), r#"[["n","=","it's"]]"#);
    }

    #[test]
    fn drops_trailing_commas() {
        assert_eq!(translate("[('a','=',1),]"), r#"[["a","=",1]]"#);
        assert_eq!(translate("[('a','in',(1,))]"), r#"[["a","in",[1]]]"#);
    }

    #[test]
    fn json_input_passes_through() {
        let json = r#"[["a","=",1],"|",["b","!=",false]]"#;
        assert_eq!(translate(json), json);
    }

    #[test]
    fn unterminated_string_is_copied_raw() {
        assert_eq!(translate("[('a','=','x)]"), r#"[["a","=",'x)]"#);
    }
}
