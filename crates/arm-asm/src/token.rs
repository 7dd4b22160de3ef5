//! Line-oriented tokenizer (§6): label, mnemonic/directive, operand list,
//! trailing `;` comment. One [`ParsedLine`] per non-blank source line.

#[derive(Debug, Clone)]
pub struct ParsedLine {
    pub line: usize,
    pub label: Option<String>,
    pub body: Option<Body>,
}

#[derive(Debug, Clone)]
pub enum Body {
    Instruction { mnemonic: String, operands: Vec<String> },
    Directive { name: String, operands: Vec<String> },
}

/// Strip a `;` comment, respecting single-quoted character literals so a
/// `;` inside `';'` isn't mistaken for one.
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_quote = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' => in_quote = !in_quote,
            b';' if !in_quote => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Split on top-level commas: commas nested inside `[...]` do not split.
fn split_operands(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for ch in s.chars() {
        match ch {
            '[' | '{' => {
                depth += 1;
                current.push(ch);
            }
            ']' | '}' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => {
                out.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    let last = current.trim();
    if !last.is_empty() {
        out.push(last.to_string());
    }
    out
}

pub fn tokenize(source: &str) -> Vec<ParsedLine> {
    let mut parsed = Vec::new();
    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let without_comment = strip_comment(raw_line).trim();
        if without_comment.is_empty() {
            continue;
        }

        let mut rest = without_comment;
        let mut label = None;
        if let Some(colon) = rest.find(':') {
            let candidate = rest[..colon].trim();
            if !candidate.is_empty() && candidate.chars().all(|c| c.is_alphanumeric() || c == '_') {
                label = Some(candidate.to_string());
                rest = rest[colon + 1..].trim();
            }
        }

        if rest.is_empty() {
            parsed.push(ParsedLine {
                line: line_no,
                label,
                body: None,
            });
            continue;
        }

        let (head, tail) = match rest.find(char::is_whitespace) {
            Some(pos) => (&rest[..pos], rest[pos..].trim()),
            None => (rest, ""),
        };
        let operands = split_operands(tail);

        let body = if let Some(name) = head.strip_prefix('.') {
            Body::Directive {
                name: name.to_ascii_uppercase(),
                operands,
            }
        } else {
            Body::Instruction {
                mnemonic: head.to_ascii_uppercase(),
                operands,
            }
        };

        parsed.push(ParsedLine {
            line: line_no,
            label,
            body: Some(body),
        });
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_and_instruction_on_one_line() {
        let lines = tokenize("loop: ADD R0, R1, R2 ; add them");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].label.as_deref(), Some("loop"));
        match lines[0].body.as_ref().unwrap() {
            Body::Instruction { mnemonic, operands } => {
                assert_eq!(mnemonic, "ADD");
                assert_eq!(operands, &vec!["R0".to_string(), "R1".to_string(), "R2".to_string()]);
            }
            _ => panic!("expected instruction"),
        }
    }

    #[test]
    fn bracketed_comma_is_not_a_split_point() {
        let lines = tokenize("LDR R0, [R1, #4]!");
        match lines[0].body.as_ref().unwrap() {
            Body::Instruction { operands, .. } => {
                assert_eq!(operands, &vec!["R0".to_string(), "[R1, #4]!".to_string()]);
            }
            _ => panic!("expected instruction"),
        }
    }

    #[test]
    fn directive_is_recognized_by_leading_dot() {
        let lines = tokenize(".word 0x1234");
        match lines[0].body.as_ref().unwrap() {
            Body::Directive { name, operands } => {
                assert_eq!(name, "WORD");
                assert_eq!(operands, &vec!["0x1234".to_string()]);
            }
            _ => panic!("expected directive"),
        }
    }

    #[test]
    fn semicolon_inside_char_literal_is_not_a_comment() {
        let lines = tokenize("MOV R0, #';'");
        match lines[0].body.as_ref().unwrap() {
            Body::Instruction { operands, .. } => {
                assert_eq!(operands, &vec!["R0".to_string(), "#';'".to_string()]);
            }
            _ => panic!("expected instruction"),
        }
    }
}
