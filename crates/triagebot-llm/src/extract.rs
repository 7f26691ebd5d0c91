//! Pulls the first balanced `{...}` object out of a model's free-form reply.
//!
//! Models are asked to respond with JSON only, but some wrap it in prose or
//! a fenced code block regardless. Scanning for the first balanced brace
//! pair is cheaper than a second model round-trip and handles both cases.

pub fn extract_json_object(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(|&b| b == b'{')?;

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return Some(text[start..end].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bare_object() {
        let s = r#"{"is_incident": true, "confidence": 0.9}"#;
        assert_eq!(extract_json_object(s).unwrap(), s);
    }

    #[test]
    fn extracts_object_wrapped_in_prose() {
        let s = "Sure, here you go:\n```json\n{\"is_incident\": false, \"confidence\": 0.1, \"category\": null, \"urgency\": null, \"rationale\": \"just chit-chat\"}\n```\nLet me know if you need more.";
        let extracted = extract_json_object(s).unwrap();
        assert!(extracted.starts_with('{'));
        assert!(extracted.ends_with('}'));
        let parsed: serde_json::Value = serde_json::from_str(&extracted).unwrap();
        assert_eq!(parsed["is_incident"], false);
    }

    #[test]
    fn handles_nested_braces_and_braces_in_strings() {
        let s = r#"prefix {"rationale": "uses a { brace } in text", "confidence": 0.5, "is_incident": true, "category": null, "urgency": null} suffix"#;
        let extracted = extract_json_object(s).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&extracted).unwrap();
        assert_eq!(parsed["confidence"], 0.5);
    }

    #[test]
    fn returns_none_when_no_object_present() {
        assert!(extract_json_object("no json here").is_none());
    }
}
