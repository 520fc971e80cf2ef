//! TwiML responses for the carrier's call webhook

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Bridge the call into our media stream
///
/// When the stream closes the carrier posts the next webhook for the same
/// call to `action_url`.
pub fn connect_stream(stream_url: &str, action_url: &str) -> String {
    format!(
        r#"{}<Response><Connect action="{}"><Stream url="{}"/></Connect></Response>"#,
        XML_DECLARATION,
        escape(action_url),
        escape(stream_url)
    )
}

/// Dial a human line
pub fn dial(number: &str) -> String {
    format!(
        "{}<Response><Dial>{}</Dial></Response>",
        XML_DECLARATION,
        escape(number)
    )
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_stream() {
        let xml = connect_stream(
            "wss://intake.example.com/connection",
            "https://intake.example.com/incoming",
        );
        assert!(xml.starts_with(XML_DECLARATION));
        assert!(xml.contains(
            r#"<Connect action="https://intake.example.com/incoming"><Stream url="wss://intake.example.com/connection"/></Connect>"#
        ));
    }

    #[test]
    fn test_dial() {
        assert_eq!(
            dial("+16156175000"),
            format!("{}<Response><Dial>+16156175000</Dial></Response>", XML_DECLARATION)
        );
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"a&b<"c">'d'"#),
            "a&amp;b&lt;&quot;c&quot;&gt;&apos;d&apos;"
        );
    }
}
