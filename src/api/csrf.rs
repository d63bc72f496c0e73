//! CSRF token discovery. The server issues the token either as the
//! `csrftoken` cookie or as a hidden `csrfmiddlewaretoken` input in a
//! rendered form; mutating requests must echo it in `X-CSRFToken`.

pub const CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_FORM_FIELD: &str = "csrfmiddlewaretoken";
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Pull a named cookie out of a `Cookie:`-style header ("a=1; b=2").
pub fn token_from_cookie_header(header: &str, name: &str) -> Option<String> {
    for pair in header.split(';') {
        let pair = pair.trim();
        if let Some((key, value)) = pair.split_once('=') {
            if key == name && !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Extract the hidden-input token from a rendered page body.
/// Scans for the field name attribute and then the nearest `value="..."`
/// within the same tag; tolerates attribute order in either direction.
pub fn token_from_form_field(html: &str) -> Option<String> {
    let needle = format!("name=\"{}\"", CSRF_FORM_FIELD);
    let at = html.find(&needle)?;
    let tag_start = html[..at].rfind('<')?;
    let tag_end = tag_start + html[tag_start..].find('>')?;
    let tag = &html[tag_start..tag_end];
    let value_at = tag.find("value=\"")? + "value=\"".len();
    let rest = &tag[value_at..];
    let end = rest.find('"')?;
    let token = &rest[..end];
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_token_from_cookie_header() {
        let header = "sessionid=abc123; csrftoken=tok-456; theme=dark";
        assert_eq!(
            token_from_cookie_header(header, CSRF_COOKIE),
            Some("tok-456".to_string())
        );
    }

    #[test]
    fn missing_or_empty_cookie_yields_none() {
        assert_eq!(token_from_cookie_header("sessionid=abc", CSRF_COOKIE), None);
        assert_eq!(token_from_cookie_header("csrftoken=", CSRF_COOKIE), None);
    }

    #[test]
    fn reads_token_from_hidden_input() {
        let html = r#"<form method="post">
            <input type="hidden" name="csrfmiddlewaretoken" value="form-tok-789">
            <input type="text" name="username">
        </form>"#;
        assert_eq!(token_from_form_field(html), Some("form-tok-789".to_string()));
    }

    #[test]
    fn reads_token_when_value_precedes_name() {
        let html = r#"<input value="tok-1" type="hidden" name="csrfmiddlewaretoken">"#;
        assert_eq!(token_from_form_field(html), Some("tok-1".to_string()));
    }

    #[test]
    fn page_without_form_token_yields_none() {
        assert_eq!(token_from_form_field("<html><body>hi</body></html>"), None);
    }
}
