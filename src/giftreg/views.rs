//! HTML pages and form fragments for the login flow.
//!
//! Forms post with `hx-post` and swap themselves (`outerHTML`), so every
//! response of `POST /login` and `POST /verify` is a fragment that replaces the
//! form that was submitted.

pub const INVALID_EMAIL: &str = "Please enter a valid email address.";
pub const EMPTY_CODE: &str = "Please enter the code from your email.";
pub const WRONG_CODE: &str = "That code is not correct. Please try again.";
pub const LOGIN_FAILED: &str = "Login failed. Please enter your email to get a new code.";
pub const TRY_AGAIN: &str = "Something went wrong. Please try again shortly.";
pub const RENDER_FAILED: &str = "Internal Server Error";

/// Escape text for use in element content and quoted attribute values.
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="/static/css/main.css">
<script src="/static/js/htmx.min.js" defer></script>
</head>
<body>
<main>
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
    )
}

fn field_error(error: Option<&str>) -> String {
    error.map_or_else(String::new, |message| {
        format!(r#"<p class="field-error" role="alert">{}</p>"#, escape(message))
    })
}

/// Email entry form.
pub fn login_form(email: &str, error: Option<&str>) -> String {
    format!(
        r#"<form id="login" hx-post="/login" hx-swap="outerHTML">
<label for="email">Email</label>
<input id="email" name="email" type="email" autocomplete="email" required value="{email}">
{error}
<button type="submit">Send login code</button>
</form>
"#,
        email = escape(email),
        error = field_error(error),
    )
}

/// Code entry form shown after an email was submitted.
pub fn verify_form(email: &str, error: Option<&str>) -> String {
    format!(
        r#"<form id="verify" hx-post="/verify" hx-swap="outerHTML">
<p>If an account exists for {email_text}, a login code is on its way. Check your email.</p>
<input name="email" type="hidden" value="{email}">
<label for="code">Code</label>
<input id="code" name="code" type="text" autocomplete="one-time-code" required>
{error}
<button type="submit">Log in</button>
</form>
"#,
        email_text = escape(email),
        email = escape(email),
        error = field_error(error),
    )
}

pub fn login_page() -> String {
    page(
        "Log in - giftreg",
        &format!("<h1>Log in</h1>\n{}", login_form("", None)),
    )
}

pub fn landing_page() -> String {
    page(
        "giftreg",
        r#"<h1>giftreg</h1>
<p>Gift lists for the whole household.</p>
<a href="/login">Log in</a>"#,
    )
}

pub fn registry_page(identity_id: i64) -> String {
    page(
        "Registry - giftreg",
        &format!(
            r#"<h1>Registry</h1>
<p data-identity="{identity_id}">Your household registry.</p>
<form method="post" action="/logout"><button type="submit">Log out</button></form>"#
        ),
    )
}

pub fn signed_in_fragment() -> String {
    r#"<p>Signed in. <a href="/registry">Continue to your registry</a>.</p>"#.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_handles_markup() {
        assert_eq!(
            escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn login_form_shows_error_and_escapes_email() {
        let html = login_form("\"><script>", Some(INVALID_EMAIL));
        assert!(html.contains(INVALID_EMAIL));
        assert!(html.contains("&quot;&gt;&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn verify_form_carries_email() {
        let html = verify_form("user@example.com", None);
        assert!(html.contains(r#"name="email" type="hidden" value="user@example.com""#));
        assert!(!html.contains("field-error"));
    }
}
