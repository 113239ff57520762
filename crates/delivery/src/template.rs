//! Placeholder substitution for notification templates.
//!
//! Templates use `{{.Name}}` placeholders. Every placeholder must name a known
//! variable and that variable must have a value for the recipient being
//! rendered; otherwise rendering fails for that recipient only.

use herald_common::types::Template;

use crate::error::RenderError;

/// Values available to a template for one recipient.
#[derive(Debug, Clone, Default)]
pub struct Variables<'a> {
    pub subject: &'a str,
    pub text: &'a str,
    pub html: &'a str,
    pub to: &'a str,
    pub user_guid: Option<&'a str>,
    pub client_id: &'a str,
    pub kind_id: &'a str,
    pub message_id: &'a str,
    pub endorsement: &'a str,
}

impl Variables<'_> {
    fn lookup(&self, name: &str) -> Result<&str, RenderError> {
        match name {
            "Subject" => Ok(self.subject),
            "Text" => Ok(self.text),
            "HTML" => Ok(self.html),
            "To" => Ok(self.to),
            "UserGUID" => self
                .user_guid
                .ok_or_else(|| RenderError::MissingValue(name.to_string())),
            "ClientID" => Ok(self.client_id),
            "KindID" => Ok(self.kind_id),
            "MessageID" => Ok(self.message_id),
            "Endorsement" => Ok(self.endorsement),
            other => Err(RenderError::UnknownVariable(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    None,
    Html,
}

/// A template rendered for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Render every part of `template` with `vars`.
pub fn render(template: &Template, vars: &Variables<'_>) -> Result<Rendered, RenderError> {
    Ok(Rendered {
        subject: substitute(&template.subject, vars, Escape::None)?,
        text: substitute(&template.text, vars, Escape::None)?,
        html: substitute(&template.html, vars, Escape::Html)?,
    })
}

fn substitute(source: &str, vars: &Variables<'_>, escape: Escape) -> Result<String, RenderError> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or(RenderError::Unterminated(offset + start))?;

        let name = after[..end].trim();
        let name = name.strip_prefix('.').unwrap_or(name);
        let value = vars.lookup(name)?;

        // The HTML body is supplied as markup and is inserted verbatim.
        if escape == Escape::Html && name != "HTML" {
            push_escaped(&mut out, value);
        } else {
            out.push_str(value);
        }

        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }

    out.push_str(rest);
    Ok(out)
}

fn push_escaped(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}
