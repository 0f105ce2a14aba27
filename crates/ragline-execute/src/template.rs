//! Prompt template rendering.

use ragline_core::{ExecuteError, TemplateVars};

/// Render a template by substituting `{{variable}}` placeholders.
///
/// Every placeholder must have a value; the first one without fails with
/// [`ExecuteError::MissingVariable`] before anything is sent anywhere.
/// Supplied variables that the template never mentions are ignored.
pub fn render_template(template: &str, vars: &TemplateVars) -> Result<String, ExecuteError> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            // unterminated braces pass through as literal text
            rendered.push_str(&rest[open..]);
            rest = "";
            break;
        };
        let name = after[..close].trim();
        let value = vars
            .get(name)
            .ok_or_else(|| ExecuteError::MissingVariable(name.to_string()))?;
        rendered.push_str(value);
        rest = &after[close + 2..];
    }
    rendered.push_str(rest);
    Ok(rendered)
}
