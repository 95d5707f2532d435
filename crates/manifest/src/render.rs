//! Template rendering with tera
//!
//! Rendering is pure: the only inputs are the template text and the scope.
//! Undefined variables are errors.

use std::collections::BTreeMap;
use std::error::Error as _;
use tera::{Context, Tera};

/// Renders manifest strings and template files
pub struct Renderer {
    tera: Tera,
}

/// Flatten a tera error and its causes into one line
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn has_markup(text: &str) -> bool {
    text.contains("{{") || text.contains("{%") || text.contains("{#")
}

impl Renderer {
    /// Register template files by name
    pub fn new(templates: &BTreeMap<String, String>) -> Result<Self, String> {
        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());
        for (name, body) in templates {
            tera.add_raw_template(name, body)
                .map_err(|e| format!("{name}: {}", describe(&e)))?;
        }
        Ok(Self { tera })
    }

    /// Render a registered template file
    pub fn render_template(&self, name: &str, context: &Context) -> Result<String, String> {
        if !self.tera.get_template_names().any(|n| n == name) {
            return Err(format!("template '{name}' was not loaded"));
        }
        self.tera.render(name, context).map_err(|e| describe(&e))
    }

    /// Render an inline string; text without tera markup is returned as is
    pub fn render_str(&self, text: &str, context: &Context) -> Result<String, String> {
        if !has_markup(text) {
            return Ok(text.to_string());
        }
        Tera::one_off(text, context, false).map_err(|e| describe(&e))
    }
}

/// Build a tera context from a JSON scope object
pub fn context(scope: &serde_json::Value) -> Result<Context, String> {
    Context::from_value(scope.clone()).map_err(|e| describe(&e))
}
