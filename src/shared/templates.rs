//! HTML page templates.
//!
//! Templates live in `templates/pages/` and are compiled into the binary.
//! The `.html` names turn on minijinja's HTML auto-escaping.

use minijinja::{Environment, Value};
use std::sync::OnceLock;
use thiserror::Error;

static TEMPLATE_ENV: OnceLock<Environment<'static>> = OnceLock::new();

const PAGES: &[(&str, &str)] = &[
    (
        "layout.html",
        include_str!("../../templates/pages/layout.html"),
    ),
    ("home.html", include_str!("../../templates/pages/home.html")),
    ("check.html", include_str!("../../templates/pages/check.html")),
];

/// Errors that can occur during template operations
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template '{0}' not found")]
    NotFound(String),

    #[error("Failed to render template: {0}")]
    RenderError(String),
}

fn init_environment() -> Environment<'static> {
    let mut env = Environment::new();

    for &(name, source) in PAGES {
        if let Err(e) = env.add_template(name, source) {
            tracing::warn!("Failed to load template {}: {}", name, e);
        }
    }

    env
}

fn get_environment() -> &'static Environment<'static> {
    TEMPLATE_ENV.get_or_init(init_environment)
}

/// Render a page template with the given context
pub fn render_page(template_name: &str, ctx: Value) -> Result<String, TemplateError> {
    let template = get_environment()
        .get_template(template_name)
        .map_err(|_| TemplateError::NotFound(template_name.to_string()))?;

    template
        .render(ctx)
        .map_err(|e| TemplateError::RenderError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn test_all_pages_compile() {
        for (name, _) in PAGES {
            assert!(get_environment().get_template(name).is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_missing_template() {
        let result = render_page("nope.html", context! {});
        assert!(matches!(result, Err(TemplateError::NotFound(_))));
    }

    #[test]
    fn test_home_escapes_user_input() {
        let html = render_page(
            "home.html",
            context! {
                max_upload_size => "10.00 GiB",
                default_max_downloads => 5,
                uuid => "<script>",
                error => "Please enter a file ID",
            },
        )
        .unwrap();

        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("Please enter a file ID"));
    }
}
