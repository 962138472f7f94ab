// src/web/pages.rs

//! The two server-rendered pages. Result rendering happens client-side from
//! the `/status` JSON.

use minijinja::{context, Environment, Error as TemplateError};
use once_cell::sync::Lazy;

// Names ending in `.html` get HTML auto-escaping.
static TEMPLATES: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    env.add_template("base.html", include_str!("../../templates/base.html"))
        .unwrap();
    env.add_template("index.html", include_str!("../../templates/index.html"))
        .unwrap();
    env.add_template("results.html", include_str!("../../templates/results.html"))
        .unwrap();
    env
});

/// Renders the landing page with the target submission form.
pub fn index() -> Result<String, TemplateError> {
    TEMPLATES.get_template("index.html")?.render(context! {})
}

/// Renders the polling page for `task_id`.
///
/// The id comes straight from the URL and is echoed back escaped, whether or
/// not it was ever issued.
pub fn results(task_id: &str) -> Result<String, TemplateError> {
    TEMPLATES
        .get_template("results.html")?
        .render(context! { task_id => task_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_posts_target_to_scan() {
        let page = index().unwrap();
        assert!(page.contains(r#"action="/scan""#));
        assert!(page.contains(r#"method="post""#));
        assert!(page.contains(r#"name="target""#));
        assert!(page.contains("<title>reconweb</title>"));
    }

    #[test]
    fn results_page_polls_status() {
        let page = results("abc").unwrap();
        assert!(page.contains("/status/"));
        assert!(page.contains(">abc</code>"));
        assert!(page.contains("<title>reconweb: abc</title>"));
    }

    #[test]
    fn results_page_escapes_the_task_id() {
        let page = results(r#"<script>alert("x")</script>"#).unwrap();
        assert!(!page.contains("<script>alert"));
        assert!(page.contains("&lt;script&gt;alert(&quot;x&quot;)"));
    }
}
