//! Server-rendered HTML for the browser front end.

use crate::api::{ABORTED_SENTINEL, DONE_SENTINEL};
use crate::sessions::SessionId;
use handlebars::{Handlebars, RenderError, TemplateError};
use papermill_types::SessionRecord;
use serde_json::json;

/// Registered page templates. Values are HTML-escaped on render.
pub struct Pages {
    handlebars: Handlebars<'static>,
}

impl Pages {
    pub fn new() -> Result<Self, TemplateError> {
        let mut handlebars = Handlebars::new();
        handlebars.register_helper("fixed", Box::new(fixed_helper));
        handlebars.register_partial("header", include_str!("../templates/header.hbs"))?;
        handlebars.register_partial("footer", include_str!("../templates/footer.hbs"))?;
        handlebars.register_template_string("index", include_str!("../templates/index.hbs"))?;
        handlebars.register_template_string("status", include_str!("../templates/status.hbs"))?;
        handlebars.register_template_string("result", include_str!("../templates/result.hbs"))?;
        Ok(Self { handlebars })
    }

    pub fn index(&self, default_max_results: usize) -> Result<String, RenderError> {
        self.handlebars.render(
            "index",
            &json!({"page_title": "Papermill", "default_max_results": default_max_results}),
        )
    }

    pub fn status(&self, id: &SessionId) -> Result<String, RenderError> {
        self.handlebars.render(
            "status",
            &json!({
                "page_title": format!("Run {}", id),
                "session_id": id,
                "done": DONE_SENTINEL,
                "aborted": ABORTED_SENTINEL,
            }),
        )
    }

    pub fn result(&self, id: &SessionId, session: &SessionRecord) -> Result<String, RenderError> {
        self.handlebars.render(
            "result",
            &json!({
                "page_title": session.title,
                "session_id": id,
                "session": session,
                "flagged": session.plagiarism.is_flagged(),
            }),
        )
    }
}

/// `{{fixed value digits}}`: a number with a fixed count of decimals.
fn fixed_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let value = h.param(0).and_then(|v| v.value().as_f64()).unwrap_or(0.0);
    let digits = h.param(1).and_then(|v| v.value().as_u64()).unwrap_or(2) as usize;
    out.write(&format!("{:.*}", digits, value))?;
    Ok(())
}
