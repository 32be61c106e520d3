use handlebars::Handlebars;
use log::*;
use serde_json::{json, Value};
use tide::{Body, Response, StatusCode};

use std::path::Path;

use crate::auth::RequestContext;
use crate::messages::FlashMessages;

/**
 * The handlebars registry holding every template under the views directory
 */
pub struct Views {
    hb: Handlebars<'static>,
}

impl Views {
    pub fn load(dir: &Path) -> Result<Self, handlebars::TemplateFileError> {
        let mut hb = Handlebars::new();
        hb.register_templates_directory(".hbs", dir)?;
        info!("Loaded templates from {}", dir.display());
        Ok(Self { hb })
    }

    pub fn render(&self, name: &str, data: &Value) -> Result<String, handlebars::RenderError> {
        self.hb.render(name, data)
    }

    /**
     * Render a full page
     *
     * The current user and any pending flash messages are merged into `data`,
     * the messages count as displayed afterwards.
     */
    pub fn page(
        &self,
        ctx: &RequestContext,
        mut flash: FlashMessages,
        name: &str,
        mut data: Value,
        status: StatusCode,
    ) -> tide::Result<Response> {
        let messages: Vec<Value> = flash.take().iter().map(|m| m.view()).collect();
        if let Value::Object(map) = &mut data {
            map.insert(
                "user".to_string(),
                match ctx.user() {
                    Some(user) => json!({ "username": user.username }),
                    None => Value::Null,
                },
            );
            map.insert("messages".to_string(), Value::Array(messages));
        }

        let html = self.render(name, &data).map_err(|err| {
            error!("Failed to render {}: {}", name, err);
            tide::Error::from_str(StatusCode::InternalServerError, "Failed to render page")
        })?;

        let mut res = Response::builder(status)
            .body(Body::from_string(html))
            .content_type(tide::http::mime::HTML)
            .build();
        flash.apply(&mut res);
        Ok(res)
    }
}
