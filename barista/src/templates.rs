//! Server-rendered pages.
//!
//! Templates are compiled into the binary and registered once in [`Templates::new`]. The
//! environment is owned by [`crate::AppState`] rather than living in a global.

use minijinja::Environment;
use serde::Serialize;

use crate::errors::Error;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("templates/base.html")),
    ("login.html", include_str!("templates/login.html")),
    ("register.html", include_str!("templates/register.html")),
    ("home.html", include_str!("templates/home.html")),
    ("settings.html", include_str!("templates/settings.html")),
];

pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for &(name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    /// Render a registered template. HTML autoescaping applies to every `.html` template.
    pub fn render<S: Serialize>(&self, name: &str, context: S) -> Result<String, Error> {
        self.env
            .get_template(name)
            .and_then(|template| template.render(context))
            .map_err(|e| Error::Internal {
                operation: format!("render template {name}: {e:#}"),
            })
    }
}

impl std::fmt::Debug for Templates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Templates").finish_non_exhaustive()
    }
}
