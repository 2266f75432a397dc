//! `Renderer`: the one thing each output format has to implement, plus
//! the three formats named in §6 (`json`, `html`, `markdown`).
//!
//! The html/markdown renderers follow `shell/mod.rs`'s pattern of a
//! `minijinja::Environment` built once, fed `minijinja_contrib`'s extra
//! filters/functions, with templates embedded via `include_str!` rather
//! than read from disk. Per §1, the template *dialect* is out of scope;
//! these exist only to exercise the file-layout and detail-page
//! requirements, not as a finished design.

use super::{ExtensionReport, ReportContext};
use crate::error::Result;
use minijinja::Environment;

pub trait Renderer: Send + Sync {
    fn format_name(&self) -> &'static str;
    fn file_extension(&self) -> &'static str;
    fn render_main(&self, ctx: &ReportContext) -> Result<Vec<u8>>;
    fn render_extension(&self, ctx: &ReportContext, extension: &ExtensionReport) -> Result<Vec<u8>>;

    /// `None` if this format doesn't emit standalone detail pages
    /// (JSON embeds detail data inline in the per-extension file
    /// instead, per §6).
    fn render_detail(&self, _ctx: &ReportContext, _extension: &ExtensionReport) -> Option<Result<Vec<u8>>> {
        None
    }

    fn emits_detail_pages(&self) -> bool {
        false
    }
}

/// Pure `serde_json`; no templating needed.
pub struct Json;

impl Renderer for Json {
    fn format_name(&self) -> &'static str {
        "json"
    }

    fn file_extension(&self) -> &'static str {
        "json"
    }

    fn render_main(&self, ctx: &ReportContext) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(ctx)?)
    }

    fn render_extension(&self, _ctx: &ReportContext, extension: &ExtensionReport) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(extension)?)
    }
}

const HTML_MAIN: &str = include_str!("templates/main.html.jinja");
const HTML_EXTENSION: &str = include_str!("templates/extension.html.jinja");
const HTML_DETAIL: &str = include_str!("templates/detail.html.jinja");

pub struct Html {
    env: Environment<'static>,
}

impl Html {
    pub fn new() -> Self {
        let mut env = Environment::new();
        minijinja_contrib::add_to_environment(&mut env);
        env.add_template("main", HTML_MAIN).expect("embedded template is valid");
        env.add_template("extension", HTML_EXTENSION)
            .expect("embedded template is valid");
        env.add_template("detail", HTML_DETAIL).expect("embedded template is valid");
        Html { env }
    }
}

impl Default for Html {
    fn default() -> Self {
        Html::new()
    }
}

impl Renderer for Html {
    fn format_name(&self) -> &'static str {
        "html"
    }

    fn file_extension(&self) -> &'static str {
        "html"
    }

    fn render_main(&self, ctx: &ReportContext) -> Result<Vec<u8>> {
        let template = self.env.get_template("main")?;
        Ok(template.render(ctx)?.into_bytes())
    }

    fn render_extension(&self, _ctx: &ReportContext, extension: &ExtensionReport) -> Result<Vec<u8>> {
        let template = self.env.get_template("extension")?;
        Ok(template
            .render(minijinja::context! { extension => extension })?
            .into_bytes())
    }

    fn render_detail(&self, _ctx: &ReportContext, extension: &ExtensionReport) -> Option<Result<Vec<u8>>> {
        extension.detail.as_ref()?;
        let template = match self.env.get_template("detail") {
            Ok(t) => t,
            Err(e) => return Some(Err(e.into())),
        };
        Some(
            template
                .render(minijinja::context! { extension => extension })
                .map(|s| s.into_bytes())
                .map_err(Into::into),
        )
    }

    fn emits_detail_pages(&self) -> bool {
        true
    }
}

const MD_MAIN: &str = include_str!("templates/main.md.jinja");
const MD_EXTENSION: &str = include_str!("templates/extension.md.jinja");
const MD_DETAIL: &str = include_str!("templates/detail.md.jinja");

pub struct Markdown {
    env: Environment<'static>,
}

impl Markdown {
    pub fn new() -> Self {
        let mut env = Environment::new();
        minijinja_contrib::add_to_environment(&mut env);
        env.add_template("main", MD_MAIN).expect("embedded template is valid");
        env.add_template("extension", MD_EXTENSION)
            .expect("embedded template is valid");
        env.add_template("detail", MD_DETAIL).expect("embedded template is valid");
        Markdown { env }
    }
}

impl Default for Markdown {
    fn default() -> Self {
        Markdown::new()
    }
}

impl Renderer for Markdown {
    fn format_name(&self) -> &'static str {
        "markdown"
    }

    fn file_extension(&self) -> &'static str {
        "md"
    }

    fn render_main(&self, ctx: &ReportContext) -> Result<Vec<u8>> {
        let template = self.env.get_template("main")?;
        Ok(template.render(ctx)?.into_bytes())
    }

    fn render_extension(&self, _ctx: &ReportContext, extension: &ExtensionReport) -> Result<Vec<u8>> {
        let template = self.env.get_template("extension")?;
        Ok(template
            .render(minijinja::context! { extension => extension })?
            .into_bytes())
    }

    fn render_detail(&self, _ctx: &ReportContext, extension: &ExtensionReport) -> Option<Result<Vec<u8>>> {
        extension.detail.as_ref()?;
        let template = match self.env.get_template("detail") {
            Ok(t) => t,
            Err(e) => return Some(Err(e.into())),
        };
        Some(
            template
                .render(minijinja::context! { extension => extension })
                .map(|s| s.into_bytes())
                .map_err(Into::into),
        )
    }

    fn emits_detail_pages(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Extension, ExtensionType, Installation, InstallationMode};
    use crate::report::ReportBuilder;
    use crate::version::Version;
    use std::path::PathBuf;

    fn fixture_ctx() -> ReportContext {
        let mut installation = Installation::new(
            PathBuf::from("/fx"),
            Version::new(12, 4, 10, None),
            InstallationMode::ComposerStandard,
        );
        installation
            .add_extension(Extension {
                key: "news".into(),
                title: "News".into(),
                version: None,
                kind: ExtensionType::ThirdParty,
                package: None,
                path: PathBuf::from("/fx/news"),
                is_active: true,
                em_configuration: Default::default(),
            })
            .unwrap();
        ReportBuilder::build(&installation, &Version::new(13, 0, 0, None), &[])
    }

    #[test]
    fn json_renderer_round_trips_through_serde() {
        let ctx = fixture_ctx();
        let bytes = Json.render_main(&ctx).unwrap();
        let parsed: ReportContext = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.extensions.len(), ctx.extensions.len());
    }

    #[test]
    fn html_renderer_produces_a_page_per_extension() {
        let ctx = fixture_ctx();
        let html = Html::new();
        let main = html.render_main(&ctx).unwrap();
        assert!(String::from_utf8(main).unwrap().contains("Upgrade readiness"));
        let extension = html.render_extension(&ctx, &ctx.extensions[0]).unwrap();
        assert!(String::from_utf8(extension).unwrap().contains("news"));
    }

    #[test]
    fn markdown_renderer_skips_detail_when_absent() {
        let ctx = fixture_ctx();
        let markdown = Markdown::new();
        assert!(markdown.render_detail(&ctx, &ctx.extensions[0]).is_none());
    }
}
