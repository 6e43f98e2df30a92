//! Handlebars template engine shared by the emitters.

use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext};
use serde::Serialize;

use crate::error::CodegenError;
use crate::naming::{to_camel_case, to_pascal_case, to_snake_case};

/// Templates compiled into the binary, by registration name.
const TEMPLATES: &[(&str, &str)] = &[
    ("native_header", include_str!("templates/native_header.h.hbs")),
    ("native_source", include_str!("templates/native_source.cc.hbs")),
    ("native_dictionary_header", include_str!("templates/native_dictionary.h.hbs")),
    ("native_dictionary_source", include_str!("templates/native_dictionary.cc.hbs")),
    ("native_union", include_str!("templates/native_union.h.hbs")),
    ("native_method", include_str!("templates/native_method.cc.hbs")),
    ("native_name_table", include_str!("templates/native_name_table.h.hbs")),
    ("native_initializer", include_str!("templates/native_initializer.cc.hbs")),
    ("native_global_functions", include_str!("templates/native_global_functions.cc.hbs")),
    ("ui_bindings", include_str!("templates/ui_bindings.dart.hbs")),
    ("dap_record", include_str!("templates/dap_record.c.hbs")),
    ("dap_records_header", include_str!("templates/dap_records.h.hbs")),
];

/// Template engine for code generation.
pub struct TemplateEngine<'a> {
    handlebars: Handlebars<'a>,
}

impl<'a> TemplateEngine<'a> {
    /// Create an engine with every built-in template registered.
    pub fn new() -> Result<Self, CodegenError> {
        let mut handlebars = Handlebars::new();
        // Generated code is not HTML.
        handlebars.register_escape_fn(handlebars::no_escape);

        let mut engine = Self { handlebars };
        engine.register_helpers();
        for (name, template) in TEMPLATES {
            engine.register_template(name, template)?;
        }
        Ok(engine)
    }

    fn register_helpers(&mut self) {
        self.handlebars.register_helper(
            "snake_case",
            Box::new(
                |h: &Helper, _r: &Handlebars, _ctx: &Context, _rc: &mut RenderContext, out: &mut dyn Output| {
                    write_case(h, out, to_snake_case)
                },
            ),
        );
        self.handlebars.register_helper(
            "pascal_case",
            Box::new(
                |h: &Helper, _r: &Handlebars, _ctx: &Context, _rc: &mut RenderContext, out: &mut dyn Output| {
                    write_case(h, out, to_pascal_case)
                },
            ),
        );
        self.handlebars.register_helper(
            "camel_case",
            Box::new(
                |h: &Helper, _r: &Handlebars, _ctx: &Context, _rc: &mut RenderContext, out: &mut dyn Output| {
                    write_case(h, out, to_camel_case)
                },
            ),
        );
        self.handlebars.register_helper(
            "upper",
            Box::new(
                |h: &Helper, _r: &Handlebars, _ctx: &Context, _rc: &mut RenderContext, out: &mut dyn Output| {
                    write_case(h, out, |s| to_snake_case(s).to_uppercase())
                },
            ),
        );
    }

    /// Register a template.
    pub fn register_template(&mut self, name: &str, template: &str) -> Result<(), CodegenError> {
        self.handlebars.register_template_string(name, template)?;
        Ok(())
    }

    /// Render a template and normalize its whitespace.
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, CodegenError> {
        let raw = self.handlebars.render(name, data)?;
        Ok(tidy(&raw))
    }
}

fn write_case(h: &Helper, out: &mut dyn Output, convert: fn(&str) -> String) -> HelperResult {
    let param = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&convert(param))?;
    Ok(())
}

/// Strip trailing whitespace, collapse runs of blank lines and end with one newline.
pub fn tidy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank = 0usize;
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank += 1;
            continue;
        }
        if blank > 0 && !out.is_empty() {
            out.push('\n');
        }
        blank = 0;
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_templates_compile() {
        assert!(TemplateEngine::new().is_ok());
    }

    #[test]
    fn test_case_helpers_and_no_escape() {
        let mut engine = TemplateEngine::new().unwrap();
        engine
            .register_template("t", "{{snake_case name}} {{pascal_case name}} {{camel_case name}} {{upper name}} {{raw}}")
            .unwrap();
        let out = engine
            .render("t", &json!({ "name": "fillRule", "raw": "a<b> && 'c'" }))
            .unwrap();
        assert_eq!(out, "fill_rule FillRule fillRule FILL_RULE a<b> && 'c'\n");
    }

    #[test]
    fn test_invalid_template() {
        let mut engine = TemplateEngine::new().unwrap();
        assert!(matches!(
            engine.register_template("t", "{{#if x}}"),
            Err(CodegenError::InvalidTemplate(_))
        ));
    }

    #[test]
    fn test_tidy() {
        assert_eq!(tidy("a  \n\n\n\nb\n\n"), "a\n\nb\n");
        assert_eq!(tidy("\n\nfirst\n"), "first\n");
    }
}
