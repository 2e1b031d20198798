/*
 * integration_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Integration tests for quarto-mustache rendering.
 */

use pretty_assertions::assert_eq;
use quarto_mustache::{
    MemoryResolver, Mustache, MustacheError, MustacheOptions, Record, View, escape::escape_html,
};
use serde_json::json;
use std::path::{Path, PathBuf};

/// Helper to get the path to the test fixtures directory
fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("test-fixtures")
}

/// Route engine logs to the test harness; filter with RUST_LOG.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Engine resolving templates from the fixtures directory
fn fixture_engine() -> Mustache {
    init_tracing();
    Mustache::with_options(MustacheOptions::new().with_template_path(fixtures_dir()))
        .expect("fixtures directory exists")
}

/// Engine resolving templates from memory
fn memory_engine(templates: &[(&str, &str)]) -> Mustache {
    Mustache::new().with_resolver(MemoryResolver::with_templates(templates.iter().copied()), 0)
}

fn render(template: &str, view: serde_json::Value) -> String {
    Mustache::new()
        .render(template, &View::from(view))
        .unwrap_or_else(|e| panic!("render of {template:?} failed: {e}"))
}

#[test]
fn test_hello_world() {
    assert_eq!(render("Hello {{planet}}", json!({"planet": "World"})), "Hello World");
}

#[test]
fn test_empty_list_renders_inverted_section() {
    let template = "{{#repo}}<b>{{name}}</b>{{/repo}}{{^repo}}No repos{{/repo}}";
    assert_eq!(render(template, json!({"repo": []})), "No repos");
    assert_eq!(
        render(template, json!({"repo": [{"name": "a"}, {"name": "b"}]})),
        "<b>a</b><b>b</b>"
    );
}

#[test]
fn test_raw_and_escaped_variables() {
    let raw = r#"<a href="x">Tom & 'Jerry'</a>"#;
    let view = json!({ "x": raw });
    assert_eq!(render("{{{x}}}", view.clone()), raw);
    assert_eq!(render("{{&x}}", view.clone()), raw);
    assert_eq!(render("{{x}}", view), escape_html(raw));
}

#[test]
fn test_section_truthiness() {
    for falsy in [json!(false), json!([]), json!(null), json!(""), json!(0)] {
        let view = json!({ "s": falsy, "name": "n" });
        assert_eq!(render("{{#s}}A{{/s}}", view.clone()), "");
        assert_eq!(render("{{^s}}B{{/s}}", view), "B");
    }

    let view = json!({ "s": true, "name": "n" });
    assert_eq!(render("{{#s}}A{{name}}{{/s}}", view.clone()), "An");
    assert_eq!(render("{{^s}}B{{/s}}", view), "");

    // A missing key is falsy too
    assert_eq!(render("{{^missing}}B{{/missing}}", json!({})), "B");
}

#[test]
fn test_nested_map_becomes_view() {
    let view = json!({ "person": { "name": "Ada", "lang": "en" } });
    assert_eq!(render("{{#person}}{{name}}/{{lang}}{{/person}}", view), "Ada/en");
}

#[test]
fn test_iteration_over_scalars() {
    assert_eq!(render("{{#s}}{{.}}{{/s}}", json!({"s": [1, 2, 3]})), "123");
    assert_eq!(
        render(
            "{{%IMPLICIT-ITERATOR iterator=i}}{{#s}}<{{i}}>{{/s}}",
            json!({"s": ["a", "b"]})
        ),
        "<a><b>"
    );
}

#[test]
fn test_scalar_iteration_skips_sections_and_partials() {
    let engine = memory_engine(&[("p", "partial")]);
    let view = View::from(json!({"s": [1, 2], "t": true}));
    assert_eq!(
        engine.render("{{#s}}{{.}}{{#t}}T{{/t}}{{>p}}{{/s}}", &view).unwrap(),
        "12"
    );
}

#[test]
fn test_dotted_paths() {
    assert_eq!(render("{{a.b}}", json!({"a": {"b": "x"}})), "x");
    assert_eq!(render("{{a.b}}", json!({"a": "scalar"})), "");
    assert_eq!(render("{{a.b.c}}", json!({"a": {"b": {"c": 3}}})), "3");
}

#[test]
fn test_delimiter_change_is_scoped_to_section() {
    let engine = memory_engine(&[("p", "{{x}}!")]);
    let view = View::from(json!({"s": true, "x": "X"}));
    let output = engine
        .render("{{#s}}{{=<% %>=}}<%x%> <%>p%>{{/s}} {{x}}", &view)
        .unwrap();
    assert_eq!(output, "X X! X");
}

#[test]
fn test_delimiter_change_at_top_level() {
    let output = render("{{=| |=}}|a| {{b}} |={{ }}=| {{a}}", json!({"a": 1, "b": 2}));
    assert_eq!(output, "1 {{b}} 1");
}

#[test]
fn test_comments_render_nothing() {
    assert_eq!(render("a{{! ignore me }}b", json!({})), "ab");
}

#[test]
fn test_objects_use_accessors_and_properties() {
    let view = View::map([(
        "user",
        View::from(
            Record::new()
                .property("name", "Grace")
                .method("greeting", || View::from("Hello"))
                .property(
                    "address",
                    Record::new().property("city", "Arlington"),
                ),
        ),
    )]);
    let output = Mustache::new()
        .render(
            "{{#user}}{{greeting}}, {{name}} of {{address.city}}{{/user}}",
            &view,
        )
        .unwrap();
    assert_eq!(output, "Hello, Grace of Arlington");
}

#[test]
fn test_value_lambda_is_invoked() {
    let view = View::map([("now", View::value_fn(|| View::from("12:00")))]);
    assert_eq!(Mustache::new().render("at {{now}}", &view).unwrap(), "at 12:00");
}

#[test]
fn test_higher_order_section() {
    let view = View::map([
        ("name", View::from("Chris")),
        (
            "bold",
            View::section_fn(|text, render| Ok(format!("<b>{}</b>", render(text)?))),
        ),
        (
            "shout",
            View::section_fn(|text, _render| Ok(text.to_uppercase())),
        ),
    ]);
    let engine = Mustache::new();
    assert_eq!(
        engine.render("{{#bold}}Hi {{name}}.{{/bold}}", &view).unwrap(),
        "<b>Hi Chris.</b>"
    );
    // The callable receives the raw section text
    assert_eq!(
        engine.render("{{#shout}}Hi {{name}}{{/shout}}", &view).unwrap(),
        "HI {{NAME}}"
    );
}

#[test]
fn test_higher_order_section_render_errors_propagate() {
    let view = View::map([(
        "wrap",
        View::section_fn(|_text, render| render("{{#unclosed}}")),
    )]);
    let result = Mustache::new().render("{{#wrap}}x{{/wrap}}", &view);
    assert!(matches!(result, Err(MustacheError::UnbalancedSection { .. })));
}

#[test]
fn test_partials_from_fixtures() {
    let engine = fixture_engine();
    let view = View::from(json!({"title": "T", "body": "B"}));
    assert_eq!(engine.render("article", &view).unwrap(), "<h1>T</h1>\n<p>B</p>");

    let view = View::from(json!({"label": "new"}));
    assert_eq!(
        engine.render("Badge: {{>partials/badge}}", &view).unwrap(),
        "Badge: [new]"
    );
}

#[test]
fn test_partial_aliases() {
    let engine = Mustache::new();
    let view = View::from(json!({"title": "Welcome"}));
    let output = engine
        .render_with_partials(
            "{{>header}} body",
            &view,
            [("header", "<h1>{{title}}</h1>")],
        )
        .unwrap();
    assert_eq!(output, "<h1>Welcome</h1> body");

    // The alias is cached under its name
    assert!(engine.all_tokens().contains_key("header"));
}

#[test]
fn test_missing_partial_is_an_error() {
    let result = Mustache::new().render("{{>nowhere}}", &View::Null);
    assert!(matches!(
        result,
        Err(MustacheError::TemplateNotFound { name }) if name == "nowhere"
    ));
}

#[test]
fn test_recursive_partial_terminates_with_data() {
    let engine = fixture_engine();
    let view = View::from(json!({
        "name": "root",
        "children": [
            {"name": "a", "children": [{"name": "c"}]},
            {"name": "b"}
        ]
    }));
    assert_eq!(engine.render("node", &view).unwrap(), "root(a(c))(b)");
}

#[test]
fn test_mutually_recursive_partials_compile() {
    let engine = memory_engine(&[
        ("a", "A{{>b}}"),
        ("b", "B{{#more}}{{>a}}{{/more}}"),
    ]);
    let view = View::from(json!({"more": false}));
    assert_eq!(engine.render("a", &view).unwrap(), "AB");
}

#[test]
fn test_unbounded_partial_recursion_is_an_error() {
    let engine = Mustache::with_options(MustacheOptions::new().with_max_partial_depth(5))
        .unwrap()
        .with_resolver(MemoryResolver::with_templates([("loop", "x{{>loop}}")]), 0);
    let result = engine.render("loop", &View::Null);
    assert!(matches!(
        result,
        Err(MustacheError::RecursivePartial { name, max_depth: 5 }) if name == "loop"
    ));
}

#[test]
fn test_whitespace_stripping_around_standalone_tags() {
    let engine = fixture_engine();
    let view = View::from(json!({"items": [{"name": "a"}, {"name": "b"}]}));
    assert_eq!(
        engine.render("list", &view).unwrap(),
        "<ul>\n  <li>a</li>\n  <li>b</li>\n</ul>\n"
    );

    let view = View::from(json!({"items": []}));
    assert_eq!(
        engine.render("list", &view).unwrap(),
        "<ul>\n  <li>none</li>\n</ul>\n"
    );
}

#[test]
fn test_whitespace_stripping_can_be_disabled() {
    let mut engine = Mustache::new();
    engine.set_strip_whitespace(false);
    assert!(!engine.strip_whitespace());

    let view = View::from(json!({"items": ["a"]}));
    assert_eq!(
        engine
            .render("<ul>\n{{#items}}\n<li>{{.}}</li>\n{{/items}}\n</ul>", &view)
            .unwrap(),
        "<ul>\n\n<li>a</li>\n\n</ul>"
    );
}

#[test]
fn test_errors() {
    let engine = Mustache::new();
    assert!(matches!(
        engine.render("{{#a}}text", &View::Null),
        Err(MustacheError::UnbalancedSection { name }) if name == "a"
    ));
    assert!(matches!(
        engine.render("{{1bad}}", &View::Null),
        Err(MustacheError::InvalidVariableName { name }) if name == "1bad"
    ));
    assert!(matches!(
        engine.render("{{%NOPE}}x", &View::Null),
        Err(MustacheError::UnregisteredPragma { name }) if name == "NOPE"
    ));
    assert!(matches!(
        engine.render("{{oops", &View::Null),
        Err(MustacheError::UnbalancedTag)
    ));
}

#[test]
fn test_error_in_nested_partial_aborts_render() {
    let engine = memory_engine(&[("broken", "{{#x}}")]);
    let result = engine.render("before {{>broken}} after", &View::Null);
    assert!(matches!(result, Err(MustacheError::UnbalancedSection { .. })));
}

#[test]
fn test_engine_is_reusable_across_renders() {
    let engine = memory_engine(&[("t", "{{%IMPLICIT-ITERATOR iterator=i}}{{#l}}{{i}}{{/l}}")]);
    let first = View::from(json!({"l": [1, 2]}));
    let second = View::from(json!({"l": [3]}));
    assert_eq!(engine.render("t", &first).unwrap(), "12");
    assert_eq!(engine.render("t", &second).unwrap(), "3");
    // Pragma activation does not leak out of a render
    assert_eq!(engine.render("{{#l}}[{{i}}]{{/l}}", &second).unwrap(), "[]");
}
