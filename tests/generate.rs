use std::fs;

use serde_json::json;
use tempfile::TempDir;

use idl_bindgen::{
    discover, GenerateOptions, GenerationReport, Orchestrator, OutputWriter, RecordCodec,
    SourceUnit, Target,
};

const NODE: &str = r#"
/** A node in the document tree. */
interface Node {
  readonly nodeName: string;
  textContent: string | null;
  appendChild(node: Node): Node;
  cloneNode(deep?: boolean): Node;
}
"#;

const ELEMENT: &str = r#"
interface Element extends Node {
  className: string;
  scrollTo(options?: ScrollOptions | double): void;
  readonly offsetWidth: DependentsOnLayout<DartImpl<double>>;
}

@Dictionary()
interface ScrollOptions {
  top?: double;
  left?: double;
  behavior: 'auto' | 'smooth';
}
"#;

const BUTTON: &str = r#"
interface ButtonProperties {
  label: string;
  variant?: 'primary' | 'outline';
  disabled: boolean;
}

interface ButtonMethods {
  focus(): void;
  delete(): ImplementedAs<void, 'remove'>;
}

interface ButtonEvents {
  onclick: Event;
}
"#;

fn units(order: &[(&str, &str)]) -> Vec<SourceUnit> {
    order
        .iter()
        .map(|(path, text)| SourceUnit::new(*path, *text))
        .collect()
}

fn generate(units: Vec<SourceUnit>) -> GenerationReport {
    let mut orchestrator = Orchestrator::new(GenerateOptions::default()).unwrap();
    orchestrator.generate(units).unwrap()
}

fn contents<'a>(report: &'a GenerationReport, target: Target, path: &str) -> &'a str {
    &report
        .files(target)
        .iter()
        .find(|f| f.path.to_str() == Some(path))
        .unwrap_or_else(|| panic!("no {target} file {path}"))
        .contents
}

#[test]
fn methods_only_family_yields_bindings_class() {
    let report = generate(units(&[("foo.d.ts", "interface FooMethods { bar(): void; }")]));
    let dart = contents(&report, Target::Ui, "foo_bindings_generated.dart");
    assert!(dart.contains("abstract class FooBindings extends WidgetElement {"));
    assert!(dart.contains("dynamic bar(List<dynamic> args);"));
    assert!(dart.contains("'bar': StaticDefinedSyncBindingObjectMethod("));
}

#[test]
fn emitting_twice_is_byte_identical() {
    let batch = [
        ("dom/node.d.ts", NODE),
        ("dom/element.d.ts", ELEMENT),
        ("widgets/button.d.ts", BUTTON),
    ];
    let mut orchestrator = Orchestrator::new(GenerateOptions::default()).unwrap();
    let first = orchestrator.generate(units(&batch)).unwrap();
    let second = orchestrator.generate(units(&batch)).unwrap();

    assert!(first.file_count() > 0);
    for target in Target::ALL {
        assert_eq!(first.files(target), second.files(target), "{target} differs");
    }
}

#[test]
fn file_order_does_not_change_output() {
    let forward = generate(units(&[
        ("a/element.d.ts", ELEMENT),
        ("b/node.d.ts", NODE),
        ("c/button.d.ts", BUTTON),
    ]));
    let backward = generate(units(&[
        ("c/button.d.ts", BUTTON),
        ("b/node.d.ts", NODE),
        ("a/element.d.ts", ELEMENT),
    ]));

    assert_eq!(forward.components, backward.components);
    for target in Target::ALL {
        assert_eq!(forward.files(target), backward.files(target), "{target} differs");
    }
}

#[test]
fn cleared_batch_does_not_leak_collector_state() {
    let mut orchestrator = Orchestrator::new(GenerateOptions::default()).unwrap();
    let first = orchestrator
        .generate(units(&[(
            "opts.d.ts",
            "@Dictionary() interface Opts { value: string | double; }",
        )]))
        .unwrap();
    assert!(first
        .files(Target::Native)
        .iter()
        .any(|f| f.path.to_str() == Some("qjs_union_dom_string_double.h")));

    orchestrator.clear_caches();
    assert!(orchestrator.batch().is_none());

    let second = orchestrator
        .generate(units(&[("opts.d.ts", "@Dictionary() interface Opts { value: string; }")]))
        .unwrap();
    let batch = orchestrator.batch().unwrap();
    assert!(batch.collectors.unions.is_empty());
    assert!(!second
        .files(Target::Native)
        .iter()
        .any(|f| f.path.to_string_lossy().starts_with("qjs_union_")));
}

#[test]
fn dictionary_round_trips_through_record_codec() {
    let mut orchestrator = Orchestrator::new(GenerateOptions::default()).unwrap();
    let report = orchestrator
        .generate(units(&[("dom/element.d.ts", ELEMENT), ("dom/node.d.ts", NODE)]))
        .unwrap();
    let c = contents(&report, Target::Dap, "dap_scroll_options.c");
    assert!(c.contains("ScrollOptions* parse_ScrollOptions(JSContext* ctx, JSValue value) {"));
    assert!(c.contains("JSValue stringify_ScrollOptions(JSContext* ctx, const ScrollOptions* record) {"));

    let batch = orchestrator.batch().unwrap();
    let codec = RecordCodec::new(&batch.model);
    let value = json!({ "top": 10.5, "left": 0.25, "behavior": "smooth" });
    let wire = codec.stringify("ScrollOptions", &value).unwrap();
    assert_eq!(codec.parse("ScrollOptions", &wire).unwrap(), value);
}

#[test]
fn renamed_member_keeps_declared_name_in_registration() {
    let report = generate(units(&[("widgets/button.d.ts", BUTTON)]));

    let dart = contents(&report, Target::Ui, "button_bindings_generated.dart");
    assert!(dart.contains("dynamic remove(List<dynamic> args);"));
    assert!(dart.contains("'delete': StaticDefinedSyncBindingObjectMethod("));
    assert!(dart.contains("return instance.remove(args);"));

    let native = contents(&report, Target::Native, "qjs_button_methods.cc");
    assert!(native.contains("self->remove(exception_state);"));
    assert!(native.contains("{\"delete\", removeCallback, 0 },"));
}

#[test]
fn second_write_reports_everything_unchanged() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    fs::create_dir_all(input.path().join("dom")).unwrap();
    fs::write(input.path().join("dom/node.d.ts"), NODE).unwrap();
    fs::write(input.path().join("dom/element.d.ts"), ELEMENT).unwrap();
    fs::write(input.path().join("global.d.ts"), "type int64 = number;").unwrap();

    let writer = OutputWriter::new(output.path());
    let mut orchestrator = Orchestrator::new(GenerateOptions::default()).unwrap();

    let mut first = orchestrator.generate(discover(input.path()).unwrap()).unwrap();
    assert_eq!(first.units, 2);
    orchestrator.write(&mut first, &writer).unwrap();
    assert_eq!(first.written, first.file_count());
    assert!(output.path().join("native/qjs_element.cc").exists());
    assert!(output.path().join("dap/dap_scroll_options.c").exists());

    let mut second = orchestrator.generate(discover(input.path()).unwrap()).unwrap();
    orchestrator.write(&mut second, &writer).unwrap();
    assert_eq!(second.written, 0);
    assert_eq!(second.unchanged, first.file_count());
}
