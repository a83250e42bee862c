use miette::Report;
use tyco_core::serialization::Value;
use tyco_core::{analyze, Analysis, TycoError};

fn analyze_ok(source: &str) -> Analysis {
    match analyze(source, "test.tyco") {
        Ok(analysis) => analysis,
        Err(err) => {
            let report = Report::from(err);
            panic!("{:#}", report);
        }
    }
}

fn analyze_err(source: &str) -> TycoError {
    match analyze(source, "test.tyco") {
        Ok(_) => panic!("Expected a TycoError, but got Ok"),
        Err(err) => err,
    }
}

fn instances<'a>(value: &'a Value, type_name: &str) -> &'a [Value] {
    value
        .as_object()
        .unwrap()
        .get(type_name)
        .unwrap_or_else(|| panic!("{type_name} missing from output"))
        .as_array()
        .unwrap()
}

#[test]
fn test_reference_resolves_to_instance_fields() {
    let source = r#"
Dog:
  *str name:
  int legs: 4
  - Rex
  - Fido, legs: 3

Owner:
  *str name:
  Dog pet:
  - Ann, Dog(Rex)
"#;
    let analysis = analyze_ok(source);
    let value = analysis.to_value();

    let owners = instances(&value, "Owner");
    let pet = owners[0].as_object().unwrap().get("pet").unwrap();
    let pet_fields = pet.as_object().unwrap();
    assert_eq!(pet_fields.get("name").unwrap().as_str(), Some("Rex"));
    assert_eq!(pet_fields.get("legs"), Some(&Value::Int(4)));
}

#[test]
fn test_reference_by_keyword_argument() {
    let source = r#"
Dog:
  *str name:
  int legs: 4
  - Rex

Owner:
  *str name:
  Dog pet:
  - Ann, Dog(name: Rex)
"#;
    let analysis = analyze_ok(source);
    let value = analysis.to_value();
    let owners = instances(&value, "Owner");
    let pet = owners[0].as_object().unwrap().get("pet").unwrap();
    assert_eq!(
        pet.as_object().unwrap().get("name").unwrap().as_str(),
        Some("Rex")
    );
}

#[test]
fn test_unknown_reference_key_fails() {
    let source = r#"
Dog:
  *str name:
  - Rex

Owner:
  *str name:
  Dog pet:
  - Ann, Dog(Ghost)
"#;
    let err = analyze_err(source);
    assert!(matches!(err, TycoError::Reference(_)));
    assert!(err.message().contains("unable to find reference"));
}

#[test]
fn test_rerunning_resolution_on_resolved_reference_fails() {
    let source = r#"
Dog:
  *str name:
  - Rex

Owner:
  *str name:
  Dog pet:
  - Ann, Dog(Rex)
"#;
    let mut analysis = analyze_ok(source);
    let err = analysis.context.render_content().unwrap_err();
    assert!(matches!(err, TycoError::Reference(_)));
    assert!(err.message().contains("resolved twice"));
}

#[test]
fn test_duplicate_primary_key_fails() {
    let source = r#"
Dog:
  *str name:
  int legs: 4
  - Rex
  - Rex, legs: 3
"#;
    let err = analyze_err(source);
    assert!(err.message().contains("duplicate primary key"));
}

#[test]
fn test_compound_primary_key() {
    let source = r#"
Point:
  *int x:
  *int y:
  str label: unset
  - 1, 2, label: first
  - 1, 3, label: second

Pin:
  *str id:
  Point at:
  - a, Point(1, 3)
"#;
    let analysis = analyze_ok(source);
    let value = analysis.to_value();
    let pins = instances(&value, "Pin");
    let at = pins[0].as_object().unwrap().get("at").unwrap();
    assert_eq!(
        at.as_object().unwrap().get("label").unwrap().as_str(),
        Some("second")
    );
}

#[test]
fn test_template_renders_sibling_field() {
    let source = r#"
Greeting:
  *str name:
  str message: "Hello {name}"
  - Ann
"#;
    let analysis = analyze_ok(source);
    let value = analysis.to_value();
    let greetings = instances(&value, "Greeting");
    assert_eq!(
        greetings[0].as_object().unwrap().get("message").unwrap().as_str(),
        Some("Hello Ann")
    );
}

#[test]
fn test_literal_string_skips_templates_and_escapes() {
    let source = r#"
Greeting:
  *str name:
  str message: 'Hello {name}\n'
  - Ann
"#;
    let analysis = analyze_ok(source);
    let value = analysis.to_value();
    let greetings = instances(&value, "Greeting");
    assert_eq!(
        greetings[0].as_object().unwrap().get("message").unwrap().as_str(),
        Some("Hello {name}\\n")
    );
}

#[test]
fn test_template_global_redirect() {
    let source = r#"
int x: 3

Box:
  *str id:
  str label: "{global.x}"
  - a
"#;
    let analysis = analyze_ok(source);
    let value = analysis.to_value();
    let boxes = instances(&value, "Box");
    assert_eq!(
        boxes[0].as_object().unwrap().get("label").unwrap().as_str(),
        Some("3")
    );
}

#[test]
fn test_template_in_global_string() {
    let source = r#"
int port: 8080
str url: "http://localhost:{port}/"
"#;
    let analysis = analyze_ok(source);
    let value = analysis.to_value();
    assert_eq!(
        value.as_object().unwrap().get("url").unwrap().as_str(),
        Some("http://localhost:8080/")
    );
}

#[test]
fn test_template_climbs_parent_chain() {
    let source = r#"
Inner:
  str label:

Outer:
  *str name:
  Inner child:
  - Ann, Inner("hi {..name}")
"#;
    let analysis = analyze_ok(source);
    let value = analysis.to_value();
    let outers = instances(&value, "Outer");
    let child = outers[0].as_object().unwrap().get("child").unwrap();
    assert_eq!(
        child.as_object().unwrap().get("label").unwrap().as_str(),
        Some("hi Ann")
    );
}

#[test]
fn test_template_climb_past_root_fails() {
    let source = r#"
Box:
  *str id:
  str label: "{...id}"
  - a
"#;
    let err = analyze_err(source);
    assert!(matches!(err, TycoError::Template(_)));
    assert!(err.message().contains("hit base instance"));
}

#[test]
fn test_template_unresolvable_segment_fails() {
    let source = r#"
Box:
  *str id:
  str label: "{nothing}"
  - a
"#;
    let err = analyze_err(source);
    assert!(matches!(err, TycoError::Template(_)));
    assert!(err.message().contains("nothing"));
}

#[test]
fn test_template_rejects_non_scalar_target() {
    let source = r#"
int[] xs: [1, 2]
str label: "{xs}"
"#;
    let err = analyze_err(source);
    assert!(matches!(err, TycoError::Template(_)));
    assert!(err.message().contains("templatize"));
}

#[test]
fn test_defaults_are_copied_per_instance() {
    let source = r#"
Counter:
  *str id:
  int count: 5
  - a
  - b, count: 9
"#;
    let analysis = analyze_ok(source);
    let value = analysis.to_value();
    let counters = instances(&value, "Counter");
    assert_eq!(counters[0].as_object().unwrap().get("count"), Some(&Value::Int(5)));
    assert_eq!(counters[1].as_object().unwrap().get("count"), Some(&Value::Int(9)));
}

#[test]
fn test_nullable_field_accepts_null() {
    let source = r#"
Task:
  *str id:
  ?str owner:
  - t1, null
  - t2, alice
"#;
    let analysis = analyze_ok(source);
    let value = analysis.to_value();
    let tasks = instances(&value, "Task");
    assert_eq!(tasks[0].as_object().unwrap().get("owner"), Some(&Value::Null));
    assert_eq!(
        tasks[1].as_object().unwrap().get("owner").unwrap().as_str(),
        Some("alice")
    );
}

#[test]
fn test_missing_mandatory_field_fails() {
    let source = r#"
Dog:
  *str name:
  int legs:
  - Rex
"#;
    let err = analyze_err(source);
    assert!(matches!(err, TycoError::Binding(_)));
    assert!(err.message().contains("legs"));
}

#[test]
fn test_array_field_of_references() {
    let source = r#"
Dog:
  *str name:
  - Rex
  - Fido

Owner:
  *str name:
  Dog[] pets:
  - Ann, [Dog(Rex), Dog(Fido)]
"#;
    let analysis = analyze_ok(source);
    let value = analysis.to_value();
    let owners = instances(&value, "Owner");
    let pets = owners[0].as_object().unwrap().get("pets").unwrap().as_array().unwrap();
    assert_eq!(pets.len(), 2);
    assert_eq!(
        pets[1].as_object().unwrap().get("name").unwrap().as_str(),
        Some("Fido")
    );
}

#[test]
fn test_unterminated_placeholder_is_inert() {
    let source = r#"
int x: 3
str y: "{missing"
"#;
    let analysis = analyze_ok(source);
    let value = analysis.to_value();
    assert_eq!(
        value.as_object().unwrap().get("y").unwrap().as_str(),
        Some("{missing")
    );
}

#[test]
fn test_scalar_where_array_expected_fails() {
    let source = "int[] xs: 3\n";
    let err = analyze_err(source);
    assert!(matches!(err, TycoError::Binding(_)));
    assert!(err.message().contains("array expected"));
}
