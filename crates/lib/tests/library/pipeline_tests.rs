//! End-to-end tests across the template, engine, schema and docgen layers.

use lualink_lib::schema::{Field, Schema};
use lualink_lib::{Engine, Error, Generator, TemplateOptions, docgen, typed};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::common::TestEnv;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct AppConfig {
    name: String,
    listen: Listen,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Listen {
    host: String,
    port: u16,
}

fn app_schema() -> Schema {
    Schema::new()
        .field(
            "name",
            Field::new()
                .required()
                .pattern(Regex::new(r"^[a-z][a-z0-9-]*$").unwrap())
                .doc("Application name."),
        )
        .field(
            "listen",
            Field::new().required().nested(
                Schema::new()
                    .field("host", Field::new().required())
                    .field("port", Field::new().required().range(1.0, 65535.0)),
            ),
        )
}

/// Template render -> chunk execution -> schema validation -> typed decode.
#[test]
fn template_to_typed_config_pipeline() {
    let env = TestEnv::new();
    let path = env.write_file(
        "app.lua.tpl",
        r#"
            app = {
                name = "{{ name }}",
                listen = { host = "{{ host | 127.0.0.1 }}", port = {{ port }} },
                tags = { "{{ env:LUALINK_TEST_TAG | default-tag }}" },
            }
        "#,
    );

    let engine = Engine::sandboxed().unwrap();
    let options = TemplateOptions::with_variables([
        ("name", json!("billing")),
        ("port", json!(9090)),
    ]);
    engine.process_template(&path, &options).unwrap();

    let config: AppConfig = engine.get_validated("app", &app_schema()).unwrap();
    assert_eq!(config.name, "billing");
    assert_eq!(config.listen.host, "127.0.0.1");
    assert_eq!(config.listen.port, 9090);
    assert_eq!(config.tags, vec!["default-tag".to_string()]);
}

#[test]
fn schema_rejects_config_before_decode() {
    let engine = Engine::sandboxed().unwrap();
    engine
        .load_string(
            r#"app = { name = "Billing!", listen = { host = "x", port = 9090 } }"#,
            "bad",
        )
        .unwrap();

    let err = engine
        .get_validated::<AppConfig>("app", &app_schema())
        .unwrap_err();
    assert!(matches!(err, Error::Validation { field, .. } if field == "name"));
}

/// Host functions registered through the middleware chain are visible to
/// config code, and config built from their results decodes cleanly.
#[test]
fn host_functions_feed_config() {
    let engine = Engine::sandboxed().unwrap();

    #[derive(Deserialize)]
    struct PortRequest {
        base: u16,
        offset: u16,
    }

    engine
        .register_function(
            "alloc_port",
            typed(|req: PortRequest| Ok(req.base + req.offset)),
        )
        .unwrap();

    engine
        .load_string(
            r#"
                app = {
                    name = "worker",
                    listen = {
                        host = "0.0.0.0",
                        port = alloc_port({ base = 9000, offset = 3 }),
                    },
                }
            "#,
            "config",
        )
        .unwrap();

    let config: AppConfig = engine.get_validated("app", &app_schema()).unwrap();
    assert_eq!(config.listen.port, 9003);
}

/// Generator output executes and round-trips back into the same host value.
#[test]
fn generated_config_round_trips() {
    let original = AppConfig {
        name: "gateway".to_string(),
        listen: Listen {
            host: "10.0.0.1".to_string(),
            port: 443,
        },
        tags: vec!["edge".to_string(), "tls".to_string()],
    };

    let mut g = Generator::new();
    g.comment("written by the host")
        .table("app")
        .field("name", &original.name)
        .field("listen", &original.listen)
        .field("tags", &original.tags)
        .end_table();

    let engine = Engine::sandboxed().unwrap();
    engine.load_string(g.as_str(), "generated").unwrap();

    let back: AppConfig = engine.get("app").unwrap();
    assert_eq!(back, original);
}

#[test]
fn docgen_covers_every_schema_field() {
    let docs = docgen::generate_docs(&app_schema(), &docgen::DocOptions::default());

    for section in ["## name", "## listen", "## listen.host", "## listen.port"] {
        assert!(docs.contains(section), "missing section {section}");
    }
    assert!(docs.contains("Application name."));
}
