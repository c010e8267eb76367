//! End-to-end tests for the recipe runner
//!
//! These tests drive the library against an in-process HTTP service that
//! plays both the remote execution service and the system under test:
//! 1. Remote submission in sync and async mode, and its failure modes
//! 2. Local execution through the reqwest engine plus the extraction pass
//! 3. Recipe files round-tripping through the codec

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use recipe::builder::{Extraction, RecipeBuilder};
use recipe::codec::{Format, RecipeCodec, TagPolicy};
use recipe::common::config::{Config, Properties, Settings};
use recipe::execution::router::ExecutionRouter;
use recipe::execution::BackendKind;
use recipe::model::assertion::*;
use recipe::model::recipe::{
    Authentication, DelayStep, JdbcRequestStep, ParameterType, PropertiesStep, RestRequestStep,
    Step,
};
use recipe::model::{Assertion, AssertionStatus, ExecutionStatus, Recipe};
use recipe::{Error, ErrorCategory};

/// A request as seen by the mock service
#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    target: String,
    headers: HashMap<String, String>,
    body: String,
}

type Handler = Arc<dyn Fn(&Recorded) -> (u16, String) + Send + Sync>;

/// Minimal HTTP/1.1 server answering each connection with one response
struct MockService {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockService {
    async fn start<F>(handler: F) -> Self
    where
        F: Fn(&Recorded) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Handler = Arc::new(handler);

        let log = requests.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = handler.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, handler, log).await;
                });
            }
        });

        Self { addr, requests }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn serve(
    stream: TcpStream,
    handler: Handler,
    log: Arc<Mutex<Vec<Recorded>>>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 || line == "\r\n" {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;

    let recorded = Recorded {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    let (status, payload) = handler(&recorded);
    log.lock().unwrap().push(recorded);

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nLocation: /orders/7\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason(status),
        payload.len(),
        payload
    );
    let stream = reader.get_mut();
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

fn report_json(status: &str, execution_id: &str, properties: Value) -> String {
    json!({
        "projectName": "remote",
        "status": status,
        "executionID": execution_id,
        "startTime": 1700000000000u64,
        "timeTaken": 12,
        "testSuiteResultReports": [{
            "testSuiteName": "suite",
            "testSuiteStatus": status,
            "testCaseResultReports": [{
                "testCaseName": "case",
                "testCaseStatus": status,
                "properties": properties,
                "testStepResultReports": []
            }]
        }]
    })
    .to_string()
}

fn router_for(config: &Config, env: &[(&str, String)]) -> ExecutionRouter {
    let env: HashMap<String, String> = env
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    let settings = Settings::with_env(move |key| env.get(key).cloned(), Arc::new(Properties::new()));
    ExecutionRouter::new(config, settings)
}

fn remote_router(service: &MockService, config: &Config) -> ExecutionRouter {
    router_for(
        config,
        &[
            ("TESTSERVER_ENDPOINT", service.url()),
            ("TESTSERVER_USER", "admin".to_string()),
            ("TESTSERVER_PASSWORD", "secret".to_string()),
        ],
    )
}

fn simple_recipe() -> Recipe {
    RecipeBuilder::new()
        .named("geocode")
        .add_step(
            RestRequestStep::get("https://maps.example.com/geocode/json")
                .with_assertion(Assertion::valid_status_codes([200])),
        )
        .build()
        .unwrap()
}

// ============== Remote execution ==============

#[tokio::test]
async fn test_remote_sync_submission_and_extraction() {
    let service = MockService::start(|_| {
        (
            200,
            report_json(
                "FINISHED",
                "e-1",
                json!({ "extractorDataId": "X", "X.p1": "v1", "X.p2": "v2", "other": "o" }),
            ),
        )
    })
    .await;
    let router = remote_router(&service, &Config::default());
    assert!(matches!(router.backend_kind(), BackendKind::Remote { .. }));

    let mut extraction = Extraction::with_id("X");
    let extractor = extraction.json_path("$.results[0].id", "p1");
    let (recipe, pending) = RecipeBuilder::new()
        .add_step(RestRequestStep::get("https://svc.test/items").with_extractor(extractor))
        .with_extraction(extraction)
        .build_with_extractions()
        .unwrap();

    let (report, extracted) = router
        .execute_with_extractions(&recipe, &pending)
        .await
        .unwrap();

    assert_eq!(report.status, ExecutionStatus::Finished);
    assert_eq!(report.execution_id, "e-1");
    assert_eq!(extracted.len(), 1);
    assert_eq!(extracted.get("p1"), Some("v1"));
    let props = &report.case_reports().next().unwrap().properties;
    assert_eq!(props.len(), 1);
    assert_eq!(props.get("other").map(String::as_str), Some("o"));

    let requests = service.requests();
    assert_eq!(requests.len(), 1);
    let submitted = &requests[0];
    assert_eq!(submitted.method, "POST");
    assert_eq!(submitted.target, "/v1/readyapi/executions?async=false");
    assert!(submitted
        .headers
        .get("authorization")
        .is_some_and(|v| v.starts_with("Basic ")));
    let body: Value = serde_json::from_str(&submitted.body).unwrap();
    assert_eq!(body, RecipeCodec::standard().encode_value(&recipe).unwrap());
}

#[tokio::test]
async fn test_remote_async_mode_polls_until_finished() {
    let polls = Arc::new(AtomicUsize::new(0));
    let counter = polls.clone();
    let service = MockService::start(move |request| {
        if request.method == "POST" {
            return (200, report_json("INITIALIZED", "e-42", json!({})));
        }
        let status = if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            "RUNNING"
        } else {
            "FINISHED"
        };
        (200, report_json(status, "e-42", json!({})))
    })
    .await;

    let config = Config::from_toml("[remote]\nmode = \"async\"\npoll_interval_ms = 10\n").unwrap();
    let router = remote_router(&service, &config);

    let report = router.execute(&simple_recipe()).await.unwrap();

    assert_eq!(report.status, ExecutionStatus::Finished);
    assert_eq!(polls.load(Ordering::SeqCst), 2);
    let targets: Vec<String> = service.requests().into_iter().map(|r| r.target).collect();
    assert_eq!(
        targets,
        vec![
            "/v1/readyapi/executions?async=true",
            "/v1/readyapi/executions/e-42/status",
            "/v1/readyapi/executions/e-42/status",
        ]
    );
}

#[tokio::test]
async fn test_remote_async_mode_waits_through_unlisted_states() {
    let polls = Arc::new(AtomicUsize::new(0));
    let counter = polls.clone();
    let service = MockService::start(move |request| {
        if request.method == "POST" {
            return (200, report_json("QUEUED", "e-7", json!({})));
        }
        let status = if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            "PENDING_REPORT"
        } else {
            "FAILED"
        };
        (200, report_json(status, "e-7", json!({})))
    })
    .await;

    let config = Config::from_toml("[remote]\nmode = \"async\"\npoll_interval_ms = 10\n").unwrap();
    let router = remote_router(&service, &config);

    let report = router.execute(&simple_recipe()).await.unwrap();

    assert_eq!(report.status, ExecutionStatus::Failed);
    assert_eq!(polls.load(Ordering::SeqCst), 2);
    assert_eq!(service.requests().len(), 3);
}

#[tokio::test]
async fn test_remote_empty_recipe_is_rejected_before_submission() {
    let service = MockService::start(|_| (200, report_json("FINISHED", "e-0", json!({})))).await;
    let router = remote_router(&service, &Config::default());
    assert!(matches!(router.backend_kind(), BackendKind::Remote { .. }));

    let err = router.execute(&Recipe::new()).await.unwrap_err();

    assert!(matches!(err, Error::InvalidRecipe(_)));
    assert_eq!(err.category(), ErrorCategory::Structural);
    assert!(service.requests().is_empty());
}

#[tokio::test]
async fn test_remote_invalid_step_is_rejected_before_submission() {
    let service = MockService::start(|_| (200, report_json("FINISHED", "e-0", json!({})))).await;
    let router = remote_router(&service, &Config::default());
    let recipe = Recipe {
        test_steps: vec![Step::JdbcRequest(JdbcRequestStep::default())],
        ..Default::default()
    };

    let err = router.execute(&recipe).await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Structural);
    assert!(service.requests().is_empty());
}

#[tokio::test]
async fn test_remote_rejected_credentials() {
    let service = MockService::start(|_| (401, "{}".to_string())).await;
    let router = remote_router(&service, &Config::default());

    let err = router.execute(&simple_recipe()).await.unwrap_err();

    assert!(matches!(err, Error::Authentication { status: 401, ref user } if user == "admin"));
    assert_eq!(err.category(), ErrorCategory::Authentication);
}

#[tokio::test]
async fn test_remote_unparseable_report_is_protocol_error() {
    let service = MockService::start(|_| (200, "<html>maintenance</html>".to_string())).await;
    let router = remote_router(&service, &Config::default());

    let err = router.execute(&simple_recipe()).await.unwrap_err();

    assert!(matches!(err, Error::Protocol(_)));
}

#[tokio::test]
async fn test_remote_server_error_is_rejection() {
    let service = MockService::start(|_| (500, "engine crashed".to_string())).await;
    let router = remote_router(&service, &Config::default());

    let err = router.execute(&simple_recipe()).await.unwrap_err();

    match err {
        Error::RemoteRejected { status, message } => {
            assert_eq!(status, 500);
            assert!(message.contains("engine crashed"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let router = router_for(
        &Config::default(),
        &[("TESTSERVER_ENDPOINT", format!("http://{}", addr))],
    );

    let err = router.execute(&simple_recipe()).await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Transport);
}

#[tokio::test]
async fn test_malformed_endpoint_runs_locally() {
    let service = MockService::start(|_| (200, r#"{"ok":true}"#.to_string())).await;
    let router = router_for(
        &Config::default(),
        &[("TESTSERVER_ENDPOINT", "::not-a-url::".to_string())],
    );

    let recipe = RecipeBuilder::new()
        .add_step(
            RestRequestStep::get(format!("{}/health", service.url()))
                .with_assertion(Assertion::json_path_match("$.ok", "true")),
        )
        .build()
        .unwrap();
    let report = router.execute(&recipe).await.unwrap();

    assert_eq!(router.backend_kind(), BackendKind::Local);
    assert_eq!(report.status, ExecutionStatus::Finished);
    assert_eq!(service.requests()[0].target, "/health");
}

// ============== Local execution ==============

#[tokio::test]
async fn test_local_execution_with_extraction() {
    let service = MockService::start(|request| match request.target.as_str() {
        "/orders?expand=items" => (201, r#"{"id":"o-7","items":[1,2,3]}"#.to_string()),
        _ => (404, r#"{"error":"not found"}"#.to_string()),
    })
    .await;
    let router = router_for(&Config::default(), &[]);

    let mut extraction = Extraction::new();
    let order_id = extraction.json_path("$.id", "orderId");
    let location = extraction.header("Location", "location");
    let (recipe, pending) = RecipeBuilder::new()
        .named("orders")
        .with_property("tenant", "acme")
        .add_step(
            RestRequestStep::post(format!("{}/orders", service.url()))
                .with_parameter(ParameterType::Query, "expand", "items")
                .with_body(r#"{"sku":"A-1"}"#, "application/json")
                .with_extractor(order_id)
                .with_extractor(location)
                .with_assertion(Assertion::valid_status_codes([201]))
                .with_assertion(Assertion::json_path_count("$.items", 3)),
        )
        .add_step(
            RestRequestStep::get(format!("{}/missing", service.url()))
                .with_assertion(Assertion::invalid_status_codes([404])),
        )
        .with_extraction(extraction)
        .build_with_extractions()
        .unwrap();

    let (report, extracted) = router
        .execute_with_extractions(&recipe, &pending)
        .await
        .unwrap();

    assert_eq!(extracted.get("orderId"), Some("o-7"));
    assert_eq!(extracted.get("location"), Some("/orders/7"));

    let case = report.case_reports().next().unwrap();
    assert_eq!(case.properties.len(), 1);
    assert_eq!(case.properties.get("tenant").map(String::as_str), Some("acme"));

    let steps = &case.test_step_result_reports;
    assert_eq!(steps[0].assertion_status, AssertionStatus::Ok);
    assert_eq!(steps[1].assertion_status, AssertionStatus::Failed);
    assert_eq!(report.status, ExecutionStatus::Failed);

    let posted = &service.requests()[0];
    assert_eq!(posted.method, "POST");
    assert_eq!(posted.body, r#"{"sku":"A-1"}"#);
    assert_eq!(
        posted.headers.get("content-type").map(String::as_str),
        Some("application/json")
    );
}

#[tokio::test]
async fn test_local_structural_failure_sends_nothing() {
    let service = MockService::start(|_| (200, "{}".to_string())).await;
    let router = router_for(&Config::default(), &[]);
    let recipe = Recipe {
        test_steps: vec![
            RestRequestStep::get(format!("{}/first", service.url())).into(),
            RestRequestStep::get("relative/path").into(),
        ],
        ..Default::default()
    };

    let err = router.execute(&recipe).await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Structural);
    assert!(service.requests().is_empty());
}

// ============== Recipe files ==============

fn one_of_everything() -> Recipe {
    let assertions: Vec<Assertion> = vec![
        Assertion::valid_status_codes([200, 201]),
        Assertion::invalid_status_codes([500]),
        ContainsAssertion {
            name: Some("has id".into()),
            token: "\"id\"".into(),
            ignore_case: true,
            use_regexp: false,
        }
        .into(),
        Assertion::not_contains("error"),
        XPathContainsAssertion {
            xpath: "//order/id".into(),
            expected_content: "7".into(),
            ignore_namespaces: true,
            ..Default::default()
        }
        .into(),
        XQueryContainsAssertion {
            xquery: "count(//item)".into(),
            expected_content: "3".into(),
            ..Default::default()
        }
        .into(),
        Assertion::json_path_match("$.id", "o-*"),
        Assertion::json_path_count("$.items", 3),
        ScriptAssertion {
            name: None,
            script: "assert messageExchange.responseStatusCode == 200".into(),
        }
        .into(),
        Assertion::max_response_time(250),
        SchemaComplianceAssertion {
            name: None,
            definition: Some("http://svc.test/schema.json".into()),
        }
        .into(),
        SoapFaultAssertion::default().into(),
        NotSoapFaultAssertion::default().into(),
    ];

    let mut rest = RestRequestStep::post("http://svc.test/orders/{id}")
        .named("create order")
        .with_parameter(ParameterType::Path, "id", "7")
        .with_authentication(Authentication::basic("u", "p"))
        .with_body("{}", "application/json");
    rest.assertions = assertions;

    let jdbc = JdbcRequestStep {
        name: Some("count orders".into()),
        driver: "org.postgresql.Driver".into(),
        connection_string: "jdbc:postgresql://db/orders".into(),
        sql_query: "select count(*) from orders".into(),
        stored_procedure: false,
        properties: BTreeMap::from([("limit".to_string(), "10".to_string())]),
        assertions: vec![
            JdbcStatusAssertion::default().into(),
            JdbcTimeoutAssertion {
                name: None,
                timeout: "1000".into(),
            }
            .into(),
        ],
    };

    Recipe {
        name: Some("everything".into()),
        properties: BTreeMap::from([("env".to_string(), "ci".to_string())]),
        test_steps: vec![
            rest.into(),
            jdbc.into(),
            DelayStep {
                name: None,
                delay: 100,
            }
            .into(),
            PropertiesStep {
                name: Some("seed".into()),
                properties: BTreeMap::from([("user".to_string(), "alice".to_string())]),
            }
            .into(),
        ],
    }
}

#[test]
fn test_every_known_tag_round_trips_through_files() {
    let recipe = one_of_everything();
    let used: usize = recipe.test_steps.iter().map(|s| s.assertions().len()).sum();
    assert_eq!(used, Assertion::SHAPES.len());
    assert_eq!(recipe.test_steps.len(), Step::SHAPES.len());

    let codec = RecipeCodec::standard();
    let dir = tempfile::tempdir().unwrap();
    for (file, format) in [("recipe.json", Format::Json), ("recipe.yaml", Format::Yaml)] {
        let path = dir.path().join(file);
        std::fs::write(&path, codec.encode(&recipe, format).unwrap()).unwrap();
        let loaded = codec.load(&path).unwrap();
        assert_eq!(loaded, recipe, "{file} did not round trip");
    }
}

#[test]
fn test_plugin_records_need_pass_through() {
    let text = r#"
name: plugins
testSteps:
  - type: GraphQL Request
    query: "{ orders { id } }"
  - type: REST Request
    method: GET
    URI: http://svc.test/
    assertions:
      - type: Valid HTTP Status Codes
        validStatusCodes: ["200"]
      - type: Response Header Match
        header: X-Version
"#;
    let strict = RecipeCodec::standard().decode(text, Format::Yaml).unwrap_err();
    assert_eq!(strict.category(), ErrorCategory::Resolution);

    let lenient = RecipeCodec::standard().with_policy(TagPolicy::PassThrough);
    let recipe = lenient.decode(text, Format::Yaml).unwrap();
    assert!(recipe.test_steps[0].is_plugin());
    assert_eq!(recipe.test_steps[0].tag(), "GraphQL Request");
    let assertions = recipe.test_steps[1].assertions();
    assert_eq!(assertions.len(), 2);
    assert_eq!(assertions[1].tag(), "Response Header Match");

    let again = lenient
        .decode(&lenient.encode(&recipe, Format::Json).unwrap(), Format::Json)
        .unwrap();
    assert_eq!(again, recipe);
}

#[test]
fn test_config_file_feeds_router() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[remote]
request_timeout_secs = 5

[codec]
allow_plugins = true

[properties]
"testserver.endpoint" = "http://svc.test:8080"
"testserver.user" = "ci"
"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert!(config.codec.allow_plugins);
    assert_eq!(config.remote.request_timeout_secs, 5);

    let properties = Arc::new(Properties::from_map(config.properties.clone()));
    let router = ExecutionRouter::new(&config, Settings::with_env(|_| None, properties));
    assert_eq!(
        router.backend_kind(),
        BackendKind::Remote {
            endpoint: "http://svc.test:8080/".to_string()
        }
    );

    let missing = Config::load_from(&dir.path().join("absent.toml")).unwrap_err();
    assert_eq!(missing.category(), ErrorCategory::Configuration);
}
