// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use floatchat_client::Client;
use std::io::Read;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Response, Server};

fn json_header() -> Header {
    Header::from_bytes("Content-Type", "application/json").expect("valid content type header")
}

fn serve_once(status: u16, body: &'static str) -> Result<(String, thread::JoinHandle<String>)> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let mut request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/ask");
        let mut received = String::new();
        request
            .as_reader()
            .read_to_string(&mut received)
            .expect("request body should be readable");
        let response = Response::from_string(body)
            .with_status_code(status)
            .with_header(json_header());
        request.respond(response).expect("response should succeed");
        received
    });

    Ok((addr, handle))
}

#[test]
fn ask_posts_question_and_decodes_answer() -> Result<()> {
    let (addr, handle) = serve_once(
        200,
        r#"{"summary":"Float 5 surfaced near 10N 20E.","data":[{"latitude":10,"longitude":20,"platform_number":5,"temperature":15.2}],"sql_query":"SELECT * FROM argo_data LIMIT 1"}"#,
    )?;

    let client = Client::new(&addr, Duration::from_secs(2))?;
    let answer = client.ask("where is float 5?")?;
    assert_eq!(answer.summary, "Float 5 surfaced near 10N 20E.");
    assert_eq!(answer.data.as_ref().map(Vec::len), Some(1));
    assert_eq!(
        answer.sql.as_deref(),
        Some("SELECT * FROM argo_data LIMIT 1")
    );

    let received = handle.join().expect("server thread should join");
    let body: serde_json::Value = serde_json::from_str(&received)?;
    assert_eq!(body, serde_json::json!({"question": "where is float 5?"}));
    Ok(())
}

#[test]
fn ask_accepts_answers_without_rows() -> Result<()> {
    let (addr, handle) = serve_once(200, r#"{"summary":"No data matched.","data":[]}"#)?;

    let client = Client::new(&addr, Duration::from_secs(2))?;
    let answer = client.ask("anything in 1850?")?;
    assert_eq!(answer.data, Some(Vec::new()));
    assert!(answer.sql.is_none());

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn server_error_detail_surfaces_verbatim() -> Result<()> {
    let (addr, handle) = serve_once(500, r#"{"detail":"database unavailable"}"#)?;

    let client = Client::new(&addr, Duration::from_secs(2))?;
    let error = client
        .ask("profiles please")
        .expect_err("500 should fail");
    assert_eq!(error.to_string(), "database unavailable");

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn server_error_without_detail_uses_status_text() -> Result<()> {
    let (addr, handle) = serve_once(503, r#"{"message":"down"}"#)?;

    let client = Client::new(&addr, Duration::from_secs(2))?;
    let error = client.ask("profiles please").expect_err("503 should fail");
    assert_eq!(error.to_string(), "API error: Service Unavailable");

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn malformed_success_body_is_an_error() -> Result<()> {
    let (addr, handle) = serve_once(200, r#"{"answer":"wrong shape"}"#)?;

    let client = Client::new(&addr, Duration::from_secs(2))?;
    let error = client.ask("shape?").expect_err("bad body should fail");
    assert!(format!("{error:#}").contains("decode answer"));

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn unreachable_service_reports_base_url() {
    let client = Client::new("http://127.0.0.1:1", Duration::from_millis(200))
        .expect("client should initialize");

    let error = client
        .ask("hello?")
        .expect_err("ask should fail for unreachable endpoint");
    let message = error.to_string();
    assert!(message.contains("127.0.0.1:1"), "unexpected message: {message}");
}
