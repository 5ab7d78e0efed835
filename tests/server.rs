//! HTTP tests against a real listener on an ephemeral port.

mod support;

use latex_tutor::pipeline::encode::from_base64;
use latex_tutor::server::{ErrorResponse, JobResponse};
use latex_tutor::Pipeline;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::json;
use std::net::SocketAddr;
use support::*;
use tempfile::TempDir;
use tokio::net::TcpListener;

async fn spawn(pipeline: Pipeline) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, latex_tutor::router(pipeline))
            .await
            .unwrap();
    });
    addr
}

fn png_form() -> Form {
    Form::new().part(
        "problemFile",
        Part::bytes(PNG_BYTES.to_vec())
            .file_name("problem.png")
            .mime_str("image/png")
            .unwrap(),
    )
}

#[tokio::test]
async fn health_is_ok() {
    let root = TempDir::new().unwrap();
    let addr = spawn(pipeline(root.path(), StubProvider::text("x"), FakeCompiler::ok())).await;

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn solve_returns_latex_and_pdf() {
    let root = TempDir::new().unwrap();
    let provider = StubProvider::fenced(SOLVED_DOC);
    let addr = spawn(pipeline(root.path(), provider.clone(), FakeCompiler::ok())).await;

    let form = png_form().text("latexTemplate", "\\documentclass{exam}");
    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/laboratory/solve"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: JobResponse = resp.json().await.unwrap();
    assert!(body.latex.starts_with("\\documentclass"));
    assert!(from_base64(&body.pdf_base64).unwrap().starts_with(b"%PDF"));
    assert!(provider.requests()[0].text().contains("\\documentclass{exam}"));
    assert_eq!(leftover(root.path()), 0);
}

#[tokio::test]
async fn safety_block_is_400() {
    let root = TempDir::new().unwrap();
    let addr = spawn(pipeline(
        root.path(),
        StubProvider::new(Reply::Blocked),
        FakeCompiler::ok(),
    ))
    .await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/laboratory/solve"))
        .multipart(png_form())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = resp.json().await.unwrap();
    assert_eq!(body.message, "Request blocked due to safety settings.");
    assert_eq!(leftover(root.path()), 0);
}

#[tokio::test]
async fn unsupported_upload_is_400() {
    let root = TempDir::new().unwrap();
    let provider = StubProvider::text(SOLVED_DOC);
    let addr = spawn(pipeline(root.path(), provider.clone(), FakeCompiler::ok())).await;

    let form = Form::new().part(
        "problemFile",
        Part::bytes(b"GIF89a".to_vec())
            .file_name("problem.gif")
            .mime_str("image/gif")
            .unwrap(),
    );
    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/laboratory/solve"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = resp.json().await.unwrap();
    assert!(body.message.contains("image/gif"), "got: {}", body.message);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn missing_file_is_400() {
    let root = TempDir::new().unwrap();
    let addr = spawn(pipeline(root.path(), StubProvider::text("x"), FakeCompiler::ok())).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/laboratory/solve"))
        .multipart(Form::new().text("latexTemplate", "\\documentclass{article}"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = resp.json().await.unwrap();
    assert_eq!(body.message, "No file uploaded.");
}

#[tokio::test]
async fn recolor_round_trip() {
    let root = TempDir::new().unwrap();
    let addr = spawn(pipeline(
        root.path(),
        StubProvider::text(RECOLORED_DOC),
        FakeCompiler::ok(),
    ))
    .await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/studio/recolor-latex"))
        .json(&json!({ "latexInput": SOLVED_DOC, "targetColor": "#FF0000" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: JobResponse = resp.json().await.unwrap();
    assert_eq!(body.message, "LaTeX recolored and PDF compiled successfully.");
    assert!(body.latex.contains("\\usepackage{xcolor}"));
}

#[tokio::test]
async fn invalid_colour_is_400() {
    let root = TempDir::new().unwrap();
    let provider = StubProvider::text(RECOLORED_DOC);
    let addr = spawn(pipeline(root.path(), provider.clone(), FakeCompiler::ok())).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/studio/recolor-latex"))
        .json(&json!({ "latexInput": SOLVED_DOC, "targetColor": "red" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = resp.json().await.unwrap();
    assert_eq!(body.message, "Invalid target color hex format.");
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn malformed_json_is_400_json() {
    let root = TempDir::new().unwrap();
    let addr = spawn(pipeline(root.path(), StubProvider::text("x"), FakeCompiler::ok())).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/latex/generate"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = resp.json().await.unwrap();
    assert!(!body.message.is_empty());
}

#[tokio::test]
async fn non_multipart_solve_is_400_json() {
    let root = TempDir::new().unwrap();
    let provider = StubProvider::text(SOLVED_DOC);
    let addr = spawn(pipeline(root.path(), provider.clone(), FakeCompiler::ok())).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/laboratory/solve"))
        .json(&json!({ "problemFile": "x" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = resp.json().await.unwrap();
    assert!(!body.message.is_empty());
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn compile_failure_is_500_with_log() {
    let root = TempDir::new().unwrap();
    let addr = spawn(pipeline(
        root.path(),
        StubProvider::text("x"),
        FakeCompiler::broken(),
    ))
    .await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/latex/generate"))
        .json(&json!({ "latexCode": SOLVED_DOC }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorResponse = resp.json().await.unwrap();
    assert_eq!(body.message, "Failed to compile LaTeX code.");
    assert!(body.latex_log.unwrap().contains("Undefined control sequence"));
    assert_eq!(leftover(root.path()), 0);
}
