use std::path::{Path, PathBuf};

use rmcp::{
    ServiceExt,
    model::CallToolRequestParams,
    transport::{ConfigureCommandExt, TokioChildProcess},
};
use serde_json::json;

fn setup_fixture(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let maria = root.join("maria");
    let victoria = root.join("victoria");
    std::fs::create_dir_all(&maria)?;
    std::fs::create_dir_all(&victoria)?;
    // No supporting/ directory: that group is simply skipped.

    std::fs::write(
        maria.join("MariasFindingPipeline.md"),
        "# Phases 4-7\n\nCatBoost with sector target encoding.",
    )?;
    std::fs::write(
        victoria.join("model_training_log.txt"),
        "XGBoost training finished\nvalidation rmse 0.394\n",
    )?;
    std::fs::write(
        victoria.join("fitch_codeathon_pipeline.ipynb"),
        json!({
            "cells": [
                {"cell_type": "markdown", "source": ["# Feature Engineering\n"]},
                {"cell_type": "markdown", "source": "Revenue shares per sector"}
            ]
        })
        .to_string(),
    )?;

    Ok(())
}

#[tokio::test]
async fn mcp_stdio_search_roundtrip() -> Result<(), Box<dyn std::error::Error>>
{
    let tempdir = tempfile::tempdir()?;
    setup_fixture(tempdir.path())?;

    let bin = pipeline_kb_bin()?;
    let transport = TokioChildProcess::new(
        tokio::process::Command::new(bin).configure(|cmd| {
            cmd.arg("mcp")
                .arg("--quiet")
                .env("PIPELINE_KB_DIR", tempdir.path())
                .env("GEMINI_API_KEY", "test-key");
        }),
    )?;

    let client = ().serve(transport).await?;

    let args = json!({
        "query": "victoria xgboost training",
        "limit": 5,
        "includeSnippet": true
    });

    let result = client
        .peer()
        .call_tool(CallToolRequestParams::new("pipeline_search")
                .with_arguments(args.as_object().unwrap().clone()))
        .await?;

    let structured = result.structured_content.expect("structured content");
    let results = structured
        .get("results")
        .and_then(|v| v.as_array())
        .expect("results array");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].get("docId").and_then(|v| v.as_u64()), Some(1001));
    assert_eq!(
        results[0].get("docType").and_then(|v| v.as_str()),
        Some("training-log")
    );
    let snippet = results[0]
        .get("snippet")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    assert!(snippet.contains("1: XGBoost training finished"));

    // Nothing matches: answered without contacting the generation service.
    let ask_args = json!({ "question": "ok to go" });
    let ask_result = client
        .peer()
        .call_tool(CallToolRequestParams::new("pipeline_ask")
                .with_arguments(ask_args.as_object().unwrap().clone()))
        .await?;
    let answer = ask_result.structured_content.expect("structured answer");
    assert_eq!(answer["sources"], json!([]));
    assert_eq!(answer["tokensUsed"], 0);

    client.cancel().await?;
    Ok(())
}

#[test]
fn cli_search_json_and_status() -> Result<(), Box<dyn std::error::Error>> {
    let tempdir = tempfile::tempdir()?;
    setup_fixture(tempdir.path())?;
    let bin = pipeline_kb_bin()?;

    let output = std::process::Command::new(&bin)
        .args(["search", "feature revenue", "--json", "--quiet"])
        .env("PIPELINE_KB_DIR", tempdir.path())
        .output()?;
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(parsed["results"][0]["docId"], 1000);
    assert_eq!(parsed["results"][0]["docType"], "feature-engineering");

    let output = std::process::Command::new(&bin)
        .args(["status", "--json", "--quiet"])
        .env("PIPELINE_KB_DIR", tempdir.path())
        .output()?;
    assert!(output.status.success());
    let status: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(status["documents"], 3);
    assert_eq!(status["contributors"]["Maria"], 1);
    assert_eq!(status["contributors"]["Victoria"], 2);
    assert!(
        status["diagnostics"]
            .as_array()
            .unwrap()
            .iter()
            .any(|d| d["group"] == "supporting" && d["kind"] == "missing")
    );

    Ok(())
}

#[test]
fn ask_without_api_key_refuses_to_start() -> Result<(), Box<dyn std::error::Error>>
{
    let tempdir = tempfile::tempdir()?;
    setup_fixture(tempdir.path())?;

    let output = std::process::Command::new(pipeline_kb_bin()?)
        .args(["ask", "What model was used?", "--quiet"])
        .env("PIPELINE_KB_DIR", tempdir.path())
        .env_remove("GEMINI_API_KEY")
        .output()?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("GEMINI_API_KEY"));
    Ok(())
}

fn pipeline_kb_bin() -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Ok(bin) = std::env::var("CARGO_BIN_EXE_pipeline-kb") {
        return Ok(PathBuf::from(bin));
    }

    let mut path = std::env::current_exe()?;
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("pipeline-kb");

    if cfg!(windows) {
        path.set_extension("exe");
    }

    Ok(path)
}
