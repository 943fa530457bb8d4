//! The health check and the request id plumbing around it.

use anyhow::Result;
use reqwest::StatusCode;
use uuid::Uuid;

use crate::helpers::TestApp;

#[tokio::test]
async fn healthcheck_ok() -> Result<()> {
    let TestApp {
        addr, http_client, ..
    } = TestApp::spawn().await?;

    let res = http_client
        .get(format!("http://{addr}/health-check"))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::OK, "Healthcheck FAILED!");

    Ok(())
}

#[tokio::test]
async fn every_response_carries_a_request_id() -> Result<()> {
    let TestApp {
        addr, http_client, ..
    } = TestApp::spawn().await?;

    let res = http_client
        .get(format!("http://{addr}/health-check"))
        .send()
        .await?;

    let req_id = res
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(Uuid::parse_str);
    assert!(
        matches!(req_id, Some(Ok(_))),
        "expected a uuid in x-request-id, got: {req_id:?}"
    );

    Ok(())
}

#[tokio::test]
async fn unknown_path_404() -> Result<()> {
    let TestApp {
        addr, http_client, ..
    } = TestApp::spawn().await?;

    let res = http_client
        .get(format!("http://{addr}/api/subscribe"))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    Ok(())
}
