use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

const TREE_CSV: &str = "NombreEtiqueta;cuadricula;lat;long;Fecha;Operador\n\
    A,B;G1;40,0;-3,0;01/01/2023;ana\n\
    C;G2;41,0;-3,1;02/01/2023;luis\n\
    D;G2;41,5;-3,2;02/01/2023 10:30:00;luis\n\
    E;G3;42,0;-3,3;31/13/2023;eva\n";

#[derive(Debug, Deserialize)]
struct Selection {
    grid_cells: Vec<String>,
    date_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Point {
    x: String,
    y: usize,
}

#[derive(Debug, Deserialize)]
struct Chart {
    points: Vec<Point>,
}

#[derive(Debug, Deserialize)]
struct Metrics {
    trees: usize,
}

#[derive(Debug, Deserialize)]
struct View {
    metrics: Metrics,
    grid_chart: Chart,
    date_chart: Chart,
    table: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DashboardResponse {
    selection: Selection,
    error: Option<String>,
    view: Option<View>,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn write_data_file(name: &str, contents: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("tree_dashboard_http_{name}_{}_{}.csv", std::process::id(), nanos));
    std::fs::write(&path, contents).expect("write data file");
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/health")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server(data_path: String, extra_env: &[(&str, &str)], register_cleanup: bool) -> TestServer {
    let port = pick_free_port();
    let child = Command::new(env!("CARGO_BIN_EXE_tree_dashboard"))
        .env("PORT", port.to_string())
        .env("TREE_DATA_PATH", data_path)
        .env("RUST_LOG", "info")
        .envs(extra_env.iter().copied())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    if register_cleanup {
        cleanup::register(child.id());
    }

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server(write_data_file("shared", TREE_CSV), &[], true).await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn get_dashboard(client: &Client, base_url: &str, session: &str) -> DashboardResponse {
    client
        .get(format!("{base_url}/api/dashboard?session={session}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn interact(client: &Client, base_url: &str, session: &str, body: serde_json::Value) -> DashboardResponse {
    let response = client
        .post(format!("{base_url}/api/interaction?session={session}"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    response.json().await.unwrap()
}

#[tokio::test]
async fn http_unfiltered_dashboard() {
    let server = shared_server().await;
    let client = Client::new();

    let dashboard = get_dashboard(&client, &server.base_url, "fresh").await;
    assert!(dashboard.error.is_none());
    assert!(dashboard.selection.grid_cells.is_empty());
    assert!(dashboard.selection.date_key.is_none());

    let view = dashboard.view.expect("view");
    assert_eq!(view.metrics.trees, 4);
    assert_eq!(view.table.len(), 4);
    let grid_total: usize = view.grid_chart.points.iter().map(|point| point.y).sum();
    assert_eq!(grid_total, view.metrics.trees);
    assert_eq!(view.grid_chart.points[0].x, "G2");
    let dates: Vec<&str> = view.date_chart.points.iter().map(|point| point.x.as_str()).collect();
    assert_eq!(dates, vec!["01/01", "02/01"]);
}

#[tokio::test]
async fn http_clicks_filter_and_reset_clears() {
    let server = shared_server().await;
    let client = Client::new();
    let session = "clicks";

    let after_grid = interact(
        &client,
        &server.base_url,
        session,
        serde_json::json!({ "type": "click_grid_bar", "points": [{ "x": "G2" }] }),
    )
    .await;
    assert_eq!(after_grid.selection.grid_cells, vec!["G2"]);
    assert_eq!(after_grid.view.as_ref().unwrap().metrics.trees, 2);

    let after_date = interact(
        &client,
        &server.base_url,
        session,
        serde_json::json!({ "type": "click_date_point", "points": [{ "x": "02/01" }] }),
    )
    .await;
    assert_eq!(after_date.selection.date_key.as_deref(), Some("02/01"));
    assert_eq!(after_date.view.as_ref().unwrap().metrics.trees, 2);

    let replaced = interact(
        &client,
        &server.base_url,
        session,
        serde_json::json!({ "type": "click_grid_bar", "points": [{ "x": "G1" }] }),
    )
    .await;
    assert_eq!(replaced.selection.grid_cells, vec!["G1"]);
    assert_eq!(replaced.view.as_ref().unwrap().metrics.trees, 0);

    let reset = interact(&client, &server.base_url, session, serde_json::json!({ "type": "reset" })).await;
    assert!(reset.selection.grid_cells.is_empty());
    assert!(reset.selection.date_key.is_none());
    assert_eq!(reset.view.unwrap().metrics.trees, 4);
}

#[tokio::test]
async fn http_sessions_are_isolated() {
    let server = shared_server().await;
    let client = Client::new();

    interact(
        &client,
        &server.base_url,
        "isolated-a",
        serde_json::json!({ "type": "select_grid_cells", "cells": ["G1", "G3"] }),
    )
    .await;

    let a = get_dashboard(&client, &server.base_url, "isolated-a").await;
    let b = get_dashboard(&client, &server.base_url, "isolated-b").await;
    assert_eq!(a.selection.grid_cells, vec!["G1", "G3"]);
    assert_eq!(a.view.unwrap().metrics.trees, 2);
    assert!(b.selection.grid_cells.is_empty());
    assert_eq!(b.view.unwrap().metrics.trees, 4);
}

#[tokio::test]
async fn http_reset_form_redirects() {
    let server = shared_server().await;
    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let response = client
        .post(format!("{}/reset?session=form", server.base_url))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_redirection());
    assert_eq!(response.headers()["location"], "/?session=form");
}

#[tokio::test]
async fn http_rejects_bad_session_ids() {
    let server = shared_server().await;
    let response = Client::new()
        .get(format!("{}/api/dashboard?session=a%2Fb", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_unloadable_file_reports_diagnostic() {
    let server = spawn_server(write_data_file("broken", "this is not the expected table\n"), &[], false).await;
    let client = Client::new();

    let dashboard = get_dashboard(&client, &server.base_url, "default").await;
    assert!(dashboard.view.is_none());
    let message = dashboard.error.expect("diagnostic");
    assert!(message.contains("this is not the expected table"));

    let page = client
        .get(format!("{}/", server.base_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Could not load the tree data"));
}

#[tokio::test]
async fn http_accumulating_grid_clicks() {
    let server = spawn_server(
        write_data_file("accumulate", TREE_CSV),
        &[("TREE_GRID_SELECTION", "accumulate")],
        false,
    )
    .await;
    let client = Client::new();
    let session = "accumulate";

    let both = interact(
        &client,
        &server.base_url,
        session,
        serde_json::json!({ "type": "click_grid_bar", "points": [{ "x": "G1" }, { "x": "G3" }] }),
    )
    .await;
    assert_eq!(both.selection.grid_cells, vec!["G1", "G3"]);
    assert_eq!(both.view.unwrap().metrics.trees, 2);

    let more = interact(
        &client,
        &server.base_url,
        session,
        serde_json::json!({ "type": "click_grid_bar", "points": [{ "x": "G2" }] }),
    )
    .await;
    assert_eq!(more.selection.grid_cells, vec!["G1", "G2", "G3"]);
    assert_eq!(more.view.unwrap().metrics.trees, 4);
}
