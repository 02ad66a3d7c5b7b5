//! Integration tests for the form-agent HTTP server

#[cfg(feature = "server")]
mod server_tests {
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use synheart_form_agent::analysis::UnconfiguredReasoner;
    use synheart_form_agent::config::AnalysisConfig;
    use synheart_form_agent::server::{run, ServerConfig};

    async fn start_server() -> (String, tokio::sync::oneshot::Sender<()>) {
        let config = ServerConfig::new(0, AnalysisConfig::default());
        let reasoning = Arc::new(UnconfiguredReasoner::new("no key in tests"));

        let (addr, shutdown_tx) = run(config, reasoning)
            .await
            .expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        (format!("http://{}", addr), shutdown_tx)
    }

    fn frame(timestamp: f64, x: f64, confidence: f64) -> serde_json::Value {
        json!({
            "timestamp": timestamp,
            "joints": {
                "leftWrist": {"x": x, "y": 0.5, "confidence": confidence},
                "rightWrist": {"x": x + 0.3, "y": 0.5, "confidence": confidence},
                "leftShoulder": {"x": 0.4, "y": 0.3, "confidence": confidence}
            }
        })
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (base, shutdown_tx) = start_server().await;

        let client = reqwest::Client::new();
        let response = client
            .get(format!("{}/health", base))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert!(body["version"].as_str().is_some());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_session_round_trip_without_credentials() {
        let (base, shutdown_tx) = start_server().await;
        let client = reqwest::Client::new();

        let started: serde_json::Value = client
            .post(format!("{}/session/start", base))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert!(started["session_id"].as_str().is_some());

        // Single frame
        let single: serde_json::Value = client
            .post(format!("{}/frames", base))
            .json(&frame(0.0, 0.2, 0.9))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(single["accepted"], 1);
        assert_eq!(single["buffered"], 1);
        assert_eq!(single["status"], "tracking");

        // Batch
        let frames: Vec<_> = (1..12).map(|i| frame(i as f64 * 0.1, 0.2, 0.9)).collect();
        let batch: serde_json::Value = client
            .post(format!("{}/frames", base))
            .json(&json!({ "frames": frames }))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(batch["accepted"], 11);
        assert_eq!(batch["frames_in_session"], 12);

        let result: serde_json::Value = client
            .post(format!("{}/session/stop", base))
            .json(&json!({ "exercise": "squat" }))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");

        // Usable frames but no credentials: neutral configuration failure
        assert_eq!(result["rep_count"], 0);
        assert_eq!(result["form_score"], 5.0);
        assert!(result["issues"][0]
            .as_str()
            .unwrap_or("")
            .starts_with("configuration:"));

        let state: serde_json::Value = client
            .get(format!("{}/state", base))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");
        assert_eq!(state["phase"], "idle");
        assert_eq!(state["session_id"], started["session_id"]);
        assert_eq!(state["final_result"], result);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_empty_session_returns_no_movement() {
        let (base, shutdown_tx) = start_server().await;
        let client = reqwest::Client::new();

        client
            .post(format!("{}/session/start", base))
            .send()
            .await
            .expect("Failed to send request");

        // Below the encoding threshold: buffered, but nothing to encode
        let frames: Vec<_> = (0..5).map(|i| frame(i as f64 * 0.1, 0.2, 0.2)).collect();
        client
            .post(format!("{}/frames", base))
            .json(&json!({ "frames": frames }))
            .send()
            .await
            .expect("Failed to send request");

        let result: serde_json::Value = client
            .post(format!("{}/session/stop", base))
            .json(&json!({ "exercise": "plank" }))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");

        assert_eq!(result["form_score"], 5.0);
        assert_eq!(result["issues"], json!([]));
        assert_eq!(result["feedback"], "No movement data recorded in this session");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let (base, shutdown_tx) = start_server().await;

        // Send OPTIONS request to check CORS
        let client = reqwest::Client::new();
        let response = client
            .request(reqwest::Method::OPTIONS, format!("{}/frames", base))
            .header("Origin", "http://localhost")
            .header("Access-Control-Request-Method", "POST")
            .send()
            .await
            .expect("Failed to send request");

        // CORS preflight should succeed
        assert!(
            response.status().is_success() || response.status() == reqwest::StatusCode::NO_CONTENT,
            "CORS preflight failed: {}",
            response.status()
        );

        let _ = shutdown_tx.send(());
    }
}
