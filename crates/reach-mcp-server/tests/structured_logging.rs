use reach_core::providers::sandbox::SandboxHandles;
use reach_core::providers::Providers;
use reach_mcp_server::config::ServerConfig;
use reach_mcp_server::server::serve;
use reach_mcp_server::tools::ToolContext;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[tokio::test]
async fn test_tool_calls_emit_structured_events() {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let buffer_clone = buffer.clone();

    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_writer(move || MockWriter(buffer_clone.clone()))
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let ctx = ToolContext::new(ServerConfig::default(), Providers::sandbox());
    let input = concat!(
        "{\"jsonrpc\":\"2.0\",\"method\":\"tools/call\",\"id\":1,\"params\":{\"name\":\"calculate_roi\",\"arguments\":{\"spend\":10,\"revenue\":20}}}\n",
        "{\"jsonrpc\":\"2.0\",\"method\":\"tools/call\",\"id\":2,\"params\":{\"name\":\"pause_campaign\",\"arguments\":{\"campaign_id\":\"ghost\",\"action\":\"pause\"}}}\n",
        "oops\n"
    );
    let mut out = Vec::new();
    serve(&ctx, input.as_bytes(), &mut out).await.unwrap();

    let output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    assert!(output.contains("\"event\":\"tool_call_start\""));
    assert!(output.contains("\"tool\":\"calculate_roi\""));
    assert!(output.contains("\"outcome\":\"ok\""));
    assert!(output.contains("\"outcome\":\"app_error\""));
    assert!(output.contains("\"code\":\"E_NOT_FOUND\""));
    assert!(output.contains("\"event\":\"json_parse_error\""));
    assert!(output.contains("\"rid\":\"r-"));
    assert!(output.contains("\"timestamp\""));

    // Logs never leak onto the protocol stream.
    let stdout = String::from_utf8(out).unwrap();
    assert_eq!(stdout.lines().count(), 2);
    assert!(!stdout.contains("tool_call_start"));
}

#[tokio::test]
async fn test_slow_provider_logs_timeout() {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let buffer_clone = buffer.clone();

    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_writer(move || MockWriter(buffer_clone.clone()))
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let sb = SandboxHandles::new();
    sb.email.set_delay(Duration::from_secs(30));
    let cfg = ServerConfig {
        timeout_ms: 50,
        ..ServerConfig::default()
    };
    let ctx = ToolContext::new(cfg, sb.providers());
    let input = "{\"jsonrpc\":\"2.0\",\"method\":\"tools/call\",\"id\":9,\"params\":{\"name\":\"send_email_campaign\",\"arguments\":{\"name\":\"n\",\"subject\":\"s\",\"html_content\":\"<p>h</p>\",\"list_ids\":[\"l-1\"]}}}\n";
    let mut out = Vec::new();
    serve(&ctx, input.as_bytes(), &mut out).await.unwrap();

    let stdout = String::from_utf8(out).unwrap();
    assert!(stdout.contains("E_TIMEOUT"), "{stdout}");
    assert!(sb.email.sent().is_empty());

    let output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    assert!(output.contains("\"event\":\"tool_call_timeout\""));
    assert!(output.contains("\"tool\":\"send_email_campaign\""));
    assert!(output.contains("\"code\":\"E_TIMEOUT\""));
}

struct MockWriter(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
