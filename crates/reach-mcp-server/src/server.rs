use crate::config::ServerConfig;
use crate::resources;
use crate::tools::{self, ToolContext};
use anyhow::Result;
use reach_core::monitor::{Intervals, Monitor};
use reach_core::providers::Providers;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

static RID: AtomicU64 = AtomicU64::new(1);

fn next_rid() -> String {
    let n = RID.fetch_add(1, Ordering::Relaxed);
    format!("r-{n:06}")
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Option<Value>,
    id: Option<Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Option<Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl JsonRpcResponse {
    fn ok(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }
}

/// Wraps a tool's output as an MCP `CallToolResult`.
fn call_tool_result(res: &Value) -> Value {
    match res.get("error") {
        Some(_) => json!({
            "content": [{
                "type": "text",
                "text": serde_json::to_string_pretty(res).unwrap_or_default()
            }],
            "isError": true
        }),
        None => json!({
            "content": [{
                "type": "text",
                "text": res.get("summary").and_then(|s| s.as_str()).unwrap_or_default()
            }],
            "structuredContent": res.get("data").cloned().unwrap_or(Value::Null),
            "isError": false
        }),
    }
}

pub struct Server;

impl Server {
    /// Serves stdio until EOF, with the background monitors running alongside.
    pub async fn run(cfg: ServerConfig, providers: Providers, monitor: bool) -> Result<()> {
        let ctx = ToolContext::new(cfg.clone(), providers);

        let monitor = monitor.then(|| {
            Monitor::spawn(
                ctx.monitor_context(),
                Intervals {
                    metrics: Duration::from_secs(cfg.metrics_poll_secs),
                    significance: Duration::from_secs(cfg.significance_poll_secs),
                },
            )
        });

        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        let served = serve(&ctx, stdin, stdout).await;

        if let Some(m) = monitor {
            m.shutdown().await;
        }
        tracing::info!(event = "server_stop");
        served
    }
}

/// Reads newline-delimited JSON-RPC from `reader` and answers on `writer`.
pub async fn serve<R, W>(ctx: &ToolContext, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let cfg = &ctx.cfg;
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let rid = next_rid();

        if line.len() > cfg.max_msg_bytes {
            tracing::warn!(
                event = "limit_exceeded",
                rid = %rid,
                bytes_in = line.len(),
                max = cfg.max_msg_bytes
            );
            let resp = JsonRpcResponse::ok(
                None,
                call_tool_result(&json!({
                    "error": {
                        "code": "E_LIMIT_EXCEEDED",
                        "message": format!("message bytes={} > max={}", line.len(), cfg.max_msg_bytes)
                    }
                })),
            );
            write_response(&mut writer, &resp).await?;
            continue;
        }

        if line.trim().is_empty() {
            continue;
        }

        let req: JsonRpcRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(event = "json_parse_error", rid = %rid, error = %e);
                continue;
            }
        };

        let Some(resp) = dispatch(ctx, &rid, req, line.len()).await else {
            continue;
        };
        write_response(&mut writer, &resp).await?;
    }

    Ok(())
}

async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, resp: &JsonRpcResponse) -> Result<()> {
    let mut buf = serde_json::to_vec(resp)?;
    buf.push(b'\n');
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// `None` for notifications, which get no response.
async fn dispatch(
    ctx: &ToolContext,
    rid: &str,
    req: JsonRpcRequest,
    bytes_in: usize,
) -> Option<JsonRpcResponse> {
    let id = req.id.clone();
    let resp = match req.method.as_str() {
        "initialize" => JsonRpcResponse::ok(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {},
                    "resources": {}
                },
                "serverInfo": {
                    "name": "reach-mcp-server",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        ),
        "notifications/initialized" => {
            tracing::info!(event = "initialized", rid = %rid);
            return None;
        }
        "ping" => JsonRpcResponse::ok(id, json!({})),
        "tools/list" => JsonRpcResponse::ok(id, json!({ "tools": tools::list_tools() })),
        "tools/call" => match req.params {
            Some(params) => call_tool(ctx, rid, id, &params, bytes_in).await,
            None => JsonRpcResponse::error(id, -32602, "Missing params".to_string()),
        },
        "resources/list" => {
            JsonRpcResponse::ok(id, json!({ "resources": resources::list_resources() }))
        }
        "resources/read" => {
            let uri = req
                .params
                .as_ref()
                .and_then(|p| p.get("uri"))
                .and_then(|u| u.as_str());
            match uri {
                None => JsonRpcResponse::error(id, -32602, "Missing params: uri".to_string()),
                Some(uri) => match resources::read_resource(ctx, uri) {
                    Ok(Some(v)) => JsonRpcResponse::ok(id, v),
                    Ok(None) => {
                        JsonRpcResponse::error(id, -32002, format!("Resource not found: {uri}"))
                    }
                    Err(e) => {
                        tracing::error!(event = "resource_error", rid = %rid, uri = uri, error = %e);
                        JsonRpcResponse::error(id, -32603, e.to_string())
                    }
                },
            }
        }
        other if req.id.is_none() => {
            tracing::debug!(event = "notification_ignored", rid = %rid, method = other);
            return None;
        }
        other => JsonRpcResponse::error(id, -32601, format!("Method not found: {other}")),
    };
    Some(resp)
}

async fn call_tool(
    ctx: &ToolContext,
    rid: &str,
    id: Option<Value>,
    params: &Value,
    bytes_in: usize,
) -> JsonRpcResponse {
    let name = params.get("name").and_then(|s| s.as_str()).unwrap_or("");
    if !tools::is_known_tool(name) {
        tracing::warn!(event = "unknown_tool", rid = %rid, tool = name);
        return JsonRpcResponse::error(id, -32602, format!("Unknown tool: {name}"));
    }
    let default_args = json!({});
    let args = params.get("arguments").unwrap_or(&default_args);
    let timeout_ms = ctx.cfg.timeout_ms;

    let start = std::time::Instant::now();
    tracing::info!(
        event = "tool_call_start",
        rid = %rid,
        rpc_id = ?id,
        tool = name,
        bytes_in = bytes_in
    );

    let result = match timeout(
        Duration::from_millis(timeout_ms),
        tools::handle_call(ctx, name, args),
    )
    .await
    {
        Ok(res) => res,
        Err(_) => {
            tracing::warn!(
                event = "tool_call_timeout",
                rid = %rid,
                rpc_id = ?id,
                tool = name,
                duration_ms = start.elapsed().as_millis() as u64,
                code = "E_TIMEOUT"
            );
            Ok(json!({
                "error": {
                    "code": "E_TIMEOUT",
                    "message": format!("Request exceeded {timeout_ms}ms")
                }
            }))
        }
    };

    let dur = start.elapsed().as_millis() as u64;
    let value = match result {
        Ok(val) => {
            match val.pointer("/error/code").and_then(|v| v.as_str()) {
                Some(code) => tracing::info!(
                    event = "tool_call_done",
                    rid = %rid,
                    rpc_id = ?id,
                    tool = name,
                    duration_ms = dur,
                    outcome = "app_error",
                    code = code
                ),
                None => tracing::info!(
                    event = "tool_call_done",
                    rid = %rid,
                    rpc_id = ?id,
                    tool = name,
                    duration_ms = dur,
                    outcome = "ok"
                ),
            }
            val
        }
        Err(e) => {
            tracing::error!(
                event = "tool_call_crash",
                rid = %rid,
                rpc_id = ?id,
                tool = name,
                duration_ms = dur,
                error = %e
            );
            json!({
                "error": {
                    "code": "E_INTERNAL",
                    "message": format!("{e:#}")
                }
            })
        }
    };

    JsonRpcResponse::ok(id, call_tool_result(&value))
}
