// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! End-to-end stream tests against an in-process collector.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use prost::Message;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tonic::codec::CompressionEncoding;
use tonic::{Request, Response, Status};

use gosight_protocol::pb;
use gosight_protocol::{StreamService, StreamServiceServer};

use gosight_agent::command::CommandDispatcher;
use gosight_agent::health::{Health, Signal};
use gosight_agent::meta::{Meta, MetaKind};
use gosight_agent::model::{LogEntry, LogPayload, Metric, MetricPayload, PayloadIdentity};
use gosight_agent::sender::encode;
use gosight_agent::sender::logs::LogsSender;
use gosight_agent::sender::{CommandHandler, ConnectionConfig, ConnectionManager, StreamSender};

use opentelemetry_proto::tonic::collector::logs::v1::logs_service_server::{
    LogsService, LogsServiceServer,
};
use opentelemetry_proto::tonic::collector::logs::v1::{
    ExportLogsServiceRequest, ExportLogsServiceResponse,
};

/// Collector double: records inbound frames and optionally pushes one
/// command down each new stream.
struct MockCollector {
    frames: mpsc::Sender<pb::StreamPayload>,
    command: Mutex<Option<pb::CommandRequest>>,
}

#[tonic::async_trait]
impl StreamService for MockCollector {
    type StreamStream =
        Pin<Box<dyn Stream<Item = Result<pb::StreamResponse, Status>> + Send + 'static>>;

    async fn stream(
        &self,
        request: Request<tonic::Streaming<pb::StreamPayload>>,
    ) -> Result<Response<Self::StreamStream>, Status> {
        let mut inbound = request.into_inner();
        let frames = self.frames.clone();
        let command = self.command.lock().unwrap().take();

        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            if let Some(command) = command {
                let _ = tx
                    .send(Ok(pb::StreamResponse {
                        status: "ok".to_string(),
                        command: Some(command),
                    }))
                    .await;
            }
            while let Ok(Some(frame)) = inbound.message().await {
                if frames.send(frame).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }
}

struct MockLogsCollector {
    requests: mpsc::Sender<ExportLogsServiceRequest>,
}

#[tonic::async_trait]
impl LogsService for MockLogsCollector {
    async fn export(
        &self,
        request: Request<ExportLogsServiceRequest>,
    ) -> Result<Response<ExportLogsServiceResponse>, Status> {
        let _ = self.requests.send(request.into_inner()).await;
        Ok(Response::new(ExportLogsServiceResponse::default()))
    }
}

async fn start_server(
    command: Option<pb::CommandRequest>,
) -> (
    String,
    mpsc::Receiver<pb::StreamPayload>,
    mpsc::Receiver<ExportLogsServiceRequest>,
) {
    let (frames_tx, frames_rx) = mpsc::channel(32);
    let (logs_tx, logs_rx) = mpsc::channel(32);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let stream_service = StreamServiceServer::new(MockCollector {
        frames: frames_tx,
        command: Mutex::new(command),
    })
    .accept_compressed(CompressionEncoding::Gzip)
    .send_compressed(CompressionEncoding::Gzip);
    let logs_service = LogsServiceServer::new(MockLogsCollector { requests: logs_tx })
        .accept_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Gzip);

    tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(stream_service)
            .add_service(logs_service)
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    (addr.to_string(), frames_rx, logs_rx)
}

fn manager_for(server_url: &str) -> Arc<ConnectionManager> {
    Arc::new(ConnectionManager::new(ConnectionConfig {
        server_url: server_url.to_string(),
        ..Default::default()
    }))
}

fn test_meta() -> Arc<Meta> {
    let mut meta = Meta {
        agent_id: "agent-it".into(),
        host_id: "host-it".into(),
        hostname: "it-host".into(),
        kind: MetaKind::Host,
        ..Default::default()
    };
    meta.refresh_endpoint_id();
    Arc::new(meta)
}

async fn wait_ready(sender: &StreamSender) {
    for _ in 0..100 {
        if sender.is_ready() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("stream never became ready");
}

#[tokio::test]
async fn test_metric_frame_reaches_collector() {
    let (addr, mut frames, _logs) = start_server(None).await;
    let conn = manager_for(&addr);
    let health = Arc::new(Health::new());
    let cancel = CancellationToken::new();

    let sender = StreamSender::new(
        "metrics",
        Signal::Metrics,
        Arc::clone(&conn),
        Arc::clone(&health),
        None,
        cancel.clone(),
    );
    let task = Arc::clone(&sender).start();
    wait_ready(&sender).await;

    let meta = test_meta();
    let payload = MetricPayload {
        identity: PayloadIdentity::from_meta(&meta, SystemTime::now()),
        metrics: vec![Metric::gauge(
            "System",
            "CPU",
            "usage_percent",
            42.0,
            "percent",
        )],
        meta,
    };
    sender
        .send_with_retry(encode::metric_frame(&payload))
        .await
        .unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(5), frames.recv())
        .await
        .expect("no frame within deadline")
        .expect("stream ended early");
    let Some(pb::stream_payload::Payload::Metric(bytes)) = frame.payload else {
        panic!("expected a metric frame");
    };
    let decoded = pb::MetricPayload::decode(bytes.as_slice()).unwrap();
    assert_eq!(decoded.agent_id, "agent-it");
    assert_eq!(decoded.metrics.len(), 1);
    assert_eq!(decoded.metrics[0].name, "usage_percent");
    assert_eq!(decoded.meta.unwrap().kind, "host");
    assert_eq!(health.snapshot(Signal::Metrics).sent, 1);

    cancel.cancel();
    let _ = task.await;
}

#[tokio::test]
async fn test_shell_command_round_trip() {
    let marker_dir = tempfile::TempDir::new().unwrap();
    std::fs::write(marker_dir.path().join("marker.txt"), "x").unwrap();

    let command = pb::CommandRequest {
        command_type: "shell".into(),
        command: "ls".into(),
        args: vec![marker_dir.path().to_string_lossy().to_string()],
    };
    let (addr, mut frames, _logs) = start_server(Some(command)).await;
    let conn = manager_for(&addr);
    let health = Arc::new(Health::new());
    let cancel = CancellationToken::new();

    let dispatcher: Arc<dyn CommandHandler> = Arc::new(CommandDispatcher::new());
    let sender = StreamSender::new(
        "metrics",
        Signal::Metrics,
        conn,
        Arc::clone(&health),
        Some(dispatcher),
        cancel.clone(),
    );
    let task = Arc::clone(&sender).start();
    wait_ready(&sender).await;

    let frame = tokio::time::timeout(Duration::from_secs(10), frames.recv())
        .await
        .expect("no command response within deadline")
        .expect("stream ended early");
    let Some(pb::stream_payload::Payload::CommandResponse(response)) = frame.payload else {
        panic!("expected a command response frame");
    };
    assert!(response.success, "command failed: {}", response.error_message);
    assert!(response.output.contains("marker.txt"));
    assert_eq!(health.commands(), 1);

    cancel.cancel();
    let _ = task.await;
}

#[tokio::test]
async fn test_disallowed_command_reports_allow_list() {
    let command = pb::CommandRequest {
        command_type: "shell".into(),
        command: "rm".into(),
        args: vec!["-rf".into(), "/tmp/whatever".into()],
    };
    let (addr, mut frames, _logs) = start_server(Some(command)).await;
    let conn = manager_for(&addr);
    let cancel = CancellationToken::new();

    let dispatcher: Arc<dyn CommandHandler> = Arc::new(CommandDispatcher::new());
    let sender = StreamSender::new(
        "metrics",
        Signal::Metrics,
        conn,
        Arc::new(Health::new()),
        Some(dispatcher),
        cancel.clone(),
    );
    let task = Arc::clone(&sender).start();
    wait_ready(&sender).await;

    let frame = tokio::time::timeout(Duration::from_secs(10), frames.recv())
        .await
        .expect("no command response within deadline")
        .expect("stream ended early");
    let Some(pb::stream_payload::Payload::CommandResponse(response)) = frame.payload else {
        panic!("expected a command response frame");
    };
    assert!(!response.success);
    assert!(response.error_message.contains("'rm'"));
    assert!(response.error_message.contains("uptime"));

    cancel.cancel();
    let _ = task.await;
}

#[tokio::test]
async fn test_log_payload_exports_over_otlp() {
    let (addr, _frames, mut logs) = start_server(None).await;
    let conn = manager_for(&addr);
    let health = Arc::new(Health::new());
    let cancel = CancellationToken::new();

    let sender = LogsSender::new(conn, Arc::clone(&health), cancel.clone());
    let meta = test_meta();
    let payload = LogPayload {
        identity: PayloadIdentity::from_meta(&meta, SystemTime::now()),
        entries: vec![LogEntry {
            severity_text: "error".into(),
            body: "disk on fire".into(),
            source: "journald".into(),
            ..Default::default()
        }],
        meta,
    };

    sender.send_with_retry(&payload).await.unwrap();

    let request = tokio::time::timeout(Duration::from_secs(5), logs.recv())
        .await
        .expect("no export within deadline")
        .expect("channel closed");
    assert_eq!(request.resource_logs.len(), 1);
    let scope_logs = &request.resource_logs[0].scope_logs;
    assert_eq!(scope_logs.len(), 1);
    assert_eq!(scope_logs[0].scope.as_ref().unwrap().name, "journald");
    let record = &scope_logs[0].log_records[0];
    assert_eq!(record.severity_number, 17);
    assert_eq!(record.severity_text, "error");
    assert_eq!(health.snapshot(Signal::Logs).sent, 1);

    cancel.cancel();
}
