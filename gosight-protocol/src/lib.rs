// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Wire types and the gRPC stream service for the GoSight agent, generated
//! from `proto/gosight.proto`.

pub mod pb {
    #![allow(clippy::derive_partial_eq_without_eq)]
    tonic::include_proto!("gosight.v1");
}

pub use pb::stream_service_client::StreamServiceClient;
pub use pb::stream_service_server::{StreamService, StreamServiceServer};

#[cfg(test)]
mod pb_test {
    use super::pb;
    use prost::Message;

    #[test]
    fn test_metric_payload_round_trip() {
        let payload = pb::MetricPayload {
            agent_id: "a-1".into(),
            host_id: "h-1".into(),
            hostname: "web-01".into(),
            endpoint_id: "ep-abc".into(),
            timestamp_unix_nano: 1_700_000_000_000_000_000,
            metrics: vec![pb::Metric {
                namespace: "System".into(),
                sub_namespace: "CPU".into(),
                name: "usage_percent".into(),
                timestamp_unix_nano: 1_700_000_000_000_000_000,
                unit: "percent".into(),
                r#type: "gauge".into(),
                value: 12.5,
                data_points: vec![],
                dimensions: [("core".to_string(), "0".to_string())].into(),
                statistic_values: Some(pb::StatisticValues {
                    minimum: 1.0,
                    maximum: 20.0,
                    sample_count: 4,
                    sum: 50.0,
                }),
            }],
            meta: Some(pb::Meta {
                agent_id: "a-1".into(),
                hostname: "web-01".into(),
                kind: "host".into(),
                ..Default::default()
            }),
        };

        let bytes = payload.encode_to_vec();
        let decoded = pb::MetricPayload::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_stream_payload_oneof() {
        let frame = pb::StreamPayload {
            payload: Some(pb::stream_payload::Payload::CommandResponse(
                pb::CommandResponse {
                    success: true,
                    output: "ok".into(),
                    error_message: String::new(),
                },
            )),
        };
        let bytes = frame.encode_to_vec();
        let decoded = pb::StreamPayload::decode(bytes.as_slice()).unwrap();
        match decoded.payload {
            Some(pb::stream_payload::Payload::CommandResponse(resp)) => {
                assert!(resp.success);
                assert_eq!(resp.output, "ok");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }
}
