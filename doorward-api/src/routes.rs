//! API route configuration.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

/// Creates the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Decisions
        .route("/verify-access", post(handlers::verify_access))
        // Operator invalidation
        .route("/clear-access-cache", post(handlers::clear_access_cache))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{NaiveDate, NaiveTime, Weekday};
    use async_trait::async_trait;
    use tower::ServiceExt;

    use doorward_access::{AccessCache, AccessService};
    use doorward_core::error::{DoorwardError, Result};
    use doorward_core::traits::{FixedClock, ScheduleGateway};
    use doorward_core::types::{
        GrantMatch, GrantQuery, Identity, Role, Room, Schedule, Sensor, Suspension, TimeWindow,
        User,
    };
    use doorward_store::MemoryStore;

    use crate::state::ApiConfig;

    fn seeded_store() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.insert_room(Room {
            id: "room-1".into(),
            name: "Lab".into(),
            notification_topic: None,
        });
        for sensor in ["S1", "S2", "S3"] {
            store.insert_sensor(Sensor {
                id: sensor.into(),
                room_id: "room-1".into(),
            });
        }
        for (id, name, nfc) in [("u1", "Ada", "N1"), ("u2", "Grace", "N2")] {
            store.insert_user(User {
                id: id.into(),
                name: name.into(),
                fingerprint_id: None,
                nfc_id: Some(nfc.into()),
            });
        }
        store.insert_role(Role {
            id: "role-1".into(),
            name: "Staff".into(),
            user_ids: vec!["u1".into(), "u2".into()],
        });
        store.insert_schedule(Schedule {
            id: "sch-1".into(),
            name: "Office hours".into(),
            active: true,
            windows: vec![TimeWindow::new(
                Weekday::Mon,
                NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            )],
            role_ids: vec!["role-1".into()],
            room_ids: vec!["room-1".into()],
        });
        store.insert_suspension(Suspension {
            id: "susp-1".into(),
            user_id: "u2".into(),
            is_permanent: true,
            start_date: None,
            end_date: None,
        });
        Arc::new(store)
    }

    struct UnreachableStore;

    #[async_trait]
    impl ScheduleGateway for UnreachableStore {
        async fn find_grant(&self, _query: &GrantQuery) -> Result<Option<GrantMatch>> {
            Err(DoorwardError::Store("dial tcp: connection refused".into()))
        }

        async fn find_identity(&self, _sensor_id: &str, _key: &str) -> Result<Option<Identity>> {
            Err(DoorwardError::Store("dial tcp: connection refused".into()))
        }
    }

    fn state_with(
        gateway: Arc<dyn ScheduleGateway>,
        sink: Arc<MemoryStore>,
        config: ApiConfig,
    ) -> Arc<AppState> {
        let monday_morning = NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let service = AccessService::new(Arc::new(AccessCache::new()), gateway, sink)
            .with_clock(Arc::new(FixedClock::new(monday_morning)));
        Arc::new(AppState::new(config, service))
    }

    fn test_state(config: ApiConfig) -> (Arc<AppState>, Arc<MemoryStore>) {
        let store = seeded_store();
        (state_with(store.clone(), store.clone(), config), store)
    }

    fn clear_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn verify_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/verify-access")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (state, _) = test_state(ApiConfig::default());
        let response = create_router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["cachedSensors"], 0);
    }

    #[tokio::test]
    async fn test_verify_granted() {
        let (state, store) = test_state(ApiConfig::default());
        let response = create_router(state.clone())
            .oneshot(verify_request(r#"{"sensorId":"S1","key":"N1","type":"NFC"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Access granted");

        assert!(state.service.drain(Duration::from_secs(1)).await);
        let records = store.audit_records();
        assert_eq!(records.len(), 1);
        assert!(records[0].granted);
    }

    #[tokio::test]
    async fn test_verify_greets_by_name() {
        let config = ApiConfig {
            include_display_name: true,
            ..ApiConfig::default()
        };
        let (state, _) = test_state(config);
        let response = create_router(state)
            .oneshot(verify_request(r#"{"sensorId":"S1","key":"N1","type":"NFC"}"#))
            .await
            .unwrap();

        assert_eq!(body_text(response).await, "Access Granted#Ada");
    }

    #[tokio::test]
    async fn test_verify_suspended_user_denied() {
        let (state, store) = test_state(ApiConfig::default());
        let response = create_router(state.clone())
            .oneshot(verify_request(r#"{"sensorId":"S1","key":"N2","type":"NFC"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "No matching schedule found");

        assert!(state.service.drain(Duration::from_secs(1)).await);
        let records = store.audit_records();
        assert!(records.len() <= 1);
        assert!(records.iter().all(|r| !r.granted && r.reason == "no matching schedule"));
    }

    #[tokio::test]
    async fn test_verify_malformed_body() {
        for body in [
            "{not json",
            r#"{"sensorId":"S1","key":"N1","type":"IRIS"}"#,
            r#"{"sensorId":"S1","type":"NFC"}"#,
            r#"{"sensorId":"","key":"N1","type":"NFC"}"#,
        ] {
            let (state, store) = test_state(ApiConfig::default());
            let response = create_router(state.clone())
                .oneshot(verify_request(body))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
            assert!(state.service.drain(Duration::from_secs(1)).await);
            assert_eq!(store.stats().grant_queries, 0);
            assert!(store.audit_records().is_empty());
        }
    }

    #[tokio::test]
    async fn test_verify_store_failure_is_500() {
        let sink = seeded_store();
        let state = state_with(Arc::new(UnreachableStore), sink.clone(), ApiConfig::default());
        let response = create_router(state.clone())
            .oneshot(verify_request(r#"{"sensorId":"S1","key":"N1","type":"NFC"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Internal server error");

        assert!(state.service.drain(Duration::from_secs(1)).await);
        assert!(sink.audit_records().is_empty());
        assert_eq!(state.service.cache_stats().total_entries, 0);
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let (state, _) = test_state(ApiConfig::default());
        let app = create_router(state.clone());

        for sensor in ["S1", "S2", "S3"] {
            let body = format!(r#"{{"sensorId":"{sensor}","key":"N1","type":"NFC"}}"#);
            let response = app.clone().oneshot(verify_request(&body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(state.service.cache_stats().valid_entries, 3);

        let response = app
            .clone()
            .oneshot(clear_request("/clear-access-cache?sensorIds=S1,S2"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Cache cleared for sensorIds: S1,S2");
        assert_eq!(state.service.cache_stats().valid_entries, 1);

        let response = app
            .oneshot(clear_request("/clear-access-cache"))
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "Cache cleared");
        assert_eq!(state.service.cache_stats().total_entries, 0);
    }

    #[tokio::test]
    async fn test_clear_cache_blank_ids_remove_nothing() {
        let (state, _) = test_state(ApiConfig::default());
        let app = create_router(state.clone());

        for sensor in ["S1", "S2"] {
            let body = format!(r#"{{"sensorId":"{sensor}","key":"N1","type":"NFC"}}"#);
            app.clone().oneshot(verify_request(&body)).await.unwrap();
        }

        for uri in ["/clear-access-cache?sensorIds=,", "/clear-access-cache?sensorIds=%20,%20"] {
            let response = app.clone().oneshot(clear_request(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "uri: {uri}");
            assert_eq!(state.service.cache_stats().valid_entries, 2, "uri: {uri}");
        }
    }
}
