use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::Json,
    routing::{get, post},
    Router,
};
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::error::ApiError;
use super::schemas::{
    ApplicationRequest, BanditUpdateResponse, EventsQuery, EventsResponse, HealthResponse,
    RecommendationRequest, RecommendationResponse, SummaryResponse,
};
use super::AppState;
use crate::copilot::underwriter_summary;
use crate::metrics::{MetricsSnapshot, OutcomeKind};
use crate::types::application::LoanApplication;
use crate::types::decision::ApprovalPrediction;
use crate::types::dealer::FeedbackEvent;
use crate::types::event::PredictionEvent;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        .route("/metrics/events", get(get_events))
        .route("/predict/approval", post(predict_approval))
        .route("/recommend/dealer-next-action", post(recommend_next_action))
        .route("/bandit/update", post(update_bandit))
        .route("/copilot/underwriter-summary", post(copilot_summary))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl AppState {
    /// Count a failed scoring or bandit request and convert it for the response
    fn request_failed(&self, endpoint: &str, err: impl Into<ApiError>) -> ApiError {
        let err = err.into();
        self.monitoring.record_outcome(OutcomeKind::Error);
        warn!(endpoint = endpoint, status = %err.status(), error = ?err, "Request failed");
        err
    }

    /// Score an application and record it with the monitor
    fn score(&self, app: &LoanApplication, start: Instant) -> Result<ApprovalPrediction, ApiError> {
        let prediction = self
            .classifier
            .predict(app)
            .map_err(|e| self.request_failed("predict", e))?;
        self.monitoring.record_prediction(
            PredictionEvent::new(app, &prediction),
            Some(start.elapsed()),
        );
        Ok(prediction)
    }
}

// ===== Route Handlers =====

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded: state.classifier.is_loaded(),
    })
}

async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.monitoring.snapshot())
}

/// Most recent prediction events, oldest first
async fn get_events(
    State(state): State<AppState>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> Result<Json<EventsResponse>, ApiError> {
    let Query(query) = query?;
    let events = state.monitoring.recent_events(query.limit());
    Ok(Json(EventsResponse {
        count: events.len(),
        events,
    }))
}

/// Predict credit approval risk for a single application
async fn predict_approval(
    State(state): State<AppState>,
    payload: Result<Json<ApplicationRequest>, JsonRejection>,
) -> Result<Json<ApprovalPrediction>, ApiError> {
    let start = Instant::now();
    let Json(req) = payload.map_err(|e| state.request_failed("predict", e))?;
    let app = LoanApplication::from(req);
    let prediction = state.score(&app, start)?;
    Ok(Json(prediction))
}

/// Thompson-sample the next action for a dealer
async fn recommend_next_action(
    State(state): State<AppState>,
    payload: Result<Json<RecommendationRequest>, JsonRejection>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| state.request_failed("recommend", e))?;

    if let Some(context) = &req.context {
        debug!(
            dealer_id = %req.dealer_id,
            region = ?context.region,
            volume_tier = ?context.volume_tier,
            risk_flag = ?context.risk_flag,
            "Dealer context"
        );
    }

    let recommendation = state
        .bandit
        .recommend(&req.dealer_id, req.available_actions.as_deref())
        .map_err(|e| state.request_failed("recommend", e))?;
    state.monitoring.record_recommendation();

    Ok(Json(RecommendationResponse {
        dealer_id: req.dealer_id,
        recommended_action: recommendation.action_id,
        note: format!(
            "Thompson Sampling recommendation over {} candidates",
            recommendation.candidates.len()
        ),
        candidates: recommendation.candidates,
    }))
}

/// Apply observed reward feedback to a dealer arm
async fn update_bandit(
    State(state): State<AppState>,
    payload: Result<Json<FeedbackEvent>, JsonRejection>,
) -> Result<Json<BanditUpdateResponse>, ApiError> {
    let Json(feedback) = payload.map_err(|e| state.request_failed("bandit_update", e))?;

    let stats = state
        .bandit
        .update(&feedback.dealer_id, &feedback.action_id, feedback.reward)
        .map_err(|e| state.request_failed("bandit_update", e))?;
    state.monitoring.record_bandit_update();

    info!(
        dealer_id = %feedback.dealer_id,
        action_id = %feedback.action_id,
        reward = feedback.reward,
        "Bandit feedback applied"
    );

    Ok(Json(BanditUpdateResponse {
        status: "ok".to_string(),
        message: "Bandit updated.".to_string(),
        dealer_id: feedback.dealer_id,
        action_id: feedback.action_id,
        successes: stats.successes,
        failures: stats.failures,
    }))
}

/// Score an application and render the underwriter narrative
async fn copilot_summary(
    State(state): State<AppState>,
    payload: Result<Json<ApplicationRequest>, JsonRejection>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let start = Instant::now();
    let Json(req) = payload.map_err(|e| state.request_failed("copilot", e))?;
    let app = LoanApplication::from(req);
    let prediction = state.score(&app, start)?;
    let summary = underwriter_summary(&app, &prediction);
    Ok(Json(SummaryResponse {
        prediction,
        summary,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewardPolicy;
    use crate::drift::ReferenceDistribution;
    use crate::metrics::MonitoringState;
    use crate::models::approval::tests::ConstantModel;
    use crate::models::{ApprovalClassifier, DealerBandit, ProbabilityModel};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state_with(model: Option<Arc<dyn ProbabilityModel>>) -> AppState {
        let arms = vec![
            "layout_a".to_string(),
            "layout_b".to_string(),
            "layout_c".to_string(),
        ];
        AppState::new(
            Arc::new(ApprovalClassifier::new(model, 0.4).unwrap()),
            Arc::new(DealerBandit::new(arms, RewardPolicy::Binary)),
            Arc::new(MonitoringState::new(
                100,
                50,
                ReferenceDistribution::uniform(10),
            )),
        )
    }

    fn test_state(risk: f64) -> AppState {
        state_with(Some(Arc::new(ConstantModel(risk))))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn application() -> Value {
        json!({
            "dealer_id": "D001",
            "vehicle_type": "suv",
            "region": "west",
            "applicant_income": 52000.0,
            "loan_amount": 14000.0,
            "vehicle_age": 4
        })
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(test_state(0.2));
        let response = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model_loaded"], true);
    }

    #[tokio::test]
    async fn test_predict_approval_records_metrics() {
        let state = test_state(0.2);
        let app = create_router(state.clone());

        let response = app
            .oneshot(post_json("/predict/approval", application()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["decision"], "APPROVE");
        assert_eq!(body["approval_risk"], 0.2);
        assert_eq!(body["threshold"], 0.4);
        assert_eq!(body["model_name"], "constant");

        let snapshot = state.monitoring.snapshot();
        assert_eq!(snapshot.total_requests, 1);
        assert_eq!(snapshot.approvals, 1);
        assert_eq!(snapshot.latency.count, 1);
        assert_eq!(snapshot.drift.observed_scores, 1);
    }

    #[tokio::test]
    async fn test_predict_review() {
        let app = create_router(test_state(0.85));
        let response = app
            .oneshot(post_json("/predict/approval", application()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["decision"], "REVIEW");
    }

    #[tokio::test]
    async fn test_predict_without_model_is_unavailable() {
        let state = state_with(None);
        let app = create_router(state.clone());

        let response = app
            .oneshot(post_json("/predict/approval", application()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_json(response).await["error"].is_string());

        let snapshot = state.monitoring.snapshot();
        assert_eq!(snapshot.total_errors, 1);
        assert_eq!(snapshot.total_requests, 0);
    }

    #[tokio::test]
    async fn test_predict_rejects_bad_input() {
        let state = test_state(0.2);
        let app = create_router(state.clone());

        let mut negative = application();
        negative["loan_amount"] = json!(-10.0);
        let response = app
            .clone()
            .oneshot(post_json("/predict/approval", negative))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post_json("/predict/approval", json!({"dealer_id": "D001"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert_eq!(state.monitoring.snapshot().total_errors, 2);
    }

    #[tokio::test]
    async fn test_recommend_with_default_arms() {
        let state = test_state(0.2);
        let app = create_router(state.clone());

        let response = app
            .oneshot(post_json(
                "/recommend/dealer-next-action",
                json!({"dealer_id": "D001", "context": {"region": "south"}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: RecommendationResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(body.dealer_id, "D001");
        assert_eq!(body.candidates, state.bandit.default_arms());
        assert!(body.candidates.contains(&body.recommended_action));
        assert_eq!(state.monitoring.snapshot().recommendations, 1);
    }

    #[tokio::test]
    async fn test_recommend_includes_learned_arms() {
        let state = test_state(0.2);
        for _ in 0..200 {
            state.bandit.update("D001", "sms_nudge", 1.0).unwrap();
            for arm in ["layout_a", "layout_b", "layout_c"] {
                state.bandit.update("D001", arm, 0.0).unwrap();
            }
        }
        let app = create_router(state);

        let response = app
            .oneshot(post_json(
                "/recommend/dealer-next-action",
                json!({"dealer_id": "D001"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: RecommendationResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(
            body.candidates,
            vec!["layout_a", "layout_b", "layout_c", "sms_nudge"]
        );
        assert_eq!(body.recommended_action, "sms_nudge");
    }

    #[tokio::test]
    async fn test_recommend_single_candidate() {
        let app = create_router(test_state(0.2));
        let response = app
            .oneshot(post_json(
                "/recommend/dealer-next-action",
                json!({"dealer_id": "D001", "available_actions": ["call"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["recommended_action"], "call");
    }

    #[tokio::test]
    async fn test_recommend_empty_candidates_rejected() {
        let state = test_state(0.2);
        let app = create_router(state.clone());
        let response = app
            .oneshot(post_json(
                "/recommend/dealer-next-action",
                json!({"dealer_id": "D001", "available_actions": []}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.monitoring.snapshot().total_errors, 1);
    }

    #[tokio::test]
    async fn test_bandit_update_accepts_arm_id_alias() {
        let state = test_state(0.2);
        let app = create_router(state.clone());

        let response = app
            .oneshot(post_json(
                "/bandit/update",
                json!({"dealer_id": "D009", "arm_id": "layout_b", "reward": 1}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["action_id"], "layout_b");
        assert_eq!(body["successes"], 1.0);
        assert_eq!(body["failures"], 0.0);

        let stats = state.bandit.arm("D009", "layout_b").unwrap();
        assert_eq!(stats.successes, 1.0);
        assert_eq!(state.monitoring.snapshot().bandit_updates, 1);
    }

    #[tokio::test]
    async fn test_bandit_update_rejects_fractional_reward() {
        let state = test_state(0.2);
        let app = create_router(state.clone());

        let response = app
            .oneshot(post_json(
                "/bandit/update",
                json!({"dealer_id": "D009", "action_id": "layout_b", "reward": 0.5}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.bandit.arm("D009", "layout_b").is_none());
        assert_eq!(state.monitoring.snapshot().total_errors, 1);
    }

    #[tokio::test]
    async fn test_events_and_metrics() {
        let state = test_state(0.3);
        let app = create_router(state.clone());

        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(post_json("/predict/approval", application()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.clone().oneshot(get_request("/metrics/events?limit=2")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["events"][0]["dealer_id"], "D001");

        let response = app.oneshot(get_request("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total_requests"], 3);
        assert_eq!(body["approval_rate"], 1.0);
        assert!(body["drift"]["psi"].is_number());
    }

    #[tokio::test]
    async fn test_copilot_summary() {
        let app = create_router(test_state(0.55));
        let response = app
            .oneshot(post_json("/copilot/underwriter-summary", application()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["prediction"]["decision"], "REVIEW");
        let summary = body["summary"].as_str().unwrap();
        assert!(summary.contains("Dealer: D001"));
        assert!(summary.contains("Suggested decision: REVIEW"));
    }
}
