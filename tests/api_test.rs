#[cfg(test)]
mod api_integration_tests {
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use gnosis::build_router;
    use gnosis::core::shared::enums::{LeadStatus, Presence};
    use gnosis::core::shared::state::AppState;
    use gnosis::core::shared::test_utils::{bearer, test_state, UserFactory, TEST_PASSWORD};
    use gnosis::leads::types::Lead;
    use gnosis::users::types::User;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct TestApp {
        state: Arc<AppState>,
        router: Router,
    }

    impl TestApp {
        fn new() -> Self {
            let state = test_state();
            let router = build_router(state.clone());
            Self { state, router }
        }

        fn token(&self, user: &User) -> String {
            bearer(&self.state, user)
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            auth: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(auth) = auth {
                builder = builder.header(header::AUTHORIZATION, auth);
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }

        async fn get(&self, uri: &str, auth: &str) -> (StatusCode, Value) {
            self.send(Method::GET, uri, Some(auth), None).await
        }

        async fn post(&self, uri: &str, auth: &str, body: Value) -> (StatusCode, Value) {
            self.send(Method::POST, uri, Some(auth), Some(body)).await
        }

        async fn put(&self, uri: &str, auth: &str, body: Value) -> (StatusCode, Value) {
            self.send(Method::PUT, uri, Some(auth), Some(body)).await
        }

        async fn lead(&self, lead: Lead) -> Lead {
            self.state.store.insert_lead(lead).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = TestApp::new();
        let (status, body) = app.send(Method::GET, "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], true);
    }

    #[tokio::test]
    async fn test_missing_or_bad_token_is_unauthorized() {
        let app = TestApp::new();
        let (status, body) = app.send(Method::GET, "/api/leads", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"success": false, "message": "Not authorized to access this route"}));

        let (status, _) = app.get("/api/leads", "Bearer not-a-token").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_assign_requires_admin() {
        let app = TestApp::new();
        let warmer = UserFactory::warmer("Wendy").insert(&app.state).await;
        let (status, body) = app
            .post("/api/leads/assign", &app.token(&warmer), json!({}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "User role warmer is not authorized to access this route");
    }

    #[tokio::test]
    async fn test_assign_round_robin_and_idempotence() {
        let app = TestApp::new();
        let admin = UserFactory::admin("Ada").insert(&app.state).await;
        UserFactory::warmer("Wendy").score(90.0).insert(&app.state).await;
        UserFactory::warmer("Walt").score(80.0).insert(&app.state).await;
        UserFactory::warmer("Offline Otto")
            .score(99.0)
            .status(Presence::Offline)
            .insert(&app.state)
            .await;
        UserFactory::closer("Cleo").score(70.0).insert(&app.state).await;

        app.lead(Lead::new("Low", "low@lead.test").with_tier(3).with_score(0.9)).await;
        app.lead(Lead::new("High", "high@lead.test").with_tier(1).with_score(0.2)).await;
        app.lead(Lead::new("Mid", "mid@lead.test").with_tier(2).with_score(0.5)).await;

        let token = app.token(&admin);
        let (status, body) = app
            .post("/api/leads/assign", &token, json!({"prioritizeHighTier": true}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "3 leads assigned successfully");

        let data = body["data"].as_array().unwrap();
        let leads: Vec<_> = data.iter().map(|a| a["leadName"].as_str().unwrap()).collect();
        let warmers: Vec<_> = data.iter().map(|a| a["warmer"].as_str().unwrap()).collect();
        assert_eq!(leads, ["High", "Mid", "Low"]);
        assert_eq!(warmers, ["Wendy", "Walt", "Wendy"]);
        assert!(data.iter().all(|a| a["closer"] == "Cleo"));

        let (_, activities) = app.get("/api/activities?type=lead_assigned", &token).await;
        assert_eq!(activities["total"], 3);

        let (status, again) = app.post("/api/leads/assign", &token, json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again["message"], "No leads to assign");
        assert_eq!(again["data"], json!([]));

        let (_, activities) = app.get("/api/activities?type=lead_assigned", &token).await;
        assert_eq!(activities["total"], 3);
    }

    #[tokio::test]
    async fn test_assign_without_body_and_without_closers() {
        let app = TestApp::new();
        let admin = UserFactory::admin("Ada").insert(&app.state).await;
        UserFactory::warmer("Wendy").insert(&app.state).await;
        UserFactory::closer("Away Cleo")
            .status(Presence::Offline)
            .insert(&app.state)
            .await;
        app.lead(Lead::new("Solo", "solo@lead.test")).await;

        let (status, body) = app
            .send(Method::POST, "/api/leads/assign", Some(&app.token(&admin)), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No available warmers or closers");
    }

    #[tokio::test]
    async fn test_lead_visibility_by_role() {
        let app = TestApp::new();
        let wendy = UserFactory::warmer("Wendy").insert(&app.state).await;
        let walt = UserFactory::warmer("Walt").insert(&app.state).await;
        let mine = app
            .lead(Lead::new("Mine", "mine@lead.test").assigned_to(Some(wendy.id), None))
            .await;
        let theirs = app
            .lead(Lead::new("Theirs", "theirs@lead.test").assigned_to(Some(walt.id), None))
            .await;

        let token = app.token(&wendy);
        let (status, list) = app.get("/api/leads", &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["count"], 1);
        assert_eq!(list["data"][0]["id"], json!(mine.id));
        assert_eq!(list["data"][0]["warmer"]["name"], "Wendy");

        let (status, body) = app.get(&format!("/api/leads/{}", theirs.id), &token).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Not authorized to access this lead");

        let (status, _) = app
            .get(&format!("/api/leads/{}", uuid::Uuid::new_v4()), &token)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_lead_update_rules() {
        let app = TestApp::new();
        let wendy = UserFactory::warmer("Wendy").insert(&app.state).await;
        let cleo = UserFactory::closer("Cleo").insert(&app.state).await;
        let lead = app
            .lead(Lead::new("Jordan", "jordan@lead.test").assigned_to(Some(wendy.id), None))
            .await;
        let uri = format!("/api/leads/{}", lead.id);
        let token = app.token(&wendy);

        let (status, _) = app
            .put(&uri, &token, json!({"assignedCloser": cleo.id}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.put(&uri, &token, json!({"status": "hot"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "hot");

        let (_, activities) = app.get("/api/activities", &token).await;
        assert_eq!(activities["data"][0]["type"], "lead_marked_hot");
        assert_eq!(activities["data"][0]["details"], "Lead marked as hot");

        let (_, body) = app.put(&uri, &token, json!({"status": "closed_won"})).await;
        assert!(body["data"]["closedAt"].is_string());
        let (_, body) = app.put(&uri, &token, json!({"status": "warm"})).await;
        assert!(body["data"]["closedAt"].is_null());

        let (status, body) = app.put(&uri, &token, json!({"score": 1.5})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_admin_creates_lead_with_validated_assignees() {
        let app = TestApp::new();
        let admin = UserFactory::admin("Ada").insert(&app.state).await;
        let wendy = UserFactory::warmer("Wendy").insert(&app.state).await;
        let token = app.token(&admin);

        let (status, body) = app
            .post("/api/leads", &token, json!({"name": "Pat", "email": "pat@lead.test", "assignedCloser": wendy.id}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, body) = app
            .post("/api/leads", &token, json!({"name": "Pat", "email": "PAT@Lead.test", "tier": 1, "assignedWarmer": wendy.id}))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["email"], "pat@lead.test");
        assert_eq!(body["data"]["warmer"]["name"], "Wendy");
        assert_eq!(body["data"]["score"], 0.5);

        let (status, body) = app.post("/api/leads", &token, json!({"email": "x@lead.test"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please provide a lead name");
    }

    #[tokio::test]
    async fn test_notes_are_paginated_and_messages_stamp_contact() {
        let app = TestApp::new();
        let wendy = UserFactory::warmer("Wendy").insert(&app.state).await;
        let lead = app
            .lead(Lead::new("Jordan", "jordan@lead.test").assigned_to(Some(wendy.id), None))
            .await;
        let token = app.token(&wendy);

        for text in ["first", "second", "third"] {
            let (status, _) = app
                .post(&format!("/api/leads/{}/notes", lead.id), &token, json!({"text": text}))
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }
        let (status, page) = app
            .get(&format!("/api/leads/{}/notes?page=2&limit=2", lead.id), &token)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["count"], 1);
        assert_eq!(page["total"], 3);
        assert_eq!(page["page"], 2);
        assert_eq!(page["pages"], 2);

        let (status, body) = app
            .post(&format!("/api/leads/{}/notes", lead.id), &token, json!({"text": "  "}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please provide note text");

        let (status, _) = app
            .post(&format!("/api/leads/{}/messages", lead.id), &token, json!({"text": "Hi Jordan"}))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, body) = app.get(&format!("/api/leads/{}", lead.id), &token).await;
        assert!(body["data"]["lastContactedAt"].is_string());

        let (_, dashboard) = app.get("/api/analytics/dashboard", &token).await;
        assert_eq!(dashboard["data"]["performance"]["responseRate"], 100);
    }

    #[tokio::test]
    async fn test_activity_log_pages_report_full_total() {
        let app = TestApp::new();
        let admin = UserFactory::admin("Ada").insert(&app.state).await;
        let token = app.token(&admin);

        for n in 0..5 {
            let (status, _) = app
                .post(
                    "/api/activities",
                    &token,
                    json!({"type": "call_completed", "details": format!("Call {n}")}),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, page) = app.get("/api/activities?page=2&limit=2", &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["count"], 2);
        assert_eq!(page["total"], 5);
        assert_eq!(page["page"], 2);
        assert_eq!(page["pages"], 3);

        let (_, last) = app.get("/api/activities?page=3&limit=2", &token).await;
        assert_eq!(last["count"], 1);
        assert_eq!(last["total"], 5);
    }

    #[tokio::test]
    async fn test_huge_page_number_returns_empty_page() {
        let app = TestApp::new();
        let admin = UserFactory::admin("Ada").insert(&app.state).await;
        let token = app.token(&admin);
        app.post("/api/activities", &token, json!({"type": "call_completed"}))
            .await;

        let (status, body) = app
            .get("/api/activities?page=9223372036854775807&limit=10", &token)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
        assert_eq!(body["total"], 1);

        let lead = app.lead(Lead::new("Jordan", "jordan@lead.test")).await;
        let (status, body) = app
            .get(
                &format!("/api/leads/{}/notes?page=9223372036854775807&limit=10", lead.id),
                &token,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_register_login_logout() {
        let app = TestApp::new();
        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({"name": "Nia", "email": "nia@gnosis.test", "password": TEST_PASSWORD})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["user"]["role"], "warmer");
        assert!(body["data"]["user"].get("passwordHash").is_none());

        let (status, _) = app
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({"name": "Nia", "email": "NIA@gnosis.test", "password": TEST_PASSWORD})),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "nia@gnosis.test", "password": "wrong-password"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");

        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "nia@gnosis.test", "password": TEST_PASSWORD})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let auth = format!("Bearer {}", body["data"]["token"].as_str().unwrap());

        let (status, me) = app.get("/api/auth/me", &auth).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["data"]["email"], "nia@gnosis.test");

        let (status, _) = app.send(Method::POST, "/api/auth/logout", Some(&auth), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.get("/api/auth/me", &auth).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_rejects_admin_role() {
        let app = TestApp::new();
        let (status, _) = app
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({"name": "Eve", "email": "eve@gnosis.test", "password": TEST_PASSWORD, "role": "admin"})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_dashboard_shape_follows_role() {
        let app = TestApp::new();
        let admin = UserFactory::admin("Ada").insert(&app.state).await;
        let cleo = UserFactory::closer("Cleo").insert(&app.state).await;
        app.lead(
            Lead::new("Won", "won@lead.test")
                .with_status(LeadStatus::ClosedWon)
                .with_estimated_value(1200.0)
                .assigned_to(None, Some(cleo.id)),
        )
        .await;

        let (status, body) = app.get("/api/analytics/dashboard", &app.token(&admin)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["revenue"]["mrr"], 1200.0);
        assert_eq!(body["data"]["leads"]["unassigned"], 1);
        assert_eq!(body["data"]["team"]["closers"]["online"], 1);

        let (_, body) = app.get("/api/analytics/dashboard", &app.token(&cleo)).await;
        assert_eq!(body["data"]["leads"]["closedWon"], 1);
        assert_eq!(body["data"]["performance"]["conversionRate"], 100);
        assert!(body["data"].get("revenue").is_none());

        let (status, _) = app.get("/api/analytics/mrr", &app.token(&cleo)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (_, trend) = app.get("/api/analytics/mrr", &app.token(&admin)).await;
        assert_eq!(trend["data"][6], json!({"day": "Today", "value": 1200.0}));
    }

    #[tokio::test]
    async fn test_performance_is_self_service_for_staff() {
        let app = TestApp::new();
        let admin = UserFactory::admin("Ada").insert(&app.state).await;
        let wendy = UserFactory::warmer("Wendy").insert(&app.state).await;
        let walt = UserFactory::warmer("Walt").insert(&app.state).await;

        let (status, body) = app.get("/api/analytics/performance", &app.token(&wendy)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["user"]["name"], "Wendy");
        assert_eq!(body["data"]["weeklyActivity"].as_array().unwrap().len(), 7);
        assert_eq!(body["data"]["leadStats"], json!({"hot": 0, "warm": 0, "cold": 0}));

        let uri = format!("/api/analytics/performance?userId={}", walt.id);
        let (status, _) = app.get(&uri, &app.token(&wendy)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = app.get(&uri, &app.token(&admin)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["user"]["name"], "Walt");
    }

    #[tokio::test]
    async fn test_users_admin_routes() {
        let app = TestApp::new();
        let admin = UserFactory::admin("Ada").insert(&app.state).await;
        let wendy = UserFactory::warmer("Wendy").score(60.0).insert(&app.state).await;
        UserFactory::warmer("Walt").score(95.0).insert(&app.state).await;
        let token = app.token(&admin);

        let (status, board) = app.get("/api/users/leaderboard", &app.token(&wendy)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(board["data"]["topWarmers"][0]["name"], "Walt");
        assert_eq!(board["data"]["topClosers"], json!([]));

        let (status, _) = app.get("/api/users", &app.token(&wendy)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (_, users) = app.get("/api/users?role=warmer", &token).await;
        assert_eq!(users["count"], 2);

        let (status, body) = app
            .post("/api/users", &token, json!({"name": "Cleo", "email": "cleo@gnosis.test", "password": "123", "role": "closer"}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Password must be at least 6 characters");

        let (status, _) = app
            .put(&format!("/api/users/{}", wendy.id), &app.token(&wendy), json!({"role": "admin"}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = app
            .put(&format!("/api/users/{}", wendy.id), &app.token(&wendy), json!({"status": "away"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "away");

        app.lead(Lead::new("Jordan", "jordan@lead.test").assigned_to(Some(wendy.id), None))
            .await;
        let (_, body) = app.get(&format!("/api/users/{}", wendy.id), &token).await;
        assert_eq!(body["data"]["leadsCount"], 1);

        let (status, body) = app
            .send(Method::DELETE, &format!("/api/users/{}", admin.id), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "You cannot delete your own account");
    }

    #[tokio::test]
    async fn test_task_lifecycle() {
        let app = TestApp::new();
        let wendy = UserFactory::warmer("Wendy").insert(&app.state).await;
        let walt = UserFactory::warmer("Walt").insert(&app.state).await;
        let token = app.token(&wendy);

        let (status, body) = app
            .post("/api/tasks", &token, json!({"title": "Call Jordan", "priority": "high"}))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["assigneeName"], "Wendy");
        assert_eq!(body["data"]["dueDate"], "Today");
        let uri = format!("/api/tasks/{}", body["data"]["id"].as_str().unwrap());

        let (status, _) = app.get(&uri, &app.token(&walt)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (_, list) = app.get("/api/tasks", &app.token(&walt)).await;
        assert_eq!(list["count"], 0);

        let (status, body) = app.put(&uri, &token, json!({"status": "completed"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "completed");

        let (_, activities) = app.get("/api/activities", &token).await;
        assert_eq!(activities["data"][0]["type"], "task_completed");
        assert_eq!(activities["data"][0]["details"], "Task completed: Call Jordan");

        let (status, _) = app.send(Method::DELETE, &uri, Some(&app.token(&walt)), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app.send(Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
