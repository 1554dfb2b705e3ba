//! REST API router.
//!
//! Routes are nested under `/api/`; uploaded files are served from
//! `/uploads/`. Protected sub-routers carry the auth middleware, public
//! ones only the rate limiter.
//!
//! Middleware uses `Extension<ApiContext>` (injected as the outermost
//! layer). Endpoint handlers use `State<ApiContext>` via `with_state`.

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::services::media::MAX_UPLOAD_BYTES;

/// Build the application router.
///
/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn api_router(ctx: ApiContext) -> Router {
    let uploads_dir = ctx.config.uploads_dir();

    let public = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/user/send-otp", post(endpoints::auth::send_otp))
        .route("/user/verify-otp", post(endpoints::auth::verify_otp))
        .route("/user/resend-otp", post(endpoints::auth::resend_otp))
        .route("/otp/send", post(endpoints::otp::send))
        .route("/otp/verify", post(endpoints::otp::verify))
        .route("/doctor/register", post(endpoints::doctors::register))
        .route("/doctor/login", post(endpoints::doctors::login))
        .route("/doctor/list", get(endpoints::doctors::list))
        .route("/admin/login", post(endpoints::admin::login))
        .route("/labs", get(endpoints::labs::list))
        .route("/labs/:id", get(endpoints::labs::detail))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    // Protected routes: Extension (outermost) → Rate limit → Auth → Handler
    let protected = Router::new()
        .route("/user/get-profile", get(endpoints::users::get_profile))
        .route("/user/update-profile", post(endpoints::users::update_profile))
        .route("/user/book-appointment", post(endpoints::users::book_appointment))
        .route("/user/book-lab", post(endpoints::users::book_lab))
        .route("/user/cancel-appointment", post(endpoints::users::cancel_appointment))
        .route("/user/appointments", get(endpoints::users::list_appointments))
        .route("/user/payment-order", post(endpoints::users::payment_order))
        .route("/user/verify-order", post(endpoints::users::verify_order))
        .route("/user/payment-checkout", post(endpoints::users::payment_checkout))
        .route("/user/verify-checkout", post(endpoints::users::verify_checkout))
        .route("/doctor/appointments", get(endpoints::doctors::appointments))
        .route("/doctor/cancel-appointment", post(endpoints::doctors::cancel_appointment))
        .route("/doctor/complete-appointment", post(endpoints::doctors::complete_appointment))
        .route("/doctor/profile", get(endpoints::doctors::profile))
        .route("/doctor/update-profile", post(endpoints::doctors::update_profile))
        .route("/doctor/change-availability", post(endpoints::doctors::change_availability))
        .route("/doctor/dashboard", get(endpoints::doctors::dashboard))
        .route("/admin/add-doctor", post(endpoints::admin::add_doctor))
        .route("/admin/doctors", get(endpoints::admin::doctors))
        .route("/admin/change-availability", post(endpoints::admin::change_availability))
        .route("/admin/appointments", get(endpoints::admin::appointments))
        .route("/admin/cancel-appointment", post(endpoints::admin::cancel_appointment))
        .route("/admin/dashboard", get(endpoints::admin::dashboard))
        .route("/admin/registrations", get(endpoints::admin::registrations))
        .route("/admin/review-registration", post(endpoints::admin::review_registration))
        .route("/admin/add-lab", post(endpoints::admin::add_lab))
        .route("/admin/labs", get(endpoints::admin::labs))
        .route("/admin/change-lab-availability", post(endpoints::admin::change_lab_availability))
        .route("/prescription/upload", post(endpoints::prescriptions::upload))
        .route("/prescription/doctor", get(endpoints::prescriptions::for_doctor))
        .route("/prescription/lab", get(endpoints::prescriptions::for_lab))
        .route("/prescription/admin", get(endpoints::prescriptions::for_admin))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx));

    Router::new()
        .route("/", get(endpoints::health::root))
        .nest("/api", public)
        .nest("/api", protected)
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .fallback(not_found)
        // Headroom over the upload cap so the handler rejects with its own
        // message instead of a bare 413
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024))
        .layer(CorsLayer::very_permissive())
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": "Route not found" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use tower::util::ServiceExt;
    use uuid::Uuid;

    use crate::api::types::issue_session;
    use crate::config::Config;
    use crate::db::repository::{doctor, otp, user};
    use crate::db::Db;
    use crate::models::{Doctor, PhoneOtp, Role, User};

    fn test_app() -> (Router, ApiContext, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_tests(dir.path().to_path_buf());
        let db = Db::open_in_memory().unwrap();
        let ctx = ApiContext::new(db, config);
        (api_router(ctx.clone()), ctx, dir)
    }

    async fn request(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    fn seed_doctor(ctx: &ApiContext) -> Uuid {
        let doc = Doctor::new(
            "Dr. Rao".into(),
            "rao@example.com".into(),
            "hash".into(),
            "Dermatology".into(),
            500,
        );
        let conn = ctx.db.conn().unwrap();
        doctor::insert_doctor(&conn, &doc).unwrap();
        doc.id
    }

    fn seed_user(ctx: &ApiContext, email: &str) -> (Uuid, String) {
        let mut account = User::new("Asha".into(), email.into(), "hash".into());
        account.is_verified = true;
        let conn = ctx.db.conn().unwrap();
        user::insert_user(&conn, &account).unwrap();
        let token = issue_session(&conn, &account.id.to_string(), Role::User).unwrap();
        (account.id, token)
    }

    #[tokio::test]
    async fn health_and_root() {
        let (app, _ctx, _dir) = test_app();
        let (status, body) = request(&app, "GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["status"], "ok");

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_renders_envelope() {
        let (app, _ctx, _dir) = test_app();
        let (status, body) = request(&app, "GET", "/api/no-such-route", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn protected_route_requires_token() {
        let (app, _ctx, _dir) = test_app();
        let (status, body) = request(&app, "GET", "/api/user/get-profile", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) =
            request(&app, "GET", "/api/user/get-profile", Some("bogus-token"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn otp_registration_issues_token() {
        let (app, ctx, _dir) = test_app();

        let (status, _) = request(
            &app,
            "POST",
            "/api/user/send-otp",
            None,
            Some(serde_json::json!({
                "email": "new@example.com",
                "name": "New Patient",
                "password": "longenough",
                "type": "register",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // Pull the challenge straight from storage (email delivery is disabled)
        let code = {
            let conn = ctx.db.conn().unwrap();
            user::get_user_by_email(&conn, "new@example.com")
                .unwrap()
                .unwrap()
                .otp
                .unwrap()
        };

        let (status, body) = request(
            &app,
            "POST",
            "/api/user/verify-otp",
            None,
            Some(serde_json::json!({
                "email": "new@example.com",
                "otp": code,
                "type": "register",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        // Code is single-use
        let (status, body) = request(
            &app,
            "POST",
            "/api/user/verify-otp",
            None,
            Some(serde_json::json!({
                "email": "new@example.com",
                "otp": code,
                "type": "login",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid OTP");

        let (status, body) =
            request(&app, "GET", "/api/user/get-profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "new@example.com");
        assert!(body["user"].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn stale_otp_is_rejected() {
        let (app, ctx, _dir) = test_app();
        let (user_id, _) = seed_user(&ctx, "asha@example.com");
        {
            let conn = ctx.db.conn().unwrap();
            user::set_otp(&conn, &user_id, "123456", chrono::Utc::now() - chrono::Duration::minutes(1))
                .unwrap();
        }

        // Right code, but its window has closed
        let (status, body) = request(
            &app,
            "POST",
            "/api/user/verify-otp",
            None,
            Some(serde_json::json!({
                "email": "asha@example.com",
                "otp": "123456",
                "type": "login",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "OTP has expired");
    }

    #[tokio::test]
    async fn stale_phone_otp_is_rejected() {
        let (app, ctx, _dir) = test_app();
        {
            let conn = ctx.db.conn().unwrap();
            let stale = PhoneOtp::new(
                "+919876543210".into(),
                "654321".into(),
                chrono::Utc::now() - chrono::Duration::minutes(1),
            );
            otp::replace_code(&conn, &stale).unwrap();
        }

        let (status, body) = request(
            &app,
            "POST",
            "/api/otp/verify",
            None,
            Some(serde_json::json!({
                "phone": "+919876543210",
                "code": "654321",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "OTP has expired");
    }

    #[tokio::test]
    async fn booking_same_slot_twice_conflicts() {
        let (app, ctx, _dir) = test_app();
        let doc_id = seed_doctor(&ctx);
        let (_, token_a) = seed_user(&ctx, "a@example.com");
        let (_, token_b) = seed_user(&ctx, "b@example.com");

        let booking = serde_json::json!({
            "doc_id": doc_id,
            "slot_date": "2026-09-01",
            "slot_time": "10:30 AM",
        });

        let (status, body) = request(
            &app,
            "POST",
            "/api/user/book-appointment",
            Some(&token_a),
            Some(booking.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Appointment Booked");
        let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();

        let (status, body) = request(
            &app,
            "POST",
            "/api/user/book-appointment",
            Some(&token_b),
            Some(booking.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Slot Not Available");

        // The taken slot shows up in the public catalogue
        let (_, body) = request(&app, "GET", "/api/doctor/list", None, None).await;
        assert_eq!(body["doctors"][0]["slots_booked"]["2026-09-01"][0], "10:30 AM");

        // Cancelling frees the slot for the other patient
        let (status, _) = request(
            &app,
            "POST",
            "/api/user/cancel-appointment",
            Some(&token_a),
            Some(serde_json::json!({ "appointment_id": appointment_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = request(
            &app,
            "POST",
            "/api/user/book-appointment",
            Some(&token_b),
            Some(booking),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn cancel_is_owner_only() {
        let (app, ctx, _dir) = test_app();
        let doc_id = seed_doctor(&ctx);
        let (_, token_a) = seed_user(&ctx, "a@example.com");
        let (_, token_b) = seed_user(&ctx, "b@example.com");

        let (_, body) = request(
            &app,
            "POST",
            "/api/user/book-appointment",
            Some(&token_a),
            Some(serde_json::json!({
                "doc_id": doc_id,
                "slot_date": "2026-09-02",
                "slot_time": "11:00 AM",
            })),
        )
        .await;
        let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();

        let (status, _) = request(
            &app,
            "POST",
            "/api/user/cancel-appointment",
            Some(&token_b),
            Some(serde_json::json!({ "appointment_id": appointment_id })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_login_and_role_checks() {
        let (app, ctx, _dir) = test_app();
        let (_, user_token) = seed_user(&ctx, "a@example.com");

        let (status, _) = request(
            &app,
            "POST",
            "/api/admin/login",
            None,
            Some(serde_json::json!({
                "email": "admin@test.local",
                "password": "wrong",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = request(
            &app,
            "POST",
            "/api/admin/login",
            None,
            Some(serde_json::json!({
                "email": "admin@test.local",
                "password": "admin-secret-123",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let admin_token = body["token"].as_str().unwrap().to_string();

        let (status, body) =
            request(&app, "GET", "/api/admin/dashboard", Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["patients"], 1);

        // A patient token must not open the admin panel
        let (status, _) =
            request(&app, "GET", "/api/admin/dashboard", Some(&user_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn doctor_registration_review_flow() {
        let (app, ctx, _dir) = test_app();

        let (status, _) = request(
            &app,
            "POST",
            "/api/doctor/register",
            None,
            Some(serde_json::json!({
                "name": "Dr. Iyer",
                "email": "iyer@example.com",
                "phone": "+919999999999",
                "specialization": "Cardiology",
                "experience_years": 12,
                "clinic_address": "5 MG Road, Bengaluru",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // Duplicate submission
        let (status, _) = request(
            &app,
            "POST",
            "/api/doctor/register",
            None,
            Some(serde_json::json!({
                "name": "Dr. Iyer",
                "email": "iyer@example.com",
                "phone": "+919999999999",
                "specialization": "Cardiology",
                "experience_years": 12,
                "clinic_address": "5 MG Road, Bengaluru",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let admin_token = {
            let conn = ctx.db.conn().unwrap();
            issue_session(&conn, "admin", Role::Admin).unwrap()
        };

        let (status, body) =
            request(&app, "GET", "/api/admin/registrations", Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        let registration_id = body["registrations"][0]["id"].as_str().unwrap().to_string();

        let (status, _) = request(
            &app,
            "POST",
            "/api/admin/review-registration",
            Some(&admin_token),
            Some(serde_json::json!({
                "registration_id": registration_id,
                "approve": true,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // Approval created the doctor
        let (status, body) = request(&app, "GET", "/api/doctor/list", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["doctors"][0]["email"], "iyer@example.com");

        // Second review is rejected
        let (status, _) = request(
            &app,
            "POST",
            "/api/admin/review-registration",
            Some(&admin_token),
            Some(serde_json::json!({
                "registration_id": registration_id,
                "approve": false,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn prescription_upload_is_one_per_appointment() {
        let (app, ctx, _dir) = test_app();
        let doc_id = seed_doctor(&ctx);
        let (_, token) = seed_user(&ctx, "a@example.com");

        let (_, body) = request(
            &app,
            "POST",
            "/api/user/book-appointment",
            Some(&token),
            Some(serde_json::json!({
                "doc_id": doc_id,
                "slot_date": "2026-09-03",
                "slot_time": "09:00 AM",
            })),
        )
        .await;
        let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();

        let upload = |boundary: &str| {
            let mut payload = Vec::new();
            payload.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; \
                     name=\"appointment_id\"\r\n\r\n{appointment_id}\r\n"
                )
                .as_bytes(),
            );
            payload.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
                     filename=\"rx.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
                )
                .as_bytes(),
            );
            payload.extend_from_slice(b"%PDF-1.7 test");
            payload.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
            payload
        };

        let boundary = "X-MEDIBOOK-BOUNDARY";
        let send = |body: Vec<u8>| {
            app.clone().oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/prescription/upload")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
        };

        let response = send(upload(boundary)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(upload(boundary)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn public_lab_catalogue() {
        let (app, ctx, _dir) = test_app();
        {
            let conn = ctx.db.conn().unwrap();
            let mut visible = crate::models::Lab::new("HealthFirst".into(), 300);
            visible.services = vec!["CBC".into()];
            crate::db::repository::lab::insert_lab(&conn, &visible).unwrap();

            let mut hidden = crate::models::Lab::new("Hidden Lab".into(), 250);
            hidden.available = false;
            crate::db::repository::lab::insert_lab(&conn, &hidden).unwrap();
        }

        let (status, body) = request(&app, "GET", "/api/labs", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["labs"].as_array().unwrap().len(), 1);
        let id = body["labs"][0]["id"].as_str().unwrap().to_string();

        let (status, body) = request(&app, "GET", &format!("/api/labs/{id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["lab"]["name"], "HealthFirst");

        let missing = Uuid::new_v4();
        let (status, _) =
            request(&app, "GET", &format!("/api/labs/{missing}"), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
