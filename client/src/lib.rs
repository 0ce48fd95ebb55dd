pub mod client;
pub mod login;

pub use client::{Client, Health};
pub use login::{LoginFeedback, LoginTracker};
use thiserror::Error;

/// Error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
    #[error("failed: {status}: {message}")]
    Failed {
        status: reqwest::StatusCode,
        message: String,
    },
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use funnel_ledger::FunnelConfig;
    use funnel_server::{Api, Server, ServerConfig};
    use funnel_types::api::{ApiStatus, PostbackQuery};
    use funnel_types::{Outcome, PlayerId, DEFAULT_PROMO_CODE};
    use std::{net::SocketAddr, sync::Arc};
    use tokio::time::{sleep, Duration};

    const ADMIN_PASSWORD: &str = "hunter2";
    const AFFILIATE_LINK: &str = "https://partner.example/register?ref=funnel";

    struct TestContext {
        server: Arc<Server>,
        base_url: String,
        server_handle: tokio::task::JoinHandle<()>,
    }

    impl TestContext {
        async fn new() -> Self {
            Self::with_config(ServerConfig::unlimited()).await
        }

        async fn with_config(config: ServerConfig) -> Self {
            let funnel_config = FunnelConfig::new(
                Some(ADMIN_PASSWORD.to_string()),
                Some(format!("  {AFFILIATE_LINK} ")),
            );
            let server = Server::in_memory(funnel_config, config);
            let api = Api::new(server.clone());

            // Start server on random port
            let addr = SocketAddr::from(([127, 0, 0, 1], 0));
            let router = api.router();
            let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
            let actual_addr = listener.local_addr().unwrap();
            let base_url = format!("http://{actual_addr}");

            let server_handle = tokio::spawn(async move {
                axum::serve(
                    listener,
                    router.into_make_service_with_connect_info::<SocketAddr>(),
                )
                .await
                .unwrap();
            });

            // Give server time to start
            sleep(Duration::from_millis(100)).await;

            Self {
                server,
                base_url,
                server_handle,
            }
        }

        fn create_client(&self) -> Client {
            Client::new(&self.base_url).unwrap()
        }
    }

    impl Drop for TestContext {
        fn drop(&mut self) {
            self.server_handle.abort();
        }
    }

    #[tokio::test]
    async fn test_healthz() {
        let ctx = TestContext::new().await;
        let client = ctx.create_client();
        let health = client.healthz().await.unwrap();
        assert!(health.ok);
        assert_eq!(health.store, "memory");
    }

    #[tokio::test]
    async fn test_player_journey() {
        let ctx = TestContext::new().await;
        let client = ctx.create_client();
        let mut tracker = LoginTracker::new();

        // Unknown player.
        let feedback = tracker.attempt(&client, "player42").await.unwrap();
        assert!(matches!(
            feedback,
            LoginFeedback::NotRegistered { attempts: 1, .. }
        ));

        // Registration only.
        let response = client.register("player42").await.unwrap();
        assert_eq!(response.status, ApiStatus::Applied);
        assert_eq!(response.outcome, Some(Outcome::Registered));
        let feedback = tracker.attempt(&client, "player42").await.unwrap();
        assert!(matches!(feedback, LoginFeedback::NeedsDeposit { .. }));

        // Below threshold.
        let response = client.first_deposit("player42", 5.0).await.unwrap();
        assert!(matches!(
            response.outcome,
            Some(Outcome::Deposited { awarded: 0, .. })
        ));
        assert!(matches!(
            tracker.attempt(&client, "player42").await.unwrap(),
            LoginFeedback::NeedsDeposit { .. }
        ));

        // Crossing the threshold awards a batch.
        let response = client.recurring_deposit("player42", 5.0).await.unwrap();
        match response.outcome {
            Some(Outcome::Deposited {
                total_deposit,
                awarded,
                ..
            }) => {
                assert_eq!(total_deposit, 10.0);
                assert_eq!(awarded, 15);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(
            tracker.attempt(&client, "player42").await.unwrap(),
            LoginFeedback::LoggedIn {
                predictions_left: 15
            }
        );

        // Spend every credit.
        for left in (0..15).rev() {
            let response = client.use_prediction("player42").await.unwrap();
            assert_eq!(response.status, ApiStatus::Consumed);
            assert_eq!(response.predictions_left, Some(left));
            let signal = response.signal.unwrap();
            assert!(signal.ends_with('x'), "unexpected signal: {signal}");
        }
        let response = client.use_prediction("player42").await.unwrap();
        assert_eq!(response.status, ApiStatus::NoCredits);
        assert!(!response.success);

        let feedback = tracker.attempt(&client, "player42").await.unwrap();
        assert!(matches!(feedback, LoginFeedback::NeedsRedeposit { .. }));

        // Clearing removes the record entirely.
        let response = client.clear_user("player42").await.unwrap();
        assert_eq!(response.status, ApiStatus::Cleared);
        let response = client.clear_user("player42").await.unwrap();
        assert_eq!(response.status, ApiStatus::NotFound);
        let response = client.use_prediction("player42").await.unwrap();
        assert_eq!(response.status, ApiStatus::NotFound);
        assert!(ctx
            .server
            .funnel()
            .record(&PlayerId::parse("player42").unwrap())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_postback_aliases_and_rejections() {
        let ctx = TestContext::new().await;
        let client = ctx.create_client();

        let query = PostbackQuery {
            sub1: Some("  sub-player ".to_string()),
            event: Some("REGISTRATION".to_string()),
            ..Default::default()
        };
        let response = client.postback(&query).await.unwrap();
        assert_eq!(response.status, ApiStatus::Applied);
        let verify = client.verify("sub-player").await.unwrap();
        assert_eq!(verify.status, ApiStatus::NeedsDeposit);

        let query = PostbackQuery {
            user_id: Some("sub-player".to_string()),
            event_type: Some("chargeback".to_string()),
            ..Default::default()
        };
        let response = client.postback(&query).await.unwrap();
        assert!(response.success);
        assert_eq!(response.status, ApiStatus::Ignored);

        let query = PostbackQuery {
            user_id: Some("sub-player".to_string()),
            event_type: Some("first_deposit".to_string()),
            amount: Some("ten".to_string()),
            ..Default::default()
        };
        let response = client.postback(&query).await.unwrap();
        assert_eq!(response.status, ApiStatus::InvalidAmount);
        assert_eq!(
            client.verify("sub-player").await.unwrap().status,
            ApiStatus::NeedsDeposit
        );

        let query = PostbackQuery {
            user_id: Some("sub-player".to_string()),
            ..Default::default()
        };
        let response = client.postback(&query).await.unwrap();
        assert!(!response.success);
        assert_eq!(response.status, ApiStatus::MissingEvent);
        assert_eq!(response.received_query, Some(query));

        let verify = client.verify("ab").await.unwrap();
        assert_eq!(verify.status, ApiStatus::InvalidId);
    }

    #[tokio::test]
    async fn test_admin_and_promo() {
        let ctx = TestContext::new().await;
        let client = ctx.create_client();

        assert_eq!(
            client.verify_admin(ADMIN_PASSWORD).await.unwrap().status,
            ApiStatus::Accepted
        );
        assert_eq!(
            client.verify_admin("guess").await.unwrap().status,
            ApiStatus::Rejected
        );

        let response = client.promo_code().await.unwrap();
        assert_eq!(response.promo_code.as_deref(), Some(DEFAULT_PROMO_CODE));

        let response = client.set_promo_code("spring", "guess").await.unwrap();
        assert_eq!(response.status, ApiStatus::Rejected);
        let response = client.set_promo_code("x", ADMIN_PASSWORD).await.unwrap();
        assert_eq!(response.status, ApiStatus::InvalidPromoCode);
        let response = client
            .set_promo_code(" spring ", ADMIN_PASSWORD)
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.promo_code.as_deref(), Some("SPRING"));

        let response = client.promo_code().await.unwrap();
        assert_eq!(response.promo_code.as_deref(), Some("SPRING"));

        let response = client.affiliate_link().await.unwrap();
        assert!(response.success);
        assert_eq!(response.link.as_deref(), Some(AFFILIATE_LINK));
    }

    #[tokio::test]
    async fn test_postback_rate_limit() {
        let config = ServerConfig {
            postback_rate_limit_per_minute: Some(1),
            postback_rate_limit_burst: Some(1),
            ..ServerConfig::unlimited()
        };
        let ctx = TestContext::with_config(config).await;
        let client = ctx.create_client();

        client.register("limited").await.unwrap();
        match client.register("limited").await {
            Err(Error::Failed { status, .. }) => {
                assert_eq!(status, reqwest::StatusCode::TOO_MANY_REQUESTS);
            }
            other => panic!("expected rate limit, got {other:?}"),
        }

        // Other routes keep their own budget.
        let verify = client.verify("limited").await.unwrap();
        assert_eq!(verify.status, ApiStatus::NeedsDeposit);
        assert_eq!(ctx.server.metrics().snapshot().reject_rate_limit, 1);
    }
}
