use crate::{Error, Result};
use funnel_types::api::{
    AdminRequest, AdminResponse, AffiliateLinkResponse, ClearUserResponse, PlayerRequest,
    PostbackQuery, PostbackResponse, PromoCodeResponse, SetPromoCodeRequest,
    UsePredictionResponse, VerifyResponse,
};
use funnel_types::EventKind;
use reqwest::{RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Liveness payload served on `/healthz`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Health {
    pub ok: bool,
    pub store: String,
}

/// HTTP client for the funnel server.
///
/// Most endpoints answer policy outcomes (`NOT_FOUND`, `NO_CREDITS`, ...) with a
/// non-2xx status and a JSON body. Those bodies are decoded and returned like any
/// other response; only bodies that do not decode surface as [`Error::Failed`].
#[derive(Clone)]
pub struct Client {
    pub base_url: Url,
    pub http_client: reqwest::Client,
}

impl Client {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        match base_url.scheme() {
            "http" | "https" => {}
            other => return Err(Error::InvalidScheme(other.to_string())),
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            http_client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        decode(status, &body)
    }

    pub async fn healthz(&self) -> Result<Health> {
        let url = self.endpoint("healthz")?;
        self.send(self.http_client.get(url)).await
    }

    /// Deliver a raw partner notification.
    pub async fn postback(&self, query: &PostbackQuery) -> Result<PostbackResponse> {
        let url = self.endpoint("api/postback")?;
        debug!(?query, "sending postback");
        self.send(self.http_client.get(url).query(query)).await
    }

    /// Notification for `kind` with the identifier in `user_id`.
    pub async fn notify(
        &self,
        player_id: &str,
        kind: EventKind,
        amount: Option<f64>,
    ) -> Result<PostbackResponse> {
        let query = PostbackQuery {
            user_id: Some(player_id.to_string()),
            event_type: Some(kind.as_str().to_string()),
            amount: amount.map(|amount| amount.to_string()),
            ..Default::default()
        };
        self.postback(&query).await
    }

    pub async fn register(&self, player_id: &str) -> Result<PostbackResponse> {
        self.notify(player_id, EventKind::Registration, None).await
    }

    pub async fn first_deposit(&self, player_id: &str, amount: f64) -> Result<PostbackResponse> {
        self.notify(player_id, EventKind::FirstDeposit, Some(amount))
            .await
    }

    pub async fn recurring_deposit(
        &self,
        player_id: &str,
        amount: f64,
    ) -> Result<PostbackResponse> {
        self.notify(player_id, EventKind::RecurringDeposit, Some(amount))
            .await
    }

    pub async fn verify(&self, player_id: &str) -> Result<VerifyResponse> {
        let url = self.endpoint("api/verify")?;
        self.send(self.http_client.get(url).query(&[("playerId", player_id)]))
            .await
    }

    pub async fn use_prediction(&self, player_id: &str) -> Result<UsePredictionResponse> {
        let url = self.endpoint("api/use-prediction")?;
        let body = PlayerRequest {
            player_id: Some(player_id.to_string()),
        };
        self.send(self.http_client.post(url).json(&body)).await
    }

    pub async fn verify_admin(&self, password: &str) -> Result<AdminResponse> {
        let url = self.endpoint("api/verify-admin")?;
        let body = AdminRequest {
            password: Some(password.to_string()),
        };
        self.send(self.http_client.post(url).json(&body)).await
    }

    pub async fn promo_code(&self) -> Result<PromoCodeResponse> {
        let url = self.endpoint("api/promo-code")?;
        self.send(self.http_client.get(url)).await
    }

    pub async fn set_promo_code(&self, code: &str, password: &str) -> Result<PromoCodeResponse> {
        let url = self.endpoint("api/promo-code")?;
        let body = SetPromoCodeRequest {
            promo_code: Some(code.to_string()),
            password: Some(password.to_string()),
        };
        self.send(self.http_client.post(url).json(&body)).await
    }

    pub async fn clear_user(&self, player_id: &str) -> Result<ClearUserResponse> {
        let url = self.endpoint("api/clear-user")?;
        let body = PlayerRequest {
            player_id: Some(player_id.to_string()),
        };
        self.send(self.http_client.post(url).json(&body)).await
    }

    pub async fn affiliate_link(&self) -> Result<AffiliateLinkResponse> {
        let url = self.endpoint("api/get-affiliate-link")?;
        self.send(self.http_client.get(url)).await
    }
}

fn decode<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|_| Error::Failed {
        status,
        message: body.trim().to_string(),
    })
}
