//! Common test utilities for modelmart integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::TestServer;
use serde_json::Value;

use modelmart_core::{Account, AccountId, FieldSpec, FieldType, Model, ModelId};
use modelmart_service::auth::issue_session_token;
use modelmart_service::crypto::{generate_api_key, hash_api_key};
use modelmart_service::{
    create_router, AppState, InferenceBackend, InferenceError, ServiceConfig,
};
use modelmart_store::{AccountDirectory, LedgerStore, MemoryStore, ModelRegistry};

pub const ADMIN_KEY: &str = "test-admin-key";
pub const SESSION_SECRET: &str = "test-session-secret";

/// A seeded account together with its plaintext API key.
pub struct TestAccount {
    pub id: AccountId,
    pub api_key: String,
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Direct handle on the backing store for seeding and inspection.
    pub store: Arc<MemoryStore>,
    /// Configuration the router was built with.
    pub config: ServiceConfig,
}

impl TestHarness {
    /// Create a harness over a fresh in-memory store and mock inference.
    pub fn new() -> Self {
        Self::configured(None, |_| {})
    }

    /// Create a harness whose inference always uses `inference`.
    pub fn with_inference(inference: Arc<dyn InferenceBackend>) -> Self {
        Self::configured(Some(inference), |_| {})
    }

    /// Create a harness after adjusting the default test configuration.
    pub fn configured(
        inference: Option<Arc<dyn InferenceBackend>>,
        adjust: impl FnOnce(&mut ServiceConfig),
    ) -> Self {
        let store = Arc::new(MemoryStore::new());

        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: String::new(),
            session_secret: Some(SESSION_SECRET.into()),
            admin_api_key: Some(ADMIN_KEY.into()),
            inference_timeout_ms: 500,
            ..ServiceConfig::default()
        };
        adjust(&mut config);

        let mut state = AppState::new(Arc::clone(&store), config.clone());
        if let Some(inference) = inference {
            state = state.with_inference(inference);
        }

        let router: Router = create_router(state);
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            config,
        }
    }

    /// Seed an account holding `credits`.
    pub fn account(&self, name: &str, credits: i64) -> TestAccount {
        let api_key = generate_api_key();
        let hash = hash_api_key(&self.config.api_key_pepper, &api_key).unwrap();
        let account = Account::new(AccountId::generate(), name, hash);

        self.store.create_account(&account).unwrap();
        if credits > 0 {
            self.store.grant(&account.id, credits).unwrap();
        }

        TestAccount {
            id: account.id,
            api_key,
        }
    }

    /// Seed a paid model with an `age: numeric, note: text?` schema.
    pub fn paid_model(&self, owner: AccountId, credits_per_call: i64) -> Model {
        let model = Model::new(ModelId::generate(), owner, "age-model")
            .with_framework("sklearn")
            .with_schema(age_note_schema())
            .paid(credits_per_call);
        self.store.put_model(&model).unwrap();
        model
    }

    /// Seed a free model with the same schema.
    pub fn free_model(&self, owner: AccountId) -> Model {
        let model = Model::new(ModelId::generate(), owner, "free-model")
            .with_framework("pytorch")
            .with_schema(age_note_schema());
        self.store.put_model(&model).unwrap();
        model
    }

    /// Current balance straight from the store.
    pub fn balance(&self, account: AccountId) -> i64 {
        self.store.balance_of(&account).unwrap()
    }

    /// Bearer header value carrying a valid session for `account`.
    pub fn session_header(&self, account: AccountId) -> HeaderValue {
        let token =
            issue_session_token(&account, SESSION_SECRET, chrono::Duration::minutes(5)).unwrap();
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
    }

    /// POST a prediction as `caller`.
    pub async fn predict(
        &self,
        caller: &TestAccount,
        model: ModelId,
        body: &Value,
    ) -> axum_test::TestResponse {
        self.server
            .post(&format!("/v1/models/{model}/predict"))
            .add_header(api_key_header(), header_value(&caller.api_key))
            .json(body)
            .await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn age_note_schema() -> Vec<FieldSpec> {
    vec![
        FieldSpec::required("age", FieldType::Numeric),
        FieldSpec::optional("note", FieldType::Text),
    ]
}

pub fn api_key_header() -> HeaderName {
    HeaderName::from_static("x-api-key")
}

pub fn admin_key_header() -> HeaderName {
    HeaderName::from_static("x-admin-key")
}

pub fn authorization() -> HeaderName {
    HeaderName::from_static("authorization")
}

pub fn idempotency_key_header() -> HeaderName {
    HeaderName::from_static("idempotency-key")
}

pub fn header_value(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap()
}

/// Inference backend that always fails.
pub struct FailingInference;

#[async_trait]
impl InferenceBackend for FailingInference {
    async fn run(&self, _model: &Model, _input: &Value) -> Result<Value, InferenceError> {
        Err(InferenceError::Model("boom".into()))
    }
}

/// Inference backend that fails its first call and succeeds afterwards.
#[derive(Default)]
pub struct FailOnce {
    failed: AtomicBool,
}

#[async_trait]
impl InferenceBackend for FailOnce {
    async fn run(&self, _model: &Model, _input: &Value) -> Result<Value, InferenceError> {
        if self.failed.swap(true, Ordering::SeqCst) {
            Ok(serde_json::json!({ "label": "ok" }))
        } else {
            Err(InferenceError::Model("transient".into()))
        }
    }
}

/// Inference backend that never answers in time.
pub struct StalledInference;

#[async_trait]
impl InferenceBackend for StalledInference {
    async fn run(&self, _model: &Model, _input: &Value) -> Result<Value, InferenceError> {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        Ok(Value::Null)
    }
}
