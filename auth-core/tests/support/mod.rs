#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use auth_core::model::{MfaFieldsUpdate, RefreshSession, UserRecord};
use auth_core::service::hash_password;
use auth_core::store::{
    Notifier, RefreshSessionStore, StoreError, StoreResult, UserStore,
};
use auth_core::{AuthConfig, AuthService};
use common_crypto::SecretCodec;

pub fn test_config() -> AuthConfig {
    AuthConfig {
        signing_key: "integration-test-signing-key-0123456789".to_string(),
        token_issuer: "test-issuer".to_string(),
        mfa_passphrase: "test passphrase".to_string(),
        mfa_salt: "test-salt-value".to_string(),
        mfa_account_issuer: "CaseBox Test".to_string(),
        front_end_base_url: "http://localhost:3000".to_string(),
        access_ttl_minutes: 60,
        mfa_ttl_minutes: 10,
        mfa_first_sign_in_ttl_minutes: 20,
        change_password_ttl_minutes: 60,
        refresh_ttl_days: 7,
    }
}

#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<Vec<UserRecord>>,
}

impl InMemoryUserStore {
    pub fn insert(&self, user: UserRecord) {
        self.users.lock().expect("lock").push(user);
    }

    pub fn get_by_email(&self, email: &str) -> Option<UserRecord> {
        self.users
            .lock()
            .expect("lock")
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self.get_by_email(email))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        Ok(self
            .users
            .lock()
            .expect("lock")
            .iter()
            .find(|user| user.id == id)
            .cloned())
    }

    async fn find_by_encrypted_mfa_secret(
        &self,
        encrypted: &str,
    ) -> StoreResult<Option<UserRecord>> {
        Ok(self
            .users
            .lock()
            .expect("lock")
            .iter()
            .find(|user| user.encrypted_mfa_secret.as_deref() == Some(encrypted))
            .cloned())
    }

    async fn update_password(&self, email: &str, password_hash: &str) -> StoreResult<bool> {
        let mut users = self.users.lock().expect("lock");
        match users
            .iter_mut()
            .find(|user| user.email.eq_ignore_ascii_case(email))
        {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_mfa_fields(&self, update: MfaFieldsUpdate) -> StoreResult<bool> {
        let mut users = self.users.lock().expect("lock");
        match users.iter_mut().find(|user| user.id == update.user_id) {
            Some(user) => {
                user.encrypted_mfa_secret = Some(update.encrypted_secret);
                user.qr_code_uri = Some(update.qr_code_uri);
                user.manual_entry_code = Some(update.manual_entry_code);
                user.first_sign_in = update.first_sign_in;
                user.mfa_verified = update.mfa_verified;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_first_sign_in_complete(&self, email: &str) -> StoreResult<bool> {
        let mut users = self.users.lock().expect("lock");
        match users
            .iter_mut()
            .find(|user| user.email.eq_ignore_ascii_case(email))
        {
            Some(user) => {
                user.first_sign_in = false;
                user.mfa_verified = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryRefreshStore {
    sessions: Mutex<Vec<RefreshSession>>,
    fail_deletes: AtomicBool,
}

impl InMemoryRefreshStore {
    pub fn insert_raw(&self, session: RefreshSession) {
        self.sessions.lock().expect("lock").push(session);
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().expect("lock").len()
    }

    /// Make subsequent deletes fail, to exercise best-effort supersession.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RefreshSessionStore for InMemoryRefreshStore {
    async fn find_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<RefreshSession>> {
        Ok(self
            .sessions
            .lock()
            .expect("lock")
            .iter()
            .find(|session| session.user_id == user_id)
            .cloned())
    }

    async fn find_by_token(&self, token: &str) -> StoreResult<Option<RefreshSession>> {
        Ok(self
            .sessions
            .lock()
            .expect("lock")
            .iter()
            .find(|session| session.token == token)
            .cloned())
    }

    async fn insert(&self, session: RefreshSession) -> StoreResult<()> {
        self.sessions.lock().expect("lock").push(session);
        Ok(())
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::new("delete_by_id", "simulated outage"));
        }
        let mut sessions = self.sessions.lock().expect("lock");
        let before = sessions.len();
        sessions.retain(|session| session.id != id);
        Ok(sessions.len() != before)
    }
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<SentMessage>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SentMessage> {
        self.messages.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        self.messages.lock().expect("lock").push(SentMessage {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

pub struct Harness {
    pub service: AuthService,
    pub users: Arc<InMemoryUserStore>,
    pub sessions: Arc<InMemoryRefreshStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub config: AuthConfig,
}

impl Harness {
    pub fn new() -> Self {
        let users = Arc::new(InMemoryUserStore::default());
        let sessions = Arc::new(InMemoryRefreshStore::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let config = test_config();
        let service = AuthService::new(
            users.clone(),
            sessions.clone(),
            notifier.clone(),
            config.clone(),
        )
        .expect("service");

        Self {
            service,
            users,
            sessions,
            notifier,
            config,
        }
    }

    pub fn codec(&self) -> SecretCodec {
        SecretCodec::new(&self.config.mfa_passphrase, &self.config.mfa_salt)
    }

    pub fn seed_user(&self, email: &str, password: &str) -> UserRecord {
        self.seed_user_with(email, password, |_| {})
    }

    pub fn seed_user_with(
        &self,
        email: &str,
        password: &str,
        customize: impl FnOnce(&mut UserRecord),
    ) -> UserRecord {
        let mut user = UserRecord {
            id: Uuid::new_v4(),
            email: email.trim().to_ascii_lowercase(),
            password_hash: hash_password(password).expect("hash"),
            active: true,
            role: "agent".to_string(),
            first_sign_in: true,
            mfa_verified: false,
            encrypted_mfa_secret: None,
            qr_code_uri: None,
            manual_entry_code: None,
        };
        customize(&mut user);
        self.users.insert(user.clone());
        user
    }

    /// Seed a returning user already enrolled with the given TOTP secret.
    pub fn seed_enrolled_user(&self, email: &str, password: &str, secret: &str) -> UserRecord {
        let encrypted = self.codec().encrypt(secret);
        self.seed_user_with(email, password, |user| {
            user.first_sign_in = false;
            user.mfa_verified = true;
            user.encrypted_mfa_secret = Some(encrypted);
        })
    }
}
