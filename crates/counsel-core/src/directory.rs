//! Client directory and phone authentication

use chrono::{DateTime, Local};
use counsel_api::{AuthOutcome, ClientRecord, LoginCodeDelivery};
use counsel_config::AuthSettings;
use counsel_ports::SmsGateway;
use counsel_store::{AuditEventType, Store};
use counsel_util::{ClientId, CounselError, PhoneNumber, RateLimiter, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::audit;
use crate::login_code::LoginCodes;
use crate::password::{hash_password, verify_password, verify_placeholder};

/// Fields supplied when inserting or updating a client
#[derive(Debug, Clone)]
pub struct ClientUpsert {
    pub name: String,
    pub phone: String,
    /// Plaintext password; `None` keeps the stored hash on update
    pub password: Option<String>,
    pub is_active: bool,
}

/// Persisted client identity records, keyed by normalized phone
pub struct ClientDirectory {
    store: Arc<dyn Store>,
    sms: Arc<dyn SmsGateway>,
    settings: AuthSettings,
    codes: Mutex<LoginCodes>,
    /// Code requests per normalized phone
    code_requests: Mutex<RateLimiter<String>>,
    code_window: chrono::Duration,
}

impl ClientDirectory {
    pub fn new(store: Arc<dyn Store>, sms: Arc<dyn SmsGateway>, settings: AuthSettings) -> Self {
        let code_window = chrono::Duration::from_std(settings.login_code_window)
            .unwrap_or_else(|_| chrono::Duration::weeks(52));
        let code_requests = RateLimiter::new(settings.login_code_requests, code_window);
        Self {
            store,
            sms,
            settings,
            codes: Mutex::new(LoginCodes::new()),
            code_requests: Mutex::new(code_requests),
            code_window,
        }
    }

    /// Insert a client, or update the record with the same normalized phone.
    ///
    /// Updates keep `id` and `created_at`.
    pub fn upsert(&self, input: ClientUpsert, now: DateTime<Local>) -> Result<ClientRecord> {
        let phone = PhoneNumber::new(input.phone);
        if phone.is_empty() {
            return Err(CounselError::invalid_input("phone must contain digits"));
        }
        let password_hash = input.password.as_deref().map(hash_password).transpose()?;

        let mut book = self.store.load_clients()?;
        let (record, created) = match book.position_by_phone(&phone) {
            Some(index) => {
                let record = &mut book.clients[index];
                record.name = input.name;
                record.phone = phone;
                record.is_active = input.is_active;
                if let Some(hash) = password_hash {
                    record.password_hash = hash;
                }
                (record.clone(), false)
            }
            None => {
                let password_hash = password_hash.ok_or_else(|| {
                    CounselError::invalid_input("a password is required for a new client")
                })?;
                let record = ClientRecord {
                    id: ClientId::new(),
                    name: input.name,
                    phone,
                    password_hash,
                    is_active: input.is_active,
                    created_at: now,
                    last_login: None,
                };
                book.clients.push(record.clone());
                (record, true)
            }
        };
        self.store.save_clients(&book)?;

        audit(
            self.store.as_ref(),
            AuditEventType::ClientUpserted {
                client_id: record.id,
                created,
            },
        );
        info!(
            client_id = %record.id,
            phone = %record.phone.masked(),
            created,
            "Client upserted"
        );

        Ok(record)
    }

    /// Check a phone and password.
    ///
    /// Fails with `NotFound` for an unknown phone, `Disabled` for an inactive
    /// record and `InvalidCredentials` for a wrong password. On success the
    /// record's `last_login` is set to `now`.
    pub fn authenticate(
        &self,
        phone_input: &str,
        password: &str,
        now: DateTime<Local>,
    ) -> Result<ClientRecord> {
        let phone = PhoneNumber::new(phone_input);
        let result = self
            .check_password(&phone, password)
            .and_then(|id| self.record_login(id, now, "password"));

        if let Err(e) = &result {
            self.login_failed(&phone, e.code());
        }
        result
    }

    /// [`authenticate`](Self::authenticate) packaged for the presentation layer
    pub fn login(&self, phone_input: &str, password: &str, now: DateTime<Local>) -> AuthOutcome {
        AuthOutcome::from_result(self.authenticate(phone_input, password, now))
    }

    pub fn get(&self, id: ClientId) -> Result<ClientRecord> {
        self.store
            .load_clients()?
            .get(id)
            .cloned()
            .ok_or_else(|| client_not_found(id))
    }

    pub fn find_by_phone(&self, phone_input: &str) -> Result<Option<ClientRecord>> {
        let phone = PhoneNumber::new(phone_input);
        Ok(self.store.load_clients()?.find_by_phone(&phone).cloned())
    }

    /// All clients in insertion order
    pub fn list(&self) -> Result<Vec<ClientRecord>> {
        Ok(self.store.load_clients()?.clients)
    }

    pub fn set_active(&self, id: ClientId, is_active: bool) -> Result<ClientRecord> {
        let mut book = self.store.load_clients()?;
        let record = book.get_mut(id).ok_or_else(|| client_not_found(id))?;
        record.is_active = is_active;
        let record = record.clone();
        self.store.save_clients(&book)?;

        audit(
            self.store.as_ref(),
            AuditEventType::ClientActivationChanged {
                client_id: id,
                is_active,
            },
        );
        info!(client_id = %id, is_active, "Client activation changed");

        Ok(record)
    }

    /// Issue a one-time login code and try to deliver it by SMS.
    ///
    /// A failed delivery is not an error: the code is handed back for
    /// in-band display instead. Each phone may request
    /// `login_code_requests` codes per `login_code_window`, known or not.
    pub fn request_login_code(
        &self,
        phone_input: &str,
        now: DateTime<Local>,
    ) -> Result<LoginCodeDelivery> {
        self.ensure_code_login()?;

        let phone = PhoneNumber::new(phone_input);
        let allowed = {
            let mut limiter = self
                .code_requests
                .lock()
                .map_err(|_| CounselError::internal("login code limiter lock poisoned"))?;
            limiter.cleanup(now, self.code_window);
            limiter.check(&phone.normalized().to_string(), now)
        };
        if !allowed {
            let e = CounselError::RateLimited;
            self.login_failed(&phone, e.code());
            return Err(e);
        }

        let client = match self.active_client(&phone) {
            Ok(client) => client,
            Err(e) => {
                self.login_failed(&phone, e.code());
                return Err(e);
            }
        };

        let ttl = chrono::Duration::from_std(self.settings.login_code_ttl)
            .map_err(|e| CounselError::internal(format!("login code ttl out of range: {}", e)))?;
        let code = {
            let mut codes = self.codes()?;
            codes.purge_expired(now);
            codes.issue(client.phone.normalized(), client.id, now + ttl)
        };

        let message = format!("Your login code is {}", code);
        let delivery = match self.sms.send(client.phone.normalized(), &message) {
            Ok(receipt) => LoginCodeDelivery::Sent {
                message_id: receipt.message_id,
            },
            Err(e) => {
                warn!(
                    client_id = %client.id,
                    phone = %client.phone.masked(),
                    error = %e,
                    "SMS delivery failed, displaying login code"
                );
                LoginCodeDelivery::Displayed { code }
            }
        };

        let delivered = matches!(delivery, LoginCodeDelivery::Sent { .. });
        audit(
            self.store.as_ref(),
            AuditEventType::LoginCodeIssued {
                client_id: client.id,
                delivered,
            },
        );
        debug!(client_id = %client.id, delivered, "Login code issued");

        Ok(delivery)
    }

    /// Log in with a code from [`request_login_code`](Self::request_login_code).
    ///
    /// Each code is accepted once, before it expires.
    pub fn verify_login_code(
        &self,
        phone_input: &str,
        code: &str,
        now: DateTime<Local>,
    ) -> Result<ClientRecord> {
        self.ensure_code_login()?;

        let phone = PhoneNumber::new(phone_input);
        let redeemed = self.codes()?.redeem(phone.normalized(), code, now);
        let id = match redeemed {
            Ok(id) => id,
            Err(rejection) => {
                self.login_failed(&phone, rejection.as_str());
                return Err(CounselError::InvalidCredentials);
            }
        };

        let result = self.get(id).and_then(|client| {
            if !client.is_active {
                return Err(CounselError::Disabled);
            }
            self.record_login(client.id, now, "code")
        });
        if let Err(e) = &result {
            self.login_failed(&phone, e.code());
        }
        result
    }

    fn check_password(&self, phone: &PhoneNumber, password: &str) -> Result<ClientId> {
        let client = match self.active_client(phone) {
            Ok(client) => client,
            Err(e) => {
                if matches!(e, CounselError::NotFound(_) | CounselError::Disabled) {
                    verify_placeholder(password);
                }
                return Err(e);
            }
        };
        if !verify_password(password, &client.password_hash) {
            return Err(CounselError::InvalidCredentials);
        }
        Ok(client.id)
    }

    fn active_client(&self, phone: &PhoneNumber) -> Result<ClientRecord> {
        let book = self.store.load_clients()?;
        let client = book
            .find_by_phone(phone)
            .ok_or_else(|| CounselError::not_found(format!("client {}", phone.masked())))?;
        if !client.is_active {
            return Err(CounselError::Disabled);
        }
        Ok(client.clone())
    }

    /// Re-read the directory and stamp `last_login`
    fn record_login(&self, id: ClientId, now: DateTime<Local>, method: &str) -> Result<ClientRecord> {
        let mut book = self.store.load_clients()?;
        let record = book.get_mut(id).ok_or_else(|| client_not_found(id))?;
        record.last_login = Some(now);
        let record = record.clone();
        self.store.save_clients(&book)?;

        audit(
            self.store.as_ref(),
            AuditEventType::LoginSucceeded {
                client_id: id,
                method: method.to_string(),
            },
        );
        info!(client_id = %id, method, "Client logged in");

        Ok(record)
    }

    fn login_failed(&self, phone: &PhoneNumber, reason: &str) {
        audit(
            self.store.as_ref(),
            AuditEventType::LoginFailed {
                phone: phone.masked(),
                reason: reason.to_string(),
            },
        );
        info!(phone = %phone.masked(), reason, "Login failed");
    }

    fn ensure_code_login(&self) -> Result<()> {
        if !self.settings.sms_login {
            return Err(CounselError::invalid_input("phone login codes are disabled"));
        }
        Ok(())
    }

    fn codes(&self) -> Result<MutexGuard<'_, LoginCodes>> {
        self.codes
            .lock()
            .map_err(|_| CounselError::internal("login code table lock poisoned"))
    }
}

fn client_not_found(id: ClientId) -> CounselError {
    CounselError::not_found(format!("client {}", id))
}
