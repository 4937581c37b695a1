//! End-to-end flows over in-memory directories: authentication, customer
//! lifecycle, and administrator invitation.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use custodia::audit::{AuditAction, AuditEntry, AuditLog};
use custodia::auth::session::MemorySessionBackend;
use custodia::auth::{AdminAuthService, AuthError, Permission, Role, Session, SessionStore};
use custodia::directory::admins::{AdminDirectory, Administrator, NewAdministrator};
use custodia::directory::customers::{
    CustomerDirectory, CustomerPage, CustomerQuery, CustomerRecord, CustomerStatus, StatusChange,
};
use custodia::invite::{InvitationService, InviteEmail, InviteRequest, InviteSender};
use custodia::verifier::{CredentialVerifier, VerifiedPrincipal, VerifierError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const PASSWORD: &str = "correct horse battery staple";

/// Credential verifier over a fixed set of email/password pairs.
#[derive(Default)]
struct StubVerifier {
    accounts: Mutex<HashMap<String, (Uuid, String)>>,
    fail_sign_out: AtomicBool,
    sign_out_calls: AtomicUsize,
    provision_calls: AtomicUsize,
    reset_calls: AtomicUsize,
}

impl StubVerifier {
    fn with_account(email: &str, password: &str) -> (Self, Uuid) {
        let id = Uuid::new_v4();
        let verifier = Self::default();
        verifier
            .accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), (id, password.to_string()));
        (verifier, id)
    }
}

#[async_trait]
impl CredentialVerifier for StubVerifier {
    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<VerifiedPrincipal, VerifierError> {
        let accounts = self.accounts.lock().unwrap();
        match accounts.get(email) {
            Some((id, stored)) if stored == password => Ok(VerifiedPrincipal {
                id: *id,
                access_token: format!("token-{id}"),
            }),
            _ => Err(VerifierError::InvalidCredentials),
        }
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), VerifierError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(VerifierError::Unavailable);
        }
        Ok(())
    }

    async fn provision(&self, email: &str, password: &str) -> Result<Uuid, VerifierError> {
        self.provision_calls.fetch_add(1, Ordering::SeqCst);
        let id = Uuid::new_v4();
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), (id, password.to_string()));
        Ok(id)
    }

    async fn update_password(
        &self,
        _access_token: &str,
        _new_password: &str,
    ) -> Result<(), VerifierError> {
        Ok(())
    }

    async fn send_password_reset(
        &self,
        _email: &str,
        _redirect_url: &str,
    ) -> Result<(), VerifierError> {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct StubAdmins {
    records: Mutex<HashMap<Uuid, Administrator>>,
}

impl StubAdmins {
    fn insert(&self, admin: Administrator) {
        self.records.lock().unwrap().insert(admin.id, admin);
    }
}

#[async_trait]
impl AdminDirectory for StubAdmins {
    async fn find_active_by_principal(&self, auth_user_id: Uuid) -> Result<Option<Administrator>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|a| a.auth_user_id == auth_user_id && a.is_active)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Administrator>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create(&self, admin: NewAdministrator) -> Result<Administrator> {
        let record = Administrator {
            id: Uuid::new_v4(),
            auth_user_id: admin.auth_user_id,
            email: admin.email,
            first_name: admin.first_name,
            last_name: admin.last_name,
            role: admin.role.as_str().to_string(),
            is_active: true,
            needs_password_reset: admin.needs_password_reset,
            created_at: Utc::now(),
            last_login_at: None,
            invited_by: admin.invited_by,
        };
        self.insert(record.clone());
        Ok(record)
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<Administrator>> {
        let mut records = self.records.lock().unwrap();
        Ok(records.get_mut(&id).map(|a| {
            a.is_active = active;
            a.clone()
        }))
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<Administrator>> {
        let mut records = self.records.lock().unwrap();
        Ok(records.get_mut(&id).map(|a| {
            a.role = role.as_str().to_string();
            a.clone()
        }))
    }

    async fn record_login(&self, id: Uuid) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        if let Some(admin) = records.get_mut(&id) {
            admin.last_login_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Administrator>> {
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }
}

#[derive(Default)]
struct StubCustomers {
    records: Mutex<HashMap<Uuid, CustomerRecord>>,
    writes: AtomicUsize,
}

impl StubCustomers {
    fn with_pending(email: &str) -> (Self, Uuid) {
        let id = Uuid::new_v4();
        let customers = Self::default();
        customers.records.lock().unwrap().insert(
            id,
            CustomerRecord {
                id,
                email: email.to_string(),
                first_name: "Pat".to_string(),
                last_name: "Doe".to_string(),
                company: None,
                status: CustomerStatus::Pending,
                created_at: Utc::now(),
                approved_by: None,
                approved_at: None,
                rejection_reason: None,
            },
        );
        (customers, id)
    }
}

#[async_trait]
impl CustomerDirectory for StubCustomers {
    async fn set_status(
        &self,
        id: Uuid,
        change: &StatusChange,
    ) -> Result<Option<CustomerRecord>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        Ok(records.get_mut(&id).map(|record| {
            record.status = change.status;
            record.approved_by = Some(change.acted_by);
            record.approved_at = Some(Utc::now());
            // Same contract as the Postgres directory: only rejections keep
            // a reason on the record.
            record.rejection_reason = if change.status == CustomerStatus::Rejected {
                change.reason.clone()
            } else {
                None
            };
            record.clone()
        }))
    }

    async fn list(&self, query: &CustomerQuery) -> Result<CustomerPage> {
        let records = self.records.lock().unwrap();
        let customers: Vec<CustomerRecord> = records
            .values()
            .filter(|r| query.statuses.is_empty() || query.statuses.contains(&r.status))
            .cloned()
            .collect();
        let total = customers.len() as i64;
        Ok(CustomerPage {
            customers,
            total,
            page_count: 1,
        })
    }
}

#[derive(Default)]
struct StubAudit {
    entries: Mutex<Vec<AuditEntry>>,
    fail: AtomicBool,
}

#[async_trait]
impl AuditLog for StubAudit {
    async fn append(&self, entry: AuditEntry) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("audit store offline"));
        }
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

#[derive(Default)]
struct StubSender {
    fail: bool,
    sent: Mutex<Vec<InviteEmail>>,
}

impl InviteSender for StubSender {
    fn send(&self, email: &InviteEmail) -> Result<()> {
        if self.fail {
            return Err(anyhow!("smtp down"));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

struct Harness {
    verifier: Arc<StubVerifier>,
    admins: Arc<StubAdmins>,
    customers: Arc<StubCustomers>,
    audit: Arc<StubAudit>,
    service: AdminAuthService,
    customer_id: Uuid,
}

fn admin_record(auth_user_id: Uuid, email: &str, role: Role) -> Administrator {
    Administrator {
        id: Uuid::new_v4(),
        auth_user_id,
        email: email.to_string(),
        first_name: "Alex".to_string(),
        last_name: "Admin".to_string(),
        role: role.as_str().to_string(),
        is_active: true,
        needs_password_reset: false,
        created_at: Utc::now(),
        last_login_at: None,
        invited_by: None,
    }
}

fn harness(role: Role) -> Harness {
    let email = "alex@example.com";
    let (verifier, principal_id) = StubVerifier::with_account(email, PASSWORD);
    let verifier = Arc::new(verifier);
    let admins = Arc::new(StubAdmins::default());
    admins.insert(admin_record(principal_id, email, role));
    let (customers, customer_id) = StubCustomers::with_pending("pat@example.com");
    let customers = Arc::new(customers);
    let audit = Arc::new(StubAudit::default());
    let sessions = SessionStore::new(Arc::new(MemorySessionBackend::new()), 3600);
    let service = AdminAuthService::new(
        Arc::clone(&verifier) as Arc<dyn CredentialVerifier>,
        Arc::clone(&admins) as Arc<dyn AdminDirectory>,
        Arc::clone(&customers) as Arc<dyn CustomerDirectory>,
        Arc::clone(&audit) as Arc<dyn AuditLog>,
        sessions,
    );
    Harness {
        verifier,
        admins,
        customers,
        audit,
        service,
        customer_id,
    }
}

async fn signed_in(role: Role) -> Harness {
    let h = harness(role);
    h.service
        .login("alex@example.com", PASSWORD)
        .await
        .expect("login");
    h
}

fn actor_session(h: &Harness) -> Session {
    h.service.current_session().expect("active session")
}

#[tokio::test]
async fn login_establishes_a_session_with_role_permissions() {
    let h = harness(Role::Admin);
    let admin = h.service.login("alex@example.com", PASSWORD).await.unwrap();
    assert_eq!(admin.email, "alex@example.com");

    let session = h.service.current_session().expect("session");
    assert_eq!(session.role_name(), "admin");
    assert!(session.allows(Permission::UsersApprove));
    assert!(!session.allows(Permission::AdminDelete));
}

#[tokio::test]
async fn wrong_password_is_indistinguishable_from_unknown_email() {
    let h = harness(Role::Admin);
    let wrong_password = h
        .service
        .login("alex@example.com", "nope")
        .await
        .unwrap_err();
    let unknown_email = h.service.login("nobody@example.com", "nope").await.unwrap_err();
    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    assert!(matches!(wrong_password, AuthError::InvalidCredentials));
    assert!(h.service.current_session().is_none());
}

#[tokio::test]
async fn valid_credentials_without_admin_record_are_rejected_and_signed_out() {
    let (verifier, _principal) = StubVerifier::with_account("user@example.com", PASSWORD);
    let verifier = Arc::new(verifier);
    let admins = Arc::new(StubAdmins::default());
    let (customers, _) = StubCustomers::with_pending("pat@example.com");
    let service = AdminAuthService::new(
        Arc::clone(&verifier) as Arc<dyn CredentialVerifier>,
        admins,
        Arc::new(customers),
        Arc::new(StubAudit::default()),
        SessionStore::new(Arc::new(MemorySessionBackend::new()), 3600),
    );

    let err = service.login("user@example.com", PASSWORD).await.unwrap_err();
    assert!(matches!(err, AuthError::NotAnAdministrator));
    assert!(service.current_session().is_none());
    // The upstream session must not stay alive.
    assert_eq!(verifier.sign_out_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unrotated_temporary_password_blocks_login() {
    let email = "fresh@example.com";
    let (verifier, principal_id) = StubVerifier::with_account(email, PASSWORD);
    let verifier = Arc::new(verifier);
    let admins = Arc::new(StubAdmins::default());
    let mut record = admin_record(principal_id, email, Role::Admin);
    record.needs_password_reset = true;
    admins.insert(record);
    let (customers, _) = StubCustomers::with_pending("pat@example.com");
    let service = AdminAuthService::new(
        Arc::clone(&verifier) as Arc<dyn CredentialVerifier>,
        admins,
        Arc::new(customers),
        Arc::new(StubAudit::default()),
        SessionStore::new(Arc::new(MemorySessionBackend::new()), 3600),
    );

    let err = service.login(email, PASSWORD).await.unwrap_err();
    assert!(matches!(err, AuthError::PasswordResetRequired));
    assert!(service.current_session().is_none());
    assert_eq!(verifier.sign_out_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn inactive_administrator_cannot_authenticate() {
    let email = "gone@example.com";
    let (verifier, principal_id) = StubVerifier::with_account(email, PASSWORD);
    let admins = Arc::new(StubAdmins::default());
    let mut record = admin_record(principal_id, email, Role::Admin);
    record.is_active = false;
    admins.insert(record);
    let (customers, _) = StubCustomers::with_pending("pat@example.com");
    let service = AdminAuthService::new(
        Arc::new(verifier),
        admins,
        Arc::new(customers),
        Arc::new(StubAudit::default()),
        SessionStore::new(Arc::new(MemorySessionBackend::new()), 3600),
    );

    let err = service.login(email, PASSWORD).await.unwrap_err();
    assert!(matches!(err, AuthError::NotAnAdministrator));
}

#[tokio::test]
async fn approve_persists_and_audits_exactly_once() {
    let h = signed_in(Role::Admin).await;
    let customer = h
        .service
        .approve_customer(h.customer_id, Some("docs verified"))
        .await
        .unwrap();
    assert_eq!(customer.status, CustomerStatus::Approved);

    let entries = h.audit.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::UserApproved);
    assert_eq!(entries[0].target_id, h.customer_id);
    assert_eq!(entries[0].details["reason"], "docs verified");
}

#[tokio::test]
async fn viewer_cannot_mutate_customers() {
    let h = signed_in(Role::Viewer).await;
    let err = h
        .service
        .suspend_customer(h.customer_id, "fraud")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::PermissionDenied {
            required: Permission::UsersSuspend
        }
    ));
    // Denied before any write or audit entry.
    assert_eq!(h.customers.writes.load(Ordering::SeqCst), 0);
    assert!(h.audit.entries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn rejection_without_reason_never_touches_the_store() {
    let h = signed_in(Role::Admin).await;
    let err = h
        .service
        .reject_customer(h.customer_id, "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));
    assert_eq!(h.customers.writes.load(Ordering::SeqCst), 0);
    assert!(h.audit.entries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn suspension_without_reason_is_refused() {
    let h = signed_in(Role::SuperAdmin).await;
    let err = h.service.suspend_customer(h.customer_id, "").await.unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));
    assert_eq!(h.customers.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_customer_is_not_found() {
    let h = signed_in(Role::Admin).await;
    let err = h
        .service
        .reject_customer(Uuid::new_v4(), "incomplete application")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotFound));
}

/// Customer directory whose writes always fail.
struct FailingCustomers;

#[async_trait]
impl CustomerDirectory for FailingCustomers {
    async fn set_status(
        &self,
        _id: Uuid,
        _change: &StatusChange,
    ) -> Result<Option<CustomerRecord>> {
        Err(anyhow!("customer store offline"))
    }

    async fn list(&self, _query: &CustomerQuery) -> Result<CustomerPage> {
        Err(anyhow!("customer store offline"))
    }
}

#[tokio::test]
async fn persistence_failure_writes_no_audit_entry() {
    let email = "alex@example.com";
    let (verifier, principal_id) = StubVerifier::with_account(email, PASSWORD);
    let admins = Arc::new(StubAdmins::default());
    admins.insert(admin_record(principal_id, email, Role::Admin));
    let audit = Arc::new(StubAudit::default());
    let service = AdminAuthService::new(
        Arc::new(verifier),
        admins,
        Arc::new(FailingCustomers),
        Arc::clone(&audit) as Arc<dyn AuditLog>,
        SessionStore::new(Arc::new(MemorySessionBackend::new()), 3600),
    );
    service.login(email, PASSWORD).await.unwrap();

    let err = service
        .approve_customer(Uuid::new_v4(), Some("docs verified"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Internal(_)));
    // A mutation that never landed must not be audited.
    assert!(audit.entries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn approval_after_rejection_clears_the_stored_reason() {
    let h = signed_in(Role::Admin).await;
    let customer = h
        .service
        .reject_customer(h.customer_id, "incomplete signup")
        .await
        .unwrap();
    assert_eq!(customer.rejection_reason.as_deref(), Some("incomplete signup"));

    let customer = h
        .service
        .approve_customer(h.customer_id, None)
        .await
        .unwrap();
    assert_eq!(customer.status, CustomerStatus::Approved);
    assert!(customer.rejection_reason.is_none());
}

#[tokio::test]
async fn audit_failure_does_not_fail_the_operation() {
    let h = signed_in(Role::Admin).await;
    h.audit.fail.store(true, Ordering::SeqCst);
    let customer = h
        .service
        .suspend_customer(h.customer_id, "chargeback abuse")
        .await
        .unwrap();
    assert_eq!(customer.status, CustomerStatus::Suspended);
    assert_eq!(h.customers.writes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn logout_clears_the_session_and_audits() {
    let h = signed_in(Role::Admin).await;
    h.service.logout().await;
    assert!(h.service.current_session().is_none());

    let entries = h.audit.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::Logout);
    // The verifier session is revoked too.
    assert_eq!(h.verifier.sign_out_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn logout_clears_even_when_audit_and_sign_out_fail() {
    let h = signed_in(Role::Admin).await;
    h.audit.fail.store(true, Ordering::SeqCst);
    h.verifier.fail_sign_out.store(true, Ordering::SeqCst);
    h.service.logout().await;
    assert!(h.service.current_session().is_none());
}

#[tokio::test]
async fn listing_requires_the_view_permission() {
    let h = harness(Role::Admin);
    // Not signed in yet.
    let err = h
        .service
        .list_customers(CustomerQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PermissionDenied { .. }));

    h.service.login("alex@example.com", PASSWORD).await.unwrap();
    let page = h
        .service
        .list_customers(CustomerQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn password_reset_request_never_errors() {
    let h = harness(Role::Admin);
    h.service
        .request_password_reset("whoever@example.com", "https://admin.example.com/login")
        .await;
    assert_eq!(h.verifier.reset_calls.load(Ordering::SeqCst), 1);
}

fn invitation_service(h: &Harness, sender: Arc<StubSender>) -> InvitationService {
    InvitationService::new(
        Arc::clone(&h.verifier) as Arc<dyn CredentialVerifier>,
        Arc::clone(&h.admins) as Arc<dyn AdminDirectory>,
        Arc::clone(&h.audit) as Arc<dyn AuditLog>,
        sender,
        "https://admin.example.com/login".to_string(),
    )
}

fn invite_request(email: &str) -> InviteRequest {
    InviteRequest {
        email: email.to_string(),
        first_name: "Nora".to_string(),
        last_name: "New".to_string(),
        role: Role::Viewer,
    }
}

#[tokio::test]
async fn invite_provisions_notifies_and_audits() {
    let h = signed_in(Role::SuperAdmin).await;
    let actor = actor_session(&h);
    let sender = Arc::new(StubSender::default());
    let service = invitation_service(&h, Arc::clone(&sender));

    let outcome = service
        .invite(invite_request("nora@example.com"), &actor)
        .await
        .unwrap();
    assert!(outcome.notified);
    assert!(outcome.temp_password.is_none());
    assert!(outcome.admin.needs_password_reset);
    assert_eq!(outcome.admin.invited_by, Some(actor.admin_id()));

    let sent = sender.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "nora@example.com");
    assert!(sent[0].temp_password.len() >= 12);

    let entries = h.audit.entries.lock().unwrap();
    assert!(entries
        .iter()
        .any(|e| e.action == AuditAction::AdminInvited && e.target_id == outcome.admin.id));
}

#[tokio::test]
async fn duplicate_invite_is_rejected_before_provisioning() {
    let h = signed_in(Role::SuperAdmin).await;
    let actor = actor_session(&h);
    let service = invitation_service(&h, Arc::new(StubSender::default()));

    // Same address as the signed-in administrator, different case.
    let err = service
        .invite(invite_request("Alex@Example.COM"), &actor)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AlreadyExists));
    assert_eq!(h.verifier.provision_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invite_with_broken_email_degrades_to_manual_handoff() {
    let h = signed_in(Role::SuperAdmin).await;
    let actor = actor_session(&h);
    let sender = Arc::new(StubSender {
        fail: true,
        ..Default::default()
    });
    let service = invitation_service(&h, sender);

    let outcome = service
        .invite(invite_request("nora@example.com"), &actor)
        .await
        .unwrap();
    assert!(!outcome.notified);
    let password = outcome.temp_password.expect("manual handoff credential");
    assert!(password.len() >= 12);
    // The record was still created.
    assert!(h
        .admins
        .find_by_email("nora@example.com")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn invalid_invite_email_is_refused() {
    let h = signed_in(Role::SuperAdmin).await;
    let actor = actor_session(&h);
    let service = invitation_service(&h, Arc::new(StubSender::default()));

    let err = service
        .invite(invite_request("not-an-email"), &actor)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));
    assert_eq!(h.verifier.provision_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn deactivate_reactivate_and_role_change_round_trip() {
    let h = signed_in(Role::SuperAdmin).await;
    let actor = actor_session(&h);
    let service = invitation_service(&h, Arc::new(StubSender::default()));

    let outcome = service
        .invite(invite_request("nora@example.com"), &actor)
        .await
        .unwrap();
    let id = outcome.admin.id;

    let admin = service.deactivate(id, &actor).await.unwrap();
    assert!(!admin.is_active);

    let admin = service.reactivate(id, &actor).await.unwrap();
    assert!(admin.is_active);

    let admin = service.update_role(id, Role::Admin, &actor).await.unwrap();
    assert_eq!(admin.role, "admin");

    let err = service.deactivate(Uuid::new_v4(), &actor).await.unwrap_err();
    assert!(matches!(err, AuthError::NotFound));
}
