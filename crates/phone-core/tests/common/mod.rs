//! Shared test support: a scriptable mock transport and a wired-up manager.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::{broadcast, mpsc};

use dialtone_phone_core::{
    EndpointConfig, MediaOptions, PhoneEvent, SessionId, SessionManager, SignalingTransport,
    TerminateReason, TransportError, TransportEvent,
};
use dialtone_phone_core::{sip_vault_account, Settings, SettingsStore};
use dialtone_settings_core::{MemoryVault, SecretVault};

// ── Mock transport ──────────────────────────────────────────────────

/// Operations the controllers invoked on the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOp {
    Start,
    Stop,
    Unregister,
    Call { target: String },
    Answer { session: SessionId },
    Terminate { session: SessionId, reason: TerminateReason },
    Hold { session: SessionId },
    Resume { session: SessionId },
    SetMuted { session: SessionId, muted: bool },
}

/// Scriptable [`SignalingTransport`]: records operations, lets tests inject
/// lifecycle events, and can be told to fail specific operations.
#[derive(Default)]
pub struct MockTransport {
    sender: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    ops: Mutex<Vec<MockOp>>,
    pub fail_start: AtomicBool,
    pub fail_call: AtomicBool,
    pub fail_answer: AtomicBool,
    pub fail_terminate: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Inject a transport event. Silently dropped once the transport is
    /// stopped, like a real library after teardown.
    pub fn emit(&self, event: TransportEvent) {
        if let Some(tx) = self.sender.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    pub fn ops(&self) -> Vec<MockOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    fn record(&self, op: MockOp) {
        self.ops.lock().unwrap().push(op);
    }

    fn fail_if(&self, flag: &AtomicBool, what: &str) -> Result<(), TransportError> {
        if flag.load(Ordering::SeqCst) {
            Err(TransportError(format!("{what} refused by mock")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SignalingTransport for MockTransport {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<TransportEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.sender.lock().unwrap() = Some(tx);
        rx
    }

    async fn start(&self, _endpoint: &EndpointConfig) -> Result<(), TransportError> {
        self.record(MockOp::Start);
        self.fail_if(&self.fail_start, "start")
    }

    async fn stop(&self) {
        self.record(MockOp::Stop);
        // Closing the channel ends the dispatch task's event stream.
        self.sender.lock().unwrap().take();
    }

    async fn unregister(&self) -> Result<(), TransportError> {
        self.record(MockOp::Unregister);
        Ok(())
    }

    async fn call(
        &self,
        target_uri: &str,
        _media: &MediaOptions,
    ) -> Result<SessionId, TransportError> {
        self.fail_if(&self.fail_call, "call")?;
        self.record(MockOp::Call {
            target: target_uri.to_string(),
        });
        Ok(SessionId::new())
    }

    async fn answer(
        &self,
        session: &SessionId,
        _media: &MediaOptions,
    ) -> Result<(), TransportError> {
        self.fail_if(&self.fail_answer, "answer")?;
        self.record(MockOp::Answer { session: *session });
        Ok(())
    }

    async fn terminate(
        &self,
        session: &SessionId,
        reason: TerminateReason,
    ) -> Result<(), TransportError> {
        self.fail_if(&self.fail_terminate, "terminate")?;
        self.record(MockOp::Terminate {
            session: *session,
            reason,
        });
        Ok(())
    }

    async fn hold(&self, session: &SessionId) -> Result<(), TransportError> {
        self.record(MockOp::Hold { session: *session });
        Ok(())
    }

    async fn resume(&self, session: &SessionId) -> Result<(), TransportError> {
        self.record(MockOp::Resume { session: *session });
        Ok(())
    }

    async fn set_muted(&self, session: &SessionId, muted: bool) -> Result<(), TransportError> {
        self.record(MockOp::SetMuted {
            session: *session,
            muted,
        });
        Ok(())
    }
}

// ── Harness ─────────────────────────────────────────────────────────

pub struct Harness {
    pub manager: SessionManager,
    pub transport: Arc<MockTransport>,
    pub vault: Arc<MemoryVault>,
    pub events: broadcast::Receiver<PhoneEvent>,
    pub store: SettingsStore,
    _dir: tempfile::TempDir,
}

/// Manager wired to a mock transport, an in-memory vault (with a SIP
/// password for "alice"), and a tempdir-backed store seeded with `settings`.
pub fn harness_with(settings: Settings, platform_base_url: Option<&str>) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();

    let dir = tempfile::tempdir().expect("tempdir");
    let store = SettingsStore::with_path(dir.path().join("settings.toml"));
    store.save(&settings).expect("seed settings");

    let vault = Arc::new(MemoryVault::new());
    vault
        .store(
            &sip_vault_account("alice"),
            &SecretString::from("sippass".to_string()),
        )
        .expect("seed vault");

    let transport = MockTransport::new();

    let mut builder =
        SessionManager::builder(store.clone(), vault.clone(), transport.clone());
    if let Some(base_url) = platform_base_url {
        builder = builder.platform_base_url(base_url);
    }
    let manager = builder.build().expect("build manager");
    let events = manager.subscribe();

    Harness {
        manager,
        transport,
        vault,
        events,
        store,
        _dir: dir,
    }
}

/// Harness with a registration-ready configuration.
pub fn harness() -> Harness {
    let mut settings = Settings::default();
    settings.sip_server = "sip.example.com".into();
    settings.sip_username = "alice".into();
    harness_with(settings, None)
}

/// Drive the harness through a successful registration.
pub async fn register(h: &mut Harness) {
    h.manager.start_registration().await.expect("start");
    h.transport.emit(TransportEvent::Connected);
    h.transport.emit(TransportEvent::Registered);
    expect_event(&mut h.events, "Registered", |e| {
        matches!(
            e,
            PhoneEvent::RegistrationStatusChanged {
                state: dialtone_phone_core::RegistrationState::Registered
            }
        )
    })
    .await;
}

// ── Event helpers ───────────────────────────────────────────────────

/// Receive events until `pred` matches, panicking after a bounded wait.
pub async fn expect_event(
    rx: &mut broadcast::Receiver<PhoneEvent>,
    what: &str,
    pred: impl Fn(&PhoneEvent) -> bool,
) -> PhoneEvent {
    let deadline = Duration::from_secs(5);
    let result = tokio::time::timeout(deadline, async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => continue,
                Err(e) => panic!("event channel closed while waiting for {what}: {e}"),
            }
        }
    })
    .await;
    match result {
        Ok(event) => event,
        Err(_) => panic!("timed out waiting for {what}"),
    }
}

/// Assert that no event matching `pred` is already queued.
pub fn assert_no_queued_event(
    rx: &mut broadcast::Receiver<PhoneEvent>,
    what: &str,
    pred: impl Fn(&PhoneEvent) -> bool,
) {
    while let Ok(event) = rx.try_recv() {
        assert!(!pred(&event), "unexpected {what}: {event:?}");
    }
}

/// Let the dispatch task drain everything queued so far.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Poll until the transport has recorded `op`, panicking after a bounded
/// wait.
pub async fn wait_for_op(transport: &MockTransport, op: &MockOp) {
    let deadline = Duration::from_secs(5);
    let result = tokio::time::timeout(deadline, async {
        loop {
            if transport.ops().contains(op) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for op {op:?}");
}
