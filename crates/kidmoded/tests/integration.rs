//! Integration tests for kidmoded
//!
//! These tests verify the end-to-end behavior of the service: a real
//! service on a temporary socket, driven through the IPC client, plus the
//! core running against the tokio scheduler.

use kidmode_api::{
    Command, ErrorCode, EventPayload, Notification, ResponsePayload, ResponseResult, Session,
    SubmitOutcome, TransitionKind, TransitionTag,
};
use kidmode_config::Settings;
use kidmode_core::{RequestArbiter, TickOutcome};
use kidmode_host_api::{RecordingSink, TokioScheduler};
use kidmode_ipc::IpcClient;
use kidmode_store::{AuditEventType, SqliteStore, Store};
use kidmode_util::Secret;
use kidmoded::{Service, DB_FILE_NAME};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct RunningService {
    dir: TempDir,
    socket_path: PathBuf,
    data_dir: PathBuf,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl RunningService {
    /// Stop the service, handing back the temp dir so its files outlive the run
    async fn stop(self) -> TempDir {
        let _ = self.stop.send(());
        self.handle.await.unwrap().unwrap();
        self.dir
    }
}

fn settings_in(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.service.socket_path = dir.join("kidmoded.sock");
    settings.service.data_dir = dir.join("data");
    settings.service.log_dir = dir.join("logs");
    settings
}

async fn start_service() -> RunningService {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_in(dir.path());
    let socket_path = settings.service.socket_path.clone();
    let data_dir = settings.service.data_dir.clone();

    let service = Service::new(settings).await.unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(service.run(async move {
        let _ = stopped.await;
    }));

    RunningService {
        dir,
        socket_path,
        data_dir,
        stop,
        handle,
    }
}

fn payload(result: ResponseResult) -> ResponsePayload {
    match result {
        ResponseResult::Ok(payload) => payload,
        ResponseResult::Err(e) => panic!("unexpected error {:?}: {}", e.code, e.message),
    }
}

fn error_code(result: ResponseResult) -> ErrorCode {
    match result {
        ResponseResult::Err(e) => e.code,
        ResponseResult::Ok(payload) => panic!("expected error, got {:?}", payload),
    }
}

async fn setup_secret(client: &mut IpcClient, secret: &str) {
    let response = client
        .send(Command::SetupSecret {
            secret: Secret::new(secret),
            confirmation: Secret::new(secret),
        })
        .await
        .unwrap();
    assert!(matches!(payload(response.result), ResponsePayload::SecretConfigured));
}

async fn session_of(client: &mut IpcClient) -> Session {
    match payload(client.send(Command::GetSession).await.unwrap().result) {
        ResponsePayload::Session(view) => view.session,
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_first_run_and_enable() {
    let service = start_service().await;
    let mut client = IpcClient::connect(&service.socket_path).await.unwrap();

    // Nothing works before setup
    let response = client
        .send(Command::RequestTransition {
            kind: TransitionKind::Enable,
        })
        .await
        .unwrap();
    assert_eq!(error_code(response.result), ErrorCode::SecretNotConfigured);

    setup_secret(&mut client, "1234").await;

    let response = client
        .send(Command::SetupSecret {
            secret: Secret::new("5678"),
            confirmation: Secret::new("5678"),
        })
        .await
        .unwrap();
    assert_eq!(error_code(response.result), ErrorCode::SecretAlreadyConfigured);

    let response = client
        .send(Command::RequestTransition {
            kind: TransitionKind::Enable,
        })
        .await
        .unwrap();
    assert!(matches!(
        payload(response.result),
        ResponsePayload::ChallengeOpened {
            kind: TransitionTag::Enable
        }
    ));

    let response = client
        .send(Command::RequestTransition {
            kind: TransitionKind::Disable,
        })
        .await
        .unwrap();
    assert_eq!(error_code(response.result), ErrorCode::AlreadyPending);

    let response = client
        .send(Command::SubmitCredential {
            candidate: Secret::new("1234"),
        })
        .await
        .unwrap();
    assert!(matches!(
        payload(response.result),
        ResponsePayload::Submitted(SubmitOutcome::Approved {
            kind: TransitionTag::Enable,
            applied: true
        })
    ));

    assert_eq!(
        session_of(&mut client).await,
        Session {
            restricted: true,
            remaining_seconds: 0,
            running: false
        }
    );

    service.stop().await;
}

#[tokio::test]
async fn test_timed_session_and_disable() {
    let service = start_service().await;
    let mut client = IpcClient::connect(&service.socket_path).await.unwrap();
    setup_secret(&mut client, "1234").await;

    let response = client
        .send(Command::RequestTransition {
            kind: TransitionKind::EnableWithTimer { minutes: 1 },
        })
        .await
        .unwrap();
    assert!(matches!(
        payload(response.result),
        ResponsePayload::ChallengeOpened {
            kind: TransitionTag::EnableWithTimer
        }
    ));

    client
        .send(Command::SubmitCredential {
            candidate: Secret::new("1234"),
        })
        .await
        .unwrap();

    let session = session_of(&mut client).await;
    assert!(session.restricted && session.running);
    assert!(session.remaining_seconds <= 60 && session.remaining_seconds >= 55);

    client
        .send(Command::RequestTransition {
            kind: TransitionKind::Disable,
        })
        .await
        .unwrap();
    let response = client
        .send(Command::SubmitCredential {
            candidate: Secret::new("1234"),
        })
        .await
        .unwrap();
    assert!(matches!(
        payload(response.result),
        ResponsePayload::Submitted(SubmitOutcome::Approved { applied: true, .. })
    ));
    assert_eq!(session_of(&mut client).await, Session::INITIAL);

    // The countdown stays stopped
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(session_of(&mut client).await, Session::INITIAL);

    service.stop().await;
}

#[tokio::test]
async fn test_invalid_timer_and_empty_cancel() {
    let service = start_service().await;
    let mut client = IpcClient::connect(&service.socket_path).await.unwrap();
    setup_secret(&mut client, "1234").await;

    let response = client
        .send(Command::RequestTransition {
            kind: TransitionKind::EnableWithTimer { minutes: 0 },
        })
        .await
        .unwrap();
    assert_eq!(error_code(response.result), ErrorCode::InvalidTimer);

    let response = client.send(Command::CancelChallenge).await.unwrap();
    assert!(matches!(
        payload(response.result),
        ResponsePayload::ChallengeCancelled { was_pending: false }
    ));

    let response = client
        .send(Command::SubmitCredential {
            candidate: Secret::new("1234"),
        })
        .await
        .unwrap();
    assert_eq!(error_code(response.result), ErrorCode::NoPendingChallenge);

    let response = client.send(Command::GetTimerPresets).await.unwrap();
    assert!(matches!(
        payload(response.result),
        ResponsePayload::TimerPresets { minutes } if minutes == vec![15, 30, 60, 120]
    ));

    service.stop().await;
}

#[tokio::test]
async fn test_subscriber_sees_lockout() {
    let service = start_service().await;
    let mut client = IpcClient::connect(&service.socket_path).await.unwrap();
    setup_secret(&mut client, "1234").await;

    let mut events = IpcClient::connect(&service.socket_path)
        .await
        .unwrap()
        .subscribe()
        .await
        .unwrap();

    client
        .send(Command::RequestTransition {
            kind: TransitionKind::Enable,
        })
        .await
        .unwrap();
    for _ in 0..3 {
        client
            .send(Command::SubmitCredential {
                candidate: Secret::new("nope"),
            })
            .await
            .unwrap();
    }

    let mut notifications = Vec::new();
    while notifications.len() < 3 {
        let event = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .unwrap()
            .unwrap();
        if let EventPayload::Notification(n) = event.payload {
            notifications.push(n);
        }
    }
    assert_eq!(
        notifications,
        vec![
            Notification::Denied { attempts_left: 2 },
            Notification::Denied { attempts_left: 1 },
            Notification::LockedOut,
        ]
    );
    assert_eq!(session_of(&mut client).await, Session::INITIAL);

    service.stop().await;
}

#[tokio::test]
async fn test_secret_persists_and_audit_trail() {
    let service = start_service().await;
    let mut client = IpcClient::connect(&service.socket_path).await.unwrap();
    setup_secret(&mut client, "1234").await;

    let response = client
        .send(Command::ChangeSecret {
            new_secret: Secret::new("longer-secret"),
            confirmation: Secret::new("longer-secret"),
        })
        .await
        .unwrap();
    assert!(matches!(
        payload(response.result),
        ResponsePayload::ChallengeOpened {
            kind: TransitionTag::ChangeSecret
        }
    ));
    client
        .send(Command::SubmitCredential {
            candidate: Secret::new("1234"),
        })
        .await
        .unwrap();

    let data_dir = service.data_dir.clone();
    drop(client);
    let _dir = service.stop().await;

    let store = SqliteStore::open(data_dir.join(DB_FILE_NAME)).unwrap();
    assert!(store.verify_secret("longer-secret").unwrap());

    let events = store.get_recent_audits(100).unwrap();
    assert!(matches!(events[0].event, AuditEventType::ServiceStopped));
    assert!(events
        .iter()
        .any(|e| matches!(e.event, AuditEventType::SecretChanged)));
    assert!(events
        .iter()
        .any(|e| matches!(e.event, AuditEventType::ServiceStarted)));
}

#[tokio::test(start_paused = true)]
async fn test_countdown_expires_on_tokio_scheduler() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let (scheduler, mut ticks) = TokioScheduler::new();
    let sink = RecordingSink::new();
    let mut arbiter = RequestArbiter::new(
        Settings::default(),
        store,
        Arc::new(scheduler),
        Arc::new(sink.clone()),
    )
    .unwrap();

    arbiter
        .setup_secret(Secret::new("1234"), Secret::new("1234"))
        .unwrap();
    arbiter
        .request_transition(TransitionKind::EnableWithTimer { minutes: 1 })
        .unwrap();
    arbiter.submit_credential("1234").unwrap();

    let mut ticked = 0;
    loop {
        let token = ticks.recv().await.unwrap();
        match arbiter.on_tick(token) {
            TickOutcome::Ticked { .. } => ticked += 1,
            TickOutcome::Expired => break,
            TickOutcome::Stale => panic!("unexpected stale tick"),
        }
    }

    assert_eq!(ticked, 59);
    assert_eq!(arbiter.session(), Session::INITIAL);
    assert_eq!(sink.count(&Notification::Expired), 1);

    // The timer task was cancelled with the expiry
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(ticks.try_recv().is_err());
}
