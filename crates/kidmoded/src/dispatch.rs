//! Command dispatch: one IPC command against the arbiter

use kidmode_api::{
    Command, ErrorCode, ErrorInfo, HealthStatus, Response, ResponsePayload,
};
use kidmode_core::RequestArbiter;
use kidmode_store::Store;
use kidmode_util::{ClientId, KidModeError};

/// A response plus whether clients should be told the session view changed
#[derive(Debug)]
pub struct Dispatched {
    pub response: Response,
    pub session_changed: bool,
}

impl Dispatched {
    fn unchanged(response: Response) -> Self {
        Self {
            response,
            session_changed: false,
        }
    }
}

/// Run one command
pub fn handle_command(
    arbiter: &mut RequestArbiter,
    store: &dyn Store,
    client_id: ClientId,
    request_id: u64,
    command: Command,
) -> Dispatched {
    let result = match command {
        Command::GetSession => {
            return Dispatched::unchanged(Response::success(
                request_id,
                ResponsePayload::Session(arbiter.view()),
            ));
        }

        Command::SetupSecret {
            secret,
            confirmation,
        } => arbiter
            .setup_secret(secret, confirmation)
            .map(|()| ResponsePayload::SecretConfigured),

        Command::RequestTransition { kind } => arbiter
            .request_transition(kind)
            .map(|view| ResponsePayload::ChallengeOpened { kind: view.kind }),

        Command::ChangeSecret {
            new_secret,
            confirmation,
        } => arbiter
            .request_secret_change(new_secret, confirmation)
            .map(|view| ResponsePayload::ChallengeOpened { kind: view.kind }),

        Command::SubmitCredential { candidate } => arbiter
            .submit_credential(candidate.expose())
            .map(ResponsePayload::Submitted),

        Command::CancelChallenge => {
            let was_pending = arbiter.cancel();
            return Dispatched {
                response: Response::success(
                    request_id,
                    ResponsePayload::ChallengeCancelled { was_pending },
                ),
                session_changed: was_pending,
            };
        }

        Command::GetTimerPresets => {
            return Dispatched::unchanged(Response::success(
                request_id,
                ResponsePayload::TimerPresets {
                    minutes: arbiter.timer_presets().to_vec(),
                },
            ));
        }

        // Subscription state is tracked by the IPC server
        Command::SubscribeEvents => {
            return Dispatched::unchanged(Response::success(
                request_id,
                ResponsePayload::Subscribed { client_id },
            ));
        }

        Command::UnsubscribeEvents => {
            return Dispatched::unchanged(Response::success(
                request_id,
                ResponsePayload::Unsubscribed,
            ));
        }

        Command::GetHealth => {
            let store_ok = store.is_healthy();
            let health = HealthStatus {
                live: true,
                ready: store_ok,
                store_ok,
                secret_configured: arbiter.secret_configured(),
            };
            return Dispatched::unchanged(Response::success(
                request_id,
                ResponsePayload::Health(health),
            ));
        }

        Command::Ping => {
            return Dispatched::unchanged(Response::success(request_id, ResponsePayload::Pong));
        }
    };

    match result {
        Ok(payload) => Dispatched {
            response: Response::success(request_id, payload),
            session_changed: true,
        },
        Err(e) => Dispatched::unchanged(error_response(request_id, &e)),
    }
}

/// Map a core error onto the wire
pub fn error_response(request_id: u64, error: &KidModeError) -> Response {
    Response::error(request_id, ErrorInfo::new(error_code(error), error.to_string()))
}

pub fn error_code(error: &KidModeError) -> ErrorCode {
    match error {
        KidModeError::AlreadyPending => ErrorCode::AlreadyPending,
        KidModeError::NoPendingChallenge => ErrorCode::NoPendingChallenge,
        KidModeError::InvalidTimer(_) => ErrorCode::InvalidTimer,
        KidModeError::InvalidSecret(_) => ErrorCode::InvalidSecret,
        KidModeError::SecretNotConfigured => ErrorCode::SecretNotConfigured,
        KidModeError::SecretAlreadyConfigured => ErrorCode::SecretAlreadyConfigured,
        KidModeError::RateLimited => ErrorCode::RateLimited,
        KidModeError::ConfigError(_)
        | KidModeError::StoreError(_)
        | KidModeError::IpcError(_)
        | KidModeError::Internal(_) => ErrorCode::InternalError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kidmode_api::{ResponseResult, SubmitOutcome, TransitionKind, TransitionTag};
    use kidmode_config::Settings;
    use kidmode_host_api::{ManualScheduler, RecordingSink};
    use kidmode_store::SqliteStore;
    use kidmode_util::Secret;
    use std::sync::Arc;

    fn setup() -> (RequestArbiter, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let arbiter = RequestArbiter::new(
            Settings::default(),
            store.clone(),
            Arc::new(ManualScheduler::new()),
            Arc::new(RecordingSink::new()),
        )
        .unwrap();
        (arbiter, store)
    }

    fn run(arbiter: &mut RequestArbiter, store: &SqliteStore, command: Command) -> Dispatched {
        handle_command(arbiter, store, ClientId::new(), 1, command)
    }

    fn error_of(dispatched: &Dispatched) -> ErrorCode {
        match &dispatched.response.result {
            ResponseResult::Err(e) => e.code,
            ResponseResult::Ok(payload) => panic!("expected error, got {:?}", payload),
        }
    }

    #[test]
    fn request_before_setup_is_refused() {
        let (mut arbiter, store) = setup();
        let out = run(
            &mut arbiter,
            &store,
            Command::RequestTransition {
                kind: TransitionKind::Enable,
            },
        );
        assert_eq!(error_of(&out), ErrorCode::SecretNotConfigured);
        assert!(!out.session_changed);
    }

    #[test]
    fn full_enable_flow() {
        let (mut arbiter, store) = setup();

        let out = run(
            &mut arbiter,
            &store,
            Command::SetupSecret {
                secret: Secret::new("1234"),
                confirmation: Secret::new("1234"),
            },
        );
        assert!(matches!(
            out.response.result,
            ResponseResult::Ok(ResponsePayload::SecretConfigured)
        ));

        let out = run(
            &mut arbiter,
            &store,
            Command::RequestTransition {
                kind: TransitionKind::Enable,
            },
        );
        assert!(out.session_changed);
        assert!(matches!(
            out.response.result,
            ResponseResult::Ok(ResponsePayload::ChallengeOpened {
                kind: TransitionTag::Enable
            })
        ));

        let out = run(
            &mut arbiter,
            &store,
            Command::RequestTransition {
                kind: TransitionKind::Disable,
            },
        );
        assert_eq!(error_of(&out), ErrorCode::AlreadyPending);

        let out = run(
            &mut arbiter,
            &store,
            Command::SubmitCredential {
                candidate: Secret::new("1234"),
            },
        );
        assert!(matches!(
            out.response.result,
            ResponseResult::Ok(ResponsePayload::Submitted(SubmitOutcome::Approved {
                applied: true,
                ..
            }))
        ));
        assert!(arbiter.session().restricted);
    }

    #[test]
    fn secret_change_as_plain_transition_is_refused() {
        let (mut arbiter, store) = setup();
        run(
            &mut arbiter,
            &store,
            Command::SetupSecret {
                secret: Secret::new("1234"),
                confirmation: Secret::new("1234"),
            },
        );

        let out = run(
            &mut arbiter,
            &store,
            Command::RequestTransition {
                kind: TransitionKind::ChangeSecret {
                    new_secret: Secret::new("typo-secret"),
                },
            },
        );
        assert_eq!(error_of(&out), ErrorCode::InvalidSecret);
        assert!(!out.session_changed);
        assert!(arbiter.pending().is_none());
        assert!(store.verify_secret("1234").unwrap());
    }

    #[test]
    fn error_codes() {
        assert_eq!(error_code(&KidModeError::InvalidTimer(0)), ErrorCode::InvalidTimer);
        assert_eq!(
            error_code(&KidModeError::store("disk full")),
            ErrorCode::InternalError
        );
        assert_eq!(
            error_code(&KidModeError::NoPendingChallenge),
            ErrorCode::NoPendingChallenge
        );
    }

    #[test]
    fn cancel_reports_whether_anything_was_open() {
        let (mut arbiter, store) = setup();
        let out = run(&mut arbiter, &store, Command::CancelChallenge);
        assert!(!out.session_changed);
        assert!(matches!(
            out.response.result,
            ResponseResult::Ok(ResponsePayload::ChallengeCancelled { was_pending: false })
        ));
    }

    #[test]
    fn health_reflects_store() {
        let (mut arbiter, store) = setup();
        let out = run(&mut arbiter, &store, Command::GetHealth);
        match out.response.result {
            ResponseResult::Ok(ResponsePayload::Health(health)) => {
                assert!(health.live);
                assert!(health.store_ok);
                assert!(!health.secret_configured);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
