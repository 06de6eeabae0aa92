//! kidmodectl - command-line panel for kidmoded
//!
//! Every state change opens a challenge on the service. Pass `--secret` to
//! answer it in the same invocation, or run `kidmodectl submit` afterwards.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kidmode_api::{
    Command, EventPayload, Notification, PendingView, ResponsePayload, ResponseResult,
    SessionView, SubmitOutcome, TransitionKind,
};
use kidmode_ipc::IpcClient;
use kidmode_util::{
    default_socket_path, format_datetime_full, format_minutes, format_remaining, Secret,
    KIDMODE_SOCKET_ENV,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kidmodectl")]
#[command(about = "Control Kid Mode through kidmoded", long_about = None)]
struct Cli {
    /// Socket path
    #[arg(short, long, env = KIDMODE_SOCKET_ENV, default_value_os_t = default_socket_path())]
    socket: PathBuf,

    /// Print raw JSON payloads instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Show the session and any open challenge
    Status,

    /// First-run secret setup (prompts twice when not given)
    Setup {
        #[arg(long)]
        secret: Option<String>,
    },

    /// Turn Kid Mode on without a time limit
    Enable {
        /// Answer the challenge right away
        #[arg(long)]
        secret: Option<String>,
    },

    /// Turn Kid Mode off
    Disable {
        #[arg(long)]
        secret: Option<String>,
    },

    /// Turn Kid Mode on for a number of minutes
    Timer {
        #[arg(allow_negative_numbers = true)]
        minutes: i64,

        #[arg(long)]
        secret: Option<String>,
    },

    /// Answer the open challenge (prompts when not given)
    Submit {
        #[arg(long)]
        secret: Option<String>,
    },

    /// Dismiss the open challenge
    Cancel,

    /// Replace the guardian secret; the current secret approves it
    ChangeSecret {
        #[arg(long)]
        new_secret: Option<String>,

        /// Current secret
        #[arg(long)]
        secret: Option<String>,
    },

    /// List quick-timer presets
    Presets,

    /// Stream session changes and notifications
    Watch,

    /// Service health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut client = IpcClient::connect(&cli.socket)
        .await
        .with_context(|| format!("Failed to connect to kidmoded at {:?}", cli.socket))?;

    match cli.cmd {
        Cmd::Status => {
            let payload = call(&mut client, Command::GetSession).await?;
            show(&payload, cli.json)?;
        }

        Cmd::Setup { secret } => {
            let (secret, confirmation) = secret_pair(secret, "New secret: ", "Repeat secret: ")?;
            let payload = call(
                &mut client,
                Command::SetupSecret {
                    secret,
                    confirmation,
                },
            )
            .await?;
            show(&payload, cli.json)?;
        }

        Cmd::Enable { secret } => {
            transition(&mut client, TransitionKind::Enable, secret, cli.json).await?;
        }

        Cmd::Disable { secret } => {
            transition(&mut client, TransitionKind::Disable, secret, cli.json).await?;
        }

        Cmd::Timer { minutes, secret } => {
            transition(
                &mut client,
                TransitionKind::EnableWithTimer { minutes },
                secret,
                cli.json,
            )
            .await?;
        }

        Cmd::Submit { secret } => {
            let candidate = match secret {
                Some(s) => Secret::new(s),
                None => prompt("Secret: ")?,
            };
            submit(&mut client, candidate, cli.json).await?;
        }

        Cmd::Cancel => {
            let payload = call(&mut client, Command::CancelChallenge).await?;
            show(&payload, cli.json)?;
        }

        Cmd::ChangeSecret { new_secret, secret } => {
            let (new_secret, confirmation) =
                secret_pair(new_secret, "New secret: ", "Repeat new secret: ")?;
            let payload = call(
                &mut client,
                Command::ChangeSecret {
                    new_secret,
                    confirmation,
                },
            )
            .await?;
            show(&payload, cli.json)?;
            let current = match secret {
                Some(s) => Secret::new(s),
                None => prompt("Current secret: ")?,
            };
            submit(&mut client, current, cli.json).await?;
        }

        Cmd::Presets => {
            let payload = call(&mut client, Command::GetTimerPresets).await?;
            show(&payload, cli.json)?;
        }

        Cmd::Watch => {
            let mut events = client.subscribe().await?;
            loop {
                let event = events.next().await?;
                if cli.json {
                    println!("{}", serde_json::to_string(&event)?);
                    continue;
                }
                match event.payload {
                    EventPayload::SessionChanged(view) => print_view(&view),
                    EventPayload::Notification(n) => println!("! {}", describe(&n)),
                    EventPayload::Shutdown => {
                        println!("kidmoded is shutting down");
                        break;
                    }
                }
            }
        }

        Cmd::Health => {
            let payload = call(&mut client, Command::GetHealth).await?;
            show(&payload, cli.json)?;
        }
    }

    Ok(())
}

async fn call(client: &mut IpcClient, command: Command) -> Result<ResponsePayload> {
    let response = client.send(command).await?;
    match response.result {
        ResponseResult::Ok(payload) => Ok(payload),
        ResponseResult::Err(e) => bail!("{} ({:?})", e.message, e.code),
    }
}

async fn transition(
    client: &mut IpcClient,
    kind: TransitionKind,
    secret: Option<String>,
    json: bool,
) -> Result<()> {
    let payload = call(client, Command::RequestTransition { kind }).await?;
    show(&payload, json)?;

    if let Some(secret) = secret {
        submit(client, Secret::new(secret), json).await?;
    }
    Ok(())
}

async fn submit(client: &mut IpcClient, candidate: Secret, json: bool) -> Result<()> {
    let payload = call(client, Command::SubmitCredential { candidate }).await?;
    show(&payload, json)?;

    if let ResponsePayload::Submitted(SubmitOutcome::LockedOut) = payload {
        bail!("challenge closed after too many wrong attempts");
    }
    Ok(())
}

fn prompt(label: &str) -> Result<Secret> {
    print!("{}", label);
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(Secret::new(line.trim_end_matches(['\r', '\n'])))
}

/// A secret and its confirmation; only prompted input is asked for twice
fn secret_pair(given: Option<String>, label: &str, repeat: &str) -> Result<(Secret, Secret)> {
    match given {
        Some(s) => {
            let secret = Secret::new(s);
            Ok((secret.clone(), secret))
        }
        None => Ok((prompt(label)?, prompt(repeat)?)),
    }
}

fn show(payload: &ResponsePayload, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(payload)?);
        return Ok(());
    }

    match payload {
        ResponsePayload::Session(view) => print_view(view),
        ResponsePayload::SecretConfigured => println!("Secret saved"),
        ResponsePayload::ChallengeOpened { kind } => {
            println!("Enter the secret to {}", kind);
        }
        ResponsePayload::Submitted(outcome) => match outcome {
            SubmitOutcome::Approved { kind, applied: true } => println!("Approved: {}", kind),
            SubmitOutcome::Approved { kind, applied: false } => {
                println!("Approved, but nothing to do for {}", kind)
            }
            SubmitOutcome::Denied { attempts_left } => {
                println!("Wrong secret, {} attempt(s) left", attempts_left)
            }
            SubmitOutcome::LockedOut => println!("Too many wrong attempts"),
        },
        ResponsePayload::ChallengeCancelled { was_pending } => {
            if *was_pending {
                println!("Challenge cancelled");
            } else {
                println!("No challenge was open");
            }
        }
        ResponsePayload::TimerPresets { minutes } => {
            let presets: Vec<String> = minutes.iter().map(|m| format_minutes(*m)).collect();
            println!("{}", presets.join("  "));
        }
        ResponsePayload::Health(health) => {
            println!(
                "live: {}  ready: {}  store: {}  secret configured: {}",
                health.live, health.ready, health.store_ok, health.secret_configured
            );
        }
        ResponsePayload::Subscribed { .. } | ResponsePayload::Unsubscribed => {}
        ResponsePayload::Pong => println!("pong"),
    }
    Ok(())
}

fn print_view(view: &SessionView) {
    let session = &view.session;
    if !session.restricted {
        println!("Kid Mode: off");
    } else if session.running {
        println!(
            "Kid Mode: on, {} remaining",
            format_remaining(session.remaining_seconds)
        );
    } else {
        println!("Kid Mode: on");
    }

    if let Some(pending) = &view.pending {
        print_pending(pending);
    }
    if !view.secret_configured {
        println!("No secret configured yet; run `kidmodectl setup`");
    }
}

fn print_pending(pending: &PendingView) {
    println!("Request opened {}", format_datetime_full(&pending.opened_at));
    match pending.timer_minutes.and_then(|m| u32::try_from(m).ok()) {
        Some(minutes) => println!(
            "Waiting for secret to {} ({}), {} attempt(s) left",
            pending.kind,
            format_minutes(minutes),
            pending.attempts_left
        ),
        None => println!(
            "Waiting for secret to {}, {} attempt(s) left",
            pending.kind, pending.attempts_left
        ),
    }
}

fn describe(notification: &Notification) -> String {
    match notification {
        Notification::Enabled {
            timer_seconds: Some(secs),
        } => format!("Kid Mode enabled for {}", format_remaining(*secs)),
        Notification::Enabled { timer_seconds: None } => "Kid Mode enabled".into(),
        Notification::Disabled => "Kid Mode disabled".into(),
        Notification::Expired => "Kid Mode timer ended".into(),
        Notification::Denied { attempts_left } => {
            format!("Wrong secret, {} attempt(s) left", attempts_left)
        }
        Notification::LockedOut => "Too many wrong attempts, request closed".into(),
        Notification::SecretChanged => "Secret changed".into(),
        Notification::ChallengeTimedOut => "Request timed out".into(),
    }
}
