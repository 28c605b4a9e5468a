//! Headless arena client
//!
//! Joins the relay, steers toward the nearest bot every frame and rejoins a
//! few seconds after being eaten or winning. Useful for load and for having
//! somebody to eat.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arena_relay::client::{
    Connection, GameSession, MoveThrottle, Outcome, Phase, Target, TransportEvent,
};
use arena_relay::config::ClientConfig;
use arena_relay::game::GameRules;
use arena_relay::ws::protocol::ClientEvent;

/// Pause on the end screen before joining again
const RESTART_DELAY: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = ClientConfig::from_env()?;
    init_tracing(&config.log_level);

    info!(server = %config.server_url, nickname = %config.nickname, "Starting headless client");

    let (connection, mut events) = Connection::open(config.transport());
    let mut session = GameSession::new(GameRules::default(), rand::random());
    let mut throttle = MoveThrottle::new(config.move_rate);

    let mut ticker = tokio::time::interval(config.frame_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut restart_at: Option<Instant> = None;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(TransportEvent::Connected { id, transport }) => {
                        info!(conn_id = %id, ?transport, "Joining");
                        session.set_self_id(id);
                        let join = session.start(&config.nickname)?;
                        restart_at = None;
                        connection.emit(join)?;
                    }
                    Some(TransportEvent::Message(event)) => session.apply(&event),
                    Some(TransportEvent::Disconnected { reason }) => {
                        warn!(%reason, "Disconnected, waiting for reconnect");
                    }
                    Some(TransportEvent::Failed { attempts }) => {
                        error!(attempts, "Relay unreachable, exiting");
                        break;
                    }
                    None => break,
                }
            }
            _ = ticker.tick() => {
                if session.phase() == Phase::Playing {
                    aim_at_nearest_bot(&mut session);
                    let Some(frame) = session.frame() else { continue };

                    if let ClientEvent::PlayerMove(fields) = frame.outbound {
                        if let Some(fields) = throttle.offer(fields) {
                            connection.emit(ClientEvent::PlayerMove(fields))?;
                        }
                    }

                    if frame.report.outcome != Outcome::Continue {
                        // Round over: push the last coalesced state before going quiet
                        if let Some(fields) = throttle.flush() {
                            connection.emit(ClientEvent::PlayerMove(fields))?;
                        }
                    }

                    match frame.report.outcome {
                        Outcome::Continue => {}
                        Outcome::Eaten { by } => {
                            info!(by = %by, "Eaten, rejoining shortly");
                            restart_at = Some(Instant::now() + RESTART_DELAY);
                        }
                        Outcome::Won => {
                            info!("Won, rejoining shortly");
                            restart_at = Some(Instant::now() + RESTART_DELAY);
                        }
                    }
                } else if restart_at.is_some_and(|at| Instant::now() >= at) {
                    restart_at = None;
                    let join = session.start(&config.nickname)?;
                    connection.emit(join)?;
                }
            }
            _ = &mut shutdown => {
                info!("Received Ctrl+C, closing connection");
                break;
            }
        }
    }

    connection.close().await;
    Ok(())
}

fn aim_at_nearest_bot(session: &mut GameSession) {
    let Some(player) = session.player() else { return };
    let (px, py) = (player.x, player.y);

    let nearest = session
        .bots()
        .bots()
        .iter()
        .map(|bot| (bot.x, bot.y))
        .min_by(|a, b| {
            let da = (a.0 - px).powi(2) + (a.1 - py).powi(2);
            let db = (b.0 - px).powi(2) + (b.1 - py).powi(2);
            da.total_cmp(&db)
        });

    if let Some((x, y)) = nearest {
        session.set_target(Target::new(x, y));
    }
}

fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
