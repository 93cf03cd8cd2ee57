//! End-to-end scenarios: the full pipeline around real handlers, and the bot
//! runtime driven through the in-memory transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use feeder_core::{ChatId, Message, Reply, RequestContext, Update};
use feeder_server::service::middleware::FALLBACK_TEXT;
use feeder_server::service::{handler_fn, BoxHandler, ErrorKind, Request};
use feeder_server::{
    build_dispatch_pipeline, Bot, ChannelTransport, CommandHandler, DispatchConfig,
    DispatchError, HealthState, PageFetcher,
};
use tokio::sync::watch;
use tokio::time::Instant;
use tower::ServiceExt;

fn request(message_id: i64, actor: i64, text: &str) -> Request {
    Request::new(
        RequestContext::new(),
        Message::private_text(message_id, actor, text),
    )
}

/// Sleeps for the number of milliseconds in the message text, then echoes it.
fn sleeper(active: Arc<AtomicUsize>, peak: Arc<AtomicUsize>) -> BoxHandler {
    handler_fn(move |req: Request| {
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        async move {
            let msg = req.message()?.clone();
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            let millis = msg.text().parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(millis)).await;
            active.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, DispatchError>(Reply::text(msg.reply_address(), msg.text()))
        }
    })
}

#[tokio::test(start_paused = true)]
async fn same_actor_requests_complete_in_order_despite_spare_capacity() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let config = DispatchConfig {
        max_concurrency: 10,
        ..DispatchConfig::default()
    };
    let pipeline = build_dispatch_pipeline(sleeper(active, Arc::clone(&peak)), &config);

    let start = Instant::now();
    let first = tokio::spawn({
        let pipeline = pipeline.clone();
        async move {
            let reply = pipeline.oneshot(request(1, 123, "50")).await.unwrap();
            (reply, Instant::now())
        }
    });
    tokio::task::yield_now().await;
    let second = tokio::spawn(async move {
        let reply = pipeline.oneshot(request(2, 123, "0")).await.unwrap();
        (reply, Instant::now())
    });

    let (r1, t1) = first.await.unwrap();
    let (r2, t2) = second.await.unwrap();
    assert_eq!(r1.text, "50");
    assert_eq!(r2.text, "0");
    assert!(t2 >= t1);
    assert_eq!(t2 - start, Duration::from_millis(50));
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn burst_across_actors_respects_global_limit() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let config = DispatchConfig {
        max_concurrency: 4,
        ..DispatchConfig::default()
    };
    let pipeline = build_dispatch_pipeline(sleeper(Arc::clone(&active), Arc::clone(&peak)), &config);

    let tasks: Vec<_> = (0..20)
        .map(|i| tokio::spawn(pipeline.clone().oneshot(request(i, i, "20"))))
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(peak.load(Ordering::SeqCst), 4);
    assert_eq!(active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn handler_failure_never_leaks_to_user() {
    let boom = handler_fn(|_req: Request| async {
        Err::<Reply, _>(DispatchError::Handler(anyhow::anyhow!("boom")))
    });
    let pipeline = build_dispatch_pipeline(boom, &DispatchConfig::default());

    let reply = pipeline.oneshot(request(1, 123, "anything")).await.unwrap();
    assert_eq!(reply.chat_id, Some(ChatId(123)));
    assert_eq!(reply.text, FALLBACK_TEXT);
    assert!(!reply.text.contains("boom"));
}

#[tokio::test]
async fn absent_message_is_invalid_input() {
    let active = Arc::new(AtomicUsize::new(0));
    let pipeline = build_dispatch_pipeline(
        sleeper(Arc::clone(&active), Arc::new(AtomicUsize::new(0))),
        &DispatchConfig::default(),
    );
    let err = pipeline
        .oneshot(Request::without_message(RequestContext::new()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test(start_paused = true)]
async fn cancelled_waiter_gets_fallback_and_handler_never_runs_it() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let pipeline = build_dispatch_pipeline(
        sleeper(Arc::clone(&active), Arc::clone(&peak)),
        &DispatchConfig::default(),
    );

    let holder = tokio::spawn(pipeline.clone().oneshot(request(1, 7, "1000")));
    tokio::task::yield_now().await;

    let ctx = RequestContext::new();
    ctx.cancel();
    let reply = pipeline
        .oneshot(Request::new(ctx, Message::private_text(2, 7, "0")))
        .await
        .unwrap();
    assert_eq!(reply.text, FALLBACK_TEXT);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(holder.await.unwrap().unwrap().text, "1000");
}

struct FixedPage;

#[async_trait]
impl PageFetcher for FixedPage {
    async fn fetch_page(&self, _url: &str) -> anyhow::Result<String> {
        Ok("x".repeat(500))
    }
}

#[tokio::test]
async fn bot_answers_commands_over_channel_transport() {
    let (transport, mut peer) = ChannelTransport::new(16);
    let config = DispatchConfig::default();
    let pipeline = build_dispatch_pipeline(CommandHandler::new(Arc::new(FixedPage)), &config);
    let bot = Arc::new(Bot::new(Arc::new(transport), pipeline, config));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let running = tokio::spawn({
        let bot = Arc::clone(&bot);
        async move { bot.run(shutdown_rx).await }
    });

    let updates = [
        (1, "/help"),
        (2, "/summary https://example.com"),
        (3, "/bogus"),
        (4, "free text"),
    ];
    for (id, text) in updates {
        peer.updates
            .send(Update {
                update_id: id,
                message: Some(Message::private_text(id, 100 + id, text)),
            })
            .await
            .unwrap();
    }

    let mut replies = Vec::new();
    for _ in 0..updates.len() {
        replies.push(peer.replies.recv().await.unwrap());
    }
    replies.sort_by_key(|reply| reply.chat_id.map(|chat| chat.0));

    assert!(replies[0].text.starts_with("Available Commands:"));
    assert_eq!(replies[1].text, "x".repeat(100));
    assert!(replies[2].text.starts_with("❓ Unknown command."));
    assert_eq!(replies[3].text, FALLBACK_TEXT);

    assert_eq!(bot.health_state(), HealthState::Ready);
    shutdown_tx.send(true).unwrap();
    running.await.unwrap();
    assert_eq!(bot.health_state(), HealthState::Stopped);
    assert_eq!(bot.in_flight(), 0);
}
