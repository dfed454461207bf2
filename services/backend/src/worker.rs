//! Broadcast Worker (spec.md §4.5, C7): drains the queue, personalizes and
//! paces outbound messages through the live Connection Manager sockets.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use wa_baileys::MessageContent;
use wa_cache::Cache;
use wa_protocol::{Jid, RewriteContext, Template};
use wa_store::{models::BroadcastRow, BroadcastStatus};

use crate::config::WORKER_CONCURRENCY;
use crate::socket_map::SocketMap;

#[derive(Clone)]
pub struct WorkerCtx {
    pub pool: PgPool,
    pub cache: Arc<dyn Cache>,
    pub sockets: SocketMap,
    pub http: reqwest::Client,
}

#[derive(Debug, Clone, Deserialize)]
struct RecipientSpec {
    phone: String,
    #[serde(default)]
    group: bool,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    var1: Option<String>,
    #[serde(default)]
    var2: Option<String>,
    #[serde(default)]
    var3: Option<String>,
}

pub async fn run_worker_pool(ctx: WorkerCtx) {
    let mut handles = Vec::new();
    for worker_id in 0..WORKER_CONCURRENCY {
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move { worker_loop(worker_id, ctx).await }));
    }
    for handle in handles {
        let _ = handle.await;
    }
}

async fn worker_loop(worker_id: usize, ctx: WorkerCtx) {
    loop {
        match wa_store::queue::claim_next(&ctx.pool).await {
            Ok(Some(job)) => {
                if let Err(err) = process_job(&ctx, job.id, job.broadcast_id, job.attempts).await {
                    tracing::warn!(worker_id, broadcast_id = %job.broadcast_id, error = %err, "broadcast job failed");
                    let _ = wa_store::queue::fail_and_maybe_retry(
                        &ctx.pool,
                        job.id,
                        job.attempts,
                        chrono::Utc::now(),
                    )
                    .await;
                } else {
                    let _ = wa_store::queue::complete(&ctx.pool, job.id).await;
                }
            }
            Ok(None) => tokio::time::sleep(Duration::from_millis(500)).await,
            Err(err) => {
                tracing::warn!(worker_id, error = %err, "failed to claim next job");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("broadcast {0} not found")]
    BroadcastMissing(Uuid),
    #[error("device {0} has no live socket")]
    DeviceNotConnected(Uuid),
    #[error("template error: {0}")]
    Template(#[from] wa_protocol::TemplateError),
}

/// Exercises one broadcast end to end against the live Connection Manager
/// sockets (spec.md §4.5, C7). `pub` so integration tests can drive it
/// directly against a mock socket rather than only through the queue.
pub async fn process_job(
    ctx: &WorkerCtx,
    _job_id: Uuid,
    broadcast_id: Uuid,
    _attempts: i32,
) -> Result<(), JobError> {
    let broadcast = wa_store::broadcasts::get(&ctx.pool, broadcast_id)
        .await
        .ok()
        .flatten()
        .ok_or(JobError::BroadcastMissing(broadcast_id))?;

    let Some(socket) = ctx.sockets.get(broadcast.device_id).await else {
        return Err(JobError::DeviceNotConnected(broadcast.device_id));
    };

    let template = Template::parse(&broadcast.message_template)?;
    let recipients: Vec<RecipientSpec> =
        serde_json::from_value(broadcast.recipients.clone()).unwrap_or_default();

    let base_delay = base_delay_for(&broadcast, recipients.len());
    let mut rng = rand::thread_rng();
    let whatsapp_display_name = ctx
        .cache
        .get(&wa_cache::keys::contacts_list(&broadcast.user_id))
        .await
        .and_then(|v| v.get("display_name").and_then(|n| n.as_str().map(str::to_owned)));

    for (index, recipient) in recipients.iter().enumerate() {
        if index > 0 {
            if wa_store::broadcasts::current_status(&ctx.pool, broadcast_id)
                .await
                .ok()
                .flatten()
                != Some(BroadcastStatus::Processing)
            {
                return Ok(());
            }
        }

        let jid = if recipient.group {
            Jid::group(recipient.phone.clone())
        } else {
            match wa_protocol::normalize_phone(&recipient.phone) {
                Ok(normalized) => Jid::individual(normalized),
                Err(_) => {
                    let _ = wa_store::broadcasts::add_counters(&ctx.pool, broadcast_id, 0, 1).await;
                    continue;
                }
            }
        };

        let contact_name = match recipient.name.clone() {
            Some(name) => Some(name),
            None => ctx
                .cache
                .get(&wa_cache::keys::contact(&broadcast.user_id, &recipient.phone))
                .await
                .and_then(|v| v.get("name").and_then(|n| n.as_str().map(str::to_owned))),
        };
        let context = RewriteContext {
            whatsapp_display_name: whatsapp_display_name.clone(),
            contact_name,
            recipient_phone: recipient.phone.clone(),
            custom_vars: [recipient.var1.clone(), recipient.var2.clone(), recipient.var3.clone()],
            now: Some(chrono::Utc::now()),
        };
        let rendered = template.render(&context, &mut rng);

        let content = if let Some(media_url) = &broadcast.media_url {
            match fetch_media_with_retries(&ctx.http, media_url).await {
                Ok(()) => MessageContent {
                    text: None,
                    media_url: Some(media_url.clone()),
                    caption: Some(rendered),
                },
                Err(err) => {
                    tracing::warn!(broadcast_id = %broadcast_id, error = %err, "media fetch failed, falling back to text-only");
                    MessageContent { text: Some(rendered), media_url: None, caption: None }
                }
            }
        } else {
            MessageContent { text: Some(rendered), media_url: None, caption: None }
        };

        match socket.send_message(&jid, content).await {
            Ok(()) => {
                let _ = wa_store::broadcasts::add_counters(&ctx.pool, broadcast_id, 1, 0).await;
            }
            Err(err) => {
                tracing::warn!(broadcast_id = %broadcast_id, jid = %jid, error = %err, "send failed");
                let _ = wa_store::broadcasts::add_counters(&ctx.pool, broadcast_id, 0, 1).await;
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }

        let is_batch_boundary = (index + 1) % (broadcast.batch_size.max(1) as usize) == 0;
        let is_last = index + 1 == recipients.len();
        if !is_last {
            tokio::time::sleep(jittered(base_delay, broadcast.randomize, &mut rng)).await;
            if is_batch_boundary {
                tokio::time::sleep(Duration::from_millis(broadcast.pause_between_batches_ms as u64)).await;
            }
        }
    }

    wa_store::broadcasts::set_status(&ctx.pool, broadcast_id, BroadcastStatus::Completed).await.ok();
    Ok(())
}

fn base_delay_for(broadcast: &BroadcastRow, recipient_count: usize) -> Duration {
    if broadcast.delay_mode == "manual" {
        if let Some(ms) = broadcast.base_delay_ms {
            return Duration::from_millis(ms.max(0) as u64);
        }
    }
    let secs = match recipient_count {
        0..=20 => 3,
        21..=50 => 5,
        51..=100 => 8,
        _ => 12,
    };
    Duration::from_secs(secs)
}

fn jittered(base: Duration, randomize: bool, rng: &mut impl Rng) -> Duration {
    if !randomize {
        return base;
    }
    let factor = rng.gen_range(0.7..=1.3);
    Duration::from_secs_f64(base.as_secs_f64() * factor)
}

/// Media fetch with retry (spec.md §4.5 step 2c): up to 3 attempts,
/// backoff i*1s, validating a non-empty body.
async fn fetch_media_with_retries(client: &reqwest::Client, url: &str) -> Result<(), String> {
    for attempt in 1..=3u32 {
        match client.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                match response.bytes().await {
                    Ok(body) if !body.is_empty() => return Ok(()),
                    Ok(_) => {}
                    Err(_) => {}
                }
            }
            _ => {}
        }
        if attempt < 3 {
            tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
        }
    }
    Err(format!("could not fetch media from {url} after 3 attempts"))
}
