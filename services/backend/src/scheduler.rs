//! Scheduler and queueing tick (spec.md §4.5, C8).

use sqlx::PgPool;

/// Every 30s: promote due drafts into the queue (spec.md "Scheduler (C8)").
pub async fn run_scheduler_forever(pool: PgPool) {
    let mut interval = tokio::time::interval(crate::config::SCHEDULER_TICK);
    loop {
        interval.tick().await;
        if let Err(err) = scheduler_tick(&pool).await {
            tracing::warn!(error = %err, "scheduler tick failed");
        }
    }
}

async fn scheduler_tick(pool: &PgPool) -> Result<(), sqlx::Error> {
    let now = chrono::Utc::now();
    let due = wa_store::broadcasts::list_due_drafts(pool, now).await?;
    for broadcast_id in due {
        if wa_store::broadcasts::try_promote_to_processing(pool, broadcast_id).await? {
            wa_store::queue::enqueue(pool, broadcast_id).await?;
        }
    }
    Ok(())
}

/// Every 15s: any processing broadcast without an in-flight job gets
/// re-enqueued (spec.md "Queueing tick (alternate to scheduler)").
pub async fn run_queueing_tick_forever(pool: PgPool) {
    let mut interval = tokio::time::interval(crate::config::QUEUEING_TICK);
    loop {
        interval.tick().await;
        if let Err(err) = queueing_tick(&pool).await {
            tracing::warn!(error = %err, "queueing tick failed");
        }
    }
}

async fn queueing_tick(pool: &PgPool) -> Result<(), sqlx::Error> {
    let processing = wa_store::broadcasts::list_processing(pool).await?;
    for broadcast_id in processing {
        if !wa_store::queue::has_inflight_job(pool, broadcast_id).await? {
            wa_store::queue::enqueue(pool, broadcast_id).await?;
        }
    }
    Ok(())
}
