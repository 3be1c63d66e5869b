mod support;

use anyhow::Result;
use chrono::NaiveDate;
use std::sync::Arc;

use rota::core::QueryExecutor;
use rota::{FixedClock, IdentityContext, OperatorShifts, OperatorStatsView, SyncConfig, SyncStatus};
use rota_api::{ApiError, OperatorId, OperatorStats, Table};

use support::*;

fn clock(y: i32, m: u32, d: u32) -> Arc<FixedClock> {
    Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(y, m, d).unwrap()))
}

#[tokio::test]
async fn test_stats_counts_today_and_upcoming() -> Result<()> {
    let store = seeded_store()?;
    let identity = IdentityContext::new(Some(OperatorId::from("op-1")));
    let view = OperatorStatsView::spawn(
        QueryExecutor::new(store.clone()),
        store.clone(),
        &identity,
        clock(2025, 1, 10),
        Arc::new(SyncConfig::default()),
    );

    let snapshot = wait_until(view.handle(), |s| s.status == SyncStatus::Ready).await?;
    assert_eq!(
        snapshot.data,
        OperatorStats {
            today_shifts: 1,
            upcoming_shifts: 1,
            total_shifts: 2,
        }
    );
    assert!(!view.loading());

    // Moving the 2025-02-01 shift to today is picked up through the shifts binding.
    store.update(Table::Shifts, "s2", serde_json::json!({"date": "2025-01-10"}))?;
    let snapshot = settled_after(view.handle(), snapshot.revision).await?;
    assert_eq!(
        snapshot.data,
        OperatorStats {
            today_shifts: 2,
            upcoming_shifts: 0,
            total_shifts: 2,
        }
    );

    store.insert(Table::ShiftAssignments, &assignment("a4", "op-1", "s4"))?;
    let snapshot = settled_after(view.handle(), snapshot.revision).await?;
    assert_eq!(view.stats().total_shifts, 3);
    assert_eq!(snapshot.data.upcoming_shifts, 1);

    view.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_stats_without_identity_are_zero() -> Result<()> {
    let store = seeded_store()?;
    let identity = IdentityContext::default();
    let view = OperatorStatsView::spawn(
        QueryExecutor::new(store.clone()),
        store.clone(),
        &identity,
        clock(2025, 1, 10),
        Arc::new(SyncConfig::default()),
    );

    quiesce().await;
    assert_eq!(view.stats(), OperatorStats::default());
    assert!(!view.loading());
    assert_eq!(store.read_count(), 0);

    view.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_stats_failure_keeps_last_counts() -> Result<()> {
    let store = seeded_store()?;
    let identity = IdentityContext::new(Some(OperatorId::from("op-1")));
    let view = OperatorStatsView::spawn(
        QueryExecutor::new(store.clone()),
        store.clone(),
        &identity,
        clock(2025, 1, 10),
        Arc::new(SyncConfig::default()),
    );
    let ready = wait_until(view.handle(), |s| s.status == SyncStatus::Ready).await?;

    store.fail_reads_with(ApiError::query("network error", None))?;
    view.handle().refetch();
    let snapshot = settled_after(view.handle(), ready.revision).await?;

    assert_eq!(snapshot.status, SyncStatus::Error);
    assert_eq!(view.stats(), ready.data);
    assert!(!view.loading());

    view.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_views_share_store_with_separate_channels() -> Result<()> {
    let store = seeded_store()?;
    let identity = IdentityContext::new(Some(OperatorId::from("op-2")));
    let config = Arc::new(SyncConfig::default());
    let executor = QueryExecutor::new(store.clone());

    let shifts = OperatorShifts::spawn(executor.clone(), store.clone(), &identity, config.clone());
    let stats = OperatorStatsView::spawn(
        executor,
        store.clone(),
        &identity,
        clock(2025, 1, 11),
        config,
    );

    wait_until(shifts.handle(), |s| s.status == SyncStatus::Ready).await?;
    let ready = wait_until(stats.handle(), |s| s.status == SyncStatus::Ready).await?;
    assert_eq!(ready.data.upcoming_shifts, 1);

    let mut names = store.channel_names();
    names.sort();
    assert_eq!(names, vec!["operator-shifts:op-2", "operator-stats:op-2"]);

    identity.sign_in(OperatorId::from("op-1"));
    wait_until(shifts.handle(), |s| {
        s.operator == Some(OperatorId::from("op-1")) && s.status == SyncStatus::Ready
    })
    .await?;
    let snapshot = wait_until(stats.handle(), |s| {
        s.operator == Some(OperatorId::from("op-1")) && s.status == SyncStatus::Ready
    })
    .await?;
    assert_eq!(snapshot.data.total_shifts, 2);
    assert_eq!(shifts.shifts().len(), 2);
    assert_eq!(store.active_channels(), 2);

    shifts.shutdown().await;
    stats.shutdown().await;
    assert_eq!(store.active_channels(), 0);
    Ok(())
}
