// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Unit tests for `controller.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::store::fake::{instance, FakeCluster, FakeSearch, Verb};

    const RESYNC: Duration = Duration::from_secs(300);

    fn operator(ctx: Arc<Context>) -> Arc<Operator> {
        Arc::new(Operator {
            ctx,
            tracker: ReconcileTracker::new(),
            resync: RESYNC,
        })
    }

    #[test]
    fn test_requeue_action_per_outcome() {
        assert_eq!(
            requeue_action(PassOutcome::Pending, RESYNC),
            Action::requeue(Duration::from_secs(PENDING_REQUEUE_SECS))
        );
        assert_eq!(requeue_action(PassOutcome::Converged, RESYNC), Action::requeue(RESYNC));
        assert_eq!(requeue_action(PassOutcome::Locked, RESYNC), Action::requeue(RESYNC));
        assert_eq!(requeue_action(PassOutcome::Missing, RESYNC), Action::await_change());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_tracker_is_healthy() {
        let tracker = ReconcileTracker::new();
        tokio::time::advance(Duration::from_secs(600)).await;
        assert!(tracker.is_healthy());
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_pass_turns_unhealthy() {
        let tracker = ReconcileTracker::new();
        let pass = tracker.begin();
        tokio::time::advance(Duration::from_secs(STALL_THRESHOLD_SECS - 1)).await;
        assert!(tracker.is_healthy());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!tracker.is_healthy());

        drop(pass);
        assert!(tracker.is_healthy());
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_pass_counts_as_progress() {
        let tracker = ReconcileTracker::new();
        let long = tracker.begin();
        tokio::time::advance(Duration::from_secs(50)).await;
        drop(tracker.begin());
        assert_eq!(tracker.in_flight(), 1);

        tokio::time::advance(Duration::from_secs(50)).await;
        assert!(tracker.is_healthy());
        drop(long);
    }

    #[test]
    fn test_failure_backoff_doubles_and_caps() {
        let tracker = ReconcileTracker::default();
        assert_eq!(tracker.next_delay("ns/a"), Duration::from_millis(RETRY_BASE_DELAY_MILLIS));
        assert_eq!(tracker.next_delay("ns/a"), Duration::from_millis(RETRY_BASE_DELAY_MILLIS * 2));
        assert_eq!(tracker.next_delay("ns/a"), Duration::from_millis(RETRY_BASE_DELAY_MILLIS * 4));
        assert_eq!(tracker.next_delay("ns/b"), Duration::from_millis(RETRY_BASE_DELAY_MILLIS));

        for _ in 0..40 {
            tracker.next_delay("ns/a");
        }
        assert_eq!(tracker.next_delay("ns/a"), Duration::from_secs(RETRY_MAX_DELAY_SECS));

        tracker.forget("ns/a");
        assert_eq!(tracker.next_delay("ns/a"), Duration::from_millis(RETRY_BASE_DELAY_MILLIS));
    }

    #[tokio::test]
    async fn test_locked_instance_requeues_at_resync_interval() {
        let cluster = FakeCluster::new();
        let mut vmi = instance("system");
        vmi.spec.lock = true;
        cluster.instances.insert(vmi.clone());
        let op = operator(cluster.context(FakeSearch::new()));

        let action = reconcile_instance(Arc::new(vmi), Arc::clone(&op)).await.unwrap();
        assert_eq!(action, Action::requeue(RESYNC));
        assert_eq!(op.tracker.in_flight(), 0);
        assert!(op
            .ctx
            .metrics
            .gather()
            .unwrap()
            .contains("vmo_verrazzano_io_reconciles_in_flight 0"));
    }

    #[tokio::test]
    async fn test_deleted_instance_waits_for_next_change() {
        let cluster = FakeCluster::new();
        let op = operator(cluster.context(FakeSearch::new()));

        let action = reconcile_instance(Arc::new(instance("gone")), op).await.unwrap();
        assert_eq!(action, Action::await_change());
        assert_eq!(cluster.total_mutations(), 0);
    }

    #[tokio::test]
    async fn test_failed_pass_backs_off_until_success() {
        let cluster = FakeCluster::new();
        let vmi = instance("system");
        cluster.instances.insert(vmi.clone());
        cluster.instances.fail(Verb::Get, "apiserver unavailable");
        let op = operator(cluster.context(FakeSearch::new()));
        let vmi = Arc::new(vmi);

        let error = reconcile_instance(Arc::clone(&vmi), Arc::clone(&op))
            .await
            .unwrap_err();
        assert!(format!("{error:#}").contains("apiserver unavailable"));
        assert_eq!(op.tracker.in_flight(), 0);

        let first = error_policy(Arc::clone(&vmi), &error, Arc::clone(&op));
        let second = error_policy(Arc::clone(&vmi), &error, Arc::clone(&op));
        assert_eq!(first, Action::requeue(Duration::from_millis(RETRY_BASE_DELAY_MILLIS)));
        assert_eq!(second, Action::requeue(Duration::from_millis(RETRY_BASE_DELAY_MILLIS * 2)));

        op.tracker.forget("verrazzano-system/system");
        assert_eq!(
            error_policy(vmi, &error, op),
            Action::requeue(Duration::from_millis(RETRY_BASE_DELAY_MILLIS))
        );
    }
}
