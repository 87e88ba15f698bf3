use migrant::errors::{ErrorKind, MigrantError};
use migrant::migration::{Direction, MigrationEventListener, MigrationEvents, Target};
use migrant_int_test::test_util::{
    cleanup, create_sample_context, event_kinds, recording_listener, run_test,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn wait_for<F: Fn() -> bool>(timeout_ms: u64, check: F) {
    awaitility::at_most(Duration::from_millis(timeout_ms)).until(check);
}

#[test]
fn test_events_follow_the_run() {
    run_test(
        create_sample_context,
        |ctx| {
            let (listener, events) = recording_listener();
            let migrator = ctx.builder().add_listener(listener).build()?;
            migrator.migrate(&Target::Version("20240102000000".to_string()), false)?;

            wait_for(1000, || event_kinds(&events).len() == 6);
            assert_eq!(
                event_kinds(&events),
                vec![
                    MigrationEvents::MigrationsMigrating,
                    MigrationEvents::VersionExecuting,
                    MigrationEvents::VersionExecuted,
                    MigrationEvents::VersionExecuting,
                    MigrationEvents::VersionExecuted,
                    MigrationEvents::MigrationsMigrated,
                ]
            );

            let received = events.lock().clone();
            let versions: Vec<Option<&str>> = received.iter().map(|info| info.version()).collect();
            assert_eq!(
                versions,
                vec![
                    None,
                    Some("20240101000000"),
                    Some("20240101000000"),
                    Some("20240102000000"),
                    Some("20240102000000"),
                    None,
                ]
            );
            assert!(received.iter().all(|info| info.direction() == Direction::Up));
            assert!(received.iter().all(|info| !info.is_dry_run()));
            assert!(received
                .iter()
                .all(|info| info.config().table_name() == "migration_versions"));
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_dry_run_events_are_flagged() {
    run_test(
        create_sample_context,
        |ctx| {
            let (listener, events) = recording_listener();
            let migrator = ctx.migrator()?;
            migrator.subscribe(listener)?;
            migrator.migrate(&Target::Latest, true)?;

            wait_for(1000, || event_kinds(&events).len() == 8);
            let received = events.lock().clone();
            assert!(received.iter().all(|info| info.is_dry_run()));
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_empty_plan_publishes_nothing() {
    run_test(
        create_sample_context,
        |ctx| {
            let (listener, events) = recording_listener();
            let migrator = ctx.migrator()?;
            migrator.migrate(&Target::Latest, false)?;

            migrator.subscribe(listener)?;
            let report = migrator.migrate(&Target::Latest, false)?;
            assert!(report.is_empty());
            assert!(event_kinds(&events).is_empty());
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_unsubscribed_listener_stops_receiving() {
    run_test(
        create_sample_context,
        |ctx| {
            let (listener, events) = recording_listener();
            let migrator = ctx.migrator()?;
            let subscriber = migrator.subscribe(listener)?;

            migrator.migrate(&Target::Version("20240101000000".to_string()), false)?;
            wait_for(1000, || event_kinds(&events).len() == 4);

            migrator.unsubscribe(subscriber)?;
            migrator.migrate(&Target::Latest, false)?;
            assert_eq!(event_kinds(&events).len(), 4);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_failing_listener_does_not_abort_migration() {
    run_test(
        create_sample_context,
        |ctx| {
            let calls = Arc::new(AtomicUsize::new(0));
            let counter = calls.clone();
            let listener = MigrationEventListener::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(MigrantError::new("listener broke", ErrorKind::InternalError))
            });

            let migrator = ctx.builder().add_listener(listener).build()?;
            migrator.migrate(&Target::Latest, false)?;

            wait_for(1000, || calls.load(Ordering::SeqCst) == 8);
            assert!(ctx.database().has_table("posts"));
            assert_eq!(migrator.status()?.executed, 3);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_failed_run_has_no_migrated_event() {
    run_test(
        create_sample_context,
        |ctx| {
            let (listener, events) = recording_listener();
            ctx.database().fail_on("create table posts");
            let migrator = ctx.builder().add_listener(listener).build()?;

            assert!(migrator.migrate(&Target::Latest, false).is_err());
            wait_for(1000, || event_kinds(&events).len() == 6);
            let kinds = event_kinds(&events);
            assert_eq!(kinds.last(), Some(&MigrationEvents::VersionExecuting));
            assert!(!kinds.contains(&MigrationEvents::MigrationsMigrated));
            Ok(())
        },
        cleanup,
    );
}
