use chrono::{Duration, Utc};
use migrant::errors::ErrorKind;
use migrant::migration::Target;
use migrant::version::{MarkOptions, MarkRequest};
use migrant_int_test::test_util::{cleanup, create_sample_context, run_test};

const FIRST: &str = "20240101000000";
const SECOND: &str = "20240102000000";
const THIRD: &str = "20240103000000";

#[test]
fn test_mark_all_records_without_running() {
    run_test(
        create_sample_context,
        |ctx| {
            let migrator = ctx.migrator()?;
            let report = migrator.mark(&MarkRequest::All { add: true })?;
            assert_eq!(report.changed(), [FIRST, SECOND, THIRD]);
            assert!(report.skipped().is_empty());

            let db = ctx.database();
            assert!(!db.has_table("users"));
            assert_eq!(db.row_count("migration_versions"), Some(3));
            assert_eq!(migrator.status()?.new_migrations, 0);
            assert!(migrator.plan(&Target::Latest)?.is_empty());

            let report = migrator.mark(&MarkRequest::All { add: true })?;
            assert!(report.changed().is_empty());
            assert_eq!(report.skipped().len(), 3);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_mark_range_delete() {
    run_test(
        create_sample_context,
        |ctx| {
            let migrator = ctx.migrator()?;
            migrator.migrate(&Target::Latest, false)?;

            let request = MarkRequest::Range {
                from: FIRST.to_string(),
                to: SECOND.to_string(),
                add: false,
            };
            let report = migrator.mark(&request)?;
            assert_eq!(report.changed(), [FIRST, SECOND]);

            let status = migrator.status()?;
            assert_eq!(status.executed, 1);
            assert_eq!(status.current_version.as_deref(), Some(THIRD));
            // tables created by the deleted versions are left alone
            assert!(ctx.database().has_table("users"));
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_mark_single_version_state_errors() {
    run_test(
        create_sample_context,
        |ctx| {
            let migrator = ctx.migrator()?;

            let err = migrator.mark(&MarkRequest::delete(FIRST)).err();
            assert_eq!(err.map(|e| e.kind().clone()), Some(ErrorKind::InvalidState));

            migrator.mark(&MarkRequest::add(FIRST))?;
            let err = migrator.mark(&MarkRequest::add(FIRST)).err();
            assert_eq!(err.map(|e| e.kind().clone()), Some(ErrorKind::InvalidState));

            let err = migrator.mark(&MarkRequest::add("42")).err();
            assert_eq!(err.map(|e| e.kind().clone()), Some(ErrorKind::UnknownVersion));

            assert_eq!(migrator.plan(&Target::Latest)?.ids(), vec![SECOND, THIRD]);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_mark_options_from_command_line_flags() {
    run_test(
        create_sample_context,
        |ctx| {
            let migrator = ctx.migrator()?;
            let request = MarkOptions {
                add: true,
                range_from: Some(SECOND.to_string()),
                range_to: Some(THIRD.to_string()),
                ..Default::default()
            }
            .into_request()?;
            let report = migrator.mark(&request)?;
            assert_eq!(report.changed(), [SECOND, THIRD]);

            let invalid = MarkOptions {
                add: true,
                delete: true,
                all: true,
                ..Default::default()
            }
            .into_request()
            .err();
            assert_eq!(
                invalid.map(|e| e.kind().clone()),
                Some(ErrorKind::InvalidArgument)
            );
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_executed_entries_carry_timestamps() {
    run_test(
        create_sample_context,
        |ctx| {
            let before = Utc::now() - Duration::seconds(5);
            let migrator = ctx.migrator()?;
            migrator.migrate(&Target::Latest, false)?;
            let after = Utc::now() + Duration::seconds(5);

            let entries = migrator.executed_entries()?;
            assert_eq!(entries.len(), 3);
            assert_eq!(entries[0].version(), FIRST);
            for entry in &entries {
                let executed_at = entry.executed_at();
                assert!(executed_at.is_some());
                assert!(executed_at.is_some_and(|at| at >= before && at <= after));
            }
            Ok(())
        },
        cleanup,
    );
}
