use migrant::errors::ErrorKind;
use migrant::migration::{Direction, Target};
use migrant_int_test::test_util::{cleanup, create_sample_context, run_test};

const FIRST: &str = "20240101000000";
const SECOND: &str = "20240102000000";
const THIRD: &str = "20240103000000";

fn version(id: &str) -> Target {
    Target::Version(id.to_string())
}

#[test]
fn test_aliases_on_an_empty_ledger() {
    run_test(
        create_sample_context,
        |ctx| {
            let migrator = ctx.migrator()?;
            assert_eq!(migrator.resolve_version_alias("first")?, Target::Zero);
            assert_eq!(migrator.resolve_version_alias("0")?, Target::Zero);
            assert_eq!(migrator.resolve_version_alias("current")?, Target::Zero);
            assert_eq!(migrator.resolve_version_alias("prev")?, Target::Zero);
            assert_eq!(migrator.resolve_version_alias("next")?, version(FIRST));
            assert_eq!(migrator.resolve_version_alias("latest")?, Target::Latest);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_aliases_relative_to_current_version() {
    run_test(
        create_sample_context,
        |ctx| {
            let migrator = ctx.migrator()?;
            migrator.migrate(&version(SECOND), false)?;

            assert_eq!(migrator.resolve_version_alias("current")?, version(SECOND));
            assert_eq!(migrator.resolve_version_alias("prev")?, version(FIRST));
            assert_eq!(migrator.resolve_version_alias("next")?, version(THIRD));
            assert_eq!(migrator.resolve_version_alias(THIRD)?, version(THIRD));

            let err = migrator.resolve_version_alias("20991231000000").err();
            assert_eq!(err.map(|e| e.kind().clone()), Some(ErrorKind::UnknownVersion));
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_step_back_with_prev() {
    run_test(
        create_sample_context,
        |ctx| {
            let migrator = ctx.migrator()?;
            migrator.migrate(&Target::Latest, false)?;

            let target = migrator.resolve_version_alias("prev")?;
            let report = migrator.migrate(&target, false)?;
            assert_eq!(report.versions(), vec![THIRD]);
            assert!(!ctx.database().has_table("posts"));

            // no version after the latest one
            let err = migrator
                .migrate(&Target::Latest, false)
                .and_then(|_| migrator.resolve_version_alias("next"))
                .err();
            assert_eq!(err.map(|e| e.kind().clone()), Some(ErrorKind::UnknownVersion));
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_execute_single_version() {
    run_test(
        create_sample_context,
        |ctx| {
            let migrator = ctx.migrator()?;
            let report = migrator.execute(FIRST, Direction::Up, false)?;
            assert_eq!(report.versions(), vec![FIRST]);
            assert!(ctx.database().has_table("users"));

            let err = migrator.execute(FIRST, Direction::Up, false).err();
            assert_eq!(err.map(|e| e.kind().clone()), Some(ErrorKind::InvalidState));

            let err = migrator.execute(SECOND, Direction::Down, false).err();
            assert_eq!(err.map(|e| e.kind().clone()), Some(ErrorKind::InvalidState));

            migrator.execute(FIRST, Direction::Down, false)?;
            assert!(!ctx.database().has_table("users"));
            assert_eq!(migrator.status()?.executed, 0);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_target_parse_drives_migrate() {
    run_test(
        create_sample_context,
        |ctx| {
            let migrator = ctx.migrator()?;
            migrator.migrate(&Target::parse(FIRST)?, false)?;
            assert_eq!(migrator.status()?.current_version.as_deref(), Some(FIRST));

            migrator.migrate(&Target::parse("latest")?, false)?;
            assert_eq!(migrator.status()?.current_version.as_deref(), Some(THIRD));

            migrator.migrate(&Target::parse("first")?, false)?;
            assert_eq!(migrator.status()?.current_version, None);
            Ok(())
        },
        cleanup,
    );
}
