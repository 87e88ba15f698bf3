use migrant::errors::ErrorKind;
use migrant::migration::{Direction, Target};
use migrant_int_test::test_util::{cleanup, create_sample_context, run_test};

const BROKEN: &str = "20240104000000";

#[test]
fn test_failed_version_is_rolled_back() {
    run_test(
        create_sample_context,
        |ctx| {
            ctx.write_migration(
                "Version20240104000000_broken.sql",
                "-- up\n\
                 CREATE TABLE audit (id INTEGER PRIMARY KEY);\n\
                 INSERT INTO missing (id) VALUES (1);\n\
                 -- down\n\
                 DROP TABLE audit;\n",
            )?;
            let migrator = ctx.migrator()?;

            let err = migrator.migrate(&Target::Latest, false).err();
            let kind = err.as_ref().map(|e| e.kind().clone());
            assert_eq!(
                kind,
                Some(ErrorKind::MigrationExecutionError {
                    version: BROKEN.to_string(),
                    direction: Direction::Up,
                })
            );
            let root = err.as_ref().map(|e| e.root_cause().kind().clone());
            assert_eq!(root, Some(ErrorKind::ConnectionError));

            let db = ctx.database();
            assert!(!db.in_transaction());
            assert!(!db.has_table("audit"));
            // earlier versions stay committed
            assert!(db.has_table("posts"));
            assert_eq!(db.row_count("migration_versions"), Some(3));
            assert_eq!(migrator.status()?.new_migrations, 1);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_non_transactional_version_keeps_partial_changes() {
    run_test(
        create_sample_context,
        |ctx| {
            ctx.write_migration(
                "Version20240104000000_broken.sql",
                "-- transactional: false\n\
                 -- up\n\
                 CREATE TABLE audit (id INTEGER PRIMARY KEY);\n\
                 INSERT INTO missing (id) VALUES (1);\n\
                 -- down\n\
                 DROP TABLE audit;\n",
            )?;
            let migrator = ctx.migrator()?;
            assert!(!migrator.registry().get_version(BROKEN)?.is_transactional());

            assert!(migrator.migrate(&Target::Latest, false).is_err());

            let db = ctx.database();
            assert!(db.has_table("audit"));
            assert_eq!(db.row_count("migration_versions"), Some(3));
            assert!(!migrator.ledger().has_migrated(&migrator.connection(), BROKEN)?);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_ledger_write_failure_rolls_back_the_version() {
    run_test(
        create_sample_context,
        |ctx| {
            let db = ctx.database();
            db.fail_on("insert into migration_versions");
            let migrator = ctx.migrator()?;

            let err = migrator.migrate(&Target::Latest, false).err();
            assert_eq!(
                err.map(|e| e.kind().clone()),
                Some(ErrorKind::LedgerWriteError)
            );
            assert!(!db.has_table("users"));
            assert!(db.has_table("migration_versions"));
            assert_eq!(db.row_count("migration_versions"), Some(0));

            db.clear_failures();
            migrator.migrate(&Target::Latest, false)?;
            assert_eq!(db.row_count("migration_versions"), Some(3));
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_failed_down_migration_keeps_ledger_entry() {
    run_test(
        create_sample_context,
        |ctx| {
            let migrator = ctx.migrator()?;
            migrator.migrate(&Target::Latest, false)?;

            let db = ctx.database();
            db.fail_on("drop table posts");
            let err = migrator.migrate(&Target::Zero, false).err();
            assert_eq!(
                err.map(|e| e.kind().clone()),
                Some(ErrorKind::MigrationExecutionError {
                    version: "20240103000000".to_string(),
                    direction: Direction::Down,
                })
            );
            assert!(db.has_table("posts"));
            assert_eq!(db.row_count("migration_versions"), Some(3));
            assert_eq!(
                migrator.status()?.current_version.as_deref(),
                Some("20240103000000")
            );
            Ok(())
        },
        cleanup,
    );
}
