use migrant::errors::ErrorKind;
use migrant::migration::{Direction, Target};
use migrant_int_test::test_util::{
    cleanup, create_sample_context, create_test_context, run_test,
};

const FIRST: &str = "20240101000000";
const SECOND: &str = "20240102000000";
const THIRD: &str = "20240103000000";

#[test]
fn test_migrate_to_latest_and_back_to_zero() {
    run_test(
        create_sample_context,
        |ctx| {
            let migrator = ctx.migrator()?;
            let db = ctx.database();

            let report = migrator.migrate(&Target::Latest, false)?;
            assert_eq!(report.direction(), Direction::Up);
            assert_eq!(report.versions(), vec![FIRST, SECOND, THIRD]);
            assert!(db.has_table("users"));
            assert!(db.has_table("posts"));
            assert_eq!(db.row_count("users"), Some(1));
            assert_eq!(db.row_count("migration_versions"), Some(3));

            let report = migrator.migrate(&Target::Zero, false)?;
            assert_eq!(report.direction(), Direction::Down);
            assert_eq!(report.versions(), vec![THIRD, SECOND, FIRST]);
            assert!(!db.has_table("users"));
            assert!(!db.has_table("posts"));
            assert_eq!(db.row_count("migration_versions"), Some(0));
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_migrate_to_specific_version() {
    run_test(
        create_sample_context,
        |ctx| {
            let migrator = ctx.migrator()?;
            migrator.migrate(&Target::Version(SECOND.to_string()), false)?;

            let db = ctx.database();
            assert!(db.has_table("users"));
            assert!(!db.has_table("posts"));

            let status = migrator.status()?;
            assert_eq!(status.current_version.as_deref(), Some(SECOND));
            assert_eq!(status.previous_version.as_deref(), Some(FIRST));
            assert_eq!(status.next_version.as_deref(), Some(THIRD));
            assert_eq!(status.latest_version.as_deref(), Some(THIRD));
            assert_eq!(status.executed, 2);
            assert_eq!(status.new_migrations, 1);

            // migrating to the current version is a no-op
            let report = migrator.migrate(&Target::Version(SECOND.to_string()), false)?;
            assert!(report.is_empty());
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_down_to_version_keeps_target_applied() {
    run_test(
        create_sample_context,
        |ctx| {
            let migrator = ctx.migrator()?;
            migrator.migrate(&Target::Latest, false)?;

            let report = migrator.migrate(&Target::Version(FIRST.to_string()), false)?;
            assert_eq!(report.versions(), vec![THIRD, SECOND]);

            let db = ctx.database();
            assert!(db.has_table("users"));
            assert_eq!(db.row_count("users"), Some(0));
            assert!(!db.has_table("posts"));
            assert_eq!(
                migrator.status()?.current_version.as_deref(),
                Some(FIRST)
            );
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_new_migration_is_picked_up_by_a_new_migrator() {
    run_test(
        create_sample_context,
        |ctx| {
            ctx.migrator()?.migrate(&Target::Latest, false)?;

            ctx.write_migration(
                "Version20240104000000_create_tags.sql",
                "-- up\nCREATE TABLE tags (id INTEGER PRIMARY KEY, label TEXT);\n-- down\nDROP TABLE tags;\n",
            )?;

            let migrator = ctx.migrator()?;
            let status = migrator.status()?;
            assert_eq!(status.executed, 3);
            assert_eq!(status.available, 4);
            assert_eq!(status.new_migrations, 1);
            assert_eq!(migrator.plan(&Target::Latest)?.ids(), vec!["20240104000000"]);

            migrator.migrate(&Target::Latest, false)?;
            assert!(ctx.database().has_table("tags"));
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_dry_run_leaves_database_untouched() {
    run_test(
        create_sample_context,
        |ctx| {
            let migrator = ctx.migrator()?;
            let report = migrator.migrate(&Target::Latest, true)?;

            assert!(report.is_dry_run());
            assert_eq!(report.statement_count(), 3);
            let script = report.to_sql_script();
            assert!(script.contains("CREATE TABLE users"));
            assert!(script.contains("INSERT INTO users (id, name) VALUES (1, 'admin')"));

            let db = ctx.database();
            assert!(!db.has_table("users"));
            assert!(!db.has_table("migration_versions"));
            assert_eq!(db.execute_count(), 0);
            assert_eq!(migrator.status()?.executed, 0);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_descriptions_come_from_marker_or_file_name() {
    run_test(
        create_sample_context,
        |ctx| {
            let migrator = ctx.migrator()?;
            let registry = migrator.registry();
            assert_eq!(registry.get_version(FIRST)?.description(), "create users");
            assert_eq!(registry.get_version(SECOND)?.description(), "seed the admin user");
            assert_eq!(registry.get_version(THIRD)?.description(), "create posts");
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_namespace_is_the_file_prefix() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_migration("Billing1_invoices.sql", "-- up\nCREATE TABLE invoices (id INTEGER);\n-- down\nDROP TABLE invoices;\n")?;
            ctx.write_migration("2.sql", "-- up\nCREATE TABLE payments (id INTEGER);\n-- down\nDROP TABLE payments;\n")?;
            ctx.write_migration("notes.txt", "not a migration")?;

            let migrator = ctx.builder().namespace("Billing").build()?;
            assert_eq!(migrator.plan(&Target::Latest)?.ids(), vec!["1", "2"]);
            assert_eq!(migrator.status()?.namespace.as_deref(), Some("Billing"));

            migrator.migrate(&Target::Latest, false)?;
            let db = ctx.database();
            assert!(db.has_table("invoices"));
            assert!(db.has_table("payments"));
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_malformed_file_name_fails_discovery() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_migration("create_users.sql", "-- up\nCREATE TABLE users (id INTEGER);\n")?;
            let err = ctx.migrator().err().map(|e| e.kind().clone());
            assert_eq!(err, Some(ErrorKind::DiscoveryError));
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_file_without_up_marker_fails_discovery() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_migration("Version1_broken.sql", "CREATE TABLE users (id INTEGER);\n")?;
            let err = ctx.migrator().err().map(|e| e.kind().clone());
            assert_eq!(err, Some(ErrorKind::DiscoveryError));
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_custom_ledger_table() {
    run_test(
        create_sample_context,
        |ctx| {
            let migrator = ctx
                .builder()
                .table_name("schema_history")
                .version_column("id")
                .executed_at_column("applied_at")
                .build()?;
            migrator.migrate(&Target::Latest, false)?;

            let db = ctx.database();
            assert_eq!(db.row_count("schema_history"), Some(3));
            assert!(!db.has_table("migration_versions"));
            assert_eq!(migrator.status()?.table_name, "schema_history");
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_inline_comments_do_not_break_statements() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_migration(
                "Version1_commented.sql",
                "-- up\n\
                 CREATE TABLE t (id INTEGER); -- create t\n\
                 /* seed */ INSERT INTO t VALUES (1); /* done */\n\
                 INSERT INTO t VALUES (2) -- no semicolon yet\n\
                 ;\n\
                 -- down\n\
                 DROP TABLE t; -- drop t\n",
            )?;
            let migrator = ctx.migrator()?;
            let db = ctx.database();

            let report = migrator.migrate(&Target::Latest, false)?;
            assert_eq!(report.statement_count(), 3);
            assert_eq!(db.row_count("t"), Some(2));

            migrator.migrate(&Target::Zero, false)?;
            assert!(!db.has_table("t"));
            Ok(())
        },
        cleanup,
    );
}
