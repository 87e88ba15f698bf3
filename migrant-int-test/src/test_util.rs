use migrant::connection::{Connection, InMemoryConnection};
use migrant::errors::{ErrorKind, MigrantError, MigrantResult};
use migrant::migration::{MigrationEventInfo, MigrationEventListener, MigrationEvents};
use migrant::{Migrator, MigratorBuilder};
use std::backtrace::Backtrace;
use std::path::{Path, PathBuf};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{env, fs, thread};

/// Runs a test with retry logic and error handling.
/// Tests run on the current thread so a failing attempt never leaks state
/// into the next one.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> MigrantResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> MigrantResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> MigrantResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;
    let mut last_backtrace: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            match before() {
                Ok(ctx) => match test(ctx.clone()) {
                    Ok(_) => match after(ctx) {
                        Ok(_) => Ok(()),
                        Err(e) => Err((format!("After run failed: {:?}", e), backtrace.to_string())),
                    },
                    Err(e) => {
                        let _ = after(ctx);
                        Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                    }
                },
                Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
            }
        });

        let elapsed = start_time.elapsed();

        match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, bt))) => {
                last_error = Some(e.clone());
                last_backtrace = Some(bt);
                if attempt < MAX_RETRIES {
                    eprintln!(
                        "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                        attempt, MAX_RETRIES, elapsed
                    );
                    eprintln!("Error: {}", e);
                    thread::sleep(Duration::from_millis(50 * attempt as u64));
                }
            }
            Err(panic_err) => {
                let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };

                eprintln!(
                    "\n========== Test Attempt {}/{} Panicked (took {:?}) ==========",
                    attempt, MAX_RETRIES, elapsed
                );
                eprintln!("{}", err_msg);
                last_error = Some(format!("Panic: {}", err_msg));
                last_backtrace = Some(Backtrace::capture().to_string());
                if attempt < MAX_RETRIES {
                    thread::sleep(Duration::from_millis(50 * attempt as u64));
                }
            }
        }
    }

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {} attempts", MAX_RETRIES);
    eprintln!("Last error: {}", last_error.as_deref().unwrap_or("Unknown"));
    if let Some(bt) = &last_backtrace {
        if !bt.is_empty() && !bt.contains("disabled") {
            eprintln!("\nBacktrace:\n{}", bt);
        }
    }
    eprintln!("=====================================================\n");

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

/// A scratch migrations directory and the in-memory database the test
/// migrates.
#[derive(Clone)]
pub struct TestContext {
    path: String,
    connection: InMemoryConnection,
}

impl TestContext {
    pub fn new(path: String, connection: InMemoryConnection) -> Self {
        Self { path, connection }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn directory(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }

    /// The raw connection, for inspecting tables and injecting failures.
    pub fn database(&self) -> InMemoryConnection {
        self.connection.clone()
    }

    /// A builder bound to this context's database and migrations directory.
    pub fn builder(&self) -> MigratorBuilder {
        Migrator::builder()
            .connection(Connection::new(self.connection.clone()))
            .migrations_directory(&self.directory())
    }

    pub fn migrator(&self) -> MigrantResult<Migrator> {
        self.builder().build()
    }

    /// Writes `contents` to `file_name` inside the migrations directory.
    pub fn write_migration(&self, file_name: &str, contents: &str) -> MigrantResult<()> {
        write_file(&self.directory(), file_name, contents)
    }
}

pub fn random_path() -> String {
    let id = uuid::Uuid::new_v4();
    let temp_dir = env::temp_dir();
    temp_dir
        .join(format!("migrant-{}", id))
        .to_string_lossy()
        .to_string()
}

pub fn create_test_context() -> MigrantResult<TestContext> {
    let path = random_path();
    if Path::new(&path).exists() {
        fs::remove_dir_all(&path)?;
    }
    fs::create_dir_all(&path).map_err(|e| {
        MigrantError::new(
            &format!("Failed to create test directory {}: {}", path, e),
            ErrorKind::IOError,
        )
    })?;
    Ok(TestContext::new(path, InMemoryConnection::new()?))
}

/// Context with three related migrations: a users table, a seed row and a
/// posts table.
pub fn create_sample_context() -> MigrantResult<TestContext> {
    let ctx = create_test_context()?;
    write_sample_migrations(&ctx)?;
    Ok(ctx)
}

pub fn write_sample_migrations(ctx: &TestContext) -> MigrantResult<()> {
    ctx.write_migration(
        "Version20240101000000_create_users.sql",
        "-- up\n\
         CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);\n\
         -- down\n\
         DROP TABLE users;\n",
    )?;
    ctx.write_migration(
        "Version20240102000000_seed_users.sql",
        "-- description: seed the admin user\n\
         -- up\n\
         INSERT INTO users (id, name) VALUES (1, 'admin');\n\
         -- down\n\
         DELETE FROM users WHERE id = 1;\n",
    )?;
    ctx.write_migration(
        "Version20240103000000_create_posts.sql",
        "-- up\n\
         CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT);\n\
         -- down\n\
         DROP TABLE posts;\n",
    )?;
    Ok(())
}

pub fn write_file(directory: &Path, file_name: &str, contents: &str) -> MigrantResult<()> {
    fs::write(directory.join(file_name), contents)?;
    Ok(())
}

/// Listener that records every event it receives, in order.
pub fn recording_listener() -> (MigrationEventListener, Arc<Mutex<Vec<MigrationEventInfo>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let listener = MigrationEventListener::new(move |info: MigrationEventInfo| {
        sink.lock().push(info);
        Ok(())
    });
    (listener, received)
}

pub fn event_kinds(events: &Arc<Mutex<Vec<MigrationEventInfo>>>) -> Vec<MigrationEvents> {
    events.lock().iter().map(|info| info.event()).collect()
}

pub fn cleanup(ctx: TestContext) -> MigrantResult<()> {
    let path = ctx.path().to_string();
    let max_retries = 5;

    for retry in 0..max_retries {
        if !Path::new(&path).exists() {
            return Ok(());
        }
        match fs::remove_dir_all(&path) {
            Ok(_) => return Ok(()),
            Err(e) if retry + 1 < max_retries => {
                eprintln!("Warning: Failed to remove {}: {}", path, e);
                thread::sleep(Duration::from_millis(20 * (retry as u64 + 1)));
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
