use crate::common::MIGRANT_EVENT;
use crate::errors::{ErrorKind, MigrantError, MigrantResult};
use crate::migration::{MigrationEventInfo, MigrationEventListener};
use basu::error::BasuError;
use basu::event::Event;
use basu::{EventBus, HandlerId};
use std::sync::Arc;

/// Handle returned when a listener is registered; used to deregister it.
pub struct SubscriberRef {
    pub(crate) inner: HandlerId,
}

impl SubscriberRef {
    pub fn new(inner: HandlerId) -> Self {
        SubscriberRef { inner }
    }
}

/// Delivers migration lifecycle events to registered listeners.
///
/// The bus is an injected capability owned by a [`crate::Migrator`]; cloning
/// shares the same set of listeners. Publishing with no listeners is a cheap
/// no-op.
///
/// # Example
///
/// ```ignore
/// let bus = MigrationEventBus::new();
/// let subscriber = bus.register(MigrationEventListener::new(|info| {
///     println!("{:?} {}", info.event(), info.direction());
///     Ok(())
/// }))?;
/// bus.deregister(subscriber)?;
/// ```
#[derive(Clone)]
pub struct MigrationEventBus {
    inner: Arc<MigrationEventBusInner>,
}

impl Default for MigrationEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationEventBus {
    pub fn new() -> Self {
        MigrationEventBus {
            inner: Arc::new(MigrationEventBusInner::new()),
        }
    }

    /// Registers a listener with the bus.
    pub fn register(&self, listener: MigrationEventListener) -> MigrantResult<SubscriberRef> {
        self.inner.register(listener)
    }

    /// Deregisters a previously registered listener.
    pub fn deregister(&self, subscriber: SubscriberRef) -> MigrantResult<()> {
        self.inner.deregister(subscriber)
    }

    /// Publishes an event to all registered listeners.
    pub fn publish(&self, event: MigrationEventInfo) -> MigrantResult<()> {
        self.inner.publish(event)
    }

    /// Publishes an event and logs, instead of returning, any listener failure.
    pub(crate) fn notify(&self, event: MigrationEventInfo) {
        let name = event.event();
        if let Err(e) = self.inner.publish(event) {
            log::warn!("Failed to publish {:?} event: {}", name, e);
        }
    }

    /// Removes every registered listener.
    pub fn close(&self) -> MigrantResult<()> {
        self.inner.close()
    }

    pub fn has_listeners(&self) -> bool {
        self.inner.has_listeners()
    }
}

struct MigrationEventBusInner {
    event_bus: EventBus<MigrationEventInfo>,
}

impl MigrationEventBusInner {
    fn new() -> Self {
        MigrationEventBusInner {
            event_bus: EventBus::new(),
        }
    }

    fn register(&self, listener: MigrationEventListener) -> MigrantResult<SubscriberRef> {
        self.event_bus
            .subscribe(MIGRANT_EVENT, Box::new(listener))
            .map(SubscriberRef::new)
            .map_err(Self::migrant_error)
    }

    fn deregister(&self, subscriber: SubscriberRef) -> MigrantResult<()> {
        self.event_bus
            .unsubscribe(MIGRANT_EVENT, &subscriber.inner)
            .map(|_| ())
            .map_err(Self::migrant_error)
    }

    fn publish(&self, event: MigrationEventInfo) -> MigrantResult<()> {
        let handler_count = match self.event_bus.get_handler_count(MIGRANT_EVENT) {
            Ok(count) => count,
            Err(BasuError::EventTypeNotFOUND) => return Ok(()),
            Err(e) => return Err(Self::migrant_error(e)),
        };

        if handler_count == 0 {
            return Ok(());
        }

        self.event_bus
            .publish(MIGRANT_EVENT, &Event::new(event))
            .map(|_| ())
            .map_err(Self::migrant_error)
    }

    fn close(&self) -> MigrantResult<()> {
        self.event_bus.clear().map(|_| ()).map_err(Self::migrant_error)
    }

    fn has_listeners(&self) -> bool {
        match self.event_bus.get_handler_count(MIGRANT_EVENT) {
            Ok(count) => count > 0,
            Err(BasuError::EventTypeNotFOUND) => false,
            Err(e) => {
                log::warn!("Failed to check listeners: {}, defaulting to false", e);
                false
            }
        }
    }

    fn migrant_error(e: BasuError) -> MigrantError {
        match e {
            BasuError::EventTypeNotFOUND => MigrantError::new(
                "Event bus error: no listener was ever registered for migration events",
                ErrorKind::EventError,
            ),
            BasuError::MutexPoisoned => MigrantError::new(
                "Event bus error: internal mutex poisoned",
                ErrorKind::EventError,
            ),
            BasuError::HandlerError(e) => {
                let message = e.to_string();
                MigrantError::new(
                    &format!("Event listener error: {}", message),
                    ErrorKind::EventError,
                )
            }
        }
    }
}
