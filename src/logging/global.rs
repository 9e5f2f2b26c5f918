//! Process-wide default logger.
//!
//! The registry only holds a weak reference: once the registered logger is
//! closed or dropped, [`global`] returns `None` instead of a dangling logger.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use super::{error::LoggerError, logger::Shared, LogLevel, LogMessage, LoggerHandle};

static GLOBAL: Mutex<Option<Weak<Shared>>> = Mutex::new(None);

fn with_slot<R>(f: impl FnOnce(&mut Option<Weak<Shared>>) -> R) -> R {
    let mut slot = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut slot)
}

/// Registers `shared` unless a live logger already holds the slot.
pub(crate) fn register_if_vacant(shared: &Arc<Shared>) {
    with_slot(|slot| {
        let occupied = slot.as_ref().is_some_and(|weak| weak.strong_count() > 0);
        if !occupied {
            *slot = Some(Arc::downgrade(shared));
        }
    });
}

pub(crate) fn register(shared: &Arc<Shared>) {
    with_slot(|slot| *slot = Some(Arc::downgrade(shared)));
}

pub(crate) fn unregister(shared: &Arc<Shared>) {
    with_slot(|slot| {
        if is_same(slot, shared) {
            *slot = None;
        }
    });
}

pub(crate) fn is_registered(shared: &Arc<Shared>) -> bool {
    with_slot(|slot| is_same(slot, shared))
}

fn is_same(slot: &Option<Weak<Shared>>, shared: &Arc<Shared>) -> bool {
    slot.as_ref()
        .is_some_and(|weak| Weak::ptr_eq(weak, &Arc::downgrade(shared)))
}

/// Handle to the current global logger, if one is alive.
pub fn global() -> Option<LoggerHandle> {
    with_slot(|slot| slot.as_ref().and_then(Weak::upgrade))
        .map(|shared| LoggerHandle { shared })
}

/// Empties the registry. The next logger created will claim it.
pub fn clear_global() {
    with_slot(|slot| *slot = None);
}

/// Forwards `log` facade records to whichever logger is global at the time.
struct Bridge;

impl log::Log for Bridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        global().is_some_and(|handle| handle.is_enabled(metadata.level().into()))
    }

    fn log(&self, record: &log::Record) {
        let Some(handle) = global() else {
            return;
        };

        let position = match (record.file(), record.line()) {
            (Some(file), Some(line)) => format!("{}:{}", file, line),
            (Some(file), None) => file.to_string(),
            _ => String::new(),
        };

        handle.submit(LogMessage::new(
            record.level().into(),
            record.args().to_string(),
            record.target(),
            &position,
        ));
    }

    fn flush(&self) {}
}

/// Routes `log::info!` and friends into the global logger.
///
/// `max` caps what the `log` facade lets through before the logger's own
/// threshold is consulted. Only one facade logger can exist per process.
pub fn install_log_bridge(max: LogLevel) -> Result<(), LoggerError> {
    log::set_boxed_logger(Box::new(Bridge)).map_err(|_| LoggerError::BridgeInstalled)?;
    log::set_max_level(max.to_level_filter());
    Ok(())
}
