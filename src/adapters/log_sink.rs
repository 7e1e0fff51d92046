//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART0 / USB-CDC in production, not
//! the schedule link).  Each event is one tagged line.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::dispense::DispenseEvent;

/// Adapter that logs every [`AppEvent`] to the console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Booted { entries, storage_ok } => {
                info!(
                    "BOOT | entries={} | storage={}",
                    entries,
                    if *storage_ok { "OK" } else { "ERR" }
                );
            }

            AppEvent::FrameStarted => info!("FRAME | start"),
            AppEvent::FrameRejected(e) => warn!("FRAME | rejected: {}", e),
            AppEvent::FrameCompleted { bytes, committed } => {
                info!(
                    "FRAME | end | bytes={} | {}",
                    bytes,
                    if *committed { "committed" } else { "NOT committed" }
                );
            }
            AppEvent::FrameAborted(e) => warn!("FRAME | aborted: {}", e),

            AppEvent::ScheduleLoaded {
                entries,
                groups,
                attempt,
            } => {
                info!(
                    "SCHED | loaded {} entries in {} slots (attempt {})",
                    entries, groups, attempt
                );
            }
            AppEvent::ScheduleLoadFailed(e) => warn!("SCHED | load failed: {}", e),

            AppEvent::DoseDue { time, meds } => info!("DOSE | due {} | meds={}", time, meds),
            AppEvent::NotificationDismissed { time, reason } => {
                info!("DOSE | {} dismissed ({:?})", time, reason);
            }
            AppEvent::DispenseRefused(time) => warn!("DOSE | {} refused: engine busy", time),
            AppEvent::DispenseSkipped { time, unknown } => {
                warn!(
                    "DOSE | {} skipped: no known tube ({} unknown)",
                    time,
                    unknown.len()
                );
            }
            AppEvent::Dispense(d) => match d {
                DispenseEvent::JobStarted {
                    time,
                    tubes,
                    unknown,
                } => {
                    info!("DOSE | job {} started | tubes={}", time, tubes);
                    for tube in unknown {
                        warn!("DOSE | job {} | unknown tube '{}' skipped", time, tube);
                    }
                }
                DispenseEvent::TubeDone(r) => {
                    if r.detected {
                        info!(
                            "DOSE | {} (actuator {}) dropped after {} ms",
                            r.tube, r.actuator, r.feed_ms
                        );
                    } else {
                        warn!(
                            "DOSE | {} (actuator {}) no drop detected in {} ms",
                            r.tube, r.actuator, r.feed_ms
                        );
                    }
                }
                DispenseEvent::JobDone(time) => info!("DOSE | job {} done", time),
            },

            AppEvent::WizardStarted { tubes } => info!("WIZARD | start | tubes={}", tubes),
            AppEvent::WizardAdvanced { step } => info!("WIZARD | step {}", step + 1),
            AppEvent::WizardCompleted => info!("WIZARD | complete"),

            AppEvent::SafetyTrip(flags) => {
                error!("SAFETY | trip, flags=0b{:08b}, all actuators off", flags);
            }
        }
    }
}
