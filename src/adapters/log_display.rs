//! Text display adapter.
//!
//! Implements [`DisplayPort`] by composing the screen as a handful of
//! text lines and writing them to the log.  The board has no panel driver
//! in this firmware; the same lines are what a character display would
//! show.  The last frame is kept for inspection.

use core::fmt::Write as _;

use log::info;

use crate::app::ports::DisplayPort;
use crate::app::view::DisplayView;

/// Slots listed on the idle screen.
const LISTED_SLOTS: usize = 4;

#[derive(Debug, Default)]
pub struct LogDisplay {
    frame: Vec<String>,
    renders: u32,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_frame(&self) -> &[String] {
        &self.frame
    }

    pub fn renders(&self) -> u32 {
        self.renders
    }
}

/// Lines for `view`, top to bottom.
pub fn compose(view: &DisplayView<'_>) -> Vec<String> {
    let mut lines = Vec::new();

    let mut header = String::new();
    let _ = write!(
        header,
        "{}  SD:{}  {}",
        view.now,
        if view.storage_ok { "OK" } else { "ERR" },
        if view.trusted { "AUTO" } else { "MANUAL" }
    );
    lines.push(header);

    if let Some(step) = &view.wizard {
        lines.push(format!("LOAD TUBE {}/{}: {}", step.index + 1, step.total, step.tube));
        for (med, grams) in &step.medications {
            lines.push(format!("  {} ({}g)", med, grams));
        }
        if step.more {
            lines.push("  + more...".to_string());
        }
        lines.push(format!("TOTAL: {}g", step.total_grams));
        lines.push("Press DROP when loaded".to_string());
        return lines;
    }

    if let Some(n) = &view.notification {
        lines.push(n.text.to_string());
        lines.push(format!("Press DROP to dispense ({}s)", n.remaining_secs));
    }
    if view.dispensing {
        lines.push("DISPENSING...".to_string());
    }

    if view.groups.is_empty() {
        lines.push("No schedule loaded".to_string());
        return lines;
    }
    if let Some(next) = view.next_group() {
        lines.push(format!("NEXT: {} ({} meds)", next.time, next.count()));
    }
    for group in view.groups.iter().take(LISTED_SLOTS) {
        let mut line = format!("{} ", group.time);
        for (i, m) in group.members.iter().enumerate() {
            if i > 0 {
                line.push_str(", ");
            }
            let _ = write!(line, "{} {}", m.medication, m.dosage);
        }
        lines.push(line);
    }
    if view.groups.len() > LISTED_SLOTS {
        lines.push(format!("+{} more slots", view.groups.len() - LISTED_SLOTS));
    }
    lines
}

impl DisplayPort for LogDisplay {
    fn render(&mut self, view: &DisplayView<'_>) {
        self.frame = compose(view);
        self.renders += 1;
        for line in &self.frame {
            info!("LCD | {}", line);
        }
    }
}
