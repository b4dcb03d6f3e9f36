use crate::events::Event;
use bytesize::ByteSize;

/// Reporter aggregates events and produces human or JSON output.
pub struct Reporter {
    events: Vec<Event>,
    json_mode: bool,
    organized: usize,
    failed: usize,
    skipped: usize,
    bytes: u64,
}

impl Reporter {
    pub fn new(json_mode: bool) -> Self {
        Self {
            events: Vec::new(),
            json_mode,
            organized: 0,
            failed: 0,
            skipped: 0,
            bytes: 0,
        }
    }

    pub fn record(&mut self, event: Event) {
        match &event {
            Event::OpCompleted { src, dry_run, .. } => {
                self.organized += 1;
                if *dry_run && let Ok(meta) = std::fs::metadata(src) {
                    self.bytes += meta.len();
                }
            }
            Event::OpFailed { .. } => self.failed += 1,
            Event::OpSkipped { .. } => self.skipped += 1,
            _ => {}
        }

        if self.json_mode {
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{}", line);
            }
        } else {
            self.print_human(&event);
        }
        self.events.push(event);
    }

    fn print_human(&self, event: &Event) {
        match event {
            Event::Planned {
                files,
                plans,
                conflicts,
            } => println!("Planned {plans} of {files} file(s), {conflicts} conflict(s)"),
            Event::ValidationFailed { error } => eprintln!("invalid: {error}"),
            Event::OpCompleted { src, dst, dry_run } => {
                let verb = if *dry_run { "would move" } else { "moved" };
                println!("{verb} {} -> {}", src.display(), dst.display());
            }
            Event::OpFailed { src, error, .. } => {
                eprintln!("failed {}: {error}", src.display());
            }
            Event::OpSkipped { src, reason, .. } => {
                println!("skipped {}: {reason}", src.display());
            }
            Event::TxnCommitted { transaction_id } => {
                println!("Transaction ID: {transaction_id}");
            }
            Event::TxnHalted {
                transaction_id,
                error,
            } => {
                eprintln!("execution halted: {error}");
                if let Some(id) = transaction_id {
                    eprintln!("Transaction ID: {id} (completed moves can be rolled back)");
                }
            }
            Event::RollbackCompleted {
                transaction_id,
                restored,
            } => println!("Rolled back {transaction_id}: {restored} file(s) restored"),
            Event::RollbackIncomplete {
                transaction_id,
                not_restored,
            } => {
                eprintln!(
                    "Rollback of {transaction_id} incomplete; these files were not restored:"
                );
                for line in not_restored {
                    eprintln!("  {line}");
                }
            }
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn organized(&self) -> usize {
        self.organized
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn summary(&self) -> String {
        let mut line = format!(
            "Organized: {}, Failed: {}, Skipped: {}",
            self.organized, self.failed, self.skipped
        );
        if self.bytes > 0 {
            line.push_str(&format!(" ({} would move)", ByteSize::b(self.bytes)));
        }
        line
    }
}
