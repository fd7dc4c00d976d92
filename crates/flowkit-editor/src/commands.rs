//! Undo/redo command stack.
//!
//! Every undoable step stores the whole document before and after, as
//! MessagePack snapshots. A step is pushed only when the model actually
//! changed, so no-op mutations (unknown ids, refused edges) never reach
//! the history. A batch (e.g. a drag gesture of many `MoveNode`s) records
//! a single step from its start to its end.

use crate::sync::{Applied, GraphMutation, SyncEngine};
use flowkit_core::document::GraphDocument;

/// One undoable step.
#[derive(Debug, Clone)]
struct Command {
    before: Vec<u8>,
    after: Vec<u8>,
    description: String,
}

/// Undo/redo stack of document snapshots.
#[derive(Debug)]
pub struct CommandStack {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
    max_depth: usize,
    /// Nesting depth of active batches.
    batch_depth: usize,
    /// Snapshot taken when the outermost batch began.
    batch_snapshot: Option<Vec<u8>>,
    batch_description: String,
}

fn encode(engine: &SyncEngine) -> Option<Vec<u8>> {
    match rmp_serde::to_vec_named(&engine.snapshot()) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            log::warn!("could not snapshot graph for history: {e}");
            None
        }
    }
}

fn restore(engine: &mut SyncEngine, bytes: &[u8]) -> bool {
    let doc: GraphDocument = match rmp_serde::from_slice(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            log::warn!("corrupt history snapshot: {e}");
            return false;
        }
    };
    match engine.restore(doc) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("could not restore history snapshot: {e}");
            false
        }
    }
}

impl CommandStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_depth,
            batch_depth: 0,
            batch_snapshot: None,
            batch_description: String::new(),
        }
    }

    /// Begin a batch: mutations until the matching `end_batch` become one
    /// undo step. Batches nest; only the outermost one records.
    pub fn begin_batch(&mut self, engine: &SyncEngine, description: &str) {
        if self.batch_depth == 0 {
            self.batch_snapshot = encode(engine);
            self.batch_description = description.to_string();
        }
        self.batch_depth += 1;
    }

    /// End a batch. Records a single step if the model changed.
    pub fn end_batch(&mut self, engine: &SyncEngine) {
        if self.batch_depth == 0 {
            return;
        }
        self.batch_depth -= 1;
        if self.batch_depth > 0 {
            return;
        }
        let Some(before) = self.batch_snapshot.take() else {
            return;
        };
        let Some(after) = encode(engine) else {
            return;
        };
        if before != after {
            let description = std::mem::take(&mut self.batch_description);
            self.push(Command {
                before,
                after,
                description,
            });
        }
    }

    pub fn in_batch(&self) -> bool {
        self.batch_depth > 0
    }

    /// Apply a mutation and record it for undo.
    pub fn execute(&mut self, engine: &mut SyncEngine, mutation: GraphMutation, description: &str) -> Applied {
        if self.in_batch() {
            return engine.apply_mutation(mutation);
        }

        let before = encode(engine);
        let applied = engine.apply_mutation(mutation);
        if applied.changed()
            && let Some(before) = before
            && let Some(after) = encode(engine)
        {
            self.push(Command {
                before,
                after,
                description: description.to_string(),
            });
        }
        applied
    }

    /// Record an arbitrary change made to `engine` between two snapshots,
    /// e.g. a whole-text replacement.
    pub fn record<F, T>(&mut self, engine: &mut SyncEngine, description: &str, change: F) -> T
    where
        F: FnOnce(&mut SyncEngine) -> T,
    {
        self.begin_batch(engine, description);
        let result = change(engine);
        self.end_batch(engine);
        result
    }

    fn push(&mut self, command: Command) {
        self.undo_stack.push(command);
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
    }

    /// Undo the last step. Returns its description.
    pub fn undo(&mut self, engine: &mut SyncEngine) -> Option<String> {
        let command = self.undo_stack.pop()?;
        if !restore(engine, &command.before) {
            self.undo_stack.push(command);
            return None;
        }
        let description = command.description.clone();
        self.redo_stack.push(command);
        Some(description)
    }

    /// Redo the last undone step. Returns its description.
    pub fn redo(&mut self, engine: &mut SyncEngine) -> Option<String> {
        let command = self.redo_stack.pop()?;
        if !restore(engine, &command.after) {
            self.redo_stack.push(command);
            return None;
        }
        let description = command.description.clone();
        self.undo_stack.push(command);
        Some(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
