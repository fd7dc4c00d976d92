pub mod commands;
pub mod editor;
pub mod input;
pub mod shortcuts;
pub mod sync;
pub mod tools;

pub use commands::CommandStack;
pub use editor::{Editor, EventResponse};
pub use input::{InputEvent, Modifiers};
pub use shortcuts::{ShortcutAction, ShortcutMap};
pub use sync::{Applied, GraphMutation, SyncEngine};
pub use tools::{ConnectFeedback, ConnectTool, Cursor, SelectTool, Tool, ToolKind};
