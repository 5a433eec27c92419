//! UI-agnostic rows and item groups backing a form step.

mod builders;
mod group;
mod item;

pub use builders::default_answer_type;
pub use group::{InputFieldTableItemGroup, ItemGroup, TableItemGroup};
pub use item::{ChoiceItem, TableItem, TableItemKind, TextInputItem};
