pub mod item;
pub mod node;
pub mod source;

pub use item::{Item, ItemUpdate, EMPTY_CONTENT};
pub use node::{Folder, Node};
pub use source::{
    Credentials, FulltextMode, Source, SourceUpdate, DEFAULT_UPDATE_EVERY, PLACEHOLDER_URL,
};
