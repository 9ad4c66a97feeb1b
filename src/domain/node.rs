use serde::{Deserialize, Serialize};

use crate::domain::Source;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub title: String,
}

impl Folder {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// An entry of the subscription tree handed to the loader.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Source(Source),
    Folder(Folder),
}

impl From<Source> for Node {
    fn from(source: Source) -> Self {
        Node::Source(source)
    }
}

impl From<Folder> for Node {
    fn from(folder: Folder) -> Self {
        Node::Folder(folder)
    }
}
