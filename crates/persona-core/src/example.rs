use serde::{Deserialize, Serialize};

/// A labelled `(bio, posts, persona)` row from the training dataset.
///
/// `posts` is kept raw: the dataset packs several posts into one field
/// separated by `;`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub bio: String,
    pub posts: String,
    pub persona: String,
}

impl TrainingExample {
    /// Text used for embedding: bio, a space, then posts with `;` turned into `". "`.
    pub fn text(&self) -> String {
        format!("{} {}", self.bio, self.posts.replace(';', ". "))
    }
}
