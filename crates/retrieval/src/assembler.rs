use crate::corpus::DocumentStore;

/// Turns index hits into prompt context.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler<'a> {
    documents: &'a DocumentStore,
}

impl<'a> ContextAssembler<'a> {
    #[must_use]
    pub const fn new(documents: &'a DocumentStore) -> Self {
        Self { documents }
    }

    /// Joins the texts of `hits` with newlines, in hit order. Unknown ids are skipped.
    #[must_use]
    pub fn assemble(&self, hits: &[(usize, f32)]) -> String {
        let mut texts = Vec::with_capacity(hits.len());
        for (id, distance) in hits {
            match self.documents.get(*id) {
                Some(text) => {
                    log::debug!("context hit {id} (distance {distance:.4})");
                    texts.push(text);
                }
                None => log::warn!("Index returned id {id} with no matching document"),
            }
        }
        texts.join("\n")
    }
}
