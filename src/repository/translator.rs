//! Identifier translation between external names and internal ids.

use crate::document::{DocId, TermId};
use crate::error::Result;
use crate::repository::Repository;

impl Repository {
    /// Resolve external document ids to internal ids.
    ///
    /// Returns `(external_id, internal_id)` pairs ordered by internal id.
    /// Duplicate inputs are resolved once and unknown names are dropped.
    ///
    /// ```no_run
    /// # fn main() -> quiver::error::Result<()> {
    /// let repository = quiver::open("/data/robust04")?;
    /// for (name, id) in repository.resolve_internal_ids(["FBIS3-10082", "LA070389-0001"])? {
    ///     assert_eq!(repository.external_id(id)?, name);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn resolve_internal_ids<I, S>(&self, external_ids: I) -> Result<Vec<(String, DocId)>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let open = self.ready()?;
        let names: Vec<S> = external_ids.into_iter().collect();
        open.collection.resolve(names.iter().map(|name| name.as_ref()))
    }

    /// External id of internal document `id`.
    pub fn external_id(&self, id: DocId) -> Result<String> {
        let open = self.ready()?;
        open.handle.check_document(id)?;
        open.collection.external_id(id)
    }

    /// Id of a term exactly as stored in the vocabulary (no normalisation).
    pub fn term_id(&self, term: &str) -> Result<Option<TermId>> {
        Ok(self.ready()?.index.term(term)?.map(|record| record.term_id))
    }

    /// Vocabulary string of `term_id`.
    pub fn term(&self, term_id: TermId) -> Result<Option<String>> {
        Ok(self
            .ready()?
            .index
            .term_by_id(term_id)?
            .map(|(term, _)| term))
    }
}
