//! Ground-truth expectations derived from the store.

use tracing::debug;

use crate::error::{HarnessError, HarnessResult};
use crate::store::{Entity, Predicate, Store};

/// Caps a raw match count at the number of items a single page shows.
pub fn clamp_to_page(raw: u64, page_size: usize) -> u64 {
    raw.min(page_size as u64)
}

#[derive(Clone)]
pub struct Oracle {
    store: Store,
}

impl Oracle {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn count<E: Entity>(&self, predicate: &Predicate) -> HarnessResult<u64> {
        let count = self.store.count::<E>(predicate)?;
        debug!(kind = E::KIND, %predicate, count, "oracle count");
        Ok(count)
    }

    /// Number of records a first list page should show.
    pub fn expected_count<E: Entity>(
        &self,
        predicate: &Predicate,
        page_size: usize,
    ) -> HarnessResult<u64> {
        Ok(clamp_to_page(self.count::<E>(predicate)?, page_size))
    }

    /// Loads the first record matching `predicate`; a missing record is
    /// [`HarnessError::NotFound`].
    pub fn load<E: Entity>(&self, predicate: &Predicate) -> HarnessResult<E> {
        self.store
            .find_one::<E>(predicate)?
            .ok_or_else(|| HarnessError::NotFound {
                kind: E::KIND,
                predicate: predicate.to_string(),
            })
    }

    pub fn load_by_id<E: Entity>(&self, id: i64) -> HarnessResult<E> {
        self.load::<E>(&Predicate::new().eq("id", id))
    }
}
