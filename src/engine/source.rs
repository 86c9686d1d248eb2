use crate::error::Result;

pub type RecordIter<'a, R> = Box<dyn Iterator<Item = Result<R>> + 'a>;

pub trait Identified {
    fn id(&self) -> i64;
}

/// Lazy supply of records for one resource type.
///
/// An `Err` from `records` means the collection could not be enumerated at
/// all. An `Err` item means enumeration broke partway; the runner stops the
/// phase there. Batching is the source's business.
pub trait RecordSource: Send + Sync {
    type Record;

    fn records(&self) -> Result<RecordIter<'_, Self::Record>>;

    /// Point lookup, independent of any iteration in progress.
    /// `Ok(None)` when the record no longer exists.
    fn find(&self, id: i64) -> Result<Option<Self::Record>>;
}

#[derive(Debug, Clone, Default)]
pub struct VecSource<R> {
    records: Vec<R>,
}

impl<R> VecSource<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self { records }
    }
}

impl<R> RecordSource for VecSource<R>
where
    R: Identified + Clone + Send + Sync,
{
    type Record = R;

    fn records(&self) -> Result<RecordIter<'_, R>> {
        Ok(Box::new(self.records.iter().cloned().map(Ok)))
    }

    fn find(&self, id: i64) -> Result<Option<R>> {
        Ok(self.records.iter().find(|r| r.id() == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(i64);

    impl Identified for Item {
        fn id(&self) -> i64 {
            self.0
        }
    }

    #[test]
    fn test_vec_source_iterates_in_order() {
        let source = VecSource::new(vec![Item(3), Item(1), Item(2)]);
        let ids: Vec<i64> = source.records().unwrap().map(|r| r.unwrap().0).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_vec_source_find() {
        let source = VecSource::new(vec![Item(3), Item(1)]);
        assert_eq!(source.find(1).unwrap(), Some(Item(1)));
        assert_eq!(source.find(42).unwrap(), None);
    }
}
