//! Time-ordered identifier assignment for records about to be inserted.

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum IdError {
    #[error("identifier generation failed: {0}")]
    Generation(String),
}

/// Produces new time-ordered identifiers.
///
/// Implementations are shared across request handlers, so they must be safe
/// to call concurrently without outside locking.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Result<Uuid, IdError>;
}

/// UUIDv7 generator backed by the `uuid` crate's shared v7 context, which
/// keeps ids monotonic within the same millisecond.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidV7Generator;

impl IdGenerator for UuidV7Generator {
    fn generate(&self) -> Result<Uuid, IdError> {
        Ok(Uuid::now_v7())
    }
}

/// A record whose primary key is assigned before its first insert.
pub trait Identified {
    fn id(&self) -> Uuid;
    fn set_id(&mut self, id: Uuid);
}

/// Gives `record` a fresh identifier if it still carries the nil sentinel.
///
/// A caller-supplied id is never overwritten, so calling this again on the
/// same record is a no-op. On failure the record is left untouched.
pub fn assign_id<R: Identified + ?Sized>(
    record: &mut R,
    ids: &dyn IdGenerator,
) -> Result<(), IdError> {
    if !record.id().is_nil() {
        return Ok(());
    }

    let id = ids.generate()?;
    if id.is_nil() {
        return Err(IdError::Generation("generator returned the nil uuid".to_string()));
    }

    record.set_id(id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, time::Duration};

    use super::*;

    #[derive(Debug, Default)]
    struct Record {
        id: Uuid,
        title: String,
        year: Option<i32>,
    }

    impl Identified for Record {
        fn id(&self) -> Uuid {
            self.id
        }

        fn set_id(&mut self, id: Uuid) {
            self.id = id;
        }
    }

    struct FailingGenerator;

    impl IdGenerator for FailingGenerator {
        fn generate(&self) -> Result<Uuid, IdError> {
            Err(IdError::Generation("clock unavailable".to_string()))
        }
    }

    struct NilGenerator;

    impl IdGenerator for NilGenerator {
        fn generate(&self) -> Result<Uuid, IdError> {
            Ok(Uuid::nil())
        }
    }

    fn embedded_millis(id: Uuid) -> u64 {
        let (secs, nanos) = id.get_timestamp().expect("v7 ids carry a timestamp").to_unix();
        secs * 1000 + u64::from(nanos) / 1_000_000
    }

    #[test]
    fn assigns_v7_id_close_to_now() {
        let mut record =
            Record { title: "Inception".to_string(), year: Some(2010), ..Default::default() };

        assign_id(&mut record, &UuidV7Generator).unwrap();

        assert!(!record.id.is_nil());
        assert_eq!(record.id.get_version(), Some(uuid::Version::SortRand));
        assert_eq!(record.title, "Inception");
        assert_eq!(record.year, Some(2010));

        let now_ms = jiff::Timestamp::now().as_millisecond() as u64;
        let embedded = embedded_millis(record.id);
        assert!(now_ms.abs_diff(embedded) < 5_000, "embedded {embedded}, now {now_ms}");
    }

    #[test]
    fn keeps_caller_supplied_id() {
        let preset = Uuid::from_u128(u128::MAX ^ 1);
        let mut record = Record { id: preset, ..Default::default() };

        assign_id(&mut record, &UuidV7Generator).unwrap();

        assert_eq!(record.id.as_bytes(), preset.as_bytes());
    }

    #[test]
    fn second_call_is_a_noop() {
        let mut record = Record::default();
        assign_id(&mut record, &UuidV7Generator).unwrap();
        let first = record.id;

        assign_id(&mut record, &UuidV7Generator).unwrap();

        assert_eq!(record.id, first);
    }

    #[test]
    fn generator_failure_leaves_nil_id() {
        let mut record = Record { title: "Inception".to_string(), ..Default::default() };

        let err = assign_id(&mut record, &FailingGenerator).unwrap_err();

        assert!(matches!(err, IdError::Generation(_)));
        assert!(record.id.is_nil());
    }

    #[test]
    fn nil_from_generator_is_rejected() {
        let mut record = Record::default();

        assert!(assign_id(&mut record, &NilGenerator).is_err());
        assert!(record.id.is_nil());
    }

    #[test]
    fn failing_generator_is_not_consulted_for_preset_id() {
        let preset = Uuid::now_v7();
        let mut record = Record { id: preset, ..Default::default() };

        assign_id(&mut record, &FailingGenerator).unwrap();

        assert_eq!(record.id, preset);
    }

    #[test]
    fn ten_thousand_ids_are_distinct() {
        let ids: HashSet<Uuid> = (0..10_000)
            .map(|_| {
                let mut record = Record::default();
                assign_id(&mut record, &UuidV7Generator).unwrap();
                record.id
            })
            .collect();

        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn later_ids_sort_after_earlier_ones() {
        let mut a = Record::default();
        assign_id(&mut a, &UuidV7Generator).unwrap();

        std::thread::sleep(Duration::from_millis(5));

        let mut b = Record::default();
        assign_id(&mut b, &UuidV7Generator).unwrap();

        assert!(a.id < b.id);
        assert!(a.id.as_u128() < b.id.as_u128());
    }

    #[test]
    fn concurrent_generation_yields_distinct_ids() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    (0..1_000).map(|_| UuidV7Generator.generate().unwrap()).collect::<Vec<_>>()
                })
            })
            .collect();

        let ids: HashSet<Uuid> =
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect();

        assert_eq!(ids.len(), 4_000);
    }
}
