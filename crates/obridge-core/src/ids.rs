use rand::Rng;

/// Source of random identifiers used while composing.
///
/// Injected so tests can pin uuids and sequence numbers.
pub trait IdGenerator: Send + Sync {
    fn uuid(&self) -> String;
    fn random_u32(&self) -> u32;
    /// Starting sequence number for one bundle level.
    fn sequence_seed(&self) -> u32;
}

/// Default generator backed by `uuid` v4 and the thread rng.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn uuid(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn random_u32(&self) -> u32 {
        rand::thread_rng().gen_range(0..4_294_967_290)
    }

    fn sequence_seed(&self) -> u32 {
        rand::thread_rng().gen_range(0..65_430)
    }
}

/// Deterministic generator: uuids are `uuid-1`, `uuid-2`, ... and random values count up.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: std::sync::atomic::AtomicU32,
}

impl IdGenerator for SequentialIds {
    fn uuid(&self) -> String {
        let n = self
            .next
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            .wrapping_add(1);
        format!("uuid-{n}")
    }

    fn random_u32(&self) -> u32 {
        self.next.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
    }

    fn sequence_seed(&self) -> u32 {
        100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_stay_in_range() {
        let ids = RandomIds;
        for _ in 0..64 {
            assert!(ids.sequence_seed() < 65_430);
        }
        assert_ne!(ids.uuid(), ids.uuid());
    }

    #[test]
    fn sequential_ids_are_predictable() {
        let ids = SequentialIds::default();
        assert_eq!(ids.uuid(), "uuid-1");
        assert_eq!(ids.uuid(), "uuid-2");
        assert_eq!(ids.sequence_seed(), 100);
    }
}
