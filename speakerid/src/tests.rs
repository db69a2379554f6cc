use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use speakerid_kv::{MemoryStore, RedbStore};

use crate::{
    Aggregation, Config, EmbedError, Embedder, Metadata, Registry, SpeakerError,
    DEFAULT_THRESHOLD,
};

fn registry() -> Registry {
    Registry::in_memory(Config::default()).unwrap()
}

// ---------------------------------------------------------------------------
// Fake embedder
// ---------------------------------------------------------------------------

/// Maps each audio byte to one component, padding or truncating to `dim`.
struct ByteEmbedder {
    dim: usize,
    min_bytes: usize,
}

impl Embedder for ByteEmbedder {
    fn embed(&self, audio: &[u8]) -> Result<Vec<f32>, EmbedError> {
        if audio.len() < self.min_bytes {
            return Err(EmbedError::AudioTooShort {
                min_bytes: self.min_bytes,
                got_bytes: audio.len(),
            });
        }
        let mut v: Vec<f32> = audio.iter().take(self.dim).map(|&b| b as f32).collect();
        v.resize(self.dim, 0.0);
        Ok(v)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

// ---------------------------------------------------------------------------
// Enrollment and lookup
// ---------------------------------------------------------------------------

#[test]
fn identify_enrolled_speaker() {
    let reg = registry();
    reg.enroll("alice", &[1.0, 0.0, 0.0]).unwrap();
    reg.enroll("bob", &[0.0, 1.0, 0.0]).unwrap();

    let m = reg.identify(&[0.9, 0.1, 0.0], Some(0.9)).unwrap();
    assert_eq!(m.identity.as_deref(), Some("alice"));
    assert!(m.accepted);
    assert!(m.score > 0.99);

    let m = reg.identify(&[0.0, 0.0, 1.0], Some(0.9)).unwrap();
    assert_eq!(m.identity, None);
    assert!(!m.accepted);
}

#[test]
fn enroll_twice_then_unenroll() {
    let reg = registry();
    reg.enroll("alice", &[1.0, 0.0]).unwrap();
    reg.enroll("alice", &[0.9, 0.1]).unwrap();
    assert_eq!(reg.samples("alice").unwrap(), vec![vec![1.0, 0.0], vec![0.9, 0.1]]);

    assert_eq!(reg.unenroll("alice").unwrap(), 2);
    assert!(reg.list().is_empty());
    assert!(matches!(reg.samples("alice"), Err(SpeakerError::NotFound(_))));
    assert!(matches!(reg.unenroll("alice"), Err(SpeakerError::NotFound(_))));
}

#[test]
fn empty_registry() {
    let reg = registry();
    assert!(reg.list().is_empty());
    let m = reg.identify(&[1.0, 0.0], None).unwrap();
    assert!(!m.accepted);
    assert_eq!(m.score, -1.0);
    assert!(reg.rank(&[1.0, 0.0], 5).unwrap().is_empty());

    let stats = reg.stats();
    assert_eq!(stats.identities, 0);
    assert_eq!(stats.samples, 0);
    assert_eq!(stats.dimension, None);
}

#[test]
fn list_is_sorted() {
    let reg = registry();
    for id in ["mia", "amy", "zed", "amy"] {
        reg.enroll(id, &[1.0, 0.5]).unwrap();
    }
    assert_eq!(reg.list(), vec!["amy", "mia", "zed"]);
}

#[test]
fn invalid_identity_is_rejected_before_storage() {
    let reg = registry();
    for key in ["", "a/b", "spk:x", ".."] {
        assert!(matches!(
            reg.enroll(key, &[1.0]),
            Err(SpeakerError::InvalidIdentity { .. })
        ));
    }
    assert_eq!(reg.stats().dimension, None);
}

#[test]
fn first_enrollment_fixes_dimension() {
    let reg = registry();
    reg.enroll("alice", &[1.0, 0.0, 0.0]).unwrap();
    assert!(matches!(
        reg.enroll("bob", &[1.0, 0.0]),
        Err(SpeakerError::DimensionMismatch { got: 2, want: 3 })
    ));
    assert!(matches!(
        reg.identify(&[1.0, 0.0], None),
        Err(SpeakerError::DimensionMismatch { got: 2, want: 3 })
    ));
    assert_eq!(reg.list(), vec!["alice"]);
}

// ---------------------------------------------------------------------------
// Verification and thresholds
// ---------------------------------------------------------------------------

#[test]
fn verify_names_identity_only_when_accepted() {
    let reg = registry();
    reg.enroll("alice", &[1.0, 0.0]).unwrap();
    reg.enroll("bob", &[0.0, 1.0]).unwrap();

    let ok = reg.verify("alice", &[0.95, 0.05], None).unwrap();
    assert!(ok.accepted);
    assert_eq!(ok.identity.as_deref(), Some("alice"));

    let no = reg.verify("alice", &[0.0, 1.0], None).unwrap();
    assert!(!no.accepted);
    assert_eq!(no.identity, None);

    assert!(matches!(
        reg.verify("carol", &[1.0, 0.0], None),
        Err(SpeakerError::NotFound(_))
    ));
}

#[test]
fn default_threshold_applies_when_omitted() {
    let reg = registry();
    assert_eq!(reg.config().threshold(), DEFAULT_THRESHOLD);
    reg.enroll("alice", &[1.0, 0.0]).unwrap();

    // cos(query, alice) = 0.5
    let query = [0.5, 0.75f32.sqrt()];
    assert!(!reg.identify(&query, None).unwrap().accepted);
    assert!(reg.identify(&query, Some(0.4)).unwrap().accepted);
}

#[test]
fn configured_threshold_and_aggregation() {
    let reg = Registry::in_memory(Config {
        default_threshold: Some(0.4),
        aggregation: Aggregation::Mean,
        ..Config::default()
    })
    .unwrap();
    reg.enroll("alice", &[1.0, 0.0]).unwrap();
    reg.enroll("alice", &[0.0, 1.0]).unwrap();

    let m = reg.identify(&[1.0, 0.0], None).unwrap();
    assert!((m.score - 0.5).abs() < 1e-6);
    assert!(m.accepted);
}

#[test]
fn explicit_zero_default_threshold_is_honored() {
    let reg = Registry::in_memory(Config {
        default_threshold: Some(0.0),
        ..Config::default()
    })
    .unwrap();
    reg.enroll("alice", &[1.0, 0.0]).unwrap();

    // cos(query, alice) = 0.5
    let m = reg.identify(&[0.5, 0.75f32.sqrt()], None).unwrap();
    assert!(m.accepted);
    assert_eq!(m.identity.as_deref(), Some("alice"));

    // orthogonal scores 0.0, still accepted at threshold 0.0
    assert!(reg.identify(&[0.0, 1.0], None).unwrap().accepted);
}

#[test]
fn out_of_range_default_threshold_fails_open() {
    let cfg = Config {
        default_threshold: Some(1.5),
        ..Config::default()
    };
    assert!(matches!(
        Registry::in_memory(cfg),
        Err(SpeakerError::InvalidThreshold(_))
    ));
}

// ---------------------------------------------------------------------------
// Scoped identification and metadata
// ---------------------------------------------------------------------------

#[test]
fn identify_among_limits_candidates() {
    let reg = registry();
    reg.enroll("alice", &[1.0, 0.0]).unwrap();
    reg.enroll("bob", &[0.8, 0.6]).unwrap();
    reg.enroll("carol", &[0.0, 1.0]).unwrap();

    let all = reg.identify(&[1.0, 0.0], Some(0.5)).unwrap();
    assert_eq!(all.identity.as_deref(), Some("alice"));

    let scoped = reg
        .identify_among(&[1.0, 0.0], &["bob", "carol"], Some(0.5))
        .unwrap();
    assert_eq!(scoped.identity.as_deref(), Some("bob"));
    assert!((scoped.score - 0.8).abs() < 1e-6);

    let rejected = reg
        .identify_among(&[1.0, 0.0], &["carol"], Some(0.5))
        .unwrap();
    assert!(!rejected.accepted);

    let none = reg.identify_among(&[1.0, 0.0], &[], Some(0.5)).unwrap();
    assert!(!none.accepted);
    assert_eq!(none.score, -1.0);
}

#[test]
fn identify_among_unknown_identity_is_not_found() {
    let reg = registry();
    reg.enroll("alice", &[1.0, 0.0]).unwrap();
    assert!(matches!(
        reg.identify_among(&[1.0, 0.0], &["alice", "dave"], None),
        Err(SpeakerError::NotFound(id)) if id == "dave"
    ));
    assert!(matches!(
        reg.identify_among(&[1.0, 0.0], &["a/b"], None),
        Err(SpeakerError::InvalidIdentity { .. })
    ));
}

#[test]
fn enrollment_metadata_is_kept_per_sample() {
    let reg = registry();
    let meta = Metadata::from([
        ("relationship".to_string(), "mother".to_string()),
        ("is_user".to_string(), "false".to_string()),
    ]);
    let record = reg
        .enroll_with_metadata("mom", &[0.3, 0.7], meta.clone())
        .unwrap();
    assert_eq!(record.metadata, meta);
    reg.enroll("mom", &[0.4, 0.6]).unwrap();

    let records = reg.records("mom").unwrap();
    assert_eq!(records[0].metadata.get("relationship").map(String::as_str), Some("mother"));
    assert!(records[1].metadata.is_empty());
}

#[test]
fn compare_ignores_enrollments() {
    let reg = registry();
    reg.enroll("alice", &[1.0, 0.0, 0.0]).unwrap();
    let m = reg.compare(&[1.0, 1.0], &[1.0, 1.0], None).unwrap();
    assert!(m.accepted);
    assert_eq!(m.identity, None);
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

#[test]
fn enroll_and_identify_audio() {
    let reg = registry();
    let embedder = ByteEmbedder {
        dim: 4,
        min_bytes: 4,
    };
    reg.enroll_audio("alice", &[200, 10, 0, 0], &embedder).unwrap();
    reg.enroll_audio("bob", &[0, 0, 10, 200], &embedder).unwrap();

    let m = reg.identify_audio(&[190, 20, 0, 0, 7], &embedder, None).unwrap();
    assert_eq!(m.identity.as_deref(), Some("alice"));

    let err = reg.enroll_audio("carol", &[1, 2], &embedder).unwrap_err();
    assert!(matches!(
        err,
        SpeakerError::Embed(EmbedError::AudioTooShort {
            min_bytes: 4,
            got_bytes: 2
        })
    ));
    assert_eq!(reg.list(), vec!["alice", "bob"]);
}

#[test]
fn embedder_dimension_is_checked_before_embedding() {
    let reg = registry();
    reg.enroll("alice", &[1.0, 0.0, 0.0]).unwrap();
    let embedder = ByteEmbedder {
        dim: 4,
        min_bytes: 100,
    };
    // min_bytes would fail embed; the dimension check comes first.
    assert!(matches!(
        reg.enroll_audio("bob", &[1, 2, 3, 4], &embedder),
        Err(SpeakerError::DimensionMismatch { got: 4, want: 3 })
    ));
    assert!(matches!(
        reg.identify_audio(&[1, 2, 3, 4], &embedder, None),
        Err(SpeakerError::DimensionMismatch { got: 4, want: 3 })
    ));
}

#[test]
fn enroll_audio_validates_identity_first() {
    let reg = registry();
    let embedder = ByteEmbedder {
        dim: 4,
        min_bytes: 100,
    };
    assert!(matches!(
        reg.enroll_audio("a/b", &[1, 2, 3, 4], &embedder),
        Err(SpeakerError::InvalidIdentity { .. })
    ));
}

// ---------------------------------------------------------------------------
// Stats and bulk removal
// ---------------------------------------------------------------------------

#[test]
fn stats_and_identity_stats() {
    let reg = registry();
    reg.enroll("alice", &[1.0, 0.0]).unwrap();
    reg.enroll("alice", &[0.9, 0.1]).unwrap();
    reg.enroll("bob", &[0.0, 1.0]).unwrap();

    let stats = reg.stats();
    assert_eq!(stats.identities, 2);
    assert_eq!(stats.samples, 3);
    assert_eq!(stats.dimension, Some(2));

    let alice = reg.identity_stats("alice").unwrap();
    assert_eq!(alice.samples, 2);
    assert!(alice.first_enrolled <= alice.last_enrolled);
    assert!(matches!(
        reg.identity_stats("carol"),
        Err(SpeakerError::NotFound(_))
    ));
}

#[test]
fn clear_removes_everything() {
    let reg = registry();
    reg.enroll("alice", &[1.0, 0.0]).unwrap();
    reg.enroll("bob", &[0.0, 1.0]).unwrap();
    assert_eq!(reg.clear().unwrap(), 2);
    assert!(reg.list().is_empty());
    assert!(!reg.identify(&[1.0, 0.0], None).unwrap().accepted);
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn reopen_memory_store() {
    let kv = MemoryStore::new();
    {
        let reg = Registry::open(Config::default(), Arc::new(kv.clone())).unwrap();
        reg.enroll("alice", &[1.0, 0.0]).unwrap();
        reg.enroll("bob", &[0.0, 1.0]).unwrap();
        reg.enroll("alice", &[0.8, 0.2]).unwrap();
    }
    let reg = Registry::open(Config::default(), Arc::new(kv)).unwrap();
    assert_eq!(reg.list(), vec!["alice", "bob"]);
    assert_eq!(reg.samples("alice").unwrap(), vec![vec![1.0, 0.0], vec![0.8, 0.2]]);
    assert_eq!(
        reg.identify(&[0.0, 1.0], None).unwrap().identity.as_deref(),
        Some("bob")
    );
}

#[test]
fn reopen_redb_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("speakers.redb");

    let seq = {
        let kv = RedbStore::open(&path).unwrap();
        let reg = Registry::open(Config::default(), Arc::new(kv)).unwrap();
        reg.enroll("alice", &[0.1, 0.2, 0.3]).unwrap();
        reg.enroll("alice", &[0.3, 0.2, 0.1]).unwrap();
        reg.enroll("bob", &[-0.3, 0.2, 0.0]).unwrap();
        reg.unenroll("bob").unwrap();
        reg.records("alice").unwrap()[1].seq
    };

    let kv = RedbStore::open(&path).unwrap();
    let reg = Registry::open(Config::default(), Arc::new(kv)).unwrap();
    assert_eq!(reg.list(), vec!["alice"]);
    assert_eq!(reg.stats().dimension, Some(3));
    let records = reg.records("alice").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].seq, seq);

    let next = reg.enroll("carol", &[0.0, 0.0, 1.0]).unwrap();
    assert!(next.seq > seq);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_enrollments_are_all_kept() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 25;

    let reg = registry();
    std::thread::scope(|s| {
        for t in 0..THREADS {
            let reg = &reg;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    reg.enroll("bob", &[1.0, t as f32, i as f32]).unwrap();
                }
            });
        }
    });

    let records = reg.records("bob").unwrap();
    assert_eq!(records.len(), THREADS * PER_THREAD);
    assert!(records.windows(2).all(|w| w[0].seq < w[1].seq));
}

#[test]
fn readers_see_consistent_snapshots_during_writes() {
    const WRITES: usize = 200;

    let reg = registry();
    reg.enroll("alice", &[1.0, 0.0]).unwrap();
    let done = AtomicBool::new(false);

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let mut last = 0;
                while !done.load(Ordering::Acquire) {
                    let snap = reg.snapshot();
                    let total = snap.sample_count();
                    assert!(total >= last, "sample count went backwards");
                    last = total;
                    for (_, records) in snap.iter() {
                        assert!(!records.is_empty());
                        assert!(records.windows(2).all(|w| w[0].seq < w[1].seq));
                    }
                    let m = reg.identify(&[1.0, 0.0], None).unwrap();
                    assert_eq!(m.identity.as_deref(), Some("alice"));
                }
            });
        }

        s.spawn(|| {
            for i in 0..WRITES {
                let id = format!("user-{}", i % 10);
                reg.enroll(&id, &[0.0, 1.0 + i as f32]).unwrap();
            }
            done.store(true, Ordering::Release);
        });
    });

    assert_eq!(reg.stats().samples, WRITES + 1);
    assert_eq!(reg.list().len(), 11);
}
