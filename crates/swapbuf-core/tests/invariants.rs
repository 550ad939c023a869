//! Random operation sequences checked against a simple model.

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use swapbuf_common::types::BufferId;
use swapbuf_core::buffer::{BufferLock, BufferManager, BufferManagerConfig};
use swapbuf_core::monitor::FixedMemoryMonitor;

const SLOTS: u64 = 4;

#[derive(Debug, Clone)]
enum Op {
    Allocate(u64, usize),
    Set(u64, usize, u8),
    Reallocate(u64, usize),
    Destroy(u64),
    Lock(u64),
    Unlock(u64),
    Write(u64, u8),
    Dump(u64),
    Restore(u64),
}

fn op() -> impl Strategy<Value = Op> {
    let slot = 0..SLOTS;
    let size = 0usize..96;
    prop_oneof![
        (slot.clone(), size.clone()).prop_map(|(s, n)| Op::Allocate(s, n)),
        (slot.clone(), size.clone(), any::<u8>()).prop_map(|(s, n, seed)| Op::Set(s, n, seed)),
        (slot.clone(), size).prop_map(|(s, n)| Op::Reallocate(s, n)),
        slot.clone().prop_map(Op::Destroy),
        slot.clone().prop_map(Op::Lock),
        slot.clone().prop_map(Op::Unlock),
        (slot.clone(), any::<u8>()).prop_map(|(s, b)| Op::Write(s, b)),
        slot.clone().prop_map(Op::Dump),
        slot.prop_map(Op::Restore),
    ]
}

fn policy() -> impl Strategy<Value = (&'static str, Vec<(&'static str, &'static str)>)> {
    prop_oneof![
        Just(("never", vec![])),
        Just(("always", vec![])),
        Just(("barrier", vec![("barrier", "128B")])),
        Just(("valve", vec![("min_free_mem", "1KiB"), ("hysteresis_offset", "64B")])),
    ]
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(seed).wrapping_add(seed)).collect()
}

/// Expected content and lock count per id.
#[derive(Default)]
struct Model {
    content: HashMap<BufferId, Vec<u8>>,
    locks: HashMap<BufferId, u32>,
}

impl Model {
    fn locked(&self, id: BufferId) -> bool {
        self.locks.get(&id).copied().unwrap_or(0) > 0
    }
}

fn check(manager: &BufferManager, model: &Model) -> Result<(), TestCaseError> {
    let infos = manager.buffer_infos();
    prop_assert_eq!(infos.len(), model.content.len());
    for (id, info) in &infos {
        let expected = &model.content[id];
        prop_assert_eq!(info.size(), expected.len());
        prop_assert_eq!(info.lock_count(), model.locks.get(id).copied().unwrap_or(0));
        if info.lock_count() > 0 {
            prop_assert!(info.is_loaded());
        }
        prop_assert_eq!(info.file_path().is_some(), info.is_dumped());
    }
    Ok(())
}

fn run(policy: &str, params: &[(&str, &str)], ops: &[Op]) -> Result<(), TestCaseError> {
    let root = tempfile::tempdir().unwrap();
    let mut config = BufferManagerConfig::default()
        .with_temp_root(root.path())
        .with_policy(policy);
    for (name, value) in params {
        config = config.with_policy_param(*name, *value);
    }
    // Free memory sits just under the valve floor so it keeps firing
    let monitor = Arc::new(FixedMemoryMonitor::new(1000, 1 << 20));
    let manager = BufferManager::with_monitor(config, monitor).unwrap();

    let mut model = Model::default();
    let mut guards: Vec<BufferLock<'_>> = Vec::new();

    for op in ops {
        match *op {
            Op::Allocate(slot, size) => {
                let id = BufferId::new(slot);
                let result = manager.allocate(id, size);
                if model.content.contains_key(&id) {
                    prop_assert!(result.is_err());
                } else {
                    prop_assert!(result.is_ok());
                    model.content.insert(id, vec![0; size]);
                }
            }
            Op::Set(slot, size, seed) => {
                let id = BufferId::new(slot);
                let result = manager.set_buffer(id, pattern(size, seed));
                if model.locked(id) {
                    prop_assert!(result.is_err());
                } else {
                    prop_assert!(result.is_ok());
                    model.content.insert(id, pattern(size, seed));
                }
            }
            Op::Reallocate(slot, size) => {
                let id = BufferId::new(slot);
                let result = manager.reallocate(id, size);
                match model.content.get_mut(&id) {
                    Some(content) if !model.locks.get(&id).is_some_and(|n| *n > 0) => {
                        prop_assert!(result.is_ok());
                        content.resize(size, 0);
                    }
                    _ => prop_assert!(result.is_err()),
                }
            }
            Op::Destroy(slot) => {
                let id = BufferId::new(slot);
                let result = manager.destroy(id);
                if model.content.contains_key(&id) && !model.locked(id) {
                    prop_assert!(result.is_ok());
                    model.content.remove(&id);
                    model.locks.remove(&id);
                } else {
                    prop_assert!(result.is_err());
                }
            }
            Op::Lock(slot) => {
                let id = BufferId::new(slot);
                let result = manager.lock(id);
                if model.content.contains_key(&id) {
                    let guard = result.unwrap();
                    prop_assert_eq!(guard.to_vec(), model.content[&id].clone());
                    *model.locks.entry(id).or_default() += 1;
                    guards.push(guard);
                } else {
                    prop_assert!(result.is_err());
                }
            }
            Op::Unlock(slot) => {
                let id = BufferId::new(slot);
                if let Some(pos) = guards.iter().position(|g| g.id() == id) {
                    guards.swap_remove(pos).unlock().unwrap();
                    *model.locks.get_mut(&id).unwrap() -= 1;
                }
            }
            Op::Write(slot, byte) => {
                let id = BufferId::new(slot);
                if let Some(guard) = guards.iter().find(|g| g.id() == id) {
                    let mut bytes = guard.bytes_mut();
                    if let Some(first) = bytes.first_mut() {
                        *first = byte;
                        model.content.get_mut(&id).unwrap()[0] = byte;
                    }
                }
            }
            Op::Dump(slot) => {
                let id = BufferId::new(slot);
                let before = manager.buffer_info(id);
                let dumped = manager.dump_buffer(id);
                let expected = before.is_some_and(|info| info.is_dumpable());
                prop_assert_eq!(dumped, expected);
            }
            Op::Restore(slot) => {
                let id = BufferId::new(slot);
                let result = manager.restore_buffer(id);
                prop_assert_eq!(result.is_ok(), model.content.contains_key(&id));
            }
        }
        check(&manager, &model)?;
    }

    drop(guards);
    for (id, expected) in &model.content {
        prop_assert_eq!(&manager.lock(*id).unwrap().to_vec(), expected);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_random_sequences_match_model(
        (name, params) in policy(),
        ops in prop::collection::vec(op(), 1..60),
    ) {
        run(name, &params, &ops)?;
    }

    #[test]
    fn test_dump_restore_is_identity(bytes in prop::collection::vec(any::<u8>(), 1..4096)) {
        let root = tempfile::tempdir().unwrap();
        let config = BufferManagerConfig::default().with_temp_root(root.path());
        let manager = BufferManager::new(config).unwrap();
        let id = manager.next_buffer_id();
        manager.set_buffer(id, bytes.clone()).unwrap();

        prop_assert!(manager.dump_buffer(id));
        prop_assert!(manager.restore_buffer(id).unwrap());
        prop_assert_eq!(manager.lock(id).unwrap().to_vec(), bytes);
    }
}
