//! Batch evaluation client.
//!
//! A client evaluates one target node for one batch index at a time. All
//! operations of a batch share that batch's stream, drawn in evaluation
//! order, so the same context and batch index give the same outputs on any
//! worker and in any order.

use crate::error::{Error, Result};
use crate::model::{Model, NodeKind};
use serde::{Deserialize, Serialize};
use simbatch_ops::{Call, Meta, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info};
use xxhash_rust::xxh64::xxh64;

/// Outputs of one evaluated batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Index of the batch.
    pub batch_index: u64,
    /// Number of items in the batch.
    pub batch_size: usize,
    /// Identifier of the evaluation call that produced this batch.
    pub submission_index: u64,
    /// Output of every evaluated node.
    pub outputs: BTreeMap<String, Value>,
}

impl Batch {
    /// Output of a node.
    #[must_use]
    pub fn get(&self, node: &str) -> Option<&Value> {
        self.outputs.get(node)
    }

    /// Hash of the outputs.
    ///
    /// Two batches with identical outputs have the same fingerprint,
    /// regardless of which call or worker produced them.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut input = String::new();
        for (name, value) in &self.outputs {
            input.push_str(&format!("{name}={value:?};"));
        }
        xxh64(input.as_bytes(), 0)
    }
}

/// Evaluates model nodes batch by batch.
///
/// Clones share the submission counter.
#[derive(Debug, Clone, Default)]
pub struct Client {
    submissions: Arc<AtomicU64>,
}

impl Client {
    /// Creates a client whose first submission index is zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates `target` and its ancestors for one batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the target is unknown, the batch index is out
    /// of range, or an operation fails.
    pub fn compute_batch(&self, model: &Model, target: &str, batch_index: u64) -> Result<Batch> {
        let order = model.evaluation_order(target)?;
        let context = model.computation_context();
        let batch_size = context.batch_size();
        let mut stream = context.stream_for(batch_index)?;
        let submission_index = self.submissions.fetch_add(1, Ordering::Relaxed);

        debug!(
            model = model.name(),
            node = target,
            batch_index,
            batch_size,
            submission_index,
            nodes = order.len(),
            "Computing batch"
        );

        let mut outputs: BTreeMap<String, Value> = BTreeMap::new();
        for node in order {
            let value = match node.kind() {
                NodeKind::Constant(value) => value.clone(),
                NodeKind::Operation { op, uses_meta } => {
                    let args: Vec<Value> = node
                        .parents()
                        .iter()
                        .map(|parent| outputs[parent].clone())
                        .collect();

                    // The metadata seed is the only extra draw metadata costs.
                    let meta = uses_meta.then(|| Meta {
                        seed: stream.next_sub_seed(),
                        batch_index,
                        batch_size,
                        submission_index,
                        index_in_batch: None,
                    });

                    let mut call = Call::new(batch_size);
                    if let Some(meta) = meta {
                        call = call.with_meta(meta);
                    }
                    if op.wants().random_state {
                        call = call.with_random_state(&mut stream);
                    }

                    op.call(&args, &mut call).map_err(|source| Error::Node {
                        node: node.name().to_string(),
                        source,
                    })?
                }
            };
            outputs.insert(node.name().to_string(), value);
        }

        Ok(Batch {
            batch_index,
            batch_size,
            submission_index,
            outputs,
        })
    }

    /// Evaluates `target` for several batches on the blocking thread pool.
    ///
    /// Batches are returned in the order of `batch_indices`.
    ///
    /// # Errors
    ///
    /// Returns the first batch error encountered, or [`Error::Worker`] if a
    /// worker task panicked.
    pub async fn compute_batches(
        &self,
        model: Arc<Model>,
        target: &str,
        batch_indices: impl IntoIterator<Item = u64>,
    ) -> Result<Vec<Batch>> {
        let mut tasks = JoinSet::new();
        for (position, batch_index) in batch_indices.into_iter().enumerate() {
            let client = self.clone();
            let model = Arc::clone(&model);
            let target = target.to_string();
            tasks.spawn_blocking(move || {
                (position, client.compute_batch(&model, &target, batch_index))
            });
        }

        info!(batches = tasks.len(), node = target, "Computing batches");

        let mut batches = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let (position, batch) = joined.map_err(|e| Error::Worker(e.to_string()))?;
            batches.push((position, batch?));
        }
        batches.sort_by_key(|(position, _)| *position);

        Ok(batches.into_iter().map(|(_, batch)| batch).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ComputationContext, ContextConfig};
    use proptest::prelude::*;
    use rand::Rng;
    use simbatch_ops::{FnOperation, Wants};
    use simbatch_random::{ambient, RandomStream};
    use std::sync::{Mutex, PoisonError};

    /// Serialises tests that touch the ambient stream.
    static AMBIENT: Mutex<()> = Mutex::new(());

    fn context(config: ContextConfig) -> Arc<ComputationContext> {
        Arc::new(ComputationContext::new(config).unwrap())
    }

    fn uniform() -> FnOperation {
        FnOperation::new("uniform", Wants::RANDOM_STATE, |_, call| {
            let n = call.batch_size;
            let rng = call.random_state()?;
            Ok((0..n).map(|_| Value::Float(rng.gen_range(0.0..10.0))).collect())
        })
    }

    fn noisy() -> FnOperation {
        FnOperation::new("noisy", Wants::RANDOM_STATE, |args, call| {
            let rng = call.random_state()?;
            args[0]
                .as_list()?
                .iter()
                .map(|mu| -> simbatch_ops::Result<Value> {
                    let mu = mu.as_float()?;
                    Ok((0..3)
                        .map(|_| Value::Float(mu + rng.gen_range(-1.0..1.0_f64)))
                        .collect())
                })
                .collect()
        })
    }

    /// `k1 ~ uniform(0, 10)`, `k2 = k1 + noise` with three draws per item.
    fn simple_model(config: ContextConfig) -> Model {
        let mut model = Model::new("simple", context(config));
        model.add_operation("k1", uniform(), &[]).unwrap();
        model.add_operation("k2", noisy(), &["k1"]).unwrap();
        model
    }

    #[test]
    fn seeded_batches_are_reproducible() {
        let model = simple_model(ContextConfig::default().with_seed(123).with_batch_size(4));
        let client = Client::new();

        let first = client.compute_batch(&model, "k2", 3).unwrap();
        let second = client.compute_batch(&model, "k2", 3).unwrap();
        assert_eq!(first.outputs, second.outputs);
        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_ne!(first.submission_index, second.submission_index);

        let rebuilt = simple_model(ContextConfig::default().with_seed(123).with_batch_size(4));
        let third = Client::new().compute_batch(&rebuilt, "k2", 3).unwrap();
        assert_eq!(first.outputs, third.outputs);
    }

    #[test]
    fn batches_differ_from_each_other() {
        let model = simple_model(ContextConfig::default().with_seed(123).with_batch_size(4));
        let client = Client::new();
        let a = client.compute_batch(&model, "k1", 0).unwrap();
        let b = client.compute_batch(&model, "k1", 1).unwrap();
        assert_ne!(a.get("k1"), b.get("k1"));
    }

    #[test]
    fn fingerprint_follows_outputs_only() {
        let model = simple_model(ContextConfig::default().with_seed(123).with_batch_size(4));
        let client = Client::new();
        let a = client.compute_batch(&model, "k2", 0).unwrap();
        let b = client.compute_batch(&model, "k2", 1).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());

        let relabelled = Batch {
            batch_index: 9,
            submission_index: 99,
            ..a.clone()
        };
        assert_eq!(relabelled.fingerprint(), a.fingerprint());

        let mut edited = a.clone();
        edited.outputs.insert("k1".to_string(), Value::Float(0.0));
        assert_ne!(edited.fingerprint(), a.fingerprint());
    }

    #[test]
    fn batches_do_not_depend_on_evaluation_order() {
        let model = simple_model(ContextConfig::default().with_seed(7));
        let forward: Vec<_> = (0..4)
            .map(|i| Client::new().compute_batch(&model, "k2", i).unwrap().outputs)
            .collect();
        let mut backward: Vec<_> = (0..4)
            .rev()
            .map(|i| Client::new().compute_batch(&model, "k2", i).unwrap().outputs)
            .collect();
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn unseeded_batches_differ() {
        let _guard = AMBIENT.lock().unwrap_or_else(PoisonError::into_inner);

        let model = simple_model(ContextConfig::default().with_batch_size(2));
        let client = Client::new();
        let a = client.compute_batch(&model, "k1", 0).unwrap();
        let b = client.compute_batch(&model, "k1", 0).unwrap();
        assert_ne!(a.get("k1"), b.get("k1"));
    }

    #[test]
    fn unseeded_runs_draw_exactly_like_direct_ambient_use() {
        let _guard = AMBIENT.lock().unwrap_or_else(PoisonError::into_inner);
        let n = 5;

        ambient::seed(0);
        let model = simple_model(ContextConfig::default().with_batch_size(n));
        let batch = Client::new().compute_batch(&model, "k2", 0).unwrap();
        let after_model = ambient::state();

        ambient::seed(0);
        let mut rng = RandomStream::ambient();
        let k1: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..10.0)).collect();
        let k2: Vec<Value> = k1
            .iter()
            .map(|mu| {
                (0..3)
                    .map(|_| Value::Float(mu + rng.gen_range(-1.0..1.0_f64)))
                    .collect()
            })
            .collect();

        assert_eq!(after_model, ambient::state());
        assert_eq!(batch.get("k1"), Some(&Value::from(k1)));
        assert_eq!(batch.get("k2"), Some(&Value::List(k2)));
    }

    #[test]
    fn only_ancestors_are_evaluated() {
        let mut model = simple_model(ContextConfig::default().with_seed(1));
        let fail = FnOperation::new("fail", Wants::NONE, |_, _| {
            Err(simbatch_ops::Error::operation("should not run"))
        });
        model.add_operation("broken", fail, &["k1"]).unwrap();

        let batch = Client::new().compute_batch(&model, "k2", 0).unwrap();
        assert!(batch.get("broken").is_none());

        let err = Client::new().compute_batch(&model, "broken", 0).unwrap_err();
        assert!(matches!(&err, Error::Node { node, .. } if node == "broken"));
        assert!(err.node_error().is_some());
    }

    #[test]
    fn constants_flow_into_operations() {
        let mut model = Model::new("m", context(ContextConfig::default().with_seed(1)));
        model.add_constant("a", 20.into()).unwrap();
        let half = FnOperation::new("half", Wants::NONE, |args, _| {
            Ok(Value::Int(args[0].as_int()? / 2))
        });
        model.add_operation("b", half, &["a"]).unwrap();

        let batch = Client::new().compute_batch(&model, "b", 0).unwrap();
        assert_eq!(batch.get("a"), Some(&Value::Int(20)));
        assert_eq!(batch.get("b"), Some(&Value::Int(10)));
    }

    #[test]
    fn out_of_range_batch_is_rejected() {
        let model = simple_model(ContextConfig::default().with_seed(1).with_max_batches(10));
        assert!(matches!(
            Client::new().compute_batch(&model, "k1", 10),
            Err(Error::Random(_))
        ));
        assert!(matches!(
            Client::new().compute_batch(&model, "nope", 0),
            Err(Error::UnknownNode(_))
        ));
    }

    #[test]
    fn metadata_draw_is_the_only_extra_draw() {
        let seeded = ContextConfig::default().with_seed(11).with_batch_size(3);
        let plain = simple_model(seeded.clone());
        let mut with_meta = simple_model(seeded);
        with_meta.set_uses_meta("k1", true).unwrap();

        let a = Client::new().compute_batch(&plain, "k1", 0).unwrap();
        let b = Client::new().compute_batch(&with_meta, "k1", 0).unwrap();
        assert_ne!(a.get("k1"), b.get("k1"));

        let mut stream = plain.computation_context().stream_for(0).unwrap();
        let _ = stream.next_sub_seed();
        let expected: Value = (0..3)
            .map(|_| Value::Float(stream.gen_range(0.0..10.0)))
            .collect();
        assert_eq!(b.get("k1"), Some(&expected));
    }

    #[tokio::test]
    async fn parallel_batches_match_sequential_ones() {
        let model = Arc::new(simple_model(
            ContextConfig::default().with_seed(123).with_batch_size(2),
        ));
        let client = Client::new();

        let parallel = client
            .compute_batches(Arc::clone(&model), "k2", [4, 0, 2, 1])
            .await
            .unwrap();
        let indices: Vec<u64> = parallel.iter().map(|b| b.batch_index).collect();
        assert_eq!(indices, vec![4, 0, 2, 1]);

        for batch in &parallel {
            let sequential = client.compute_batch(&model, "k2", batch.batch_index).unwrap();
            assert_eq!(batch.outputs, sequential.outputs);
        }

        let mut submissions: Vec<u64> = parallel.iter().map(|b| b.submission_index).collect();
        submissions.sort_unstable();
        submissions.dedup();
        assert_eq!(submissions.len(), 4);
    }

    #[tokio::test]
    async fn parallel_failure_is_reported() {
        let model = Arc::new(simple_model(
            ContextConfig::default().with_seed(1).with_max_batches(2),
        ));
        let result = Client::new().compute_batches(model, "k1", 0..5).await;
        assert!(matches!(result, Err(Error::Random(_))));
    }

    #[cfg(unix)]
    mod external {
        use super::*;
        use simbatch_ops::{external_operation, vectorize, ResultType};

        fn model(seed: u64) -> Model {
            let mut model = Model::new(
                "external",
                context(ContextConfig::default().with_seed(seed).with_batch_size(3)),
            );
            model.add_constant("theta", 123.into()).unwrap();
            let sim = vectorize(
                external_operation(
                    "echo {seed} {0} {batch_index} {index_in_batch} {submission_index}",
                )
                .unwrap()
                .with_process_result(ResultType::Int32),
            );
            model.add_operation("sim", sim, &["theta"]).unwrap();
            model
        }

        #[test]
        fn metadata_placeholders_need_the_opt_in() {
            let err = Client::new().compute_batch(&model(1), "sim", 0).unwrap_err();
            assert!(matches!(
                err.node_error(),
                Some(simbatch_ops::Error::MisconfiguredMetadata { .. })
            ));
        }

        #[test]
        fn vectorized_external_receives_metadata() {
            let mut model = model(1);
            model.set_uses_meta("sim", true).unwrap();
            let client = Client::new();

            let batch = client.compute_batch(&model, "sim", 2).unwrap();
            let out = batch.get("sim").unwrap();

            let seeds = out.column(0).unwrap();
            assert!(seeds[0] != seeds[1] && seeds[1] != seeds[2] && seeds[0] != seeds[2]);
            assert_eq!(out.column(1).unwrap(), vec![Value::Int(123); 3]);
            assert_eq!(out.column(2).unwrap(), vec![Value::Int(2); 3]);
            assert_eq!(
                out.column(3).unwrap(),
                vec![Value::Int(0), Value::Int(1), Value::Int(2)]
            );
            let submission = i64::try_from(batch.submission_index).unwrap();
            assert_eq!(out.column(4).unwrap(), vec![Value::Int(submission); 3]);

            // Same batch again: same seeds, new submission index.
            let again = client.compute_batch(&model, "sim", 2).unwrap();
            let again = again.get("sim").unwrap();
            assert_eq!(again.column(0).unwrap(), seeds);
            assert_ne!(again.column(4).unwrap(), out.column(4).unwrap());

            // Another batch: different seeds.
            let other = client.compute_batch(&model, "sim", 3).unwrap();
            assert_ne!(other.get("sim").unwrap().column(0).unwrap(), seeds);
        }

        #[test]
        fn seed_without_metadata_comes_from_the_batch_stream() {
            let mut model = Model::new(
                "seeded",
                context(ContextConfig::default().with_seed(5)),
            );
            model.add_constant("theta", 7.into()).unwrap();
            let sim = external_operation("echo {0} {seed}")
                .unwrap()
                .with_process_result(ResultType::Int64);
            model.add_operation("sim", sim, &["theta"]).unwrap();

            let batch = Client::new().compute_batch(&model, "sim", 0).unwrap();
            let expected = model
                .computation_context()
                .stream_for(0)
                .unwrap()
                .next_sub_seed();
            assert_eq!(
                batch.get("sim"),
                Some(&Value::List(vec![Value::Int(7), Value::from(expected)]))
            );
        }
    }

    proptest! {
        #[test]
        fn fingerprint_is_stable(seed in any::<u64>(), batch_index in 0u64..1_000) {
            let model = simple_model(ContextConfig::default().with_seed(seed).with_batch_size(3));
            let client = Client::new();
            let a = client.compute_batch(&model, "k2", batch_index).unwrap();
            let b = client.compute_batch(&model, "k2", batch_index).unwrap();
            prop_assert_eq!(a.fingerprint(), b.fingerprint());
        }
    }
}
