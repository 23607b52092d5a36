// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use serde_json::{Map, json};
use understory_materialize::{Materializer, MaterializerOptions, Value, infer_schema};

#[derive(Clone)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u32(&mut self) -> u32 {
        // Numerical Recipes LCG parameters.
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 32) as u32
    }

    fn gen_range_usize(&mut self, upper_exclusive: usize) -> usize {
        if upper_exclusive == 0 {
            return 0;
        }
        (self.next_u32() as usize) % upper_exclusive
    }
}

/// `comps` entities with `props` fields, some of which reference `links`.
fn build_document(comps: usize, links: usize, props: usize, seed: u64) -> Value {
    let mut rng = Lcg::new(seed);

    let mut link_map = Map::new();
    for l in 0..links {
        link_map.insert(format!("link{l}"), json!({ "href": format!("/page/{l}") }));
    }

    let mut comp_map = Map::new();
    for c in 0..comps {
        let mut fields = Map::new();
        for p in 0..props {
            let field = if rng.gen_range_usize(4) == 0 {
                json!(format!("$links.link{}.href", rng.gen_range_usize(links)))
            } else {
                json!(p)
            };
            fields.insert(format!("p{p}"), field);
        }
        comp_map.insert(format!("comp{c}"), json!({ "props": fields }));
    }

    Value::from(json!({ "comps": comp_map, "links": link_map }))
}

/// `comps` entities where each one reads the label of the next.
fn build_chain(len: usize) -> Value {
    let mut comp_map = Map::new();
    for c in 0..len {
        let label = if c + 1 == len {
            json!(0)
        } else {
            json!(format!("$comps.comp{}.label", c + 1))
        };
        comp_map.insert(format!("comp{c}"), json!({ "label": label }));
    }
    Value::from(json!({ "comps": comp_map }))
}

fn loaded(document: &Value) -> Materializer {
    let mut m = Materializer::new(MaterializerOptions::new(2).observe("comps"))
        .expect("depth is non-zero");
    m.update(document, None).expect("documents are acyclic");
    m
}

fn bench_materialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("understory_materialize");
    group.sample_size(50);

    for &(comps, links) in &[(256_usize, 16_usize), (4_096_usize, 64_usize)] {
        let document = build_document(comps, links, 8, 0xD1A7_0000_0000_0001);
        let schema = infer_schema(&document);

        group.bench_function(format!("initial_update(c={comps},l={links})"), |b| {
            b.iter(|| black_box(loaded(&document)));
        });

        group.bench_function(
            format!("initial_update_precomputed_schema(c={comps},l={links})"),
            |b| {
                b.iter(|| {
                    let mut m = Materializer::new(MaterializerOptions::new(2).observe("comps"))
                        .expect("depth is non-zero");
                    black_box(m.update(&document, Some(&schema)).expect("acyclic"));
                });
            },
        );

        let link_update = Value::from(json!({ "links": { "link0": { "href": "/moved" } } }));
        group.bench_function(format!("fan_out_update(c={comps},l={links})"), |b| {
            b.iter_batched(
                || loaded(&document),
                |mut m| black_box(m.update(&link_update, None).expect("acyclic")),
                BatchSize::LargeInput,
            );
        });

        group.bench_function(format!("batched_comp_updates(c={comps},l={links})"), |b| {
            let updates: Vec<Value> = (0..comps)
                .step_by(7)
                .map(|i| Value::from(json!({ "comps": { format!("comp{i}"): { "extra": i } } })))
                .collect();
            b.iter_batched(
                || loaded(&document),
                |mut m| {
                    for update in &updates {
                        m.update_without_flush(update, None);
                    }
                    black_box(m.flush().expect("acyclic"))
                },
                BatchSize::LargeInput,
            );
        });
    }

    for &len in &[64_usize, 1_024_usize] {
        let chain = build_chain(len);
        let head = Value::from(json!({
            "comps": { format!("comp{}", len - 1): { "label": 1 } }
        }));
        group.bench_function(format!("chain_update(n={len})"), |b| {
            b.iter_batched(
                || loaded(&chain),
                |mut m| black_box(m.update(&head, None).expect("acyclic")),
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_materialize);
criterion_main!(benches);
