#[macro_use]
extern crate criterion;

use criterion::Criterion;
use rust_mmt::attentive_mnmt::{AttentiveMnmtConfig, AttentiveMnmtModel, TranslationOptions};
use rust_mmt::datasets::Batch;
use std::collections::HashMap;
use tch::{nn, Device, Kind, Tensor};

fn create_model() -> AttentiveMnmtModel {
    let vs = nn::VarStore::new(Device::Cpu);
    let mut config = AttentiveMnmtConfig::default();
    config.src_vocab_size = 1000;
    config.trg_vocab_size = 1000;
    config.n_channels = 64;
    AttentiveMnmtModel::new(&vs.root() / "model", &config).unwrap()
}

fn create_batch() -> Batch {
    let mut data = HashMap::new();
    data.insert(
        "en".to_string(),
        Tensor::randint(996, &[8, 12], (Kind::Int64, Device::Cpu)) + 4,
    );
    data.insert(
        "de".to_string(),
        Tensor::randint(996, &[8, 14], (Kind::Int64, Device::Cpu)) + 4,
    );
    data.insert(
        "image".to_string(),
        Tensor::randn(&[8, 64, 7, 7], (Kind::Float, Device::Cpu)),
    );
    Batch {
        data,
        lengths: HashMap::new(),
    }
}

fn bench_forward(c: &mut Criterion) {
    let mut model = create_model();
    let batch = create_batch();
    c.bench_function("attentive_mnmt_forward", |b| {
        b.iter(|| {
            let _ = model.forward_t(&batch, true).unwrap();
        })
    });
}

fn bench_greedy_translation(c: &mut Criterion) {
    let model = create_model();
    let batch = create_batch();
    let options = TranslationOptions {
        beam_size: 1,
        max_len: 20,
    };
    c.bench_function("attentive_mnmt_greedy_translation", |b| {
        b.iter(|| {
            let _ = model.translate(&batch, &options).unwrap();
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_forward, bench_greedy_translation
}
criterion_main!(benches);
