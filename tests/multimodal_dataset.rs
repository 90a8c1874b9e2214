use rust_mmt::attentive_mnmt::{AttentiveMnmtConfig, AttentiveMnmtModel};
use rust_mmt::datasets::{MultimodalDataset, StreamKind, Topology};
use rust_mmt::vocab::{Vocabulary, EOS_ID, UNK_ID};
use rust_mmt::RustMmtError;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tch::{nn, Device, Kind, Tensor};

fn write_corpus(dir: &std::path::Path) -> anyhow::Result<HashMap<String, PathBuf>> {
    let en_path = dir.join("train.en");
    let de_path = dir.join("train.de");
    let image_path = dir.join("train-resnet50.npy");
    fs::write(
        &en_path,
        "a b c d\na\na b\na b c d e\nb c\nd\n",
    )?;
    fs::write(
        &de_path,
        "x y\nx\nx y z\ny\nz z\nx z\n",
    )?;
    Tensor::randn(&[6, 8, 2, 2], (Kind::Float, Device::Cpu)).write_npy(&image_path)?;

    let mut sources = HashMap::new();
    sources.insert("en".to_string(), en_path);
    sources.insert("de".to_string(), de_path);
    sources.insert("image".to_string(), image_path);
    Ok(sources)
}

fn test_vocabs() -> HashMap<String, Vocabulary> {
    let mut vocabs = HashMap::new();
    vocabs.insert(
        "en".to_string(),
        Vocabulary::from_tokens(&["a", "b", "c", "d", "e"]),
    );
    vocabs.insert("de".to_string(), Vocabulary::from_tokens(&["x", "y", "z"]));
    vocabs
}

#[test]
fn vocabulary_roundtrip() {
    let vocab = Vocabulary::from_tokens(&["a", "b", "c"]);
    assert_eq!(vocab.len(), 7);
    assert_eq!(vocab.token_to_id("a"), 4);
    assert_eq!(vocab.token_to_id("zebra"), UNK_ID);
    assert_eq!(vocab.sentence_to_ids("a c"), vec![4, 6, EOS_ID]);
    // Decoding skips <bos>, stops at <eos>.
    assert_eq!(vocab.ids_to_sentence(&[1, 4, 6, EOS_ID, 5]), "a c");
    assert_eq!(vocab.id_to_token(5), Some("b"));
}

#[test]
fn vocabulary_validates_reserved_entries() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let good = dir.path().join("vocab.json");
    fs::write(
        &good,
        r#"{"<pad>": 0, "<bos>": 1, "<eos>": 2, "<unk>": 3, "hund": 4}"#,
    )?;
    let vocab = Vocabulary::from_file(&good)?;
    assert_eq!(vocab.len(), 5);
    assert_eq!(vocab.token_to_id("hund"), 4);

    let bad = dir.path().join("bad.json");
    fs::write(&bad, r#"{"<pad>": 0, "<bos>": 1, "<unk>": 3, "hund": 4}"#)?;
    let err = Vocabulary::from_file(&bad).err().unwrap();
    assert!(matches!(err, RustMmtError::InvalidConfigurationError(_)));
    Ok(())
}

#[test]
fn topology_parsing() -> anyhow::Result<()> {
    let topology = Topology::new("en:Text, image:ImageFeats -> de:Text")?;
    assert_eq!(topology.srcs.len(), 2);
    assert_eq!(topology.trgs.len(), 1);
    assert_eq!(topology.first_src_text().unwrap().name, "en");
    assert_eq!(topology.first_trg_text().unwrap().name, "de");
    assert_eq!(topology.get("image").unwrap().kind, StreamKind::ImageFeats);
    assert_eq!(
        topology.to_string(),
        "en:Text, image:ImageFeats -> de:Text"
    );

    assert!(Topology::new("en:Text de:Text").is_err());
    assert!(Topology::new("en:Audio -> de:Text").is_err());
    assert!(Topology::new("-> de:Text").is_err());
    Ok(())
}

#[test]
fn dataset_loads_and_batches_sorted() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let sources = write_corpus(dir.path())?;
    let vocabs = test_vocabs();
    let topology = Topology::new("en:Text, image:ImageFeats -> de:Text")?;

    let dataset = MultimodalDataset::new(&sources, &vocabs, &topology, "en")?;
    assert_eq!(dataset.len(), 6);

    let batches = dataset.batches(4)?;
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].size(), 4);
    assert_eq!(batches[1].size(), 2);
    let mut total = 0;
    for batch in &batches {
        let tokens = batch.get("en")?;
        let lengths = &batch.lengths["en"];
        // Sorted by source length, longest first, as the encoder expects.
        for pair in lengths.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
        assert_eq!(tokens.size()[0], batch.size());
        assert_eq!(tokens.size()[1], *lengths.iter().max().unwrap());
        let image = batch.get("image")?;
        assert_eq!(image.size()[1..], [8, 2, 2]);
        total += batch.size();
    }
    assert_eq!(total, 6);
    Ok(())
}

#[test]
fn dataset_rejects_inconsistent_streams() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut sources = write_corpus(dir.path())?;
    let short = dir.path().join("short.de");
    fs::write(&short, "x\nz\n")?;
    sources.insert("de".to_string(), short);
    let topology = Topology::new("en:Text, image:ImageFeats -> de:Text")?;

    let err = MultimodalDataset::new(&sources, &test_vocabs(), &topology, "en")
        .err()
        .unwrap();
    assert!(matches!(err, RustMmtError::ValueError(_)));
    Ok(())
}

#[test]
fn dataset_requires_vocabularies_and_text_bucketing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let sources = write_corpus(dir.path())?;
    let topology = Topology::new("en:Text, image:ImageFeats -> de:Text")?;

    let mut vocabs = test_vocabs();
    vocabs.remove("de");
    let err = MultimodalDataset::new(&sources, &vocabs, &topology, "en")
        .err()
        .unwrap();
    assert!(matches!(err, RustMmtError::InvalidConfigurationError(_)));

    let err = MultimodalDataset::new(&sources, &test_vocabs(), &topology, "image")
        .err()
        .unwrap();
    assert!(matches!(err, RustMmtError::InvalidConfigurationError(_)));
    Ok(())
}

#[test]
fn model_dataset_registry_reuses_loaded_splits() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let sources = write_corpus(dir.path())?;
    let vocabs = test_vocabs();

    let vs = nn::VarStore::new(Device::Cpu);
    let mut config = AttentiveMnmtConfig::default();
    config.emb_dim = 16;
    config.enc_dim = 12;
    config.dec_dim = 20;
    config.src_vocab_size = vocabs["en"].len() as i64;
    config.trg_vocab_size = vocabs["de"].len() as i64;
    config.n_channels = 8;
    let mut model = AttentiveMnmtModel::new(&vs.root() / "model", &config)?;

    model.load_data("train", &sources, &vocabs)?;
    assert!(model.dataset("train").is_some());
    assert_eq!(model.dataset("train").unwrap().len(), 6);
    assert!(model.dataset("val").is_none());

    // A loaded split is reused, not rebuilt.
    model.load_data("train", &sources, &vocabs)?;
    assert_eq!(model.dataset("train").unwrap().len(), 6);

    // The loaded batches drive a full forward pass.
    let batches = model.dataset("train").unwrap().batches(3)?;
    let output = model.forward_t(&batches[0], true)?;
    assert!(output.loss.double_value(&[]).is_finite());
    assert!(output.n_items > 0);
    Ok(())
}
