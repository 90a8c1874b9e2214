use rust_mmt::attentive_mnmt::{
    doubly_stochastic_regularization, AttentionBottleneck, AttentionType, AttentiveMnmtConfig,
    AttentiveMnmtModel, ConditionalMmDecoder, ConditionalMmDecoderConfig, DecoderInit, FusionType,
    RnnType, TiedEmbedding, TranslationOptions, IMAGE_STREAM,
};
use rust_mmt::common::Activation;
use rust_mmt::datasets::Batch;
use rust_mmt::Config;
use rust_mmt::RustMmtError;
use std::collections::HashMap;
use std::io::Write;
use tch::{nn, Device, Kind, Tensor};

fn test_config() -> AttentiveMnmtConfig {
    let mut config = AttentiveMnmtConfig::default();
    config.emb_dim = 16;
    config.enc_dim = 12;
    config.dec_dim = 20;
    config.src_vocab_size = 31;
    config.trg_vocab_size = 37;
    config.n_channels = 8;
    config
}

fn test_batch() -> Batch {
    let mut data = HashMap::new();
    data.insert(
        "en".to_string(),
        Tensor::of_slice(&[5i64, 6, 7, 2, 8, 9, 2, 0]).view((2, 4)),
    );
    data.insert(
        "de".to_string(),
        Tensor::of_slice(&[10i64, 11, 2, 12, 2, 0]).view((2, 3)),
    );
    data.insert(
        IMAGE_STREAM.to_string(),
        Tensor::randn(&[2, 8, 3, 5], (Kind::Float, Device::Cpu)),
    );
    let mut lengths = HashMap::new();
    lengths.insert("en".to_string(), vec![4, 3]);
    lengths.insert("de".to_string(), vec![3, 2]);
    Batch { data, lengths }
}

#[test]
fn config_defaults_resolution() -> anyhow::Result<()> {
    let config: AttentiveMnmtConfig =
        serde_json::from_str(r#"{"src_vocab_size": 31, "trg_vocab_size": 37}"#)?;
    assert_eq!(config.fusion_type, FusionType::concat);
    assert_eq!(config.n_channels, 2048);
    assert!(config.alpha_c.abs() < f64::EPSILON);
    assert_eq!(config.tied_emb, TiedEmbedding::untied);
    assert_eq!(config.dec_init, DecoderInit::zero);
    assert_eq!(config.att_type, AttentionType::mlp);
    assert_eq!(config.att_activ, Activation::tanh);
    assert_eq!(config.att_bottleneck, AttentionBottleneck::Ctx);
    assert_eq!(config.src_vocab_size, 31);

    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(
        file,
        r#"{{"fusion_type": "sum", "alpha_c": 0.5, "att_bottleneck": {{"dim": 16}}}}"#
    )?;
    let config = AttentiveMnmtConfig::from_file(file.path());
    assert_eq!(config.fusion_type, FusionType::sum);
    assert!((config.alpha_c - 0.5).abs() < f64::EPSILON);
    assert_eq!(config.att_bottleneck, AttentionBottleneck::Dim(16));
    assert_eq!(config.n_channels, 2048);
    Ok(())
}

#[test]
fn config_rejects_unknown_fusion_type() {
    let parsed = serde_json::from_str::<AttentiveMnmtConfig>(r#"{"fusion_type": "avg"}"#);
    assert!(parsed.is_err());
    let parsed = serde_json::from_str::<AttentiveMnmtConfig>(r#"{"tied_emb": "4way"}"#);
    assert!(parsed.is_err());
}

#[test]
fn model_construction_fails_fast() {
    let vs = nn::VarStore::new(Device::Cpu);

    let mut config = test_config();
    config.alpha_c = -0.5;
    let err = AttentiveMnmtModel::new(&vs.root() / "m1", &config).err().unwrap();
    assert!(matches!(err, RustMmtError::InvalidConfigurationError(_)));

    let mut config = test_config();
    config.n_channels = 0;
    let err = AttentiveMnmtModel::new(&vs.root() / "m2", &config).err().unwrap();
    assert!(matches!(err, RustMmtError::InvalidConfigurationError(_)));

    // 3way tying needs a shared vocabulary.
    let mut config = test_config();
    config.tied_emb = TiedEmbedding::three_way;
    let err = AttentiveMnmtModel::new(&vs.root() / "m3", &config).err().unwrap();
    assert!(matches!(err, RustMmtError::InvalidConfigurationError(_)));
}

#[test]
fn alpha_reg_registered_at_construction() -> anyhow::Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);

    let mut config = test_config();
    config.alpha_c = 2.0;
    let model = AttentiveMnmtModel::new(&vs.root() / "regularized", &config)?;
    let alpha_reg = model.aux_loss().get("alpha_reg").unwrap();
    assert!(alpha_reg.double_value(&[]).abs() < f64::EPSILON);

    let model = AttentiveMnmtModel::new(&vs.root() / "plain", &test_config())?;
    assert!(model.aux_loss().get("alpha_reg").is_none());
    Ok(())
}

#[test]
fn encode_reshapes_image_features_without_mask() -> anyhow::Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let model = AttentiveMnmtModel::new(&vs.root() / "model", &test_config())?;
    let batch = test_batch();
    let original = batch.get(IMAGE_STREAM)?.shallow_clone();

    let encoded = model.encode(&batch, false)?;
    let (image_ctx, image_mask) = encoded.get(IMAGE_STREAM).unwrap();
    assert_eq!(image_ctx.size(), vec![15, 2, 8]);
    assert!(image_mask.is_none());

    // The reshape is a pure permutation: undoing it recovers the raw
    // features exactly.
    let restored = image_ctx.permute(&[1, 2, 0]).reshape(&[2, 8, 3, 5]);
    let diff = (&restored - &original).abs().sum(Kind::Float).double_value(&[]);
    assert!(diff == 0.0);

    let (text_ctx, text_mask) = encoded.get("en").unwrap();
    assert_eq!(text_ctx.size(), vec![4, 2, 24]);
    assert_eq!(text_mask.as_ref().unwrap().size(), vec![4, 2]);
    Ok(())
}

#[test]
fn three_way_tying_shares_embedding_storage() -> anyhow::Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let mut config = test_config();
    config.trg_vocab_size = config.src_vocab_size;
    config.tied_emb = TiedEmbedding::three_way;
    let model = AttentiveMnmtModel::new(&vs.root() / "tied", &config)?;

    tch::no_grad(|| {
        let mut src = model.src_embedding_weights();
        let _ = src.fill_(0.5);
    });
    let trg_mean = model.trg_embedding_weights().mean(Kind::Float).double_value(&[]);
    assert!((trg_mean - 0.5).abs() < 1e-6);

    tch::no_grad(|| {
        let mut trg = model.trg_embedding_weights();
        let _ = trg.fill_(0.25);
    });
    let src_mean = model.src_embedding_weights().mean(Kind::Float).double_value(&[]);
    assert!((src_mean - 0.25).abs() < 1e-6);
    Ok(())
}

#[test]
fn untied_embeddings_stay_independent() -> anyhow::Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let model = AttentiveMnmtModel::new(&vs.root() / "untied", &test_config())?;
    tch::no_grad(|| {
        let mut src = model.src_embedding_weights();
        let _ = src.fill_(0.5);
    });
    let trg_mean = model.trg_embedding_weights().mean(Kind::Float).double_value(&[]);
    assert!((trg_mean - 0.5).abs() > 1e-3);
    Ok(())
}

#[test]
fn perfect_attention_has_zero_regularization() {
    // Four steps of uniform attention over four locations: every location
    // accumulates a mass of exactly 1.
    let alphas: Vec<Tensor> = (0..4)
        .map(|_| Tensor::full(&[4, 2], 0.25, (Kind::Float, Device::Cpu)))
        .collect();
    let reg = doubly_stochastic_regularization(&alphas, 2.0);
    assert!(reg.double_value(&[]).abs() < 1e-6);

    // Half the mass missing on every one of the 6 locations:
    // (1 - 0.5)^2 * 6 * alpha_c = 3.
    let alphas: Vec<Tensor> = (0..2)
        .map(|_| Tensor::full(&[6, 2], 0.25, (Kind::Float, Device::Cpu)))
        .collect();
    let reg = doubly_stochastic_regularization(&alphas, 2.0);
    assert!((reg.double_value(&[]) - 3.0).abs() < 1e-5);
}

#[test]
fn alpha_reg_written_in_training_state_only() -> anyhow::Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let mut config = test_config();
    config.alpha_c = 2.0;
    let mut model = AttentiveMnmtModel::new(&vs.root() / "model", &config)?;
    let batch = test_batch();

    // Inference never writes the registry.
    let output = model.forward_t(&batch, false)?;
    assert!(output.loss.double_value(&[]).is_finite());
    assert_eq!(output.n_items, 5);
    assert!(model.aux_loss()["alpha_reg"].double_value(&[]).abs() < f64::EPSILON);

    // Training does.
    model.forward_t(&batch, true)?;
    let after_train = model.aux_loss()["alpha_reg"].double_value(&[]);
    assert!(after_train > 0.0);

    // A later inference pass leaves the entry untouched.
    model.forward_t(&batch, false)?;
    let after_eval = model.aux_loss()["alpha_reg"].double_value(&[]);
    assert!((after_train - after_eval).abs() < f64::EPSILON);
    Ok(())
}

#[test]
fn decoder_requires_populated_ctx_registry() {
    let vs = nn::VarStore::new(Device::Cpu);
    let mut ctx_size_dict = HashMap::new();
    ctx_size_dict.insert("en".to_string(), 24);
    let config = ConditionalMmDecoderConfig {
        input_size: 16,
        hidden_size: 20,
        n_vocab: 37,
        rnn_type: RnnType::gru,
        ctx_size_dict,
        ctx_name: "en".to_string(),
        fusion_type: FusionType::concat,
        tied_emb: TiedEmbedding::untied,
        dec_init: DecoderInit::zero,
        att_type: AttentionType::mlp,
        att_activ: Activation::tanh,
        transform_ctx: true,
        mlp_bias: false,
        att_bottleneck: AttentionBottleneck::Ctx,
        dropout_out: 0.0,
        emb_maxnorm: None,
        emb_gradscale: false,
    };
    let err = ConditionalMmDecoder::new(&vs.root() / "dec", &config).err().unwrap();
    assert!(matches!(err, RustMmtError::InvalidConfigurationError(_)));
}

#[test]
fn forward_covers_fusion_and_recurrence_variants() -> anyhow::Result<()> {
    let batch = test_batch();
    for (index, (fusion_type, rnn_type, dec_init)) in [
        (FusionType::sum, RnnType::gru, DecoderInit::zero),
        (FusionType::mul, RnnType::gru, DecoderInit::mean_ctx),
        (FusionType::concat, RnnType::lstm, DecoderInit::mean_ctx),
    ]
    .iter()
    .enumerate()
    {
        let vs = nn::VarStore::new(Device::Cpu);
        let mut config = test_config();
        config.fusion_type = *fusion_type;
        config.enc_type = *rnn_type;
        config.dec_type = *rnn_type;
        config.dec_init = *dec_init;
        // sum/mul fusion needs every attended context in a common space
        config.att_bottleneck = AttentionBottleneck::Dim(16);
        let mut model = AttentiveMnmtModel::new(&vs.root() / index.to_string().as_str(), &config)?;
        let output = model.forward_t(&batch, true)?;
        assert!(output.loss.double_value(&[]).is_finite());
        assert!(output.loss.double_value(&[]) > 0.0);
        assert_eq!(output.n_items, 5);
    }
    Ok(())
}

#[test]
fn sum_fusion_rejects_mismatched_context_sizes() {
    let vs = nn::VarStore::new(Device::Cpu);
    let mut config = test_config();
    config.fusion_type = FusionType::sum;
    // Ctx-sized bottlenecks differ between the text (24) and image (8)
    // streams.
    config.att_bottleneck = AttentionBottleneck::Ctx;
    let err = AttentiveMnmtModel::new(&vs.root() / "model", &config).err().unwrap();
    assert!(matches!(err, RustMmtError::InvalidConfigurationError(_)));
}

#[test]
fn embedding_max_norm_is_enforced() -> anyhow::Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let mut config = test_config();
    config.emb_maxnorm = Some(0.5);
    let mut model = AttentiveMnmtModel::new(&vs.root() / "model", &config)?;
    model.forward_t(&test_batch(), true)?;

    let ws = model.src_embedding_weights();
    let row_norms = (&ws * &ws).sum_dim_intlist(&[1], false, Kind::Float).sqrt();
    assert!(row_norms.max().double_value(&[]) <= 0.5 + 1e-4);
    Ok(())
}

#[test]
fn translate_produces_bounded_sequences() -> anyhow::Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let model = AttentiveMnmtModel::new(&vs.root() / "model", &test_config())?;
    let batch = test_batch();

    for beam_size in [1usize, 3].iter() {
        let options = TranslationOptions {
            beam_size: *beam_size,
            max_len: 7,
        };
        let outputs = model.translate(&batch, &options)?;
        assert_eq!(outputs.len(), 2);
        for output in outputs {
            assert!(output.len() <= 7);
            for id in output {
                assert!(id >= 0 && id < 37);
            }
        }
    }

    // Inference-only: the auxiliary-loss registry is never created by
    // decoding.
    assert!(model.aux_loss().is_empty());
    Ok(())
}
