//! Model blob parsing through the public API, including robustness
//! against corrupted input.

use microlite::test_utils::ModelBuilder;
use microlite::{registration_name, BuiltinOp, ModelInfo, Operator};

#[test]
fn model_facts_round_trip() {
    let blob = ModelBuilder::new(3)
        .description("keyword spotting")
        .operator(BuiltinOp::Conv2D)
        .operator(BuiltinOp::FullyConnected)
        .deprecated_builtin(25)
        .custom("TFLite_Detection_PostProcess")
        .build();

    let info = ModelInfo::parse(&blob).unwrap();
    assert_eq!(info.schema_version, 3);
    assert_eq!(info.description.as_deref(), Some("keyword spotting"));
    assert_eq!(
        info.operators,
        vec![
            Operator::Builtin(BuiltinOp::Conv2D),
            Operator::Builtin(BuiltinOp::FullyConnected),
            Operator::Builtin(BuiltinOp::Softmax),
            Operator::Custom("TFLite_Detection_PostProcess".to_string()),
        ]
    );
}

#[test]
fn corrupted_blobs_never_panic() {
    use rand::Rng;

    let blob = ModelBuilder::new(3)
        .description("garble me")
        .operator(BuiltinOp::Conv2D)
        .operator(BuiltinOp::Softmax)
        .custom("my_op")
        .build();

    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let mut corrupted = blob.clone();
        let flips = rng.gen_range(1..8);
        for _ in 0..flips {
            let at = rng.gen_range(0..corrupted.len());
            corrupted[at] = rng.gen();
        }
        // Any result is fine as long as nothing panics.
        let _ = ModelInfo::parse(&corrupted);
    }

    for len in 0..blob.len() {
        let _ = ModelInfo::parse(&blob[..len]);
    }
}

#[test]
fn operator_display_matches_model_format_names() {
    assert_eq!(
        Operator::Builtin(BuiltinOp::DepthwiseConv2D).to_string(),
        "DEPTHWISE_CONV_2D"
    );
    assert_eq!(Operator::Custom("my_op".to_string()).to_string(), "my_op");
    assert_eq!(Operator::Unknown(999).to_string(), "UNKNOWN(999)");

    assert_eq!(registration_name("DEPTHWISE_CONV_2D"), "AddDepthwiseConv2D");
    assert_eq!(
        BuiltinOp::UnidirectionalSequenceLstm.registration_name(),
        "AddUnidirectionalSequenceLSTM"
    );
}

#[test]
fn model_info_serializes_for_tooling() {
    let blob = ModelBuilder::new(3)
        .operator(BuiltinOp::FullyConnected)
        .custom("my_op")
        .build();
    let info = ModelInfo::parse(&blob).unwrap();

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["schema_version"], 3);
    assert_eq!(json["operators"][0], "FULLY_CONNECTED");
    assert_eq!(json["operators"][1], "my_op");
    assert_eq!(json["len"], blob.len());
}
