//! Codec integration tests.
//!
//! Tests verify:
//! - Lossless round trips for every backend
//! - Integer/string key fidelity
//! - The image path for u8, float and multi-channel arrays
//! - Decode-side rejection of malformed documents
//! - Compatibility with tags written by earlier producers

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value as Json};

use treepack::codec::{ArrayCodec, Backend, ImageCodec};
use treepack::{
    decode_tree, encode_tree, from_json_bytes, load_from_file, save_to_file, CodecError, DType,
    DecodeError, EncodeOptions, ImageFormat, ImageOptions, InputError, Key, Map, NdArray, Value,
};

use super::test_utils::{gradient, mean_abs_diff, unit_gradient};

fn image_options() -> EncodeOptions {
    EncodeOptions::default().with_image_path()
}

fn mixed_tree() -> Value {
    let nested = Map::new()
        .with(1, "one")
        .with("flag", false)
        .with("empty", Value::Null);

    Value::Map(
        Map::new()
            .with("name", "outfit")
            .with("scale", 1.25)
            .with(7, nested)
            .with(
                "parts",
                vec![
                    Value::from(1),
                    Value::from("two"),
                    Value::Map(Map::new().with(
                        "weights",
                        NdArray::from_f32(vec![2, 2], &[0.5, -1.0, 3.25, 0.0]).unwrap(),
                    )),
                ],
            )
            .with(
                "ids",
                NdArray::from_i64(vec![4], &[-5, 0, 1 << 40, 9]).unwrap(),
            )
            .with("mask", gradient(3, 4, 2)),
    )
}

fn member<'a>(encoded: &'a Json, name: &str) -> &'a Json {
    encoded
        .get(name)
        .unwrap_or_else(|| panic!("missing member {} in {}", name, encoded))
}

// =============================================================================
// Lossless Round Trips
// =============================================================================

#[test]
fn test_round_trip_every_backend() {
    let tree = mixed_tree();
    let mut options = vec![EncodeOptions::fallback()];
    options.extend(Backend::ALL.iter().map(|&b| EncodeOptions::fallback().with_backend(b)));

    for opts in options {
        let encoded = encode_tree(&tree, &opts).unwrap();
        let text = serde_json::to_string(&encoded).unwrap();
        let decoded = from_json_bytes(text.as_bytes()).unwrap();
        assert_eq!(decoded, tree, "round trip failed for {:?}", opts.backends);
    }
}

#[test]
fn test_integer_and_string_keys_stay_distinct() {
    let tree = Value::Map(Map::new().with(1, "int").with("1", "str"));

    let encoded = encode_tree(&tree, &EncodeOptions::default()).unwrap();
    assert_eq!(encoded, json!({"1|int|": "int", "1||": "str"}));

    let decoded = decode_tree(&encoded).unwrap();
    let map = decoded.as_map().unwrap();
    assert_eq!(map.get(Key::Int(1)), Some(&Value::from("int")));
    assert_eq!(map.get(Key::Str("1".to_string())), Some(&Value::from("str")));
    assert_eq!(decoded, tree);
}

#[test]
fn test_small_u8_array_is_exact() {
    let arr = NdArray::from_u8(vec![3, 4], (0..12).map(|v| v * 20).collect()).unwrap();
    let tree = Value::Map(Map::new().with("a", arr.clone()));

    let encoded = encode_tree(&tree, &image_options()).unwrap();
    assert!(member(&encoded, "a||array.zstd").is_string());

    let decoded = decode_tree(&encoded).unwrap();
    let back = decoded.as_map().unwrap().get("a").unwrap().as_array().unwrap();
    assert_eq!(back.dtype(), DType::U8);
    assert_eq!(back.shape(), &[3, 4]);
    assert_eq!(back, &arr);
}

#[test]
fn test_array_at_threshold_skips_image_path() {
    // Both leading axes must exceed 100
    let arr = gradient(100, 200, 3);
    let tree = Value::Map(Map::new().with("a", arr));

    let encoded = encode_tree(&tree, &image_options()).unwrap();
    assert!(member(&encoded, "a||array.zstd").is_string());
    assert_eq!(decode_tree(&encoded).unwrap(), tree);
}

// =============================================================================
// Image Path
// =============================================================================

#[test]
fn test_three_channel_image_path() {
    let arr = gradient(101, 101, 3);
    let tree = Value::Map(Map::new().with("img", arr.clone()));

    let encoded = encode_tree(&tree, &image_options()).unwrap();
    let payload = member(&encoded, "img||image").as_array().unwrap();
    assert_eq!(payload.len(), 2);
    assert!(payload[0].is_string());
    assert!(payload[1].is_null());

    let decoded = decode_tree(&encoded).unwrap();
    let back = decoded.as_map().unwrap().get("img").unwrap().as_array().unwrap();
    assert_eq!(back.dtype(), DType::U8);
    assert_eq!(back.shape(), &[101, 101, 3]);

    let mad = mean_abs_diff(back, &arr);
    assert!(mad < 5.0, "mean absolute difference too high: {}", mad);
}

#[test]
fn test_channel_overflow_goes_to_remainder() {
    let arr = gradient(150, 150, 5);
    let tree = Value::Map(Map::new().with(3, arr.clone()));

    let encoded = encode_tree(&tree, &image_options()).unwrap();
    let payload = member(&encoded, "3|int|image").as_array().unwrap();
    assert!(payload[0].is_string());
    assert!(payload[1].is_string());

    let decoded = decode_tree(&encoded).unwrap();
    let back = decoded.as_map().unwrap().get(3).unwrap().as_array().unwrap();
    assert_eq!(back.shape(), &[150, 150, 5]);

    // Channels past the third are stored losslessly
    let (_, rest_in) = arr.split_channels(3);
    let (_, rest_out) = back.split_channels(3);
    assert_eq!(rest_in, rest_out);

    let mad = mean_abs_diff(back, &arr);
    assert!(mad < 5.0, "mean absolute difference too high: {}", mad);
}

#[test]
fn test_float_image_path() {
    let arr = unit_gradient(120, 120, 3);
    let tree = Value::Map(Map::new().with("f", arr.clone()));

    let encoded = encode_tree(&tree, &image_options()).unwrap();
    assert!(member(&encoded, "f||image.float").is_array());

    let decoded = decode_tree(&encoded).unwrap();
    let back = decoded.as_map().unwrap().get("f").unwrap().as_array().unwrap();
    assert_eq!(back.dtype(), DType::F32);
    assert_eq!(back.shape(), &[120, 120, 3]);

    let mad = mean_abs_diff(back, &arr);
    assert!(mad < 5.0 / 255.0, "mean absolute difference too high: {}", mad);
    assert!(back.to_f64_vec().iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn test_grayscale_image_path_is_lossless() {
    // Fewer than three channels bypass the still-image codec
    let arr = gradient(150, 150, 1).reshape(vec![150, 150]).unwrap();
    let tree = Value::Map(Map::new().with("g", arr));

    let encoded = encode_tree(&tree, &image_options()).unwrap();
    assert!(member(&encoded, "g||image").is_string());
    assert_eq!(decode_tree(&encoded).unwrap(), tree);
}

#[test]
fn test_png_image_path_is_lossless() {
    let arr = gradient(110, 130, 4);
    let tree = Value::Map(Map::new().with("p", arr));
    let options = EncodeOptions::default().with_image(ImageOptions::new(ImageFormat::Png, 95));

    let encoded = encode_tree(&tree, &options).unwrap();
    assert!(member(&encoded, "p||image").is_array());
    assert_eq!(decode_tree(&encoded).unwrap(), tree);
}

#[test]
fn test_image_path_disabled_keeps_arrays_exact() {
    let arr = gradient(120, 120, 3);
    let tree = Value::Map(Map::new().with("a", arr));

    let encoded = encode_tree(&tree, &EncodeOptions::default()).unwrap();
    assert!(member(&encoded, "a||array.zstd").is_string());
    assert_eq!(decode_tree(&encoded).unwrap(), tree);
}

#[test]
fn test_legacy_preference_string() {
    let options: EncodeOptions = "jpeg|zstd".parse().unwrap();
    let tree = Value::Map(
        Map::new()
            .with("big", gradient(101, 101, 3))
            .with("small", gradient(2, 2, 1)),
    );

    let encoded = encode_tree(&tree, &options).unwrap();
    assert!(encoded.get("big||image").is_some());
    assert!(encoded.get("small||array.zstd").is_some());
}

// =============================================================================
// Rejection
// =============================================================================

#[test]
fn test_malformed_key_rejected() {
    for name in ["abc", "a|b"] {
        let err = decode_tree(&json!({ name: 1 })).unwrap_err();
        assert!(err.is_decode());
        assert_eq!(
            err.root(),
            &CodecError::Decode(DecodeError::MalformedKey(name.to_string()))
        );
    }
}

#[test]
fn test_unknown_backend_rejected() {
    let err = ArrayCodec::from_name("snappy").unwrap_err();
    assert_eq!(
        err,
        CodecError::Input(InputError::UnknownBackend("snappy".to_string()))
    );

    assert!(EncodeOptions::parse_backends(&["zstd", "brotli"]).is_err());

    let err = decode_tree(&json!({"a||array.snappy": "AAAA"})).unwrap_err();
    assert!(matches!(
        err.root(),
        CodecError::Decode(DecodeError::UnknownValueKind(_))
    ));
}

#[test]
fn test_corrupt_payload_reports_key_path() {
    let encoded = json!({
        "outer||dict": {
            "5|int|array.lz4": "bm90IGx6NA=="
        }
    });
    let err = decode_tree(&encoded).unwrap_err();
    assert!(err.is_decode());
    assert_eq!(err.key_path(), vec!["outer||dict", "5|int|array.lz4"]);
}

#[test]
fn test_payload_shape_mismatch_rejected() {
    for doc in [
        json!({"a||list": {"x||": 1}}),
        json!({"a||dict": [1]}),
        json!({"a||array.zstd": 12}),
        json!({"a||": {"x||": 1}}),
        json!({"a||image": [1, 2]}),
    ] {
        let err = decode_tree(&doc).unwrap_err();
        assert!(
            matches!(err.root(), CodecError::Decode(DecodeError::UnexpectedPayload { .. })),
            "{} gave {:?}",
            doc,
            err
        );
    }
}

#[test]
fn test_array_outside_map_rejected() {
    let tree = Value::Sequence(vec![Value::from(gradient(2, 2, 1))]);
    let err = encode_tree(&tree, &EncodeOptions::default()).unwrap_err();
    assert!(err.is_input());
}

/// A `.npy` v1.0 container with a hand-written header, zstd compressed and
/// base64 encoded as an `array.zstd` payload.
fn raw_array_payload(descr: &str, shape: &str, data: &[u8]) -> String {
    let mut dict = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        descr, shape
    );
    while (10 + dict.len() + 1) % 64 != 0 {
        dict.push(' ');
    }
    dict.push('\n');

    let mut npy = b"\x93NUMPY\x01\x00".to_vec();
    npy.extend_from_slice(&(dict.len() as u16).to_le_bytes());
    npy.extend_from_slice(dict.as_bytes());
    npy.extend_from_slice(data);
    STANDARD.encode(Backend::Zstd.compress(&npy).unwrap())
}

#[test]
fn test_oversized_array_header_rejected() {
    for shape in ["(4611686018427387904, 8)", "(2305843009213693952, 8)"] {
        let text = raw_array_payload("<f8", shape, &[]);
        let err = decode_tree(&json!({ "a||array.zstd": text })).unwrap_err();
        assert!(err.is_decode(), "shape {} gave {:?}", shape, err);
        assert!(matches!(
            err.root(),
            CodecError::Decode(DecodeError::ArrayContainer(_))
        ));
    }
}

#[test]
fn test_array_header_data_mismatch_rejected() {
    let text = raw_array_payload("|u1", "(3, 4)", &[0; 10]);
    let err = decode_tree(&json!({ "a||array.zstd": text })).unwrap_err();
    assert!(err.is_decode());
}

#[test]
fn test_image_remainder_mismatch_rejected() {
    let pixels = gradient(120, 120, 3);
    let image = ImageCodec::jpeg(90).encode(&pixels).unwrap();

    // Remainder whose leading axes disagree with the image
    let remainder = ArrayCodec::new(Backend::Zstd)
        .encode(&gradient(60, 120, 2))
        .unwrap();
    let err = decode_tree(&json!({ "img||image": [image.clone(), remainder] })).unwrap_err();
    assert!(err.is_decode());
    assert_eq!(err.key_path(), vec!["img||image"]);

    // Remainder container claiming more data than it holds
    let remainder = raw_array_payload("|u1", "(120, 120, 2)", &[0; 100]);
    let err = decode_tree(&json!({ "img||image": [image, remainder] })).unwrap_err();
    assert!(err.is_decode());
}

// =============================================================================
// Compatibility
// =============================================================================

#[test]
fn test_legacy_tags_decode() {
    let arr = gradient(4, 5, 1);
    let zstd = ArrayCodec::new(Backend::Zstd).encode(&arr).unwrap();
    let zlib = ArrayCodec::new(Backend::Zlib).encode(&arr).unwrap();
    let pixels = gradient(120, 120, 3);
    let jpeg = ImageCodec::jpeg(95).with_header(true).encode(&pixels).unwrap();

    let encoded = json!({
        "a||numpy.ndarray.zstd": zstd,
        "b||numpy.ndarray": zlib,
        "c||jpeg": [jpeg, null],
    });
    let decoded = decode_tree(&encoded).unwrap();
    let map = decoded.as_map().unwrap();

    assert_eq!(map.get("a").unwrap().as_array().unwrap(), &arr);
    assert_eq!(map.get("b").unwrap().as_array().unwrap(), &arr);

    let image = map.get("c").unwrap().as_array().unwrap();
    assert_eq!(image.shape(), &[120, 120, 3]);
    assert!(mean_abs_diff(image, &pixels) < 5.0);
}

#[test]
fn test_legacy_jpeg_in_opencv_channel_order() {
    // Stream as written by an OpenCV producer for an array whose channel 0
    // (blue) is high: the JPEG itself is blue
    let blue = image::RgbImage::from_pixel(128, 128, image::Rgb([10, 20, 220]));
    let mut stream = Vec::new();
    image::DynamicImage::ImageRgb8(blue)
        .write_to(&mut std::io::Cursor::new(&mut stream), image::ImageFormat::Jpeg)
        .unwrap();

    let encoded = json!({ "c||jpeg": [STANDARD.encode(&stream), null] });
    let decoded = decode_tree(&encoded).unwrap();
    let pixels = decoded.as_map().unwrap().get("c").unwrap().as_array().unwrap();
    assert_eq!(pixels.shape(), &[128, 128, 3]);

    let expected = NdArray::from_u8(vec![128, 128, 3], [220, 20, 10].repeat(128 * 128)).unwrap();
    assert!(mean_abs_diff(pixels, &expected) < 5.0);
}

#[test]
fn test_file_round_trip_with_image_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("item.json");
    let tree = Value::Sequence(vec![Value::Map(
        Map::new()
            .with("name", "shirt")
            .with("texture", gradient(128, 128, 3))
            .with("uv", NdArray::from_f32(vec![3], &[0.0, 0.5, 1.0]).unwrap()),
    )]);

    save_to_file(&path, &tree, &image_options()).unwrap();
    let loaded = load_from_file(&path).unwrap();

    let item = &loaded.as_sequence().unwrap()[0];
    let map = item.as_map().unwrap();
    assert_eq!(map.get("name"), Some(&Value::from("shirt")));
    assert_eq!(
        map.get("uv").unwrap().as_array().unwrap(),
        &NdArray::from_f32(vec![3], &[0.0, 0.5, 1.0]).unwrap()
    );
    let texture = map.get("texture").unwrap().as_array().unwrap();
    assert!(mean_abs_diff(texture, &gradient(128, 128, 3)) < 5.0);
}
